use serde::{Deserialize, Serialize};

/// A known-correct (input, expected output) pair extracted from a problem page.
///
/// Immutable once constructed; `index` is the extracted sample number
/// (1-based on most contest sites).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    index: usize,
    input: String,
    expected: String,
}

impl Sample {
    pub fn new(index: usize, input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            index,
            input: input.into(),
            expected: expected.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }
}
