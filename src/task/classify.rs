//! Contest classification by task URL.

use serde::{Deserialize, Serialize};

/// Kind of contest a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestKind {
    /// Exact-answer problems; sample outputs can be diffed.
    Standard,
    /// Optimization contests; there is no single correct output.
    Heuristic,
}

/// Classifies tasks by looking for a marker in their URL.
#[derive(Debug, Clone)]
pub struct ContestClassifier {
    marker: String,
}

impl Default for ContestClassifier {
    fn default() -> Self {
        Self::new("ahc")
    }
}

impl ContestClassifier {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into().to_lowercase(),
        }
    }

    /// A URL is heuristic when one of its path segments starts with the
    /// marker (`/contests/ahc030/tasks/ahc030_a`). Unparseable URLs fall back
    /// to a plain substring check.
    pub fn classify(&self, url: &str) -> ContestKind {
        if self.marker.is_empty() {
            return ContestKind::Standard;
        }
        let heuristic = match url::Url::parse(url) {
            Ok(parsed) => parsed
                .path_segments()
                .map(|mut segments| {
                    segments.any(|s| s.to_lowercase().starts_with(&self.marker))
                })
                .unwrap_or(false),
            Err(_) => url.to_lowercase().contains(&self.marker),
        };
        if heuristic {
            ContestKind::Heuristic
        } else {
            ContestKind::Standard
        }
    }
}
