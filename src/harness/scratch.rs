//! The single shared scratch directory.

use std::path::{Path, PathBuf};

use super::HarnessError;

/// Fixed-location scratch directory holding one problem file and one program
/// file. Every staging overwrites both, so only one verification may use a
/// slot at a time; [`super::VerificationHarness`] serializes access.
#[derive(Debug)]
pub struct ScratchSlot {
    dir: PathBuf,
    program_file: String,
    problem_file: String,
}

impl ScratchSlot {
    pub fn new(dir: impl Into<PathBuf>, program_file: &str, problem_file: &str) -> Self {
        Self {
            dir: dir.into(),
            program_file: program_file.to_string(),
            problem_file: problem_file.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn program_path(&self) -> PathBuf {
        self.dir.join(&self.program_file)
    }

    pub fn problem_path(&self) -> PathBuf {
        self.dir.join(&self.problem_file)
    }

    /// Create the directory if needed and overwrite both files.
    /// A missing problem text truncates the problem file.
    pub async fn stage(&self, problem: Option<&str>, program: &str) -> Result<(), HarnessError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HarnessError::Io {
                context: format!("creating {}", self.dir.display()),
                source: e,
            })?;

        let problem_path = self.problem_path();
        tokio::fs::write(&problem_path, problem.unwrap_or_default())
            .await
            .map_err(|e| HarnessError::Io {
                context: format!("writing {}", problem_path.display()),
                source: e,
            })?;

        let program_path = self.program_path();
        tokio::fs::write(&program_path, program)
            .await
            .map_err(|e| HarnessError::Io {
                context: format!("writing {}", program_path.display()),
                source: e,
            })?;

        tracing::debug!(path = %program_path.display(), bytes = program.len(), "Staged program");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let slot = ScratchSlot::new(dir.path().join("scratch"), "main.rs", "problem.md");

        slot.stage(Some("first problem"), "fn main() { println!(\"one\"); }")
            .await
            .unwrap();
        slot.stage(None, "fn main() {}").await.unwrap();

        assert_eq!(std::fs::read_to_string(slot.program_path()).unwrap(), "fn main() {}");
        assert_eq!(std::fs::read_to_string(slot.problem_path()).unwrap(), "");
    }
}
