//! Local verification harness.
//!
//! Writes a generated program into the shared scratch slot, compiles it with
//! the configured build command and runs it against every sample. A compile
//! failure, a non-zero exit or an output mismatch is a *verdict*, not an
//! error; [`HarnessError`] is reserved for I/O trouble and timeouts.

mod compare;
mod process;
mod scratch;
mod verifier;

pub use compare::{normalize_output, outputs_match};
pub use process::{run_shell, sanitize_output, ProcessOutput};
pub use scratch::ScratchSlot;
pub use verifier::VerificationHarness;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Result of running the program on one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SampleOutcome {
    Passed,
    RuntimeError {
        /// `None` when the process was killed by a signal
        exit_code: Option<i32>,
        output: String,
    },
    Mismatch {
        expected: String,
        actual: String,
    },
}

impl SampleOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Per-sample record kept in every post-compile verdict.
#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    /// 1-based sample index
    pub index: usize,
    pub outcome: SampleOutcome,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

/// Outcome of verifying one program.
///
/// `RuntimeError` and `Mismatch` describe the *first* failing sample, but
/// `reports` always covers every sample: evaluation never short-circuits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum VerificationVerdict {
    CompileFailed {
        output: String,
    },
    RuntimeError {
        index: usize,
        reports: Vec<SampleReport>,
    },
    Mismatch {
        index: usize,
        expected: String,
        actual: String,
        reports: Vec<SampleReport>,
    },
    AllPassed {
        reports: Vec<SampleReport>,
    },
    /// No samples available. `compiled` is true when a compile-only check ran and succeeded.
    SkippedNoSamples {
        compiled: bool,
    },
    /// Heuristic contests have no exact expected output.
    SkippedHeuristicContest,
}

impl VerificationVerdict {
    /// Only this verdict authorizes automatic submission.
    pub fn is_all_passed(&self) -> bool {
        matches!(self, Self::AllPassed { .. })
    }

    pub fn reports(&self) -> &[SampleReport] {
        match self {
            Self::RuntimeError { reports, .. }
            | Self::Mismatch { reports, .. }
            | Self::AllPassed { reports } => reports,
            _ => &[],
        }
    }

    /// Number of samples the program was actually run against.
    pub fn evaluated(&self) -> usize {
        self.reports().len()
    }

    /// One-line description for logs and run reports.
    pub fn summary(&self) -> String {
        match self {
            Self::CompileFailed { .. } => "compile failed".to_string(),
            Self::RuntimeError { index, reports } => format!(
                "runtime error on sample {} ({}/{} passed)",
                index,
                passed_count(reports),
                reports.len()
            ),
            Self::Mismatch { index, reports, .. } => format!(
                "wrong answer on sample {} ({}/{} passed)",
                index,
                passed_count(reports),
                reports.len()
            ),
            Self::AllPassed { reports } => format!("all {} samples passed", reports.len()),
            Self::SkippedNoSamples { compiled: true } => {
                "no samples; compile check passed".to_string()
            }
            Self::SkippedNoSamples { compiled: false } => "no samples; not verified".to_string(),
            Self::SkippedHeuristicContest => "heuristic contest; samples skipped".to_string(),
        }
    }
}

fn passed_count(reports: &[SampleReport]) -> usize {
    reports.iter().filter(|r| r.outcome.passed()).count()
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
