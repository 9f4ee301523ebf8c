//! Model failover orchestrator.
//!
//! Turns a prompt into program source while the generative endpoint rate
//! limits, exhausts quotas and renames models underneath it. See
//! [`ModelFailover::generate`] for the retry policy.

mod candidates;
mod extract;
mod orchestrator;

pub use candidates::{rank_candidates, ExclusionSet, ModelCandidate};
pub use extract::{extract_code, extract_program};
pub use orchestrator::{rate_limit_wait, ModelFailover};

use std::time::Duration;

use serde::Serialize;

/// How a single request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    ParseError,
    QuotaExhausted,
    RateLimited,
    ModelNotFound,
    TransportError,
}

/// Record of one request in the failover loop. Ephemeral.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    pub model: String,
    /// HTTP status, `None` for transport failures
    pub status: Option<u16>,
    /// Wait hint parsed from a rate-limit body
    pub wait_hint_secs: Option<f64>,
    pub outcome: AttemptOutcome,
    /// Delay applied after this attempt before the next one
    pub delay: Duration,
}

/// Successful generation result.
#[derive(Debug, Clone)]
pub struct GeneratedProgram {
    pub source: String,
    pub model: String,
    pub attempts: Vec<GenerationAttempt>,
}

/// Errors surfaced by [`ModelFailover::generate`].
///
/// Recoverable conditions (rate limits, quotas, missing models, transport
/// hiccups, unusable payloads) never appear here unless they consume the
/// whole attempt budget.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Generation failed on {model} after {attempts} attempt(s): {message}")]
    GenerationFailed {
        model: String,
        status: Option<u16>,
        message: String,
        attempts: u32,
    },

    #[error("Generation timed out: attempt budget of {attempts} exhausted")]
    GenerationTimedOut { attempts: u32 },

    #[error("No candidate models left after {attempts} attempt(s) ({excluded} excluded)")]
    NoCandidates { attempts: u32, excluded: usize },
}
