//! Task pipeline: fetch, generate, verify, submit.
//!
//! The pipeline owns a task's `Processing -> {Done, Error}` transitions. The
//! problem source and the submission sink are collaborators behind traits so
//! the pipeline never knows whether problems come from a contest site or a
//! local manifest.

mod prompt;
mod runner;
#[cfg(test)]
pub(crate) mod testing;

pub use prompt::{build_prompt, language_name};
pub use runner::{PipelineError, PipelineSettings, SharedTask, TaskPipeline, TaskReport};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::task::{Sample, Task, TaskSnapshot};

/// Problem statement and samples for one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemData {
    pub statement: String,
    pub samples: Vec<Sample>,
}

/// Supplies tasks and their problem data.
#[async_trait]
pub trait ProblemSource: Send + Sync {
    /// Tasks in contest order. Returned tasks are `Idle`.
    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>>;

    /// Statement text and ordered samples for `task`.
    async fn fetch_problem(&self, task: &TaskSnapshot) -> anyhow::Result<ProblemData>;
}

/// Receives the final source of a task that passed every sample.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn submit(&self, task: &TaskSnapshot, source: &str) -> anyhow::Result<()>;
}
