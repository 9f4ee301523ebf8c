use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use super::prompt::build_prompt;
use super::{ProblemSource, SubmissionSink};
use crate::config::Config;
use crate::events::{EventBus, SolverEvent};
use crate::generation::{GenerationError, ModelFailover};
use crate::harness::{HarnessError, VerificationHarness, VerificationVerdict};
use crate::task::{ContestClassifier, Task, TaskError, TaskSnapshot, TaskStatus};

/// A task shared between the controller (for status reads) and the
/// pipeline processing it. The lock is only held for transitions, never
/// across an await on generation or verification.
pub type SharedTask = Arc<Mutex<Task>>;

/// Faults that send a task to `Error`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to fetch problem: {0:#}")]
    Fetch(anyhow::Error),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Verification harness error: {0}")]
    Harness(#[from] HarnessError),

    #[error("Submission failed: {0:#}")]
    Submit(anyhow::Error),

    #[error("Pipeline panicked: {0}")]
    Panicked(String),
}

/// Pipeline knobs taken from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub prompt_max_chars: usize,
    pub fence_tag: String,
    pub heuristic_marker: String,
    pub auto_submit: bool,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            prompt_max_chars: config.prompt_max_chars,
            fence_tag: config.generation.fence_tag.clone(),
            heuristic_marker: config.heuristic_marker.clone(),
            auto_submit: config.auto_submit,
        }
    }
}

/// Terminal result of processing one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub url: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<VerificationVerdict>,
    pub submitted: bool,
}

struct Solved {
    model: String,
    verdict: VerificationVerdict,
    submitted: bool,
}

/// Drives one task through fetch, generate, verify and submit.
pub struct TaskPipeline {
    failover: ModelFailover,
    harness: VerificationHarness,
    source: Arc<dyn ProblemSource>,
    sink: Arc<dyn SubmissionSink>,
    classifier: ContestClassifier,
    settings: PipelineSettings,
    events: EventBus,
}

impl TaskPipeline {
    pub fn new(
        failover: ModelFailover,
        harness: VerificationHarness,
        source: Arc<dyn ProblemSource>,
        sink: Arc<dyn SubmissionSink>,
        settings: PipelineSettings,
        events: EventBus,
    ) -> Self {
        Self {
            failover,
            harness,
            source,
            sink,
            classifier: ContestClassifier::new(settings.heuristic_marker.clone()),
            settings,
            events,
        }
    }

    pub fn source(&self) -> &Arc<dyn ProblemSource> {
        &self.source
    }

    /// Process `task` to a terminal state.
    ///
    /// Fails only if the task cannot enter `Processing`. Every fault after
    /// that, panics included, is recorded on the task as `Error` and the
    /// report is still returned.
    pub async fn process(&self, task: &SharedTask) -> Result<TaskReport, TaskError> {
        let snapshot = {
            let mut guard = task.lock().await;
            guard.start()?;
            guard.snapshot()
        };
        self.publish_status(&snapshot);
        tracing::info!(task = %snapshot.name, url = %snapshot.url, "Processing task");

        let result = AssertUnwindSafe(self.solve(&snapshot))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PipelineError::Panicked(panic_message(panic.as_ref()))));

        let mut guard = task.lock().await;
        let report = match result {
            Ok(solved) => {
                guard.complete()?;
                tracing::info!(
                    task = %snapshot.name,
                    verdict = %solved.verdict.summary(),
                    submitted = solved.submitted,
                    "Task done"
                );
                TaskReport {
                    task: snapshot.name.clone(),
                    url: snapshot.url.clone(),
                    status: guard.status().clone(),
                    model: Some(solved.model),
                    verdict: Some(solved.verdict),
                    submitted: solved.submitted,
                }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(task = %snapshot.name, error = %message, "Task failed");
                guard.fail(message)?;
                TaskReport {
                    task: snapshot.name.clone(),
                    url: snapshot.url.clone(),
                    status: guard.status().clone(),
                    model: None,
                    verdict: None,
                    submitted: false,
                }
            }
        };
        let finished = guard.snapshot();
        drop(guard);
        self.publish_status(&finished);
        Ok(report)
    }

    async fn solve(&self, task: &TaskSnapshot) -> Result<Solved, PipelineError> {
        let problem = self
            .source
            .fetch_problem(task)
            .await
            .map_err(PipelineError::Fetch)?;
        tracing::debug!(
            task = %task.name,
            samples = problem.samples.len(),
            statement_chars = problem.statement.chars().count(),
            "Fetched problem"
        );

        let prompt = build_prompt(
            &problem.statement,
            &self.settings.fence_tag,
            self.settings.prompt_max_chars,
        );
        let generated = self.failover.generate(&prompt).await?;

        let kind = self.classifier.classify(&task.url);
        let verdict = self
            .harness
            .verify_with_problem(
                Some(&problem.statement),
                &generated.source,
                &problem.samples,
                kind,
            )
            .await?;

        let submitted = if verdict.is_all_passed() && self.settings.auto_submit {
            self.sink
                .submit(task, &generated.source)
                .await
                .map_err(PipelineError::Submit)?;
            self.events.publish(SolverEvent::Submitted {
                task: task.name.clone(),
            });
            true
        } else {
            tracing::info!(
                task = %task.name,
                verdict = %verdict.summary(),
                "Submission left to operator"
            );
            false
        };

        Ok(Solved {
            model: generated.model,
            verdict,
            submitted,
        })
    }

    fn publish_status(&self, snapshot: &TaskSnapshot) {
        self.events.publish(SolverEvent::TaskStatusChanged {
            task: snapshot.name.clone(),
            status: snapshot.status.clone(),
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
