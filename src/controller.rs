//! Task set controller.
//!
//! Owns the ordered task list and runs selected tasks strictly one after
//! another. A run is single-flight: while one is active, another start
//! request returns [`ControllerError::AlreadyRunning`] without side effects.
//! Cancellation is cooperative and checked between tasks only; the
//! in-flight task always reaches a terminal state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::{EventBus, SolverEvent};
use crate::pipeline::{SharedTask, TaskPipeline, TaskReport};
use crate::task::TaskSnapshot;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Running,
    /// Cancel requested; the in-flight task is finishing
    Cancelling,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("Failed to load tasks: {0:#}")]
    Load(anyhow::Error),
}

/// Point-in-time view for an operator UI.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub state: ControllerState,
    pub tasks: Vec<TaskSnapshot>,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    /// Selected tasks that never started because the run was cancelled
    pub not_started: usize,
    pub tasks: Vec<TaskReport>,
}

pub struct TaskSetController {
    pipeline: TaskPipeline,
    tasks: RwLock<Vec<SharedTask>>,
    running: AtomicBool,
    shutdown: CancellationToken,
    run_cancel: std::sync::Mutex<CancellationToken>,
    events: EventBus,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl TaskSetController {
    /// `shutdown` is the process-wide token; each run gets a child of it so
    /// that [`cancel`](Self::cancel) only affects the current run.
    pub fn new(pipeline: TaskPipeline, events: EventBus, shutdown: CancellationToken) -> Self {
        let run_cancel = shutdown.child_token();
        Self {
            pipeline,
            tasks: RwLock::new(Vec::new()),
            running: AtomicBool::new(false),
            shutdown,
            run_cancel: std::sync::Mutex::new(run_cancel),
            events,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn current_token(&self) -> CancellationToken {
        self.run_cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Fetch the task list from the problem source. Loaded tasks start in
    /// `Loaded` and selected.
    pub async fn load_tasks(&self) -> Result<usize, ControllerError> {
        if self.is_running() {
            return Err(ControllerError::AlreadyRunning);
        }
        let mut loaded = self
            .pipeline
            .source()
            .list_tasks()
            .await
            .map_err(ControllerError::Load)?;
        for task in &mut loaded {
            task.mark_loaded()
                .map_err(|e| ControllerError::Load(e.into()))?;
        }

        let count = loaded.len();
        *self.tasks.write().await = loaded
            .into_iter()
            .map(|t| Arc::new(Mutex::new(t)))
            .collect();
        tracing::info!(tasks = count, "Tasks loaded");
        Ok(count)
    }

    /// Set the selection flag of the task named `name`. Returns `false` if no
    /// such task exists.
    pub async fn select(&self, name: &str, selected: bool) -> bool {
        for task in self.tasks.read().await.iter() {
            let mut task = task.lock().await;
            if task.name() == name {
                task.set_selected(selected);
                return true;
            }
        }
        false
    }

    pub async fn set_all_selected(&self, selected: bool) {
        for task in self.tasks.read().await.iter() {
            task.lock().await.set_selected(selected);
        }
    }

    pub async fn status(&self) -> ControllerStatus {
        let state = if !self.is_running() {
            ControllerState::Idle
        } else if self.current_token().is_cancelled() {
            ControllerState::Cancelling
        } else {
            ControllerState::Running
        };

        let mut tasks = Vec::new();
        for task in self.tasks.read().await.iter() {
            tasks.push(task.lock().await.snapshot());
        }
        ControllerStatus { state, tasks }
    }

    /// Request cancellation of the active run. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        tracing::info!("Cancellation requested; finishing in-flight task");
        self.current_token().cancel();
        true
    }

    fn try_begin(&self) -> Result<CancellationToken, ControllerError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ControllerError::AlreadyRunning)?;
        let token = self.shutdown.child_token();
        *self
            .run_cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token.clone();
        Ok(token)
    }

    /// Run every selected task to completion on the current task.
    pub async fn run(&self) -> Result<RunReport, ControllerError> {
        let token = self.try_begin()?;
        let _guard = RunGuard {
            running: &self.running,
        };
        Ok(self.run_tasks(token).await)
    }

    /// Start a run in the background. The running flag is claimed before
    /// this returns, so a second `start` immediately after fails.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<RunReport>, ControllerError> {
        let token = self.try_begin()?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _guard = RunGuard {
                running: &this.running,
            };
            this.run_tasks(token).await
        }))
    }

    async fn run_tasks(&self, cancel: CancellationToken) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let mut selected = Vec::new();
        for task in self.tasks.read().await.iter() {
            if task.lock().await.is_selected() {
                selected.push(Arc::clone(task));
            }
        }
        tracing::info!(run_id = %run_id, tasks = selected.len(), "Run started");
        self.events.publish(SolverEvent::RunStarted {
            run_id,
            tasks: selected.len(),
        });

        let mut reports = Vec::with_capacity(selected.len());
        let mut not_started = 0;
        for (i, task) in selected.iter().enumerate() {
            if cancel.is_cancelled() {
                not_started = selected.len() - i;
                break;
            }

            {
                let mut guard = task.lock().await;
                if guard.status().is_terminal() {
                    if let Err(e) = guard.reset() {
                        tracing::warn!(task = %guard.name(), error = %e, "Could not reset task");
                    }
                }
            }

            match self.pipeline.process(task).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    let name = task.lock().await.name().to_string();
                    tracing::warn!(task = %name, error = %e, "Task skipped");
                }
            }
        }

        let cancelled = cancel.is_cancelled();
        tracing::info!(
            run_id = %run_id,
            processed = reports.len(),
            not_started,
            cancelled,
            "Run finished"
        );
        self.events.publish(SolverEvent::RunFinished { run_id, cancelled });

        RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            not_started,
            tasks: reports,
        }
    }
}
