//! Core Task type and its status state machine.
//!
//! # Invariants
//! - A task reaches `Done` or `Error` at most once per run
//! - Only a `Processing` task can reach a terminal state
//! - `(name, url)` identifies a task within a task set

use serde::{Deserialize, Serialize};

/// Status of a task in its lifecycle.
///
/// # State Machine
/// ```text
/// Idle -> Loaded -> Processing -> Done
///    \______________/        \-> Error
/// ```
/// `reset` moves a terminal task back to `Loaded` between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Known by name only
    Idle,
    /// Problem data fetched and ready
    Loaded,
    /// A pipeline is generating/verifying this task
    Processing,
    /// Pipeline finished without a fault
    Done,
    /// Pipeline faulted
    Error { message: String },
}

impl TaskStatus {
    /// `true` if the task is Done or Error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            TaskStatus::Idle => "Idle",
            TaskStatus::Loaded => "Loaded",
            TaskStatus::Processing => "Processing",
            TaskStatus::Done => "Done",
            TaskStatus::Error { .. } => "Error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Error { message } => write!(f, "Error: {}", message),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// One problem within a contest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Display name (e.g. "A - Welcome")
    name: String,

    /// Canonical problem URL
    url: String,

    status: TaskStatus,

    /// Whether the controller should process this task
    selected: bool,
}

impl Task {
    /// Create a new task in `Idle`, selected by default.
    ///
    /// # Errors
    /// Returns `Err` if `name` is blank.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, TaskError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TaskError::EmptyName);
        }
        Ok(Self {
            name,
            url: url.into(),
            status: TaskStatus::Idle,
            selected: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            name: self.name.clone(),
            url: self.url.clone(),
            status: self.status.clone(),
            selected: self.selected,
        }
    }

    // State transitions - explicit and validated

    /// Mark problem data as fetched.
    ///
    /// # Precondition
    /// `self.status` is `Idle` or `Loaded`
    pub fn mark_loaded(&mut self) -> Result<(), TaskError> {
        match &self.status {
            TaskStatus::Idle | TaskStatus::Loaded => {
                self.status = TaskStatus::Loaded;
                Ok(())
            }
            other => Err(TaskError::invalid(other, "Loaded")),
        }
    }

    /// Transition the task to Processing.
    ///
    /// # Precondition
    /// `self.status` is `Idle` or `Loaded`
    pub fn start(&mut self) -> Result<(), TaskError> {
        match &self.status {
            TaskStatus::Idle | TaskStatus::Loaded => {
                self.status = TaskStatus::Processing;
                Ok(())
            }
            other => Err(TaskError::invalid(other, "Processing")),
        }
    }

    /// Transition the task to Done.
    ///
    /// # Precondition
    /// `self.status == Processing`
    pub fn complete(&mut self) -> Result<(), TaskError> {
        match &self.status {
            TaskStatus::Processing => {
                self.status = TaskStatus::Done;
                Ok(())
            }
            other => Err(TaskError::invalid(other, "Done")),
        }
    }

    /// Transition the task to Error, recording `message`.
    ///
    /// # Precondition
    /// `self.status == Processing`
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TaskError> {
        match &self.status {
            TaskStatus::Processing => {
                self.status = TaskStatus::Error {
                    message: message.into(),
                };
                Ok(())
            }
            other => Err(TaskError::invalid(other, "Error")),
        }
    }

    /// Prepare a finished task for another run.
    ///
    /// Terminal tasks go back to `Loaded`; `Idle` and `Loaded` are left as is.
    ///
    /// # Errors
    /// Returns `Err` if the task is `Processing`.
    pub fn reset(&mut self) -> Result<(), TaskError> {
        match &self.status {
            TaskStatus::Done | TaskStatus::Error { .. } => {
                self.status = TaskStatus::Loaded;
                Ok(())
            }
            TaskStatus::Idle | TaskStatus::Loaded => Ok(()),
            other => Err(TaskError::invalid(other, "Loaded")),
        }
    }
}

/// Serializable view of a task for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub name: String,
    pub url: String,
    pub status: TaskStatus,
    pub selected: bool,
}

/// Errors that can occur during task operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Task name cannot be empty")]
    EmptyName,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl TaskError {
    fn invalid(from: &TaskStatus, to: &str) -> Self {
        TaskError::InvalidTransition {
            from: from.label().to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("A - Sum", "https://atcoder.jp/contests/abc300/tasks/abc300_a").unwrap()
    }

    #[test]
    fn new_task_is_idle_and_selected() {
        let t = task();
        assert_eq!(t.status(), &TaskStatus::Idle);
        assert!(t.is_selected());
        assert_eq!(Task::new("  ", "u").unwrap_err(), TaskError::EmptyName);
    }

    #[test]
    fn happy_path_reaches_done_once() {
        let mut t = task();
        t.mark_loaded().unwrap();
        t.start().unwrap();
        t.complete().unwrap();
        assert!(t.status().is_terminal());
        assert!(t.complete().is_err());
        assert!(t.fail("late").is_err());
        assert_eq!(t.status(), &TaskStatus::Done);
    }

    #[test]
    fn failure_records_message() {
        let mut t = task();
        t.start().unwrap();
        t.fail("boom").unwrap();
        assert_eq!(
            t.status(),
            &TaskStatus::Error {
                message: "boom".to_string()
            }
        );
        assert_eq!(t.status().to_string(), "Error: boom");
    }

    #[test]
    fn processing_cannot_be_started_twice() {
        let mut t = task();
        t.start().unwrap();
        let err = t.start().unwrap_err();
        assert_eq!(
            err,
            TaskError::InvalidTransition {
                from: "Processing".to_string(),
                to: "Processing".to_string()
            }
        );
        assert!(t.reset().is_err());
    }

    #[test]
    fn reset_returns_terminal_task_to_loaded() {
        let mut t = task();
        t.start().unwrap();
        t.fail("x").unwrap();
        t.reset().unwrap();
        assert_eq!(t.status(), &TaskStatus::Loaded);
        t.start().unwrap();
    }

    #[test]
    fn snapshot_serializes_status_tag() {
        let mut t = task();
        t.start().unwrap();
        let json = serde_json::to_value(t.snapshot()).unwrap();
        assert_eq!(json["status"]["state"], "processing");
        assert_eq!(json["selected"], true);
    }
}
