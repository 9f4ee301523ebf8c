//! Task module - problem tasks, their samples and contest classification.
//!
//! - `Task` carries identity plus an explicit status state machine
//! - `Sample` is an immutable (input, expected output) pair
//! - `ContestKind` decides whether sample diffing is meaningful

mod classify;
mod sample;
pub mod task;

pub use classify::{ContestClassifier, ContestKind};
pub use sample::Sample;
pub use task::{Task, TaskError, TaskSnapshot, TaskStatus};
