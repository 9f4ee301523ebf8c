//! # Contest Solver
//!
//! Generates, verifies and submits competitive-programming solutions.
//!
//! This library provides:
//! - A model failover orchestrator over a Gemini-style generative API
//! - A local verification harness that compiles a program and diffs it
//!   against sample cases
//! - A per-task pipeline and a single-flight controller over a task set
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │        TaskSetController         │
//!        │  (sequential, single-flight)     │
//!        └────────────────┬─────────────────┘
//!                         │ one task at a time
//!                         ▼
//!                ┌─────────────────┐
//!                │  TaskPipeline   │
//!                └──┬─────┬─────┬──┘
//!        fetch      │     │     │      submit
//!   ProblemSource ◄─┘     │     └─► SubmissionSink
//!                ┌────────┴────────┐
//!                ▼                 ▼
//!         ModelFailover    VerificationHarness
//!        (generate code)   (build + samples)
//! ```
//!
//! ## Task Flow
//! 1. Load tasks from the problem source
//! 2. For each selected task: fetch statement and samples
//! 3. Generate a program, switching models on quota/404/parse failures
//! 4. Build and run it against every sample
//! 5. Submit if all samples pass, otherwise leave it to the operator
//!
//! ## Modules
//! - `generation`: model ranking, exclusion and the failover loop
//! - `llm`: generative API wire types and the HTTP transport
//! - `harness`: scratch slot, subprocess runner, output comparison
//! - `pipeline` / `controller`: task state machine and run control
//! - `source`: manifest-backed problem source and drop-directory sink

pub mod config;
pub mod controller;
pub mod events;
pub mod generation;
pub mod harness;
pub mod llm;
pub mod pipeline;
pub mod source;
pub mod task;
pub mod util;
pub mod wait;

pub use config::Config;
pub use controller::{ControllerStatus, RunReport, TaskSetController};
pub use events::{EventBus, SolverEvent};
