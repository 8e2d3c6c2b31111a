// src/dag/mod.rs

//! Task graph and scheduling.
//!
//! - [`graph`] holds the acyclic graph of named tasks.
//! - [`scheduler`] contains the per-generation state machine that decides
//!   which tasks are ready to run and resolves callers waiting on them.
//! - [`task_info`] provides task state and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-generation state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::{Task, TaskGraph};
pub use scheduler::Scheduler;
pub use scheduler_step::{GenerationSummary, RequestId, RunResult, SchedulerStep};
pub use task_info::{ScheduledTask, TaskState};
