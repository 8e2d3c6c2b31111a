// src/dag/task_info.rs

//! Per-generation task state and scheduled task types.

use std::sync::Arc;

use crate::errors::SharedError;
use crate::pipeline::Pipeline;
use crate::types::{Generation, TaskName};

/// State of a task within one generation (internal).
///
/// A task without an entry in a generation is idle there.
#[derive(Debug, Clone)]
pub enum RunState {
    /// Requested in this generation, waiting on prerequisites.
    Pending,
    /// Dispatched to the executor.
    Running,
    /// Its pipeline reported that every artifact was written.
    Succeeded,
    Failed(SharedError),
    /// A prerequisite failed; the task never ran.
    Skipped { failed_prerequisite: TaskName },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }
}

/// Public, read-only view of a task's state in a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl From<Option<&RunState>> for TaskState {
    fn from(state: Option<&RunState>) -> Self {
        match state {
            None => TaskState::Idle,
            Some(RunState::Pending) => TaskState::Pending,
            Some(RunState::Running) => TaskState::Running,
            Some(RunState::Succeeded) => TaskState::Succeeded,
            Some(RunState::Failed(_)) => TaskState::Failed,
            Some(RunState::Skipped { .. }) => TaskState::Skipped,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub generation: Generation,
    pub pipeline: Arc<Pipeline>,
}
