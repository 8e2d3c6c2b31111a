// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::errors::TaskError;
use crate::reload::ReloadEvent;
use crate::types::{Generation, TaskName};

/// Identifier the caller attaches to a run request so its outcome can be
/// routed back.
pub type RequestId = u64;

/// What a caller of `run` eventually receives.
pub type RunResult = Result<(), TaskError>;

/// Summary emitted when a generation has no pending or running tasks left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub generation: Generation,
    pub succeeded: Vec<TaskName>,
    pub failed: Vec<TaskName>,
    pub skipped: Vec<TaskName>,
}

impl GenerationSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Structured result of a single scheduler step.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks whose action failed in this step.
    pub newly_failed: Vec<TaskName>,
    /// Tasks skipped in this step because a prerequisite failed.
    pub newly_skipped: Vec<TaskName>,
    /// Run requests that now have an outcome.
    pub resolved: Vec<(RequestId, RunResult)>,
    /// Reload events to broadcast (only set when a generation finishes
    /// cleanly).
    pub reloads: Vec<ReloadEvent>,
    /// Set when this step left the generation quiescent.
    pub generation_finished: Option<GenerationSummary>,
}

impl SchedulerStep {
    pub fn scheduled_names(&self) -> Vec<&str> {
        self.newly_scheduled.iter().map(|t| t.name.as_str()).collect()
    }
}
