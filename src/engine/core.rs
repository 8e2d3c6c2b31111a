// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`CoreEvent`]s and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels and routing replies
//! - sending `ScheduledTask`s to the executor
//! - broadcasting reload events
//!
//! The core has no Tokio types, channels, filesystem or processes, so it can
//! be unit tested directly.

use crate::dag::{RequestId, Scheduler};
use crate::engine::TaskOutcome;
use crate::engine::event_handlers::{
    CoreStep, handle_reload_request, handle_run_request, handle_task_completion,
};
use crate::types::{Generation, TaskName};

/// Input to the core. Mirrors `RuntimeEvent` with reply channels replaced
/// by request ids.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    RunRequested {
        request: RequestId,
        task: TaskName,
        generation: Generation,
    },
    ReloadRequested {
        generation: Generation,
    },
    TaskCompleted {
        task: TaskName,
        generation: Generation,
        outcome: TaskOutcome,
    },
    ShutdownRequested,
}

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn start_generation(&mut self) -> Generation {
        self.scheduler.start_generation()
    }

    /// Expose whether any generation still has work in flight (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Handle a single event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: CoreEvent) -> CoreStep {
        match event {
            CoreEvent::RunRequested {
                request,
                task,
                generation,
            } => handle_run_request(&mut self.scheduler, request, &task, generation),
            CoreEvent::ReloadRequested { generation } => {
                handle_reload_request(&mut self.scheduler, generation)
            }
            CoreEvent::TaskCompleted {
                task,
                generation,
                outcome,
            } => handle_task_completion(&mut self.scheduler, &task, generation, outcome),
            CoreEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
