// src/engine/mod.rs

//! Orchestration engine for assetdag.
//!
//! This module ties together:
//! - the task scheduler
//! - the main runtime event loop that reacts to:
//!   - generation and run requests from a [`BuildHandle`]
//!   - task completion events from the executor
//!   - shutdown requests
//! - the live-reload broadcast once a generation finishes
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]; [`handle`] is the cloneable front door.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::dag::RunResult;
use crate::errors::SharedError;
use crate::types::{Generation, TaskName};

/// Outcome of a task's pipeline for the scheduler.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// Every artifact was written. Paths are relative to the output
    /// directory.
    Success { written: Vec<PathBuf> },
    Failed(SharedError),
}

impl TaskOutcome {
    pub fn success() -> Self {
        TaskOutcome::Success {
            written: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }
}

/// Events flowing into the runtime from handles and executors.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// Start a new build generation and reply with its number.
    GenerationRequested {
        reply: oneshot::Sender<Generation>,
    },
    /// Run a task in a generation; the reply carries its outcome.
    RunRequested {
        task: TaskName,
        generation: Generation,
        reply: oneshot::Sender<RunResult>,
    },
    /// Broadcast a full reload once the generation finishes cleanly.
    ReloadRequested { generation: Generation },
    /// A dispatched pipeline finished.
    TaskCompleted {
        task: TaskName,
        generation: Generation,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod handle;
pub mod runtime;

pub use core::{CoreEvent, CoreRuntime};
pub use event_handlers::{CoreCommand, CoreStep};
pub use handle::{BuildHandle, GenerationReport, spawn_runtime};
pub use runtime::Runtime;
