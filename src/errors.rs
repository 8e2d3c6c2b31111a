// src/errors.rs

//! Crate-wide error types.
//!
//! - [`AssetdagError`] covers configuration, IO and startup failures.
//! - [`GraphError`] is raised while the task graph is being assembled.
//! - [`StageError`] is what a transform stage yields when it cannot produce
//!   an artifact.
//! - [`TaskError`] is what every caller of a task run receives on failure.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobError(#[from] globset::Error),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors detected while registering or validating tasks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate task '{0}'")]
    DuplicateTask(TaskName),

    #[error("cycle detected in task graph: {}", path.join(" -> "))]
    Cycle { path: Vec<TaskName> },

    #[error("task '{task}' has unknown prerequisite '{prerequisite}'")]
    UnknownPrerequisite {
        task: TaskName,
        prerequisite: TaskName,
    },
}

/// Failure raised by a single transform stage.
#[derive(Error, Debug)]
#[error("stage '{stage}' failed: {cause:#}")]
pub struct StageError {
    pub stage: String,
    pub cause: anyhow::Error,
}

impl StageError {
    pub fn new(stage: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            stage: stage.into(),
            cause: cause.into(),
        }
    }
}

/// Cheaply clonable failure cause.
///
/// A single task failure is reported to every caller that joined the run,
/// so the underlying error is shared instead of copied.
#[derive(Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<StageError> for SharedError {
    fn from(err: StageError) -> Self {
        SharedError::new(err)
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Outcome reported to callers of a task run.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("task '{task}' failed: {cause}")]
    Failure { task: TaskName, cause: SharedError },

    #[error("task '{task}' skipped because prerequisite '{failed_prerequisite}' failed")]
    SkippedDueToDependency {
        task: TaskName,
        failed_prerequisite: TaskName,
    },

    #[error("unknown task '{0}'")]
    UnknownTask(TaskName),

    #[error("unknown build generation {0}")]
    UnknownGeneration(u64),

    #[error("build generation {0} is no longer retained")]
    GenerationPruned(u64),

    #[error("build runtime is not running")]
    RuntimeClosed,
}

impl TaskError {
    /// Name of the task this error is about, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            TaskError::Failure { task, .. } | TaskError::SkippedDueToDependency { task, .. } => {
                Some(task)
            }
            TaskError::UnknownTask(task) => Some(task),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;
