// src/exec/backend.rs

//! Where scheduled tasks actually run.
//!
//! [`PipelineExecutor`] runs each task's pipeline on the blocking pool and
//! posts a `TaskCompleted` event back to the runtime. The test suites plug in
//! a scripted backend through the same trait.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::{Result, SharedError};
use crate::fs::FileSystem;
use crate::pipeline::{ArtifactCache, StageContext};

/// Trait abstracting how scheduled tasks are executed.
///
/// Implementations must not wait for the tasks to finish: completion is
/// reported later through a `RuntimeEvent::TaskCompleted`.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Where pipelines read sources from and write artifacts to.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Project root; source globs are relative to it.
    pub root: PathBuf,
    /// Absolute (or root-relative) output directory.
    pub output_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// Production executor: one Tokio task per scheduled pipeline.
pub struct PipelineExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    fs: Arc<dyn FileSystem>,
    layout: OutputLayout,
    cache: Arc<ArtifactCache>,
}

impl PipelineExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        fs: Arc<dyn FileSystem>,
        layout: OutputLayout,
        cache: Arc<ArtifactCache>,
    ) -> Self {
        Self {
            runtime_tx,
            fs,
            layout,
            cache,
        }
    }
}

impl ExecutorBackend for PipelineExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for task in tasks {
                let tx = self.runtime_tx.clone();
                let fs = Arc::clone(&self.fs);
                let ctx = StageContext::new(
                    task.name.clone(),
                    task.generation,
                    self.layout.root.clone(),
                    Arc::clone(&self.cache),
                );
                let output_dir = self.layout.output_dir.clone();

                tokio::spawn(run_task(task, ctx, fs, output_dir, tx));
            }
            Ok(())
        })
    }
}

/// Run one pipeline and report its outcome to the runtime.
async fn run_task(
    task: ScheduledTask,
    ctx: StageContext,
    fs: Arc<dyn FileSystem>,
    output_dir: PathBuf,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    info!(task = %task.name, generation = task.generation, "starting pipeline");

    let outcome = match Arc::clone(&task.pipeline).run(ctx, fs, output_dir).await {
        Ok(written) => TaskOutcome::Success { written },
        Err(err) => {
            error!(task = %task.name, generation = task.generation, error = %err, "pipeline failed");
            TaskOutcome::Failed(SharedError::from(err))
        }
    };

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            generation: task.generation,
            outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %task.name, "runtime gone before task completed");
    }
}
