// src/engine/handle.rs

//! Cloneable front door to a running [`Runtime`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::dag::{GenerationSummary, RunResult, Scheduler};
use crate::errors::{Result, TaskError};
use crate::exec::ExecutorBackend;
use crate::reload::LiveReload;
use crate::types::{Generation, TaskName};

use super::core::CoreRuntime;
use super::runtime::Runtime;
use super::RuntimeEvent;

const EVENT_QUEUE: usize = 256;
const SUMMARY_QUEUE: usize = 64;

/// Build the runtime, hand `make_executor` the event sender it reports
/// completions on, and spawn the event loop.
pub fn spawn_runtime<E, F>(
    scheduler: Scheduler,
    reload: Arc<LiveReload>,
    make_executor: F,
) -> (BuildHandle, JoinHandle<Result<()>>)
where
    E: ExecutorBackend + 'static,
    F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
{
    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    let (summaries, _) = broadcast::channel(SUMMARY_QUEUE);

    let executor = make_executor(tx.clone());
    let runtime = Runtime::new(
        CoreRuntime::new(scheduler),
        rx,
        executor,
        reload,
        summaries.clone(),
    );
    let join = tokio::spawn(runtime.run());

    (BuildHandle { tx, summaries }, join)
}

/// Outcomes of every task requested in one generation.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub generation: Generation,
    /// In request order.
    pub results: Vec<(TaskName, RunResult)>,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &TaskError)> {
        self.results
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name.as_str(), e)))
    }
}

#[derive(Debug, Clone)]
pub struct BuildHandle {
    tx: mpsc::Sender<RuntimeEvent>,
    summaries: broadcast::Sender<GenerationSummary>,
}

impl BuildHandle {
    /// Start a new build generation.
    pub async fn start_generation(&self) -> std::result::Result<Generation, TaskError> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeEvent::GenerationRequested { reply })
            .await?;
        rx.await.map_err(|_| TaskError::RuntimeClosed)
    }

    /// Request `task` in `generation` and wait for its outcome.
    ///
    /// Prerequisites run first; any that already finished in this
    /// generation are not run again.
    pub async fn run(&self, task: &str, generation: Generation) -> RunResult {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeEvent::RunRequested {
            task: task.to_string(),
            generation,
            reply,
        })
        .await?;
        rx.await.map_err(|_| TaskError::RuntimeClosed)?
    }

    /// Request every task in `tasks` in `generation` concurrently and wait
    /// for all of them.
    pub async fn run_all(&self, generation: Generation, tasks: &[TaskName]) -> GenerationReport {
        let mut set = JoinSet::new();
        for (index, name) in tasks.iter().enumerate() {
            let handle = self.clone();
            let name = name.clone();
            set.spawn(async move {
                let result = handle.run(&name, generation).await;
                (index, name, result)
            });
        }

        let mut results: Vec<(usize, TaskName, RunResult)> = Vec::with_capacity(tasks.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(err) => warn!(error = %err, "run request task aborted"),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);

        GenerationReport {
            generation,
            results: results
                .into_iter()
                .map(|(_, name, result)| (name, result))
                .collect(),
        }
    }

    /// Start a generation and run `tasks` in it.
    pub async fn run_generation(
        &self,
        tasks: &[TaskName],
    ) -> std::result::Result<GenerationReport, TaskError> {
        let generation = self.start_generation().await?;
        debug!(generation, ?tasks, "running build generation");
        Ok(self.run_all(generation, tasks).await)
    }

    /// Broadcast a full reload once `generation` finishes without failures.
    pub async fn request_full_reload(
        &self,
        generation: Generation,
    ) -> std::result::Result<(), TaskError> {
        self.send(RuntimeEvent::ReloadRequested { generation }).await
    }

    /// Receive a summary each time a generation goes quiescent.
    pub fn subscribe_summaries(&self) -> broadcast::Receiver<GenerationSummary> {
        self.summaries.subscribe()
    }

    /// Ask the runtime to stop. Unresolved run requests fail with
    /// [`TaskError::RuntimeClosed`].
    pub async fn shutdown(&self) {
        if self.send(RuntimeEvent::ShutdownRequested).await.is_err() {
            debug!("runtime already stopped");
        }
    }

    async fn send(&self, event: RuntimeEvent) -> std::result::Result<(), TaskError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| TaskError::RuntimeClosed)
    }
}
