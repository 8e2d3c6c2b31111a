// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::{GenerationSummary, RequestId, RunResult, ScheduledTask};
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::reload::LiveReload;

use super::core::{CoreEvent, CoreRuntime};
use super::{CoreCommand, RuntimeEvent};

/// Async owner of the build state.
///
/// Every decision is made by [`CoreRuntime`]; this type only moves data:
/// requests in from [`BuildHandle`](super::BuildHandle)s, tasks out to the
/// executor, results back to waiting callers and reload events out to the
/// browser hub.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    reload: Arc<LiveReload>,
    summaries: broadcast::Sender<GenerationSummary>,
    pending: HashMap<RequestId, oneshot::Sender<RunResult>>,
    next_request: RequestId,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        reload: Arc<LiveReload>,
        summaries: broadcast::Sender<GenerationSummary>,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            reload,
            summaries,
            pending: HashMap::new(),
            next_request: 0,
        }
    }

    /// Process events until a shutdown request or until every sender is gone.
    ///
    /// Callers still waiting when the loop exits see their reply channel
    /// close.
    pub async fn run(mut self) -> Result<()> {
        info!("assetdag runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let Some(core_event) = self.route(event) else {
                continue;
            };

            let step = self.core.step(core_event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("shutdown requested; stopping runtime");
                break;
            }
        }

        if !self.pending.is_empty() {
            warn!(
                waiting = self.pending.len(),
                "runtime exiting with unresolved run requests"
            );
        }
        info!("runtime exiting");
        Ok(())
    }

    /// Handle events that need the shell (reply channels), and turn the
    /// rest into core events.
    fn route(&mut self, event: RuntimeEvent) -> Option<CoreEvent> {
        match event {
            RuntimeEvent::GenerationRequested { reply } => {
                let generation = self.core.start_generation();
                if reply.send(generation).is_err() {
                    debug!(generation, "generation requester went away");
                }
                None
            }
            RuntimeEvent::RunRequested {
                task,
                generation,
                reply,
            } => {
                self.next_request += 1;
                let request = self.next_request;
                self.pending.insert(request, reply);
                Some(CoreEvent::RunRequested {
                    request,
                    task,
                    generation,
                })
            }
            RuntimeEvent::ReloadRequested { generation } => {
                Some(CoreEvent::ReloadRequested { generation })
            }
            RuntimeEvent::TaskCompleted {
                task,
                generation,
                outcome,
            } => Some(CoreEvent::TaskCompleted {
                task,
                generation,
                outcome,
            }),
            RuntimeEvent::ShutdownRequested => Some(CoreEvent::ShutdownRequested),
        }
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::Resolve(outcomes) => {
                for (request, outcome) in outcomes {
                    match self.pending.remove(&request) {
                        Some(reply) => {
                            // The caller may have stopped waiting.
                            let _ = reply.send(outcome);
                        }
                        None => warn!(request, "no caller registered for resolved request"),
                    }
                }
            }
            CoreCommand::Broadcast(events) => {
                let report = self.reload.broadcast_all(&events);
                debug!(
                    events = events.len(),
                    delivered = report.delivered,
                    dropped = report.dropped,
                    removed = report.removed,
                    "broadcast reload events"
                );
            }
            CoreCommand::GenerationFinished(summary) => {
                // No subscribers is fine.
                let _ = self.summaries.send(summary);
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "dispatching ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
