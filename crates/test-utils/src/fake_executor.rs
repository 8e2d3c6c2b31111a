use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetdag::dag::{ScheduledTask, Scheduler, TaskGraph};
use assetdag::engine::{BuildHandle, RuntimeEvent, TaskOutcome, spawn_runtime};
use assetdag::errors::{Result, SharedError};
use assetdag::exec::ExecutorBackend;
use assetdag::reload::LiveReload;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default)]
struct Behaviour {
    failing: HashSet<String>,
    written: HashMap<String, Vec<PathBuf>>,
    delay: Duration,
}

/// A fake executor that:
/// - records which tasks were "run", in dispatch order
/// - reports `TaskCompleted` for each scheduled task after an optional delay,
///   failing the tasks it was told to fail
/// - tracks how many tasks were in flight at once
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    behaviour: Behaviour,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
            behaviour: Behaviour::default(),
        }
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.behaviour.failing.insert(task.to_string());
        self
    }

    /// Paths (relative to the output dir) the task reports as written.
    pub fn writes(mut self, task: &str, paths: &[&str]) -> Self {
        self.behaviour
            .written
            .insert(task.to_string(), paths.iter().map(PathBuf::from).collect());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.behaviour.delay = delay;
        self
    }

    pub fn max_in_flight_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_in_flight)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for t in tasks {
                self.executed.lock().unwrap().push(t.name.clone());

                let tx = self.runtime_tx.clone();
                let behaviour = self.behaviour.clone();
                let in_flight = Arc::clone(&self.in_flight);
                let max_in_flight = Arc::clone(&self.max_in_flight);

                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);

                tokio::spawn(async move {
                    if !behaviour.delay.is_zero() {
                        tokio::time::sleep(behaviour.delay).await;
                    }
                    in_flight.fetch_sub(1, Ordering::SeqCst);

                    let outcome = if behaviour.failing.contains(&t.name) {
                        TaskOutcome::Failed(SharedError::new(anyhow::anyhow!(
                            "{} exploded",
                            t.name
                        )))
                    } else {
                        TaskOutcome::Success {
                            written: behaviour.written.get(&t.name).cloned().unwrap_or_default(),
                        }
                    };

                    let _ = tx
                        .send(RuntimeEvent::TaskCompleted {
                            task: t.name.clone(),
                            generation: t.generation,
                            outcome,
                        })
                        .await;
                });
            }
            Ok(())
        })
    }
}

/// A runtime driven by a [`FakeExecutor`], plus everything a test inspects.
pub struct FakeHarness {
    pub handle: BuildHandle,
    pub executed: Arc<Mutex<Vec<String>>>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub reload: Arc<LiveReload>,
    pub join: JoinHandle<Result<()>>,
}

impl FakeHarness {
    /// Spawn a runtime over `graph`; `configure` customises the executor.
    pub fn spawn(graph: TaskGraph, configure: impl FnOnce(FakeExecutor) -> FakeExecutor) -> Self {
        let executed = Arc::new(Mutex::new(Vec::new()));
        let reload = Arc::new(LiveReload::default());
        let mut max_in_flight = None;

        let (handle, join) = spawn_runtime(
            Scheduler::new(Arc::new(graph)),
            Arc::clone(&reload),
            |tx| {
                let executor = configure(FakeExecutor::new(tx, Arc::clone(&executed)));
                max_in_flight = Some(executor.max_in_flight_counter());
                executor
            },
        );

        Self {
            handle,
            executed,
            max_in_flight: max_in_flight.unwrap_or_default(),
            reload,
            join,
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// How many times `task` was dispatched.
    pub fn runs_of(&self, task: &str) -> usize {
        self.executed().iter().filter(|t| *t == task).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
        self.join
            .await
            .expect("runtime task panicked")
            .expect("runtime exited with error");
    }
}
