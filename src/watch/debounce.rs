// src/watch/debounce.rs

//! Debouncing of raw change notifications.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Changed paths accumulated during one debounce window, in first-seen
/// order without duplicates.
#[derive(Debug, Default, Clone)]
pub struct PendingChanges {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl PendingChanges {
    pub fn push(&mut self, path: PathBuf) {
        if self.seen.insert(path.clone()) {
            self.paths.push(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Hand out the batch and start a fresh one.
    pub fn take(&mut self) -> Vec<PathBuf> {
        self.seen.clear();
        std::mem::take(&mut self.paths)
    }
}

/// Collapses bursts of change notifications into batches.
///
/// Every change restarts the window; a batch is flushed once no change has
/// arrived for a whole window.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window: Duration,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Consume `changes` until the sender side closes, calling `flush` once
    /// per quiet window. A batch still pending at close is flushed too.
    ///
    /// `flush` must not block: the loop keeps collecting the next batch
    /// while earlier ones are being built.
    pub async fn run<F>(self, mut changes: mpsc::UnboundedReceiver<PathBuf>, mut flush: F)
    where
        F: FnMut(Vec<PathBuf>),
    {
        let mut pending = PendingChanges::default();
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Some(path) => {
                        pending.push(path);
                        deadline = Some(Instant::now() + self.window);
                    }
                    None => {
                        if !pending.is_empty() {
                            flush(pending.take());
                        }
                        debug!("change stream closed; debouncer stopping");
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    debug!(changes = pending.len(), "debounce window elapsed");
                    flush(pending.take());
                }
            }
        }
    }
}
