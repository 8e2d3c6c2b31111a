// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::watch::debounce::Debouncer;
use crate::watch::dispatch::Dispatcher;
use crate::watch::rules::{WatchRule, watch_roots};

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl WatcherHandle {
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Subscribe to the static root of every watch pattern and feed debounced
/// change batches into `dispatcher`.
///
/// - `root` is the project root against which all glob patterns are evaluated.
/// - Roots that do not exist yet are skipped with a warning.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    rules: &[WatchRule],
    debouncer: Debouncer,
    dispatcher: Dispatcher,
) -> Result<WatcherHandle> {
    let root = root.into();

    // Channel from the blocking notify callback into the async world.
    let (change_tx, change_rx) = mpsc::unbounded_channel::<PathBuf>();
    // Output writes must not even reset the debounce window.
    let filter = dispatcher.filter().clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_access() {
                    return;
                }
                for path in event.paths.into_iter().filter(|p| filter.accepts(p)) {
                    if change_tx.send(path).is_err() {
                        // Debouncer gone; nothing left to notify.
                        return;
                    }
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;

    let mut roots = Vec::new();
    for dir in watch_roots(&root, rules) {
        if !dir.is_dir() {
            warn!(?dir, "watch root does not exist; skipping");
            continue;
        }
        watcher
            .watch(&dir, RecursiveMode::Recursive)
            .with_context(|| format!("watching {}", dir.display()))?;
        debug!(?dir, "watching directory");
        roots.push(dir);
    }

    info!(roots = roots.len(), window = ?debouncer.window(), "file watcher started");

    tokio::spawn(debouncer.run(change_rx, move |batch| {
        dispatcher.dispatch(batch);
    }));

    Ok(WatcherHandle {
        _inner: watcher,
        roots,
    })
}
