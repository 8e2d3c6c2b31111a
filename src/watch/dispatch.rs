// src/watch/dispatch.rs

//! Turns debounced change batches into build generations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{BuildHandle, GenerationReport};
use crate::fs::is_temp_artifact;
use crate::reload::{LiveReload, ReloadEvent};
use crate::watch::rules::{WatchRule, plan};

/// Paths a change batch must never react to.
///
/// Temp files from in-flight artifact writes are always dropped. Directories
/// added with [`ChangeFilter::ignore_dir`] (the output tree) are dropped
/// too, otherwise a root-level pattern would rebuild on its own output.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    ignored_dirs: Vec<PathBuf>,
}

impl ChangeFilter {
    pub fn ignore_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ignored_dirs.push(dir.into());
        self
    }

    pub fn accepts(&self, path: &Path) -> bool {
        !is_temp_artifact(path) && !self.ignored_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    root: PathBuf,
    rules: Arc<Vec<WatchRule>>,
    handle: BuildHandle,
    reload: Arc<LiveReload>,
    filter: ChangeFilter,
}

impl Dispatcher {
    pub fn new(
        root: impl Into<PathBuf>,
        rules: Arc<Vec<WatchRule>>,
        handle: BuildHandle,
        reload: Arc<LiveReload>,
    ) -> Self {
        Self {
            root: root.into(),
            rules,
            handle,
            reload,
            filter: ChangeFilter::default(),
        }
    }

    /// Drop every change under `dir`.
    pub fn ignoring(mut self, dir: impl Into<PathBuf>) -> Self {
        self.filter = self.filter.ignore_dir(dir);
        self
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// React to one batch of changes.
    ///
    /// Never waits for the build: the generation runs on its own Tokio task,
    /// whose handle is returned. Nothing is spawned when no rule matched or
    /// the matching rules only ask for a reload.
    pub fn dispatch(&self, mut changed: Vec<PathBuf>) -> Option<JoinHandle<Option<GenerationReport>>> {
        changed.retain(|path| self.filter.accepts(path));
        if changed.is_empty() {
            return None;
        }

        let plan = plan(&self.root, &changed, &self.rules);

        if plan.is_empty() {
            debug!(changes = changed.len(), "no watch rule matched");
            return None;
        }

        if plan.triggers.is_empty() {
            info!(changes = changed.len(), "reload-only change; reloading clients");
            self.reload.broadcast(&ReloadEvent::FullReload);
            return None;
        }

        info!(changes = changed.len(), triggers = ?plan.triggers, "changes detected; rebuilding");
        let handle = self.handle.clone();

        Some(tokio::spawn(async move {
            let generation = match handle.start_generation().await {
                Ok(g) => g,
                Err(err) => {
                    warn!(error = %err, "cannot start build generation");
                    return None;
                }
            };

            if plan.full_reload {
                if let Err(err) = handle.request_full_reload(generation).await {
                    warn!(generation, error = %err, "cannot request reload");
                }
            }

            let report = handle.run_all(generation, &plan.triggers).await;
            for (task, err) in report.failures() {
                error!(generation, task = %task, error = %err, "rebuild failed");
            }
            Some(report)
        }))
    }
}
