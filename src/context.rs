// src/context.rs

//! Everything one build process needs, compiled from a validated config.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use crate::config::{ConfigFile, ConfigSection, StageConfig, TaskConfig};
use crate::dag::{Scheduler, Task, TaskGraph};
use crate::errors::{AssetdagError, Result};
use crate::fs::FileSystem;
use crate::pipeline::stages::{Check, Concat, Passthrough, Shell};
use crate::pipeline::{ArtifactCache, Cached, Pipeline, SourceSet, Stage};
use crate::types::TaskName;
use crate::watch::{Debouncer, WatchRule};

pub use crate::exec::OutputLayout;

/// Task graph, watch rules, artifact cache and output layout.
///
/// Passed around explicitly; the cache lives as long as the context.
#[derive(Debug, Clone)]
pub struct BuildContext {
    graph: Arc<TaskGraph>,
    rules: Arc<Vec<WatchRule>>,
    cache: Arc<ArtifactCache>,
    layout: OutputLayout,
    settings: ConfigSection,
}

impl BuildContext {
    /// Compile `cfg` against the project `root`.
    pub fn from_config(cfg: &ConfigFile, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let settings = cfg.settings().clone();

        let mut graph = TaskGraph::new();
        for (name, task_cfg) in cfg.tasks() {
            graph.register(compile_task(name, task_cfg)?)?;
        }
        graph.validate()?;

        let mut rules = Vec::with_capacity(cfg.watch_rules().len());
        for rule in cfg.watch_rules() {
            rules.push(WatchRule::new(
                rule.patterns.clone(),
                rule.exclude.clone(),
                rule.triggers.clone(),
                rule.reload,
            )?);
        }

        let layout = OutputLayout::new(root.clone(), root.join(&settings.output_dir));
        info!(
            tasks = graph.len(),
            rules = rules.len(),
            output = %layout.output_dir.display(),
            "build context ready"
        );

        Ok(Self {
            graph: Arc::new(graph),
            rules: Arc::new(rules),
            cache: Arc::new(ArtifactCache::new()),
            layout,
            settings,
        })
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn rules(&self) -> &Arc<Vec<WatchRule>> {
        &self.rules
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn settings(&self) -> &ConfigSection {
        &self.settings
    }

    /// Fresh scheduler over this context's graph.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(Arc::clone(&self.graph))
    }

    pub fn debouncer(&self) -> Debouncer {
        Debouncer::new(Duration::from_millis(self.settings.debounce_ms))
    }

    /// `[config].default`, or every task nothing depends on.
    pub fn default_tasks(&self) -> Vec<TaskName> {
        if self.settings.default.is_empty() {
            self.graph.sinks()
        } else {
            self.settings.default.clone()
        }
    }

    /// Delete the output directory.
    pub fn clean(&self, fs: &dyn FileSystem) -> Result<()> {
        info!(dir = %self.layout.output_dir.display(), "cleaning output directory");
        fs.remove_dir_all(&self.layout.output_dir)?;
        Ok(())
    }
}

fn compile_task(name: &str, cfg: &TaskConfig) -> Result<Task> {
    let task = Task::group(name, cfg.after.iter().cloned());
    if !cfg.has_pipeline() {
        debug!(task = %name, "grouping task");
        return Ok(task);
    }

    let sources = SourceSet::new(&cfg.src, &cfg.exclude)?;
    let mut stages: Vec<Box<dyn Stage>> = Vec::with_capacity(cfg.stages.len());
    for (index, stage_cfg) in cfg.stages.iter().enumerate() {
        let stage = compile_stage(stage_cfg)
            .with_context(|| format!("task '{name}', stage #{}", index + 1))?;
        let stage: Box<dyn Stage> = if stage_cfg.cache() {
            Box::new(Cached::new(stage).scoped(format!("{name}/{index}/{}", stage_cfg.name())))
        } else {
            stage
        };
        stages.push(stage);
    }

    let pipeline = Pipeline::new(sources, &cfg.dest, cfg.kind).with_stages(stages);
    Ok(task.with_pipeline(pipeline))
}

fn compile_stage(cfg: &StageConfig) -> anyhow::Result<Box<dyn Stage>> {
    let stage: Box<dyn Stage> = match cfg {
        StageConfig::Copy { .. } => Box::new(Passthrough),
        StageConfig::Concat {
            file, separator, ..
        } => Box::new(Concat::new(file).separator(separator.clone())),
        StageConfig::Shell {
            command, extension, ..
        } => {
            let shell = Shell::new(command.clone());
            Box::new(match extension {
                Some(ext) => shell.extension(ext.clone()),
                None => shell,
            })
        }
        StageConfig::Check { command, .. } => Box::new(Check::new(command.clone())),
        StageConfig::Scss { compressed, .. } => scss_stage(*compressed)?,
        StageConfig::Image { format, .. } => image_stage(format)?,
    };
    Ok(stage)
}

#[cfg(feature = "grass")]
fn scss_stage(compressed: bool) -> anyhow::Result<Box<dyn Stage>> {
    Ok(Box::new(
        crate::pipeline::stages::Scss::new().compressed(compressed),
    ))
}

#[cfg(not(feature = "grass"))]
fn scss_stage(_compressed: bool) -> anyhow::Result<Box<dyn Stage>> {
    anyhow::bail!("the scss stage requires assetdag to be built with the `grass` feature")
}

#[cfg(feature = "image")]
fn image_stage(format: &str) -> anyhow::Result<Box<dyn Stage>> {
    Ok(Box::new(crate::pipeline::stages::Reencode::from_extension(
        format,
    )?))
}

#[cfg(not(feature = "image"))]
fn image_stage(_format: &str) -> anyhow::Result<Box<dyn Stage>> {
    anyhow::bail!("the image stage requires assetdag to be built with the `image` feature")
}

/// Resolve the project root: the directory holding the config file.
pub fn project_root(config_path: &Path) -> Result<PathBuf> {
    let dir = match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    dir.canonicalize().map_err(|e| {
        AssetdagError::ConfigError(format!(
            "cannot resolve project root {}: {e}",
            dir.display()
        ))
    })
}
