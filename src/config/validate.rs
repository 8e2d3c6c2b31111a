// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, StageConfig};
use crate::dag::{Task, TaskGraph};
use crate::errors::{AssetdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task, raw.watch))
    }
}

fn config_error(msg: impl Into<String>) -> AssetdagError {
    AssetdagError::ConfigError(msg.into())
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    validate_dag(cfg)?;
    validate_watch_rules(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(config_error("[config].debounce_ms must be >= 1 (got 0)"));
    }

    for name in &cfg.config.default {
        if !cfg.task.contains_key(name) {
            return Err(config_error(format!(
                "[config].default names unknown task '{name}'"
            )));
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in &cfg.task {
        if !task.stages.is_empty() && task.src.is_empty() {
            return Err(config_error(format!(
                "task '{name}' has stages but no `src`"
            )));
        }
        for stage in &task.stages {
            if matches!(stage, StageConfig::Concat { cache: true, .. }) {
                return Err(config_error(format!(
                    "task '{name}': `cache` is not supported on concat stages"
                )));
            }
        }
        for dep in &task.after {
            if !cfg.task.contains_key(dep) {
                return Err(config_error(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

/// Register every task in a pipeline-less graph so duplicate and cycle
/// detection run exactly as they will for the real graph.
fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    let mut graph = TaskGraph::new();
    for (name, task) in &cfg.task {
        graph.register(Task::group(name.clone(), task.after.iter().cloned()))?;
    }
    graph.validate()?;
    Ok(())
}

fn validate_watch_rules(cfg: &RawConfigFile) -> Result<()> {
    for (index, rule) in cfg.watch.iter().enumerate() {
        if rule.patterns.is_empty() {
            return Err(config_error(format!(
                "[[watch]] rule #{} has no patterns",
                index + 1
            )));
        }
        if rule.triggers.is_empty() && !rule.reload {
            return Err(config_error(format!(
                "[[watch]] rule #{} needs `triggers` or `reload = true`",
                index + 1
            )));
        }
        for task in &rule.triggers {
            if !cfg.task.contains_key(task) {
                return Err(config_error(format!(
                    "[[watch]] rule #{} triggers unknown task '{task}'",
                    index + 1
                )));
            }
        }
    }
    Ok(())
}
