#![allow(dead_code)]

use assetdag::config::{
    ConfigFile, ConfigSection, RawConfigFile, StageConfig, TaskConfig, WatchConfig,
};
use assetdag::dag::{Task, TaskGraph};
use assetdag::errors::Result;
use assetdag::pipeline::{Pipeline, SourceSet};
use assetdag::types::AssetKind;
use std::collections::BTreeMap;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_watch(mut self, patterns: &[&str], triggers: &[&str]) -> Self {
        self.config.watch.push(WatchConfig {
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            reload: false,
        });
        self
    }

    pub fn with_reload_watch(mut self, patterns: &[&str]) -> Self {
        self.config.watch.push(WatchConfig {
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            reload: true,
            ..WatchConfig::default()
        });
        self
    }

    pub fn output_dir(mut self, dir: &str) -> Self {
        self.config.config.output_dir = dir.into();
        self
    }

    pub fn default_tasks(mut self, tasks: &[&str]) -> Self {
        self.config.config.default = tasks.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A grouping task (no sources).
    pub fn group() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    /// A pipeline task reading `pattern`.
    pub fn new(pattern: &str) -> Self {
        Self::group().src(pattern)
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.task.src.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = dest.into();
        self
    }

    pub fn kind(mut self, kind: AssetKind) -> Self {
        self.task.kind = kind;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn stage(mut self, stage: StageConfig) -> Self {
        self.task.stages.push(stage);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builds a `TaskGraph` of pipeline tasks whose pipelines are never run
/// for real (the fake executor ignores them).
pub struct GraphBuilder {
    graph: TaskGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: TaskGraph::new(),
        }
    }

    /// Task with a placeholder pipeline producing `kind`.
    pub fn task(self, name: &str, after: &[&str]) -> Self {
        self.task_of_kind(name, after, AssetKind::Other)
    }

    pub fn task_of_kind(mut self, name: &str, after: &[&str], kind: AssetKind) -> Self {
        let sources = SourceSet::new(&[format!("{name}/**/*")], &[]).expect("valid glob");
        let task = Task::group(name, after.iter().copied())
            .with_pipeline(Pipeline::new(sources, name, kind));
        self.graph.register(task).expect("task registers");
        self
    }

    /// Grouping task without a pipeline.
    pub fn group(mut self, name: &str, after: &[&str]) -> Self {
        self.graph
            .register(Task::group(name, after.iter().copied()))
            .expect("group registers");
        self
    }

    pub fn build(self) -> TaskGraph {
        self.graph.validate().expect("graph validates");
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
