// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{AssetKind, TaskName};

/// Configuration exactly as read from `Assetdag.toml`, before validation.
///
/// ```toml
/// [config]
/// output_dir = "dist"
/// default = ["build"]
///
/// [task.styles]
/// src = ["src/styles/**/*.scss"]
/// dest = "css"
/// kind = "css"
/// stages = [{ use = "scss" }]
///
/// [task.build]
/// after = ["styles"]
///
/// [[watch]]
/// patterns = ["src/styles/**/*.scss"]
/// triggers = ["styles"]
/// ```
///
/// All sections are optional at this stage; [`ConfigFile::try_from`]
/// rejects configs without tasks.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<TaskName, TaskConfig>,

    /// `[[watch]]` rules, in declaration order.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Where sources live, shown by `--dry-run`. Globs stay relative to the
    /// project root.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Output tree, relative to the project root unless absolute.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Quiet period before a batch of changes is dispatched.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Dev server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Delete `output_dir` before the initial build.
    #[serde(default = "default_clean")]
    pub clean: bool,

    /// Tasks run by `build` and by the initial `develop` build. Empty means
    /// every task nothing else depends on.
    #[serde(default)]
    pub default: Vec<TaskName>,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_port() -> u16 {
    9000
}

fn default_clean() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            debounce_ms: default_debounce_ms(),
            port: default_port(),
            clean: default_clean(),
            default: Vec::new(),
        }
    }
}

/// `[task.<name>]` section.
///
/// A task with `src` runs a pipeline; one without is a grouping task that
/// only orders its `after` list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Source globs, relative to the project root.
    #[serde(default)]
    pub src: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Output namespace inside `output_dir`.
    #[serde(default)]
    pub dest: PathBuf,

    #[serde(default)]
    pub kind: AssetKind,

    /// Prerequisites: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<TaskName>,

    /// Transform stages, applied left to right. No stages means a plain copy.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl TaskConfig {
    pub fn has_pipeline(&self) -> bool {
        !self.src.is_empty()
    }
}

/// One entry of a task's `stages` list, selected by `use`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "use", rename_all = "lowercase", deny_unknown_fields)]
pub enum StageConfig {
    Copy {
        #[serde(default)]
        cache: bool,
    },
    Concat {
        file: PathBuf,
        #[serde(default = "default_separator")]
        separator: String,
        #[serde(default)]
        cache: bool,
    },
    Shell {
        command: String,
        /// Replace the artifact's extension with this one.
        #[serde(default)]
        extension: Option<String>,
        #[serde(default)]
        cache: bool,
    },
    Check {
        command: String,
        #[serde(default)]
        cache: bool,
    },
    Scss {
        #[serde(default)]
        compressed: bool,
        #[serde(default)]
        cache: bool,
    },
    Image {
        /// Target format by extension, e.g. `"png"`.
        format: String,
        #[serde(default)]
        cache: bool,
    },
}

fn default_separator() -> String {
    "\n".to_string()
}

impl StageConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StageConfig::Copy { .. } => "copy",
            StageConfig::Concat { .. } => "concat",
            StageConfig::Shell { .. } => "shell",
            StageConfig::Check { .. } => "check",
            StageConfig::Scss { .. } => "scss",
            StageConfig::Image { .. } => "image",
        }
    }

    pub fn cache(&self) -> bool {
        match self {
            StageConfig::Copy { cache }
            | StageConfig::Concat { cache, .. }
            | StageConfig::Shell { cache, .. }
            | StageConfig::Check { cache, .. }
            | StageConfig::Scss { cache, .. }
            | StageConfig::Image { cache, .. } => *cache,
        }
    }
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub patterns: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Tasks to re-run, in order.
    #[serde(default)]
    pub triggers: Vec<TaskName>,

    /// Reload connected browsers once the triggered tasks finish (or right
    /// away when there are none).
    #[serde(default)]
    pub reload: bool,
}

/// Validated configuration. Build one with `ConfigFile::try_from`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    tasks: BTreeMap<TaskName, TaskConfig>,
    watch: Vec<WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        tasks: BTreeMap<TaskName, TaskConfig>,
        watch: Vec<WatchConfig>,
    ) -> Self {
        Self {
            config,
            tasks,
            watch,
        }
    }

    pub fn settings(&self) -> &ConfigSection {
        &self.config
    }

    pub fn tasks(&self) -> &BTreeMap<TaskName, TaskConfig> {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.get(name)
    }

    pub fn watch_rules(&self) -> &[WatchConfig] {
        &self.watch
    }
}
