// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// File name looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Assetdag.toml";

/// Deserialize TOML text into a [`RawConfigFile`] without semantic checks.
pub fn parse_config(text: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(text)?)
}

/// Read and deserialize the config at `path`.
///
/// Unknown keys are rejected here. Graph checks happen in
/// [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let raw = parse_config(&text)?;
    debug!(
        config = %path.display(),
        tasks = raw.task.len(),
        watch_rules = raw.watch.len(),
        "config parsed"
    );
    Ok(raw)
}

/// Read the config at `path` and run every semantic check on it: unknown
/// `after`/`default`/`triggers` names, cycles, stage options and settings.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}
