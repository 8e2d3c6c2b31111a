// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants like graph correctness (`validate.rs`).
//!
//! Turning a validated config into runnable pipelines happens in
//! [`crate::context`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path, parse_config};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, StageConfig, TaskConfig, WatchConfig};
