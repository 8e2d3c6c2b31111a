// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build front-end assets from a task graph, and rebuild them on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// The directory holding it is the project root.
    #[arg(long, global = true, value_name = "PATH", default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task graph, but don't build anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run one build generation and exit (non-zero on any failure).
    Build {
        /// Tasks to run. Defaults to `[config].default`.
        #[arg(value_name = "TASK")]
        tasks: Vec<String>,
    },
    /// Build, then serve the output with live reload and rebuild on change.
    Develop {
        /// Dev server port. Defaults to `[config].port`.
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,

        /// Keep the existing output directory.
        #[arg(long)]
        no_clean: bool,

        /// Tasks for the initial build. Defaults to `[config].default`.
        #[arg(value_name = "TASK")]
        tasks: Vec<String>,
    },
    /// Delete the output directory.
    Clean,
}

impl Default for Command {
    fn default() -> Self {
        Command::Build { tasks: Vec::new() }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
