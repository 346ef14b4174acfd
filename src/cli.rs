// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_CONFIG_FILE, DEFAULT_DATA_DIR};
use crate::types::LogLevel;

/// Command-line arguments for `bakedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bakedag",
    version,
    about = "Build only what changed: run a DAG of file-producing tasks with an incremental cache.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory holding the resolved settings and the build snapshot.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_DATA_DIR, global = true)]
    pub data_dir: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BAKEDAG_LOG`, `system.log_level` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Resolve the configuration, load the workflow and write the initial
    /// snapshot.
    Init {
        /// Path to the config file (TOML).
        #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Run every stale task whose dependencies are satisfied.
    Build,

    /// Print tasks in dependency order with their status.
    List,

    /// Remove the build-output directory and the task workspaces.
    Clean,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
