// src/logging.rs

//! Logging setup for `bakedag` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `BAKEDAG_LOG` environment variable (a level such as "debug", or a full
//!    filter directive such as "bakedag::dag=trace")
//! 3. `system.log_level` from the configuration
//! 4. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for command output
//! (`bakedag list`, build summaries).

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::types::LogLevel;

/// Environment variable consulted when no `--log-level` flag is given.
pub const LOG_ENV: &str = "BAKEDAG_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>, config_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok(), config_level)?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

/// Resolve the effective filter from the three possible sources.
pub fn build_filter(
    cli_level: Option<LogLevel>,
    env_value: Option<String>,
    config_level: Option<LogLevel>,
) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(level.as_str()));
    }

    if let Some(value) = env_value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        return EnvFilter::try_new(value)
            .with_context(|| format!("invalid {LOG_ENV} value '{value}'"));
    }

    Ok(EnvFilter::new(config_level.unwrap_or_default().as_str()))
}
