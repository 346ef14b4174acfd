// src/config/validate.rs

use crate::config::model::{Config, RawConfig};
use crate::errors::{BakedagError, Result};

impl TryFrom<RawConfig> for Config {
    type Error = BakedagError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw.system, raw.tasks))
    }
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    validate_queue(cfg)?;
    validate_executor(cfg)?;
    validate_paths(cfg)?;
    Ok(())
}

fn validate_queue(cfg: &RawConfig) -> Result<()> {
    // The queue type is strongly typed and checked during deserialization.
    if cfg.system.scheduler.queue.size == 0 {
        return Err(BakedagError::Configuration(
            "system.scheduler.queue.size must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_executor(cfg: &RawConfig) -> Result<()> {
    if cfg.system.executor.workers == 0 {
        return Err(BakedagError::Configuration(
            "system.executor.workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_paths(cfg: &RawConfig) -> Result<()> {
    let checks = [
        ("system.build_output_dir", &cfg.system.build_output_dir),
        ("system.executor.workspace", &cfg.system.executor.workspace),
        ("tasks.workspace", &cfg.tasks.workspace),
        ("tasks.source", &cfg.tasks.source),
    ];

    for (key, path) in checks {
        if path.as_os_str().is_empty() {
            return Err(BakedagError::Configuration(format!("{key} must not be empty")));
        }
        if !path.is_absolute() {
            return Err(BakedagError::Configuration(format!(
                "{key} must be an absolute path (got {path:?})"
            )));
        }
    }

    if cfg.system.build_output_dir == cfg.system.executor.workspace {
        return Err(BakedagError::Configuration(
            "system.build_output_dir and system.executor.workspace must differ".to_string(),
        ));
    }

    Ok(())
}
