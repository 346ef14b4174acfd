// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{Config, RawConfig};
use crate::errors::{BakedagError, Result};

/// File name of the resolved configuration written by `init` into the data dir.
pub const SETTINGS_FILE: &str = "settings.toml";

/// Config file `init` reads when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Bakedag.toml";

/// Data directory holding the snapshot and resolved settings.
pub const DEFAULT_DATA_DIR: &str = ".bakedag";

/// Load a configuration file from a given path and return the raw `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** resolve paths or
/// perform semantic validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        BakedagError::Configuration(format!("cannot read config file {path:?}: {e}"))
    })?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path, make its paths absolute and validate it.
///
/// Relative paths inside the file are resolved against the directory that
/// contains the config file, so the result no longer depends on the current
/// working directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;
    let base = config_root_dir(path)?;
    raw_config.resolve_paths(&base);
    debug!(config = ?path, base = ?base, "resolved config paths");
    Config::try_from(raw_config)
}

/// Write the resolved configuration into `<data_dir>/settings.toml`.
///
/// Later commands (`build`, `list`, `clean`) read this copy so that they see
/// exactly the paths `init` resolved.
pub fn materialize(config: &Config, data_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)?;
    let path = data_dir.join(SETTINGS_FILE);
    let contents = toml::to_string_pretty(config).map_err(|e| {
        BakedagError::Configuration(format!("cannot serialize configuration: {e}"))
    })?;
    fs::write(&path, contents)?;
    info!(path = ?path, "wrote resolved configuration");
    Ok(path)
}

/// Load the configuration materialized by `init`.
pub fn load_materialized(data_dir: &Path) -> Result<Config> {
    let path = data_dir.join(SETTINGS_FILE);
    if !path.exists() {
        return Err(BakedagError::Configuration(format!(
            "no resolved configuration at {path:?}; run `bakedag init` first"
        )));
    }
    load_and_validate(path)
}

/// Directory that relative config paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "configs/Bakedag.toml"),
///   we use that directory (made absolute).
/// - For a bare filename we fall back to the current working directory.
fn config_root_dir(config_path: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => return Ok(cwd),
    };
    if dir.is_absolute() {
        Ok(dir)
    } else {
        Ok(cwd.join(dir))
    }
}
