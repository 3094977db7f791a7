// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::{Result, WatchserveError};

/// A config file together with the directory its relative paths resolve
/// against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ConfigFile,
    pub base_dir: PathBuf,
}

/// Load a configuration file from a given path.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// the semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        WatchserveError::config(format!("cannot read config {}: {e}", path.display()))
    })?;

    let config: ConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Find the configuration to use.
///
/// - An explicit path must exist.
/// - Otherwise `Watchserve.toml` in the working directory is used if present.
/// - Otherwise there is no file and everything comes from the command line.
pub fn discover(explicit: Option<&Path>) -> Result<Option<LoadedConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path();
            if !path.is_file() {
                debug!(path = %path.display(), "no config file; using command-line settings");
                return Ok(None);
            }
            path
        }
    };

    let config = load_and_validate(&path)?;
    debug!(path = %path.display(), "loaded config file");
    Ok(Some(LoadedConfig {
        config,
        base_dir: config_base_dir(&path),
    }))
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Watchserve.toml")
}

/// Directory holding `config_path`; a bare filename means the working
/// directory.
pub fn config_base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
