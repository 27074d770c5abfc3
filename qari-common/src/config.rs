//! Configuration loading for Qari services
//!
//! Resolution order: explicit path argument, then the `QARI_CONFIG`
//! environment variable, then `qari.toml` in the working directory.
//! Missing files are not an error; callers fall back to their defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the TOML configuration file
pub const CONFIG_ENV_VAR: &str = "QARI_CONFIG";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "qari.toml";

/// Resolve the configuration file path
///
/// Returns `None` when no candidate file exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Some(path);
        }
        debug!("{} points to missing file: {}", CONFIG_ENV_VAR, path.display());
    }

    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    if default.exists() {
        return Some(default);
    }

    None
}

/// Load and deserialize a TOML configuration file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;

    let config: T = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;

    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Load configuration, returning defaults when no file is found
pub fn load_or_default<T: DeserializeOwned + Default>(explicit: Option<&Path>) -> Result<T> {
    match resolve_config_path(explicit) {
        Some(path) => load_toml(&path),
        None => {
            debug!("No configuration file found, using defaults");
            Ok(T::default())
        }
    }
}

/// Read an environment override, parsed into the target type
///
/// Unparseable values are ignored with a warning so a bad override
/// cannot take the service down.
pub fn env_override<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring unparseable env override {}={}", name, raw);
                None
            }
        },
        Err(_) => None,
    }
}
