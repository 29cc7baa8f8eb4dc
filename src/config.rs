//! Configuration file discovery and loading.
//!
//! Settings are layered: command line flags and their environment variables
//! first, then a TOML file, then built-in defaults.

use serde::de::DeserializeOwned;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const APP_NAME: &str = "weather-dashboard";
pub const CONFIG_FILE_NAME: &str = "dashboard.toml";
pub const CONFIG_ENV_VAR: &str = "WEATHER_DASHBOARD_CONFIG";

pub const DEFAULT_DATABASE: &str = "weatherdb";
pub const DEFAULT_COLLECTION: &str = "Weather Data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{0}'")]
    Parse(PathBuf, #[source] toml::de::Error),
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Given on the command line or in the environment.
    Explicit(PathBuf),
    CurrentDir(PathBuf),
    /// The per-user config directory, e.g. `~/.config/weather-dashboard/`.
    UserConfig(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(p) | ConfigSource::CurrentDir(p) | ConfigSource::UserConfig(p) => {
                Some(p.as_path())
            }
            ConfigSource::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(p) => write!(f, "{}", p.display()),
            None => write!(f, "(defaults)"),
        }
    }
}

/// Looks for a config file.
///
/// Search order: `$WEATHER_DASHBOARD_CONFIG`, `./dashboard.toml`, then
/// `dashboard.toml` in the user config directory.
pub fn find_config_file() -> ConfigSource {
    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        let p = PathBuf::from(path);
        if p.exists() {
            return ConfigSource::Explicit(p);
        }
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return ConfigSource::CurrentDir(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let user = dir.join(APP_NAME).join(CONFIG_FILE_NAME);
        if user.exists() {
            return ConfigSource::UserConfig(user);
        }
    }

    ConfigSource::Defaults
}

/// Parses the TOML file behind `source`, or returns `T::default()` when there is none.
pub fn load_config<T: DeserializeOwned + Default>(source: &ConfigSource) -> Result<T, ConfigError> {
    match source.path() {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
            toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
        }
        None => Ok(T::default()),
    }
}
