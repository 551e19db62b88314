//! Configuration loading for the Roughly client.
//!
//! Settings live in a TOML file under a `[roughly]` table:
//!
//! ```toml
//! [roughly]
//! path = "/opt/roughly/bin/roughly"
//! args = ["lsp"]
//! ```
//!
//! The table deserializes into a validated [`ClientSettings`]; missing keys
//! take their defaults. The `SERVER_PATH` environment variable overrides
//! `roughly.path` when set.

mod watch;

pub use watch::{ConfigSubscription, ConfigWatcher, DEFAULT_POLL_INTERVAL};

use std::path::{Path, PathBuf};
use std::{env, fs, io};

use roughly_types::{ClientSettings, SettingsError};
use serde::Deserialize;

/// Environment variable that overrides the configured server path.
pub const SERVER_PATH_ENV: &str = "SERVER_PATH";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ROUGHLY_CLIENT_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid settings in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: SettingsError,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawConfigFile {
    roughly: Option<ClientSettings>,
}

/// Location of the settings file: `$ROUGHLY_CLIENT_CONFIG`, else
/// `~/.roughly/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".roughly").join("config.toml"))
}

/// Directory holding the config file, used as the base for log files.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    config_path().and_then(|path| path.parent().map(Path::to_path_buf))
}

fn server_path_override() -> Option<String> {
    env::var(SERVER_PATH_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn resolve(raw: RawConfigFile, path_override: Option<String>) -> Result<ClientSettings, SettingsError> {
    let settings = raw.roughly.unwrap_or_default();
    match path_override {
        Some(path) => settings.with_path(path),
        None => Ok(settings),
    }
}

fn parse(content: &str, path: &Path, path_override: Option<String>) -> Result<ClientSettings, ConfigError> {
    let raw: RawConfigFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    resolve(raw, path_override).map_err(|source| ConfigError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<ClientSettings, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse(&content, path, server_path_override())
}

/// Load settings from `path`, falling back to defaults on any error.
#[must_use]
pub fn load_or_default(path: &Path) -> ClientSettings {
    match load_from(path) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!("{err}; using default settings");
            fallback_settings()
        }
    }
}

/// Load settings from the default location.
#[must_use]
pub fn load() -> ClientSettings {
    match config_path() {
        Some(path) => load_or_default(&path),
        None => {
            tracing::warn!("No home directory; using default settings");
            fallback_settings()
        }
    }
}

fn fallback_settings() -> ClientSettings {
    match server_path_override() {
        Some(path) => ClientSettings::default()
            .with_path(path)
            .unwrap_or_default(),
        None => ClientSettings::default(),
    }
}
