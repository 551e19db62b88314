//! Resolved client settings and the server launch snapshot derived from them.
//!
//! [`ClientSettings`] deserializes straight from the `[roughly]` table and
//! validates at the parse boundary. The controller derives an immutable
//! [`ServerConfig`] from each snapshot.
//!
//! Existence of a value is the proof of its validity.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Executable name used when `roughly.path` is not configured.
pub const DEFAULT_SERVER_PATH: &str = "roughly";

/// Subcommand the server expects once argument pass-through is enabled.
pub const DEFAULT_SERVER_ARGS: &[&str] = &["lsp"];

/// Environment variable injected into the server to raise its log level.
pub const SERVER_LOG_ENV: (&str, &str) = ("RUST_LOG", "debug");

/// Whether `roughly.args` is forwarded to the launched server.
///
/// Released server versions do not accept the `lsp` subcommand yet, so the
/// configured arguments are read and validated but not passed through.
pub const FORWARD_SERVER_ARGS: bool = false;

/// A recognized configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    /// `roughly.path`: the server executable. Changing it requires a restart.
    Path,
    /// `roughly.args`: arguments for the server executable.
    Args,
}

impl SettingKey {
    /// The key whose change requires tearing down and recreating the transport.
    pub const RESTART_RELEVANT: SettingKey = SettingKey::Path;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "roughly.path",
            Self::Args => "roughly.args",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("roughly.path must not be empty")]
    EmptyPath,
    #[error("roughly.args must not contain empty arguments")]
    EmptyArgument,
}

#[derive(Deserialize)]
struct RawClientSettings {
    #[serde(default = "default_path")]
    path: String,
    #[serde(default = "default_args")]
    args: Vec<String>,
}

fn default_path() -> String {
    DEFAULT_SERVER_PATH.to_string()
}

fn default_args() -> Vec<String> {
    DEFAULT_SERVER_ARGS.iter().map(ToString::to_string).collect()
}

/// Validated `roughly.*` settings.
///
/// Invariant: `path` is non-empty after trimming and no argument is empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawClientSettings")]
pub struct ClientSettings {
    path: String,
    args: Vec<String>,
}

impl TryFrom<RawClientSettings> for ClientSettings {
    type Error = SettingsError;

    fn try_from(raw: RawClientSettings) -> Result<Self, Self::Error> {
        Self::new(raw.path, raw.args)
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            path: default_path(),
            args: default_args(),
        }
    }
}

impl ClientSettings {
    pub fn new(path: impl Into<String>, args: Vec<String>) -> Result<Self, SettingsError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(SettingsError::EmptyPath);
        }
        if args.iter().any(|arg| arg.is_empty()) {
            return Err(SettingsError::EmptyArgument);
        }
        Ok(Self {
            path: path.trim().to_string(),
            args,
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Replace the server path, keeping the configured arguments.
    pub fn with_path(self, path: impl Into<String>) -> Result<Self, SettingsError> {
        Self::new(path, self.args)
    }

    /// Keys whose values differ between `self` and `next`, in key order.
    #[must_use]
    pub fn changed_keys(&self, next: &ClientSettings) -> Vec<SettingKey> {
        let mut changed = Vec::new();
        if self.path != next.path {
            changed.push(SettingKey::Path);
        }
        if self.args != next.args {
            changed.push(SettingKey::Args);
        }
        changed
    }
}

/// A configuration change notification: the changed keys plus the new snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    changed: Vec<SettingKey>,
    settings: ClientSettings,
}

impl ConfigChange {
    #[must_use]
    pub fn new(changed: Vec<SettingKey>, settings: ClientSettings) -> Self {
        Self { changed, settings }
    }

    /// Diff two snapshots. Returns `None` when nothing changed.
    #[must_use]
    pub fn between(previous: &ClientSettings, next: &ClientSettings) -> Option<Self> {
        let changed = previous.changed_keys(next);
        if changed.is_empty() {
            return None;
        }
        Some(Self::new(changed, next.clone()))
    }

    #[must_use]
    pub fn affects(&self, key: SettingKey) -> bool {
        self.changed.contains(&key)
    }

    #[must_use]
    pub fn changed(&self) -> &[SettingKey] {
        &self.changed
    }

    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }
}

/// Immutable launch snapshot for one transport channel.
///
/// Built once per channel. A configuration change produces a new snapshot
/// and a new channel; this value is never updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    command: String,
    args: Vec<String>,
    env_overrides: BTreeMap<String, String>,
}

impl ServerConfig {
    #[must_use]
    pub fn from_settings(settings: &ClientSettings) -> Self {
        let args = if FORWARD_SERVER_ARGS {
            settings.args().to_vec()
        } else {
            Vec::new()
        };
        let (key, value) = SERVER_LOG_ENV;
        Self {
            command: settings.path().to_string(),
            args,
            env_overrides: BTreeMap::from([(key.to_string(), value.to_string())]),
        }
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Variables set on top of the inherited environment.
    #[must_use]
    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env_overrides
    }

    /// Human-readable command line for logs.
    #[must_use]
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(path: &str) -> ClientSettings {
        ClientSettings::new(path, vec!["lsp".to_string()]).unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = ClientSettings::default();
        assert_eq!(settings.path(), "roughly");
        assert_eq!(settings.args(), ["lsp"]);
    }

    #[test]
    fn deserialize_fills_missing_fields() {
        let settings: ClientSettings = serde_json::from_value(serde_json::json!({
            "path": "/opt/roughly/bin/roughly"
        }))
        .unwrap();
        assert_eq!(settings.path(), "/opt/roughly/bin/roughly");
        assert_eq!(settings.args(), ["lsp"]);
    }

    #[test]
    fn rejects_blank_path() {
        assert_eq!(
            ClientSettings::new("   ", Vec::new()),
            Err(SettingsError::EmptyPath)
        );
        let json = serde_json::json!({ "path": "" });
        assert!(serde_json::from_value::<ClientSettings>(json).is_err());
    }

    #[test]
    fn rejects_empty_argument() {
        assert_eq!(
            ClientSettings::new("roughly", vec![String::new()]),
            Err(SettingsError::EmptyArgument)
        );
    }

    #[test]
    fn path_is_trimmed() {
        assert_eq!(settings("  roughly-dev \n").path(), "roughly-dev");
    }

    #[test]
    fn changed_keys_reports_each_difference() {
        let base = settings("roughly");
        assert!(base.changed_keys(&base.clone()).is_empty());

        let moved = settings("/usr/local/bin/roughly");
        assert_eq!(base.changed_keys(&moved), vec![SettingKey::Path]);

        let reargs = ClientSettings::new("roughly", vec!["serve".to_string()]).unwrap();
        assert_eq!(base.changed_keys(&reargs), vec![SettingKey::Args]);

        let both = ClientSettings::new("other", Vec::new()).unwrap();
        assert_eq!(
            base.changed_keys(&both),
            vec![SettingKey::Path, SettingKey::Args]
        );
    }

    #[test]
    fn config_change_between_identical_snapshots_is_none() {
        let base = settings("roughly");
        assert!(ConfigChange::between(&base, &base.clone()).is_none());
    }

    #[test]
    fn config_change_affects_only_changed_keys() {
        let change = ConfigChange::between(&settings("roughly"), &settings("roughly-dev")).unwrap();
        assert!(change.affects(SettingKey::Path));
        assert!(!change.affects(SettingKey::Args));
        assert_eq!(change.settings().path(), "roughly-dev");
    }

    #[test]
    fn server_config_drops_args_and_sets_log_level() {
        let config = ServerConfig::from_settings(&settings("roughly"));
        assert_eq!(config.command(), "roughly");
        assert!(config.args().is_empty());
        assert_eq!(
            config.env_overrides().get("RUST_LOG").map(String::as_str),
            Some("debug")
        );
        assert_eq!(config.display_command(), "roughly");
    }

    #[test]
    fn setting_key_names() {
        assert_eq!(SettingKey::Path.to_string(), "roughly.path");
        assert_eq!(SettingKey::Args.as_str(), "roughly.args");
        assert_eq!(SettingKey::RESTART_RELEVANT, SettingKey::Path);
    }
}
