//! Core domain types for the Roughly client.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod command;
mod settings;

pub use command::{Command, UnknownCommand};
pub use settings::{
    ClientSettings, ConfigChange, DEFAULT_SERVER_ARGS, DEFAULT_SERVER_PATH, FORWARD_SERVER_ARGS,
    SERVER_LOG_ENV, ServerConfig, SettingKey, SettingsError,
};

use std::fmt;

/// Two-valued summary of whether the server process is considered usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HealthState {
    /// Construction immediately triggers a start attempt, so this is the
    /// initial value.
    #[default]
    Started,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The user's answer to a restart confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartChoice {
    Restart,
    /// Closing or ignoring the prompt.
    Dismiss,
}
