use std::fmt;
use std::str::FromStr;

/// A zero-argument, user-invocable lifecycle command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    RestartLanguageServer,
    StartLanguageServer,
    StopLanguageServer,
    OpenLogs,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::RestartLanguageServer,
        Command::StartLanguageServer,
        Command::StopLanguageServer,
        Command::OpenLogs,
    ];

    /// Stable identifier used in tooltips and by hosts that register commands.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::RestartLanguageServer => "roughly.restartLanguageServer",
            Self::StartLanguageServer => "roughly.startLanguageServer",
            Self::StopLanguageServer => "roughly.stopLanguageServer",
            Self::OpenLogs => "roughly.openLogs",
        }
    }

    /// Short name accepted from interactive input.
    #[must_use]
    pub fn alias(self) -> &'static str {
        match self {
            Self::RestartLanguageServer => "restart",
            Self::StartLanguageServer => "start",
            Self::StopLanguageServer => "stop",
            Self::OpenLogs => "logs",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::RestartLanguageServer => "Restart server",
            Self::StartLanguageServer => "Start server",
            Self::StopLanguageServer => "Stop server",
            Self::OpenLogs => "Open Logs",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Command::ALL
            .into_iter()
            .find(|cmd| cmd.id() == trimmed || cmd.alias().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCommand(trimmed.to_string()))
    }
}
