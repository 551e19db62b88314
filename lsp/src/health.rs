//! Health indicator rendering and publication.

use std::sync::Arc;

use roughly_types::{Command, HealthState};

use crate::host::StatusIndicator;
use crate::selector::{ActiveDocument, DocumentSelector};

/// Label shown while the server is started.
const STARTED_TEXT: &str = "Roughly";

/// Label shown while the server is stopped.
const STOPPED_TEXT: &str = "$(stop-circle) roughly";

/// Command linked from the version footer. Hosts may leave it unregistered.
pub const SERVER_VERSION_COMMAND: &str = "roughly.serverVersion";

/// The server binary does not report its version yet.
const SERVER_VERSION_UNKNOWN: &str = "unknown";

/// Host theme colors the indicator can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeColor {
    WarningForeground,
    WarningBackground,
}

impl ThemeColor {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::WarningForeground => "statusBarItem.warningForeground",
            Self::WarningBackground => "statusBarItem.warningBackground",
        }
    }
}

/// Everything the host needs to draw the indicator.
///
/// `None` colors mean "inherit the host theme default".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorView {
    pub text: String,
    pub color: Option<ThemeColor>,
    pub background: Option<ThemeColor>,
    /// Trusted markdown; may contain `command:` links and `$(icon)` syntax.
    pub tooltip_markup: String,
    pub default_command: Command,
}

fn command_link(label: &str, command: Command, hover: &str) -> String {
    format!("[{label}](command:{} \"{hover}\")", command.id())
}

fn version_footer(version: &str) -> String {
    [
        format!(
            "[Extension Info](command:{SERVER_VERSION_COMMAND} \"Show version and server binary info\"): \
             Version {version}, Server Version {SERVER_VERSION_UNKNOWN}\n\n---"
        ),
        command_link(
            "$(terminal) Open Logs",
            Command::OpenLogs,
            "Open the server logs",
        ),
        command_link(
            "$(debug-restart) Restart server",
            Command::RestartLanguageServer,
            "Restart the server",
        ),
        command_link(
            "$(stop-circle) Stop server",
            Command::StopLanguageServer,
            "Stop the server",
        ),
    ]
    .join("\n\n")
}

/// Render the indicator for `state`. Pure: equal inputs give equal views.
#[must_use]
pub fn render(state: HealthState, version: &str) -> IndicatorView {
    match state {
        HealthState::Started => IndicatorView {
            text: STARTED_TEXT.to_string(),
            color: None,
            background: None,
            tooltip_markup: version_footer(version),
            default_command: Command::OpenLogs,
        },
        HealthState::Stopped => IndicatorView {
            text: STOPPED_TEXT.to_string(),
            color: Some(ThemeColor::WarningForeground),
            background: Some(ThemeColor::WarningBackground),
            tooltip_markup: format!(
                "Server is stopped\n\n[Start server](command:{})",
                Command::StartLanguageServer.id()
            ),
            default_command: Command::StartLanguageServer,
        },
    }
}

/// Pushes rendered health to the host indicator.
///
/// Repeated publications of the same state are dropped, so the host sees
/// each distinct view once.
pub struct HealthPublisher {
    indicator: Arc<dyn StatusIndicator>,
    version: String,
    selector: DocumentSelector,
    last_view: Option<IndicatorView>,
    visible: Option<bool>,
}

impl HealthPublisher {
    pub fn new(indicator: Arc<dyn StatusIndicator>, version: impl Into<String>) -> Self {
        Self {
            indicator,
            version: version.into(),
            selector: DocumentSelector::r_files(),
            last_view: None,
            visible: None,
        }
    }

    /// Render `state` and push it if it differs from the last pushed view.
    ///
    /// Returns whether the host indicator was updated.
    pub fn publish(&mut self, state: HealthState) -> bool {
        let view = render(state, &self.version);
        if self.last_view.as_ref() == Some(&view) {
            return false;
        }
        self.indicator.apply(&view);
        self.last_view = Some(view);
        true
    }

    /// Show the indicator only while `document` matches the selector.
    pub fn update_visibility(&mut self, document: Option<&ActiveDocument>) {
        let visible = document.is_some_and(|doc| self.selector.matches(doc));
        if self.visible == Some(visible) {
            return;
        }
        self.indicator.set_visible(visible);
        self.visible = Some(visible);
    }
}
