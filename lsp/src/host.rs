//! Sinks the host environment provides to the controller.
//!
//! The controller never renders UI itself. It pushes indicator views,
//! prompts, errors and log reveals through these traits, and the transport
//! appends server output to the [`LogSink`].

use std::sync::Arc;

use crate::controller::PendingRestartDecision;
use crate::health::IndicatorView;

/// Append-only output pane for server logs.
pub trait LogSink: Send + Sync {
    /// Append one line of server output, unmodified.
    fn append_line(&self, line: &str);

    /// Bring the pane into view.
    fn reveal(&self);
}

/// Prompt and notification surface.
pub trait Notifier: Send + Sync {
    /// Report a failed lifecycle operation to the user.
    fn show_error(&self, message: &str);

    /// Ask the user whether to restart. The host answers by passing the
    /// decision back to
    /// [`LifecycleController::resolve_restart_decision`](crate::LifecycleController::resolve_restart_decision).
    fn show_restart_prompt(&self, decision: &PendingRestartDecision);
}

/// The health indicator widget.
pub trait StatusIndicator: Send + Sync {
    fn apply(&self, view: &IndicatorView);

    fn set_visible(&self, visible: bool);
}

/// Handles to every host sink, passed once at activation.
#[derive(Clone)]
pub struct Host {
    pub log_sink: Arc<dyn LogSink>,
    pub notifier: Arc<dyn Notifier>,
    pub indicator: Arc<dyn StatusIndicator>,
}
