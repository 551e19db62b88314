//! Lifecycle control for the Roughly language server.
//!
//! [`LifecycleController`] owns the server's transport, turns user commands
//! and configuration changes into start/stop/restart transitions, and
//! publishes a two-valued health state to the host indicator.

pub mod codec;
pub mod health;
pub mod host;
pub mod selector;
pub mod transport;

pub(crate) mod process;
pub(crate) mod protocol;

mod controller;
mod monitor;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{
    LOG_REVEAL_DELAY, LifecycleController, PendingRestartDecision, RESTART_ACTION, RESTART_PROMPT,
};
pub use health::{HealthPublisher, IndicatorView, ThemeColor, render};
pub use host::{Host, LogSink, Notifier, StatusIndicator};
pub use monitor::ConfigChangeMonitor;
pub use selector::{ActiveDocument, DocumentSelector};
pub use transport::{
    ChannelFactory, StdioChannel, StdioChannelFactory, TransportChannel, TransportError,
    TransportFut,
};
