//! LifecycleController: the server lifecycle state machine.
//!
//! The host owns exactly one controller per session and hands it every
//! user command and configuration change. Each operation takes `&mut self`,
//! so transitions never overlap; health is published only after the
//! transport reports completion.

use std::sync::{Arc, Weak};
use std::time::Duration;

use roughly_types::{
    ClientSettings, Command, ConfigChange, FORWARD_SERVER_ARGS, HealthState, RestartChoice,
    ServerConfig, SettingKey,
};
use tokio::task::JoinHandle;

use crate::health::HealthPublisher;
use crate::host::{Host, LogSink, Notifier};
use crate::selector::ActiveDocument;
use crate::transport::{ChannelFactory, TransportChannel, TransportError};

/// Delay between a config-driven restart and revealing the logs, so the
/// user sees the server's start-up output.
pub const LOG_REVEAL_DELAY: Duration = Duration::from_millis(1500);

pub const RESTART_PROMPT: &str = "Configuration change requires restarting the language server";

pub const RESTART_ACTION: &str = "Restart";

/// A restart awaiting the user's answer.
///
/// Not `Clone`: resolving consumes it, so one prompt yields at most one
/// restart.
#[derive(Debug)]
pub struct PendingRestartDecision {
    key: SettingKey,
}

impl PendingRestartDecision {
    fn new(key: SettingKey) -> Self {
        Self { key }
    }

    /// The setting whose change raised the prompt.
    #[must_use]
    pub fn key(&self) -> SettingKey {
        self.key
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        RESTART_PROMPT
    }

    /// Explicit choices offered. Dismissal is always implicit.
    #[must_use]
    pub fn actions(&self) -> &'static [&'static str] {
        &[RESTART_ACTION]
    }
}

/// Log reveal scheduled after a config-driven restart.
///
/// Aborted on drop. Holds only a weak sink reference, so a reveal that
/// outlives the host is a no-op.
struct DelayedReveal {
    handle: JoinHandle<()>,
}

impl DelayedReveal {
    fn schedule(sink: Weak<dyn LogSink>, delay: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match sink.upgrade() {
                Some(sink) => sink.reveal(),
                None => tracing::trace!("Log sink gone; skipping delayed reveal"),
            }
        });
        Self { handle }
    }

    fn is_pending(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for DelayedReveal {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct LifecycleController {
    factory: Box<dyn ChannelFactory>,
    /// At most one channel exists; `None` until the first start attempt.
    channel: Option<Box<dyn TransportChannel>>,
    /// Snapshot used for the next channel construction.
    config: ServerConfig,
    health: HealthState,
    publisher: HealthPublisher,
    log_sink: Arc<dyn LogSink>,
    notifier: Arc<dyn Notifier>,
    reveal: Option<DelayedReveal>,
}

impl LifecycleController {
    /// Construct without touching the transport. Most hosts want
    /// [`Self::activate`] instead.
    pub fn new(
        settings: &ClientSettings,
        factory: Box<dyn ChannelFactory>,
        host: Host,
        version: impl Into<String>,
    ) -> Self {
        let config = ServerConfig::from_settings(settings);
        tracing::info!(
            command = %config.display_command(),
            configured_args = ?settings.args(),
            "Using server command"
        );
        if !FORWARD_SERVER_ARGS && !settings.args().is_empty() {
            tracing::debug!("{} is not forwarded to the server", SettingKey::Args);
        }

        Self {
            factory,
            channel: None,
            config,
            health: HealthState::Started,
            publisher: HealthPublisher::new(host.indicator, version),
            log_sink: host.log_sink,
            notifier: host.notifier,
            reveal: None,
        }
    }

    /// Construct the controller and make the initial start attempt.
    ///
    /// A launch failure is reported through the notifier and leaves the
    /// controller `Stopped`; construction itself never fails.
    pub async fn activate(
        settings: &ClientSettings,
        factory: Box<dyn ChannelFactory>,
        host: Host,
        version: impl Into<String>,
    ) -> Self {
        let mut controller = Self::new(settings, factory, host, version);
        if let Err(e) = controller.start().await {
            controller.report_failure("start", &e);
        }
        controller
    }

    #[must_use]
    pub fn health(&self) -> HealthState {
        self.health
    }

    /// Whether the current channel's server process is alive.
    pub fn is_running(&mut self) -> bool {
        self.channel
            .as_mut()
            .is_some_and(|channel| channel.is_running())
    }

    /// The snapshot the next channel will be built from.
    #[must_use]
    pub fn server_config(&self) -> &ServerConfig {
        &self.config
    }

    fn set_health(&mut self, state: HealthState) {
        if self.health != state {
            tracing::info!(from = %self.health, to = %state, "Server health changed");
        }
        self.health = state;
        self.publisher.publish(state);
    }

    /// After a failed stop, health follows whatever the process actually did.
    fn settle_health(&mut self) {
        let state = if self.is_running() {
            HealthState::Started
        } else {
            HealthState::Stopped
        };
        self.set_health(state);
    }

    /// Build a channel from the current snapshot, start it and install it.
    async fn launch_fresh_channel(&mut self) -> Result<(), TransportError> {
        let mut channel = self.factory.create(self.config.clone());
        let result = channel.start().await;
        self.channel = Some(channel);
        match result {
            Ok(()) => {
                self.set_health(HealthState::Started);
                Ok(())
            }
            Err(e) => {
                self.set_health(HealthState::Stopped);
                Err(e)
            }
        }
    }

    /// Start the server. A no-op while the current channel is running.
    pub async fn start(&mut self) -> Result<(), TransportError> {
        if self.is_running() {
            tracing::debug!("Server already running; start is a no-op");
            self.set_health(HealthState::Started);
            return Ok(());
        }
        if let Some(mut previous) = self.channel.take()
            && let Err(e) = previous.stop().await
        {
            tracing::warn!("Failed to reap previous server: {e}");
        }
        self.launch_fresh_channel().await
    }

    /// Stop the server. Health is `Stopped` afterwards regardless of the
    /// prior state.
    pub async fn stop(&mut self) -> Result<(), TransportError> {
        if let Some(channel) = self.channel.as_mut()
            && let Err(e) = channel.stop().await
        {
            self.settle_health();
            return Err(e);
        }
        self.set_health(HealthState::Stopped);
        Ok(())
    }

    /// Fully stop the current channel, then start a fresh one.
    pub async fn restart(&mut self) -> Result<(), TransportError> {
        if let Some(mut old) = self.channel.take()
            && let Err(e) = old.stop().await
        {
            self.channel = Some(old);
            self.settle_health();
            return Err(e);
        }
        self.launch_fresh_channel().await
    }

    pub async fn on_user_restart_command(&mut self) -> Result<(), TransportError> {
        if self.is_running() {
            self.restart().await
        } else {
            self.start().await
        }
    }

    pub async fn on_user_start_command(&mut self) -> Result<(), TransportError> {
        self.start().await
    }

    pub async fn on_user_stop_command(&mut self) -> Result<(), TransportError> {
        self.stop().await
    }

    pub fn open_logs(&self) {
        self.log_sink.reveal();
    }

    /// Run a user command, returning transport failures to the caller.
    pub async fn execute(&mut self, command: Command) -> Result<(), TransportError> {
        tracing::debug!(%command, "Running command");
        match command {
            Command::RestartLanguageServer => self.on_user_restart_command().await,
            Command::StartLanguageServer => self.on_user_start_command().await,
            Command::StopLanguageServer => self.on_user_stop_command().await,
            Command::OpenLogs => {
                self.open_logs();
                Ok(())
            }
        }
    }

    /// Command handler: run `command` and surface any failure to the user.
    pub async fn dispatch(&mut self, command: Command) {
        if let Err(e) = self.execute(command).await {
            self.report_failure(command.alias(), &e);
        }
    }

    /// Show a failed lifecycle operation through the notifier.
    pub fn report_failure(&self, action: &str, error: &TransportError) {
        tracing::warn!(action, "Server lifecycle operation failed: {error}");
        self.notifier
            .show_error(&format!("Failed to {action} the Roughly language server: {error}"));
    }

    /// React to a configuration change.
    ///
    /// Only a change to the server path matters. The new snapshot is adopted
    /// for the next channel; if the server is running the user is asked to
    /// restart, and the returned decision must be passed back to
    /// [`Self::resolve_restart_decision`].
    pub fn on_config_changed(&mut self, change: &ConfigChange) -> Option<PendingRestartDecision> {
        if !change.affects(SettingKey::RESTART_RELEVANT) {
            tracing::trace!(changed = ?change.changed(), "Ignoring configuration change");
            return None;
        }

        let next = ServerConfig::from_settings(change.settings());
        tracing::info!(command = %next.display_command(), "Server path changed");
        self.config = next;

        if !self.is_running() {
            tracing::info!("Server is not running; the new path applies on next start");
            return None;
        }

        let decision = PendingRestartDecision::new(SettingKey::RESTART_RELEVANT);
        self.notifier.show_restart_prompt(&decision);
        Some(decision)
    }

    /// Apply the user's answer to a restart prompt.
    ///
    /// Dismissal leaves the running server on its previous snapshot.
    pub async fn resolve_restart_decision(
        &mut self,
        decision: PendingRestartDecision,
        choice: RestartChoice,
    ) -> Result<(), TransportError> {
        match choice {
            RestartChoice::Dismiss => {
                tracing::debug!(key = %decision.key(), "Restart declined");
                Ok(())
            }
            RestartChoice::Restart => {
                self.restart().await?;
                self.schedule_log_reveal();
                Ok(())
            }
        }
    }

    fn schedule_log_reveal(&mut self) {
        // Replacing an older reveal drops and aborts it.
        self.reveal = Some(DelayedReveal::schedule(
            Arc::downgrade(&self.log_sink),
            LOG_REVEAL_DELAY,
        ));
    }

    /// Whether a delayed log reveal is still waiting to fire.
    #[must_use]
    pub fn has_pending_reveal(&self) -> bool {
        self.reveal.as_ref().is_some_and(DelayedReveal::is_pending)
    }

    /// Forward an active-document change to the indicator visibility rule.
    pub fn on_active_document_changed(&mut self, document: Option<&ActiveDocument>) {
        self.publisher.update_visibility(document);
    }

    /// Tear down: cancel the delayed reveal and stop the server, if a
    /// channel was ever built. Await the result before exiting the host.
    pub async fn deactivate(mut self) -> Result<(), TransportError> {
        self.reveal = None;
        match self.channel.take() {
            Some(mut channel) => {
                tracing::info!("Stopping server for deactivation");
                channel.stop().await
            }
            None => Ok(()),
        }
    }
}
