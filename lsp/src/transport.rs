//! Transport channels: the controller's only handle on a server process.
//!
//! A channel is built from one [`ServerConfig`] snapshot and never
//! reconfigured. Restarting means stopping the channel and building a new
//! one through a [`ChannelFactory`].

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use roughly_types::ServerConfig;

use crate::host::LogSink;
use crate::process::ProcessHandle;

/// Transport operation future type alias.
pub type TransportFut<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("server executable `{command}` not found")]
    NotFound { command: String },
    #[error("failed to launch `{command}`: {source}")]
    Launch { command: String, source: io::Error },
    #[error("server process `{command}` has no {pipe} pipe")]
    MissingPipe {
        command: String,
        pipe: &'static str,
    },
    #[error("failed to stop `{command}`: {source}")]
    Stop { command: String, source: io::Error },
}

/// A start/stop-able connection to one server process.
///
/// `start` on a running channel is a no-op. `stop` on a stopped channel
/// succeeds immediately.
pub trait TransportChannel: Send {
    fn start(&mut self) -> TransportFut<'_>;

    fn stop(&mut self) -> TransportFut<'_>;

    /// Whether the server process is alive right now.
    fn is_running(&mut self) -> bool;
}

/// Builds a fresh channel for a configuration snapshot.
pub trait ChannelFactory: Send + Sync {
    fn create(&self, config: ServerConfig) -> Box<dyn TransportChannel>;
}

/// Channel that talks to a child process over stdin/stdout.
pub struct StdioChannel {
    config: ServerConfig,
    log_sink: Arc<dyn LogSink>,
    process: Option<ProcessHandle>,
}

impl StdioChannel {
    #[must_use]
    pub fn new(config: ServerConfig, log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            log_sink,
            process: None,
        }
    }
}

impl TransportChannel for StdioChannel {
    fn start(&mut self) -> TransportFut<'_> {
        Box::pin(async move {
            if self.is_running() {
                tracing::debug!(command = %self.config.command(), "Server already running");
                return Ok(());
            }
            // Reap a process that exited on its own before launching another.
            if let Some(exited) = self.process.take() {
                exited.shutdown().await?;
            }
            let process = ProcessHandle::spawn(&self.config, self.log_sink.clone())?;
            self.process = Some(process);
            Ok(())
        })
    }

    fn stop(&mut self) -> TransportFut<'_> {
        Box::pin(async move {
            match self.process.take() {
                Some(process) => process.shutdown().await,
                None => Ok(()),
            }
        })
    }

    fn is_running(&mut self) -> bool {
        self.process.as_mut().is_some_and(ProcessHandle::is_alive)
    }
}

/// Factory for [`StdioChannel`]s sharing one log sink.
pub struct StdioChannelFactory {
    log_sink: Arc<dyn LogSink>,
}

impl StdioChannelFactory {
    #[must_use]
    pub fn new(log_sink: Arc<dyn LogSink>) -> Self {
        Self { log_sink }
    }
}

impl ChannelFactory for StdioChannelFactory {
    fn create(&self, config: ServerConfig) -> Box<dyn TransportChannel> {
        Box::new(StdioChannel::new(config, self.log_sink.clone()))
    }
}
