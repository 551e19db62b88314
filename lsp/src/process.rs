//! Process handle: owns one server child process and its stdio pumps.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use roughly_types::ServerConfig;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{FrameReader, FrameWriter};
use crate::host::LogSink;
use crate::protocol::{Incoming, LogMessage, Outgoing};
use crate::transport::TransportError;

/// How long to wait for the `shutdown` response.
const SHUTDOWN_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for the process to exit after `exit` before killing it.
const EXIT_TIMEOUT: Duration = Duration::from_secs(2);

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// Outcome of one of our requests: the result, or the server's error message.
type Reply = Result<serde_json::Value, String>;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

pub(crate) enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

pub(crate) struct ProcessHandle {
    command: String,
    child: Child,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: u64,
    pending: PendingMap,
    reader_handle: JoinHandle<()>,
    #[allow(dead_code)]
    writer_handle: JoinHandle<()>,
    #[allow(dead_code)]
    stderr_handle: JoinHandle<()>,
}

impl ProcessHandle {
    /// Launch the server and start its pump tasks.
    ///
    /// Resolves as soon as the process is spawned. A server that exits right
    /// away is still a successful launch; liveness is observed through
    /// [`ProcessHandle::is_alive`].
    pub fn spawn(config: &ServerConfig, log_sink: Arc<dyn LogSink>) -> Result<Self, TransportError> {
        let command = config.command().to_string();
        let resolved = which::which(&command).map_err(|e| {
            tracing::debug!("Could not resolve '{command}': {e}");
            TransportError::NotFound {
                command: command.clone(),
            }
        })?;

        let mut child = Command::new(&resolved)
            .args(config.args())
            .envs(config.env_overrides())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Launch {
                command: command.clone(),
                source,
            })?;

        let missing = |pipe| TransportError::MissingPipe {
            command: command.clone(),
            pipe,
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        tracing::info!(
            command = %config.display_command(),
            path = %resolved.display(),
            pid = child.id().unwrap_or_default(),
            "Server process spawned"
        );

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(stdin);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            tracing::debug!("Server write error: {e:#}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_handle = tokio::spawn(Self::read_loop(
            stdout,
            command.clone(),
            pending.clone(),
            writer_tx.clone(),
            log_sink.clone(),
        ));

        let stderr_handle = tokio::spawn(Self::pump_stderr(stderr, log_sink));

        Ok(Self {
            command,
            child,
            writer_tx,
            next_id: 1,
            pending,
            reader_handle,
            writer_handle,
            stderr_handle,
        })
    }

    async fn read_loop<R: AsyncRead + Unpin>(
        stdout: R,
        command: String,
        pending: PendingMap,
        writer_tx: mpsc::Sender<WriterCommand>,
        log_sink: Arc<dyn LogSink>,
    ) {
        let mut reader = FrameReader::new(stdout);
        loop {
            match reader.read_frame().await {
                Ok(Some(frame)) => {
                    Self::dispatch_frame(frame, &pending, &writer_tx, log_sink.as_ref(), &command)
                        .await;
                }
                Ok(None) => {
                    tracing::info!("Server '{command}' closed stdout");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Server '{command}' stdout unreadable: {e:#}");
                    break;
                }
            }
        }
        // Nobody will answer now; fail outstanding requests instead of
        // letting them run into their timeout.
        pending.lock().await.clear();
    }

    async fn pump_stderr<R: AsyncRead + Unpin>(stderr: R, log_sink: Arc<dyn LogSink>) {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => log_sink.append_line(&line),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Server stderr unreadable: {e}");
                    break;
                }
            }
        }
    }

    async fn dispatch_frame(
        frame: serde_json::Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
        writer_tx: &mpsc::Sender<WriterCommand>,
        log_sink: &dyn LogSink,
        command: &str,
    ) {
        let Some(incoming) = Incoming::classify(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame from '{command}'");
            return;
        };

        match incoming {
            Incoming::Reply { id, outcome } => {
                let sender = pending.lock().await.remove(&id);
                if let Some(tx) = sender {
                    let _ = tx.send(outcome);
                }
            }
            Incoming::Call { id, method } => {
                // The server may block until its request is answered.
                tracing::debug!("Server '{command}' sent request: {method}; replying method not found");
                let reply = Outgoing::MethodNotFound { id, method }.to_frame();
                let _ = writer_tx.send(WriterCommand::Send(reply)).await;
            }
            Incoming::Event { method, params } => match method.as_str() {
                "window/logMessage" | "window/showMessage" => {
                    let Some(params) = params else { return };
                    match serde_json::from_value::<LogMessage>(params) {
                        Ok(log) => {
                            log_sink.append_line(&format!("[{}] {}", log.level_label(), log.message));
                        }
                        Err(e) => {
                            tracing::debug!("Failed to parse {method} from '{command}': {e}");
                        }
                    }
                }
                _ => {
                    tracing::trace!("Ignoring notification from '{command}': {method}");
                }
            },
        }
    }

    /// Whether the child has not exited yet.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Send `shutdown` and wait for the reply. `None` if the server never
    /// answered.
    async fn request_shutdown(&mut self, timeout: Duration) -> Option<Reply> {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = Outgoing::Shutdown { id }.to_frame();
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return None;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Some(reply),
            Ok(Err(_)) | Err(_) => {
                self.pending.lock().await.remove(&id);
                None
            }
        }
    }

    /// Stop the server: `shutdown` request, `exit` notification, then wait
    /// for the process, killing it if it lingers. Consumes self.
    pub async fn shutdown(mut self) -> Result<(), TransportError> {
        if self.is_alive() {
            match self.request_shutdown(SHUTDOWN_REQUEST_TIMEOUT).await {
                Some(Ok(_)) => {}
                Some(Err(message)) => {
                    tracing::debug!("Server '{}' rejected shutdown: {message}", self.command);
                }
                None => {
                    tracing::debug!("Server '{}' did not answer shutdown", self.command);
                }
            }
            let exit = Outgoing::Exit.to_frame();
            let _ = self.writer_tx.send(WriterCommand::Send(exit)).await;
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        match tokio::time::timeout(EXIT_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("Server '{}' exited with {status}", self.command);
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to wait for server '{}': {e}", self.command);
                self.kill().await?;
            }
            Err(_) => {
                tracing::debug!("Server '{}' didn't exit in time, killing", self.command);
                self.kill().await?;
            }
        }

        self.reader_handle.abort();
        Ok(())
    }

    async fn kill(&mut self) -> Result<(), TransportError> {
        self.child
            .kill()
            .await
            .map_err(|source| TransportError::Stop {
                command: self.command.clone(),
                source,
            })
    }
}
