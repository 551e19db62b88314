//! Roughly client - terminal host for the language server lifecycle.
//!
//! Stands in for an editor: it activates a [`LifecycleController`], feeds it
//! commands read from stdin and settings changes from the config file, and
//! deactivates it on `quit`, end of input, or Ctrl-C.
//!
//! ```text
//! stdin lines ----\
//! config watcher --+--> select! --> LifecycleController --> server process
//! ctrl-c ---------/                       |
//!                                         v
//!                         OutputPane / TerminalNotifier / TerminalIndicator
//! ```

mod input;
mod terminal;

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    ops::ControlFlow,
    path::{self, Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use roughly_config::ConfigWatcher;
use roughly_lsp::{
    ActiveDocument, ConfigChangeMonitor, Host, LifecycleController, PendingRestartDecision,
    StdioChannelFactory,
};
use roughly_types::{Command, ConfigChange, RestartChoice};

use input::{HELP, Input, parse_line};
use terminal::{OutputPane, TerminalIndicator, TerminalNotifier};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Stdout carries the prompt and server output; keep tracing off it.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.roughly/logs/client.log
    if let Some(config_dir) = roughly_config::config_dir() {
        candidates.push(config_dir.join("logs").join("client.log"));
    }

    // Fallback: ./.roughly/logs/client.log
    candidates.push(PathBuf::from(".roughly").join("logs").join("client.log"));

    candidates
}

/// Forward stdin lines until EOF or the receiver goes away.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {e}");
                    break;
                }
            }
        }
    });
    rx
}

fn config_monitor() -> ConfigChangeMonitor {
    match roughly_config::config_path() {
        Some(path) => {
            tracing::info!(path = %path.display(), "Watching settings");
            ConfigChangeMonitor::new(ConfigWatcher::new(path).spawn())
        }
        None => ConfigChangeMonitor::detached(roughly_config::load()),
    }
}

fn active_document(path: &Path) -> Option<ActiveDocument> {
    match path::absolute(path) {
        Ok(path) => ActiveDocument::from_path(&path),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Cannot resolve document path: {e}");
            None
        }
    }
}

struct Session {
    controller: LifecycleController,
    pending: Option<PendingRestartDecision>,
}

impl Session {
    async fn handle(&mut self, input: Input) -> ControlFlow<()> {
        match input {
            Input::Run(command) => self.controller.dispatch(command).await,
            Input::Open(path) => {
                let document = active_document(&path);
                if document.is_none() {
                    eprintln!("Not a usable document path: {}", path.display());
                }
                self.controller.on_active_document_changed(document.as_ref());
            }
            Input::Close => self.controller.on_active_document_changed(None),
            Input::Confirm => self.answer(RestartChoice::Restart).await,
            Input::Dismiss => self.answer(RestartChoice::Dismiss).await,
            Input::Ids => {
                for command in Command::ALL {
                    println!("{:<32} {:<8} {}", command.id(), command.alias(), command.title());
                }
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => return ControlFlow::Break(()),
            Input::Unknown(line) => eprintln!("Unknown input `{line}`; type `help`"),
        }
        ControlFlow::Continue(())
    }

    /// Any unanswered prompt refers to an older path and is dropped, even
    /// when the new change raises no prompt of its own.
    fn on_path_change(&mut self, change: &ConfigChange) {
        self.pending = self.controller.on_config_changed(change);
    }

    async fn answer(&mut self, choice: RestartChoice) {
        let Some(decision) = self.pending.take() else {
            println!("No restart prompt is pending");
            return;
        };
        if let Err(e) = self
            .controller
            .resolve_restart_decision(decision, choice)
            .await
        {
            self.controller.report_failure("restart", &e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut monitor = config_monitor();
    let settings = monitor.baseline().clone();

    let pane = Arc::new(OutputPane::default());
    let host = Host {
        log_sink: pane.clone(),
        notifier: Arc::new(TerminalNotifier),
        indicator: Arc::new(TerminalIndicator::default()),
    };
    let factory = StdioChannelFactory::new(pane);
    let controller = LifecycleController::activate(
        &settings,
        Box::new(factory),
        host,
        env!("CARGO_PKG_VERSION"),
    )
    .await;

    let mut session = Session {
        controller,
        pending: None,
    };
    let mut lines = spawn_stdin_reader();
    let mut watching = true;

    println!("Roughly client {}; type `help`", env!("CARGO_PKG_VERSION"));

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                if let Some(input) = parse_line(&line)
                    && session.handle(input).await.is_break()
                {
                    break;
                }
            }
            change = monitor.next_restart_change(), if watching => match change {
                Some(change) => session.on_path_change(&change),
                None => watching = false,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    drop(monitor);
    let Session { controller, .. } = session;
    if let Err(e) = controller.deactivate().await {
        eprintln!("Failed to stop the language server: {e}");
    }

    Ok(())
}
