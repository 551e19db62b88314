//! Polling watcher that publishes settings snapshots when the file changes.

use std::path::PathBuf;
use std::time::Duration;

use roughly_types::ClientSettings;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{load_from, load_or_default};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Live subscription to settings snapshots.
///
/// Dropping the subscription stops the watcher task.
pub struct ConfigSubscription {
    rx: watch::Receiver<ClientSettings>,
    handle: JoinHandle<()>,
}

impl ConfigSubscription {
    /// Build a subscription around an existing receiver. The task handle is
    /// aborted when the subscription is dropped.
    #[must_use]
    pub fn new(rx: watch::Receiver<ClientSettings>, handle: JoinHandle<()>) -> Self {
        Self { rx, handle }
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn current(&self) -> ClientSettings {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot.
    ///
    /// Returns `None` once the watcher has shut down.
    pub async fn changed(&mut self) -> Option<ClientSettings> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for ConfigSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct ConfigWatcher {
    path: PathBuf,
    interval: Duration,
}

impl ConfigWatcher {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Load the current settings and start polling for changes.
    ///
    /// The file is re-read every interval; a snapshot is published only when
    /// the resolved settings differ from the last one. Only the initial load
    /// falls back to defaults: while the file is unreadable or invalid the
    /// last good snapshot stays current and nothing is published.
    #[must_use]
    pub fn spawn(self) -> ConfigSubscription {
        let initial = load_or_default(&self.path);
        let (tx, rx) = watch::channel(initial);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            let mut last_error: Option<String> = None;
            loop {
                ticker.tick().await;
                let next = match load_from(&self.path) {
                    Ok(next) => {
                        if last_error.take().is_some() {
                            tracing::info!(path = %self.path.display(), "Settings readable again");
                        }
                        next
                    }
                    Err(err) => {
                        let message = err.to_string();
                        if last_error.as_deref() != Some(message.as_str()) {
                            tracing::warn!("{message}; keeping previous settings");
                            last_error = Some(message);
                        }
                        if tx.is_closed() {
                            break;
                        }
                        continue;
                    }
                };
                let changed = tx.send_if_modified(|current| {
                    if *current == next {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
                if changed {
                    tracing::debug!(path = %self.path.display(), "Settings changed");
                }
                if tx.is_closed() {
                    tracing::debug!("Settings subscription closed; stopping watcher");
                    break;
                }
            }
        });
        ConfigSubscription::new(rx, handle)
    }
}
