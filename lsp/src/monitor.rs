//! ConfigChangeMonitor: turns settings snapshots into restart-relevant changes.

use roughly_config::ConfigSubscription;
use roughly_types::{ClientSettings, ConfigChange, SettingKey};

/// Watches settings snapshots and reports changes to the server path.
///
/// Holds nothing but the subscription and the last seen snapshot. Dropping
/// the monitor releases the subscription.
pub struct ConfigChangeMonitor {
    key: SettingKey,
    baseline: ClientSettings,
    subscription: Option<ConfigSubscription>,
}

impl ConfigChangeMonitor {
    #[must_use]
    pub fn new(subscription: ConfigSubscription) -> Self {
        Self {
            key: SettingKey::RESTART_RELEVANT,
            baseline: subscription.current(),
            subscription: Some(subscription),
        }
    }

    /// A monitor fed only through [`Self::observe`].
    #[must_use]
    pub fn detached(baseline: ClientSettings) -> Self {
        Self {
            key: SettingKey::RESTART_RELEVANT,
            baseline,
            subscription: None,
        }
    }

    /// The last snapshot seen.
    #[must_use]
    pub fn baseline(&self) -> &ClientSettings {
        &self.baseline
    }

    /// Compare `next` with the baseline and adopt it.
    ///
    /// Returns the change only when it touches the watched key.
    pub fn observe(&mut self, next: ClientSettings) -> Option<ConfigChange> {
        let change = ConfigChange::between(&self.baseline, &next)?;
        self.baseline = next;
        if change.affects(self.key) {
            Some(change)
        } else {
            tracing::debug!(changed = ?change.changed(), "Settings changed without affecting {}", self.key);
            None
        }
    }

    /// Wait for the next change touching the watched key.
    ///
    /// Returns `None` once the subscription is closed, or immediately for a
    /// detached monitor. Cancel safe.
    pub async fn next_restart_change(&mut self) -> Option<ConfigChange> {
        loop {
            let next = self.subscription.as_mut()?.changed().await?;
            if let Some(change) = self.observe(next) {
                return Some(change);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::watch;

    fn settings(path: &str, args: &[&str]) -> ClientSettings {
        ClientSettings::new(path, args.iter().map(ToString::to_string).collect()).unwrap()
    }

    #[test]
    fn path_change_is_reported() {
        let mut monitor = ConfigChangeMonitor::detached(settings("roughly", &["lsp"]));
        let change = monitor.observe(settings("roughly-dev", &["lsp"])).unwrap();
        assert_eq!(change.changed(), [SettingKey::Path]);
        assert_eq!(monitor.baseline().path(), "roughly-dev");
    }

    #[test]
    fn args_change_is_filtered_but_adopted() {
        let mut monitor = ConfigChangeMonitor::detached(settings("roughly", &["lsp"]));
        assert!(monitor.observe(settings("roughly", &["serve"])).is_none());
        assert_eq!(monitor.baseline().args(), ["serve"]);

        // A later path change reports only what changed since the baseline.
        let change = monitor.observe(settings("roughly-dev", &["serve"])).unwrap();
        assert_eq!(change.changed(), [SettingKey::Path]);
    }

    #[test]
    fn identical_snapshot_is_not_a_change() {
        let mut monitor = ConfigChangeMonitor::detached(settings("roughly", &["lsp"]));
        assert!(monitor.observe(settings("roughly", &["lsp"])).is_none());
    }

    #[tokio::test]
    async fn detached_monitor_has_no_stream() {
        let mut monitor = ConfigChangeMonitor::detached(ClientSettings::default());
        assert!(monitor.next_restart_change().await.is_none());
    }

    #[tokio::test]
    async fn subscription_yields_only_path_changes() {
        let (tx, rx) = watch::channel(settings("roughly", &["lsp"]));
        let idle = tokio::spawn(std::future::pending::<()>());
        let mut monitor = ConfigChangeMonitor::new(ConfigSubscription::new(rx, idle));

        tx.send_replace(settings("roughly", &["serve"]));
        let waited =
            tokio::time::timeout(Duration::from_millis(50), monitor.next_restart_change()).await;
        assert!(waited.is_err(), "args-only change must not surface");

        tx.send_replace(settings("/usr/bin/roughly", &["serve"]));
        let change = monitor.next_restart_change().await.unwrap();
        assert_eq!(change.settings().path(), "/usr/bin/roughly");

        drop(tx);
        assert!(monitor.next_restart_change().await.is_none());
    }
}
