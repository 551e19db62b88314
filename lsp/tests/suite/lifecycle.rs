//! End-to-end lifecycle scenarios against real processes.
//!
//! `cat` and `tee` stand in for a server: they echo every frame we send, so
//! our own `shutdown` request comes back as a server request, gets a
//! "method not found" reply, and that reply completes the handshake.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use roughly_lsp::{ConfigChangeMonitor, LifecycleController, StdioChannelFactory};
use roughly_types::{ClientSettings, Command, HealthState, RestartChoice};

use crate::common::{TestHost, activate, settings, wait_for_exit};

#[cfg(unix)]
#[tokio::test]
async fn exited_server_can_still_be_stopped() {
    let host = Arc::new(TestHost::default());
    let mut controller = activate("echo", &host).await;
    assert_eq!(controller.health(), HealthState::Started);

    wait_for_exit(&mut controller).await;
    // The exit happened out-of-band; health only moves on an explicit command.
    assert_eq!(controller.health(), HealthState::Started);

    controller.stop().await.unwrap();
    assert_eq!(controller.health(), HealthState::Stopped);
    assert!(host.errors().is_empty());
}

#[tokio::test]
async fn missing_executable_is_reported_and_stopped() {
    let host = Arc::new(TestHost::default());
    let controller = activate("roughly-integration-missing-binary", &host).await;

    assert_eq!(controller.health(), HealthState::Stopped);
    let errors = host.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("roughly-integration-missing-binary"));
    assert_eq!(
        host.last_view().unwrap().default_command,
        Command::StartLanguageServer
    );
    controller.deactivate().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn stop_completes_shutdown_handshake() {
    let host = Arc::new(TestHost::default());
    let mut controller = activate("cat", &host).await;
    assert!(controller.is_running());

    controller.dispatch(Command::StopLanguageServer).await;

    assert_eq!(controller.health(), HealthState::Stopped);
    assert!(!controller.is_running());
    assert!(host.errors().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn unrelated_change_leaves_server_alone() {
    let host = Arc::new(TestHost::default());
    let mut controller = activate("cat", &host).await;
    let mut monitor = ConfigChangeMonitor::detached(settings("cat"));

    let args_only = ClientSettings::new("cat", vec!["serve".to_string()]).unwrap();
    assert!(monitor.observe(args_only).is_none());

    assert_eq!(host.prompts.load(Ordering::SeqCst), 0);
    assert_eq!(controller.health(), HealthState::Started);
    assert!(controller.is_running());
    controller.deactivate().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn confirmed_path_change_restarts_on_new_command() {
    let host = Arc::new(TestHost::default());
    let mut controller = activate("cat", &host).await;
    let mut monitor = ConfigChangeMonitor::detached(settings("cat"));

    let change = monitor.observe(settings("tee")).expect("path change");
    let decision = controller
        .on_config_changed(&change)
        .expect("running server prompts");
    assert_eq!(host.prompts.load(Ordering::SeqCst), 1);

    controller
        .resolve_restart_decision(decision, RestartChoice::Restart)
        .await
        .unwrap();

    assert_eq!(controller.health(), HealthState::Started);
    assert!(controller.is_running());
    assert_eq!(controller.server_config().command(), "tee");
    assert!(controller.has_pending_reveal());
    controller.deactivate().await.unwrap();
}

#[tokio::test]
async fn deactivate_before_any_start_is_immediate() {
    let host = Arc::new(TestHost::default());
    let factory = StdioChannelFactory::new(host.clone());
    let controller = LifecycleController::new(
        &settings("roughly"),
        Box::new(factory),
        host.handles(),
        "test",
    );

    controller.deactivate().await.unwrap();
    assert!(host.views.lock().unwrap().is_empty());
}
