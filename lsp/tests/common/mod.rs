//! Recording host sinks shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roughly_lsp::{
    Host, IndicatorView, LifecycleController, LogSink, Notifier, PendingRestartDecision,
    StatusIndicator, StdioChannelFactory,
};
use roughly_types::ClientSettings;

#[derive(Default)]
pub struct TestHost {
    pub lines: Mutex<Vec<String>>,
    pub reveals: AtomicUsize,
    pub errors: Mutex<Vec<String>>,
    pub prompts: AtomicUsize,
    pub views: Mutex<Vec<IndicatorView>>,
}

impl TestHost {
    pub fn handles(self: &Arc<Self>) -> Host {
        Host {
            log_sink: self.clone(),
            notifier: self.clone(),
            indicator: self.clone(),
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn last_view(&self) -> Option<IndicatorView> {
        self.views.lock().unwrap().last().cloned()
    }
}

impl LogSink for TestHost {
    fn append_line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn reveal(&self) {
        self.reveals.fetch_add(1, Ordering::SeqCst);
    }
}

impl Notifier for TestHost {
    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn show_restart_prompt(&self, _decision: &PendingRestartDecision) {
        self.prompts.fetch_add(1, Ordering::SeqCst);
    }
}

impl StatusIndicator for TestHost {
    fn apply(&self, view: &IndicatorView) {
        self.views.lock().unwrap().push(view.clone());
    }

    fn set_visible(&self, _visible: bool) {}
}

pub fn settings(path: &str) -> ClientSettings {
    ClientSettings::new(path, vec!["lsp".to_string()]).unwrap()
}

/// Activate a controller that launches `command` as the server.
pub async fn activate(command: &str, host: &Arc<TestHost>) -> LifecycleController {
    let factory = StdioChannelFactory::new(host.clone());
    LifecycleController::activate(&settings(command), Box::new(factory), host.handles(), "test")
        .await
}

/// Poll until the server process has exited on its own.
pub async fn wait_for_exit(controller: &mut LifecycleController) {
    for _ in 0..100 {
        if !controller.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server process did not exit");
}
