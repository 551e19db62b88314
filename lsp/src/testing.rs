//! Recording host sinks and scripted transports for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use roughly_types::ServerConfig;

use crate::controller::PendingRestartDecision;
use crate::health::IndicatorView;
use crate::host::{Host, LogSink, Notifier, StatusIndicator};
use crate::transport::{ChannelFactory, TransportChannel, TransportError, TransportFut};

#[derive(Default)]
pub(crate) struct RecordingIndicator {
    views: Mutex<Vec<IndicatorView>>,
    visibility: Mutex<Vec<bool>>,
}

impl RecordingIndicator {
    pub fn views(&self) -> Vec<IndicatorView> {
        self.views.lock().unwrap().clone()
    }

    pub fn visibility_changes(&self) -> Vec<bool> {
        self.visibility.lock().unwrap().clone()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn apply(&self, view: &IndicatorView) {
        self.views.lock().unwrap().push(view.clone());
    }

    fn set_visible(&self, visible: bool) {
        self.visibility.lock().unwrap().push(visible);
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    lines: Mutex<Vec<String>>,
    reveals: AtomicUsize,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn reveals(&self) -> usize {
        self.reveals.load(Ordering::SeqCst)
    }
}

impl LogSink for RecordingSink {
    fn append_line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn reveal(&self) {
        self.reveals.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    errors: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn show_restart_prompt(&self, decision: &PendingRestartDecision) {
        self.prompts.lock().unwrap().push(decision.message().to_string());
    }
}

pub(crate) struct RecordingHost {
    pub sink: Arc<RecordingSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub indicator: Arc<RecordingIndicator>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(RecordingSink::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            indicator: Arc::new(RecordingIndicator::default()),
        }
    }

    pub fn host(&self) -> Host {
        Host {
            log_sink: self.sink.clone(),
            notifier: self.notifier.clone(),
            indicator: self.indicator.clone(),
        }
    }
}

/// A transport operation observed by [`ScriptedFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Create(String),
    Start(usize),
    Stop(usize),
}

#[derive(Default)]
struct Script {
    calls: Mutex<Vec<Call>>,
    /// Liveness flag of every channel created so far, by creation index.
    running: Mutex<Vec<Arc<AtomicBool>>>,
    fail_next_start: AtomicBool,
}

/// Factory of in-memory channels that record every call.
#[derive(Clone, Default)]
pub(crate) struct ScriptedFactory {
    script: Arc<Script>,
}

impl ScriptedFactory {
    pub fn calls(&self) -> Vec<Call> {
        self.script.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.script.calls.lock().unwrap().clear();
    }

    pub fn created(&self) -> usize {
        self.script.running.lock().unwrap().len()
    }

    pub fn live_channels(&self) -> usize {
        self.script
            .running
            .lock()
            .unwrap()
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }

    pub fn fail_next_start(&self) {
        self.script.fail_next_start.store(true, Ordering::SeqCst);
    }

    /// Simulate the most recent server exiting on its own.
    pub fn crash_latest(&self) {
        if let Some(flag) = self.script.running.lock().unwrap().last() {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

impl ChannelFactory for ScriptedFactory {
    fn create(&self, config: ServerConfig) -> Box<dyn TransportChannel> {
        let running = Arc::new(AtomicBool::new(false));
        let index = {
            let mut flags = self.script.running.lock().unwrap();
            flags.push(running.clone());
            flags.len() - 1
        };
        self.script
            .calls
            .lock()
            .unwrap()
            .push(Call::Create(config.command().to_string()));
        Box::new(ScriptedChannel {
            index,
            config,
            running,
            script: self.script.clone(),
        })
    }
}

struct ScriptedChannel {
    index: usize,
    config: ServerConfig,
    running: Arc<AtomicBool>,
    script: Arc<Script>,
}

impl TransportChannel for ScriptedChannel {
    fn start(&mut self) -> TransportFut<'_> {
        Box::pin(async move {
            self.script
                .calls
                .lock()
                .unwrap()
                .push(Call::Start(self.index));
            if self.script.fail_next_start.swap(false, Ordering::SeqCst) {
                return Err(TransportError::NotFound {
                    command: self.config.command().to_string(),
                });
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn stop(&mut self) -> TransportFut<'_> {
        Box::pin(async move {
            self.script.calls.lock().unwrap().push(Call::Stop(self.index));
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_running(&mut self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
