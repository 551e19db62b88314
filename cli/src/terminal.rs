//! Terminal implementations of the host surfaces.
//!
//! Output goes to stdout; tracing goes to the log file, so the two never
//! interleave.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use roughly_lsp::{IndicatorView, LogSink, Notifier, PendingRestartDecision, StatusIndicator};

/// Lines kept by the output pane before the oldest are dropped.
const OUTPUT_CAPACITY: usize = 2000;

const OUTPUT_TITLE: &str = "Roughly Language Server";

/// In-memory server output, printed when revealed.
pub struct OutputPane {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for OutputPane {
    fn default() -> Self {
        Self::with_capacity(OUTPUT_CAPACITY)
    }
}

impl OutputPane {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(OUTPUT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl LogSink for OutputPane {
    fn append_line(&self, line: &str) {
        tracing::trace!(target: "roughly_client::server", "{line}");
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }

    fn reveal(&self) {
        let lines = self.snapshot();
        println!("==> {OUTPUT_TITLE} ({} lines)", lines.len());
        for line in lines {
            println!("    {line}");
        }
        println!("<== {OUTPUT_TITLE}");
    }
}

pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn show_error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    fn show_restart_prompt(&self, decision: &PendingRestartDecision) {
        println!(
            "{} [{}] (type `confirm` or `dismiss`)",
            decision.message(),
            decision.actions().join("/")
        );
    }
}

/// Prints the indicator as a one-line status whenever it changes.
#[derive(Default)]
pub struct TerminalIndicator {
    visible: AtomicBool,
    current: Mutex<Option<IndicatorView>>,
}

impl TerminalIndicator {
    fn print(view: &IndicatorView) {
        let warning = if view.color.is_some() { " (!)" } else { "" };
        println!(
            "[status] {}{warning}  default: {}",
            strip_icons(&view.text),
            view.default_command.alias()
        );
    }
}

impl StatusIndicator for TerminalIndicator {
    fn apply(&self, view: &IndicatorView) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(view.clone());
        if self.visible.load(Ordering::Relaxed) {
            Self::print(view);
        }
    }

    fn set_visible(&self, visible: bool) {
        let was_visible = self.visible.swap(visible, Ordering::Relaxed);
        if visible
            && !was_visible
            && let Some(view) = self
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
        {
            Self::print(view);
        }
    }
}

/// Drop `$(icon)` tokens the terminal cannot draw.
fn strip_icons(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        match rest[start..].find(')') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}
