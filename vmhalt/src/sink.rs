//! User-facing output sinks.
//!
//! The orchestrator reports progress through an [`OutputSink`]:
//! - `say`: a headline for a phase ("Gracefully halting virtual machine...")
//! - `message`: one line of guest command output
//! - `error`: a terminal failure, reported once
//!
//! Calls are ordered and infallible. Sinks are shared across tasks, so they
//! take `&self` and use interior mutability where they keep state.

use parking_lot::Mutex;
use std::io::Write;

pub trait OutputSink: Send + Sync {
    fn say(&self, text: &str);

    fn message(&self, text: &str);

    fn error(&self, text: &str);
}

/// Routes output into the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn say(&self, text: &str) {
        tracing::info!(target: "vmhalt::ui", "{}", text);
    }

    fn message(&self, text: &str) {
        tracing::info!(target: "vmhalt::ui", output = true, "{}", text);
    }

    fn error(&self, text: &str) {
        tracing::error!(target: "vmhalt::ui", "{}", text);
    }
}

/// Terminal output: headlines prefixed with `==> `, command output indented,
/// errors on stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    // Serializes writes so lines from concurrent callers never interleave.
    lock: Mutex<()>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for ConsoleSink {
    fn say(&self, text: &str) {
        let _guard = self.lock.lock();
        let _ = writeln!(std::io::stdout(), "==> {}", text);
    }

    fn message(&self, text: &str) {
        let _guard = self.lock.lock();
        let _ = writeln!(std::io::stdout(), "    {}", text);
    }

    fn error(&self, text: &str) {
        let _guard = self.lock.lock();
        let _ = writeln!(std::io::stderr(), "==> {}", text);
    }
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Say(String),
    Message(String),
    Error(String),
}

/// Keeps every event in memory, in call order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Only the `message` lines.
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Message(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Only the `error` lines.
    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Error(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn say(&self, text: &str) {
        self.events.lock().push(SinkEvent::Say(text.to_string()));
    }

    fn message(&self, text: &str) {
        self.events.lock().push(SinkEvent::Message(text.to_string()));
    }

    fn error(&self, text: &str) {
        self.events.lock().push(SinkEvent::Error(text.to_string()));
    }
}
