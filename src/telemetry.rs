use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

/// Scalar attribute value carried on spans, breadcrumbs and log records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

pub type AttrMap = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A named, timed unit of work with structured attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    pub name: String,
    pub op: String,
    pub attributes: AttrMap,
}

impl Span {
    pub fn new(name: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            attributes: AttrMap::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Lightweight annotation attached to the current observability context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breadcrumb {
    pub category: String,
    pub message: String,
    pub level: Level,
    pub data: AttrMap,
}

impl Breadcrumb {
    pub fn new(category: impl Into<String>, message: impl Into<String>, level: Level) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            level,
            data: AttrMap::new(),
        }
    }

    pub fn datum(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Structured log record keyed by an event name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub level: Level,
    pub event: String,
    pub fields: AttrMap,
}

impl LogRecord {
    pub fn new(level: Level, event: impl Into<String>) -> Self {
        Self {
            level,
            event: event.into(),
            fields: AttrMap::new(),
        }
    }

    pub fn info(event: impl Into<String>) -> Self {
        Self::new(Level::Info, event)
    }

    pub fn warn(event: impl Into<String>) -> Self {
        Self::new(Level::Warning, event)
    }

    pub fn error(event: impl Into<String>) -> Self {
        Self::new(Level::Error, event)
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// The three message kinds the sink accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryMessage {
    Span(Span),
    Breadcrumb(Breadcrumb),
    Log(LogRecord),
}

/// Destination for telemetry. Emission is fire-and-forget: callers never
/// learn whether delivery succeeded, and form logic must not depend on it.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, msg: TelemetryMessage);
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Arc<S> {
    fn emit(&self, msg: TelemetryMessage) {
        (**self).emit(msg);
    }
}

/// Captures every message in memory. Used by tests and by the demo binary
/// to print a session transcript.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<TelemetryMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<TelemetryMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.messages.lock() {
            m.clear();
        }
    }

    pub fn spans(&self) -> Vec<Span> {
        self.snapshot()
            .into_iter()
            .filter_map(|m| match m {
                TelemetryMessage::Span(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.snapshot()
            .into_iter()
            .filter_map(|m| match m {
                TelemetryMessage::Breadcrumb(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.snapshot()
            .into_iter()
            .filter_map(|m| match m {
                TelemetryMessage::Log(l) => Some(l),
                _ => None,
            })
            .collect()
    }
}

impl TelemetrySink for RecordingSink {
    fn emit(&self, msg: TelemetryMessage) {
        if let Ok(mut m) = self.messages.lock() {
            m.push(msg);
        }
    }
}

/// Forwards messages to the `tracing` subscriber stack. Attribute maps are
/// rendered as JSON since their keys are dynamic.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, msg: TelemetryMessage) {
        match msg {
            TelemetryMessage::Span(s) => {
                let attrs = serde_json::to_string(&s.attributes).unwrap_or_default();
                info!(target: "formtrace", op = %s.op, attributes = %attrs, "span {}", s.name);
            }
            TelemetryMessage::Breadcrumb(b) => {
                let data = serde_json::to_string(&b.data).unwrap_or_default();
                match b.level {
                    Level::Info => {
                        info!(target: "formtrace", category = %b.category, data = %data, "{}", b.message)
                    }
                    Level::Warning => {
                        warn!(target: "formtrace", category = %b.category, data = %data, "{}", b.message)
                    }
                    Level::Error => {
                        error!(target: "formtrace", category = %b.category, data = %data, "{}", b.message)
                    }
                }
            }
            TelemetryMessage::Log(l) => {
                let fields = serde_json::to_string(&l.fields).unwrap_or_default();
                match l.level {
                    Level::Info => info!(target: "formtrace", fields = %fields, "{}", l.event),
                    Level::Warning => warn!(target: "formtrace", fields = %fields, "{}", l.event),
                    Level::Error => error!(target: "formtrace", fields = %fields, "{}", l.event),
                }
            }
        }
    }
}

/// Delivers every message to each of a set of sinks in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }
}

impl TelemetrySink for FanoutSink {
    fn emit(&self, msg: TelemetryMessage) {
        for sink in &self.sinks {
            sink.emit(msg.clone());
        }
    }
}

/// Buffered sink: messages go onto a channel and a worker thread delivers
/// them to the wrapped sink, so a slow destination cannot stall the form.
pub struct ChannelSink {
    tx: Mutex<Option<Sender<TelemetryMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelSink {
    pub fn spawn<S: TelemetrySink + 'static>(inner: S) -> Self {
        let (tx, rx) = mpsc::channel::<TelemetryMessage>();
        let worker = std::thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                inner.emit(msg);
            }
        });
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Drop the sender and wait for the worker to drain the queue.
    pub fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        self.close();
    }
}

impl TelemetrySink for ChannelSink {
    fn emit(&self, msg: TelemetryMessage) {
        // A closed channel means the sink is shutting down; the message is
        // dropped on the floor, which fire-and-forget permits.
        if let Ok(tx) = self.tx.lock() {
            if let Some(tx) = tx.as_ref() {
                let _ = tx.send(msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_splits_by_kind() {
        let sink = RecordingSink::new();
        sink.emit(TelemetryMessage::Span(Span::new("a", "op.a")));
        sink.emit(TelemetryMessage::Breadcrumb(Breadcrumb::new(
            "cat",
            "msg",
            Level::Info,
        )));
        sink.emit(TelemetryMessage::Log(LogRecord::info("evt")));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.spans().len(), 1);
        assert_eq!(sink.breadcrumbs().len(), 1);
        assert_eq!(sink.logs().len(), 1);
    }

    #[test]
    fn channel_sink_delivers_to_inner_after_close() {
        let inner = Arc::new(RecordingSink::new());
        let channel = ChannelSink::spawn(Arc::clone(&inner));

        for i in 0..5 {
            channel.emit(TelemetryMessage::Log(
                LogRecord::info("evt").field("i", i as u64),
            ));
        }
        channel.close();

        assert_eq!(inner.len(), 5);
    }

    #[test]
    fn emit_after_close_is_silently_dropped() {
        let inner = Arc::new(RecordingSink::new());
        let channel = ChannelSink::spawn(Arc::clone(&inner));
        channel.close();
        channel.emit(TelemetryMessage::Log(LogRecord::info("late")));
        assert_eq!(inner.len(), 0);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(RecordingSink::new());
        let b = Arc::new(RecordingSink::new());
        let fanout = FanoutSink::new(vec![
            Arc::clone(&a) as Arc<dyn TelemetrySink>,
            Arc::clone(&b) as Arc<dyn TelemetrySink>,
        ]);
        fanout.emit(TelemetryMessage::Log(LogRecord::info("evt")));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn level_renders_lowercase() {
        assert_eq!(Level::Warning.to_string(), "warning");
        assert_eq!(Level::Info.to_string(), "info");
    }

    #[test]
    fn messages_serialize_with_kind_tag() {
        let msg = TelemetryMessage::Breadcrumb(
            Breadcrumb::new("signup.lifecycle", "Form interaction started", Level::Info)
                .datum("timestamp", 42u64),
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"kind\":\"breadcrumb\""));
        assert!(json.contains("\"timestamp\":42"));
    }
}
