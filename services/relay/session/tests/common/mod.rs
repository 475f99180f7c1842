//! Shared test doubles for relay-session integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use relay_session::{
    ConnectionHandler, DiagnosticLogger, SocketTransport, TransportError, TransportEvent,
    TransportEventSink,
};
use relay_wire::{CloseCode, Endpoint};

/// Call made by the connection into the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Disconnect(CloseCode),
    Text(String),
    Ping,
}

/// Transport that records calls and lets tests inject events
#[derive(Default)]
pub struct MockTransport {
    sink: Mutex<Option<TransportEventSink>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Push an event as if the socket produced it
    pub fn emit(&self, event: TransportEvent) {
        let sink = self.sink.lock().unwrap().clone().expect("event sink installed");
        sink.emit(event);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn pings(&self) -> usize {
        self.count(&Call::Ping)
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                Call::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl SocketTransport for MockTransport {
    fn set_event_sink(&self, sink: TransportEventSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn connect(&self) {
        self.calls.lock().unwrap().push(Call::Connect);
    }

    fn disconnect(&self, code: CloseCode) {
        self.calls.lock().unwrap().push(Call::Disconnect(code));
    }

    fn write_text(&self, text: String) {
        self.calls.lock().unwrap().push(Call::Text(text));
    }

    fn write_ping(&self, payload: Bytes) {
        assert!(payload.is_empty(), "heartbeat pings carry no payload");
        self.calls.lock().unwrap().push(Call::Ping);
    }
}

/// Callback observed by the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Connect,
    Disconnect(Option<TransportError>),
    Text(String),
}

#[derive(Default)]
pub struct RecordingHandler {
    callbacks: Mutex<Vec<Callback>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callbacks(&self) -> Vec<Callback> {
        self.callbacks.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.callbacks().iter().filter(|c| **c == Callback::Connect).count()
    }

    pub fn disconnects(&self) -> usize {
        self.callbacks()
            .iter()
            .filter(|c| matches!(c, Callback::Disconnect(_)))
            .count()
    }

    pub fn texts(&self) -> Vec<String> {
        self.callbacks()
            .into_iter()
            .filter_map(|c| match c {
                Callback::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ConnectionHandler for RecordingHandler {
    fn on_connect(&self) {
        self.callbacks.lock().unwrap().push(Callback::Connect);
    }

    fn on_disconnect(&self, error: Option<&TransportError>) {
        self.callbacks
            .lock()
            .unwrap()
            .push(Callback::Disconnect(error.cloned()));
    }

    fn on_text_receive(&self, text: &str) {
        self.callbacks.lock().unwrap().push(Callback::Text(text.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn outgoing(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.starts_with("==> "))
            .collect()
    }

    pub fn containing(&self, needle: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(needle)).count()
    }
}

impl DiagnosticLogger for RecordingLogger {
    fn log(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

pub fn endpoint() -> Endpoint {
    Endpoint::new("wss://bridge.example.org", "7f3c1d").unwrap()
}

pub fn disconnected() -> TransportEvent {
    TransportEvent::Disconnected {
        code: CloseCode::NORMAL,
        reason: String::new(),
    }
}

/// Let the dispatcher drain its queue.
///
/// Tests run with paused time, so this returns only once every other task
/// is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
