//! Ordered event dispatcher.
//!
//! One dispatcher task runs per connection and drains the transport's event
//! queue in FIFO order, so handlers never run concurrently for the same
//! connection and observe events in the order the transport produced them.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::connection::Shared;
use crate::error::TransportError;
use crate::transport::TransportEvent;

/// Last callback delivered to the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notified {
    Connect,
    Disconnect,
}

pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    last: Option<Notified>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared, last: None }
    }

    pub(crate) async fn run(mut self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        debug!("Dispatcher started");
        while let Some(event) = events.recv().await {
            if !self.shared.is_live() {
                break;
            }
            self.handle(event);
        }
        debug!("Dispatcher stopped");
    }

    fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.connected(),
            TransportEvent::Disconnected { code, reason } => {
                self.terminal(format!("disconnected ({}) {}", code, reason), None)
            }
            TransportEvent::Error(error) => self.terminal(format!("error: {}", error), Some(error)),
            TransportEvent::Cancelled => self.terminal("cancelled".to_string(), None),
            TransportEvent::Text(text) => {
                if self.shared.is_live() {
                    self.shared.handler.on_text_receive(&text);
                }
            }
            TransportEvent::Ping(_) => self.shared.logger.log("<== ping"),
            TransportEvent::Pong(_) => self.shared.logger.log("<== pong"),
            TransportEvent::ReconnectSuggested(suggested) => self
                .shared
                .logger
                .log(&format!("reconnect suggested: {}", suggested)),
            TransportEvent::Binary(_) | TransportEvent::ViabilityChanged(_) => {}
        }
    }

    fn connected(&mut self) {
        self.shared.connected.store(true, Ordering::Release);
        self.shared.heartbeat.start();

        if self.last == Some(Notified::Connect) {
            self.shared.logger.log("connected (already reported)");
            return;
        }
        self.last = Some(Notified::Connect);
        self.shared.logger.log("connected");
        if self.shared.is_live() {
            self.shared.handler.on_connect();
        }
    }

    /// Disconnected, error or cancelled.
    ///
    /// While the host is suspended the event is only logged: the suspension
    /// already forced a close, and the state is settled when the host resumes.
    /// The socket that reported the event is gone, so the next Connected is a
    /// new connection and is reported again.
    fn terminal(&mut self, description: String, error: Option<TransportError>) {
        if !self.shared.lifecycle.is_active() {
            self.shared
                .logger
                .log(&format!("{} while suspended, not reported", description));
            self.last = None;
            return;
        }

        self.shared.heartbeat.invalidate();
        self.shared.connected.store(false, Ordering::Release);

        if self.last == Some(Notified::Disconnect) {
            self.shared
                .logger
                .log(&format!("{} (already reported)", description));
            return;
        }
        self.last = Some(Notified::Disconnect);
        self.shared.logger.log(&description);
        if self.shared.is_live() {
            self.shared.handler.on_disconnect(error.as_ref());
        }
    }
}
