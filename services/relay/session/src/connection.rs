//! Public connection facade.
//!
//! [`RelayConnection`] owns one transport, its heartbeat, its lifecycle
//! subscriptions and the dispatcher task that turns transport events into
//! callbacks. Every operation is fire-and-forget and may be called from any
//! thread; results are observable only through the handler or later
//! [`RelayConnection::is_open`] reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_wire::{CloseCode, Endpoint, JsonRpcRequestDecoder, JsonRpcResponseDecoder, MessageDecoder};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

use crate::dispatcher::Dispatcher;
use crate::error::SessionError;
use crate::handler::{ConnectionHandler, NoopHandler};
use crate::heartbeat::Heartbeat;
use crate::lifecycle::{AlwaysActive, LifecycleProvider, LifecycleSignal, Subscription};
use crate::logger::{DiagnosticLogger, NoopLogger, OutgoingLog};
use crate::transport::{SocketTransport, TransportEventSink};

/// Default interval between heartbeat pings
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for a relay connection
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Interval between heartbeat pings while connected
    pub heartbeat_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// State shared between the facade, the dispatcher task and lifecycle callbacks
pub(crate) struct Shared {
    pub(crate) endpoint: Endpoint,
    pub(crate) transport: Arc<dyn SocketTransport>,
    pub(crate) heartbeat: Heartbeat,
    pub(crate) handler: Arc<dyn ConnectionHandler>,
    pub(crate) lifecycle: Arc<dyn LifecycleProvider>,
    pub(crate) logger: Arc<dyn DiagnosticLogger>,
    outgoing: OutgoingLog,
    /// Written only by the dispatcher
    pub(crate) connected: AtomicBool,
    torn_down: AtomicBool,
}

impl Shared {
    pub(crate) fn open(&self) {
        debug!("Opening connection to {}", self.endpoint);
        self.heartbeat.enable();
        self.transport.connect();
    }

    /// A Connected event already queued when this runs does not restart the
    /// heartbeat; only the next `open` re-arms it.
    pub(crate) fn close(&self, code: CloseCode) {
        debug!("Closing connection to {} with {}", self.endpoint, code);
        self.heartbeat.disable();
        self.transport.disconnect(code);
    }

    fn send(&self, text: &str) {
        if !self.is_open() {
            debug!("Dropping outgoing frame to {}: not connected", self.endpoint);
            return;
        }
        self.transport.write_text(text.to_owned());
        self.outgoing.record(text);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Whether callbacks may still be delivered
    pub(crate) fn is_live(&self) -> bool {
        !self.torn_down.load(Ordering::Acquire)
    }
}

/// Builder for [`RelayConnection`]
pub struct ConnectionBuilder {
    endpoint: Endpoint,
    transport: Arc<dyn SocketTransport>,
    config: ConnectionConfig,
    handler: Arc<dyn ConnectionHandler>,
    lifecycle: Arc<dyn LifecycleProvider>,
    logger: Arc<dyn DiagnosticLogger>,
    decoders: Vec<Arc<dyn MessageDecoder>>,
}

impl ConnectionBuilder {
    /// Start building a connection to `endpoint` over `transport`
    pub fn new(endpoint: Endpoint, transport: Arc<dyn SocketTransport>) -> Self {
        Self {
            endpoint,
            transport,
            config: ConnectionConfig::default(),
            handler: Arc::new(NoopHandler),
            lifecycle: Arc::new(AlwaysActive),
            logger: Arc::new(NoopLogger),
            decoders: vec![
                Arc::new(JsonRpcRequestDecoder) as Arc<dyn MessageDecoder>,
                Arc::new(JsonRpcResponseDecoder),
            ],
        }
    }

    /// Set the connection configuration
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the callback handler
    pub fn handler(mut self, handler: Arc<dyn ConnectionHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Set the host lifecycle provider
    pub fn lifecycle(mut self, lifecycle: Arc<dyn LifecycleProvider>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Set the diagnostic logger
    pub fn logger(mut self, logger: Arc<dyn DiagnosticLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the decoders used to describe outgoing frames
    pub fn decoders(mut self, decoders: Vec<Arc<dyn MessageDecoder>>) -> Self {
        self.decoders = decoders;
        self
    }

    /// Build the connection and start its dispatcher.
    ///
    /// Must be called from within a Tokio runtime; the dispatcher and the
    /// heartbeat timer run on that runtime.
    pub fn build(self) -> Result<RelayConnection, SessionError> {
        let runtime = Handle::try_current()?;

        let (sink, events) = TransportEventSink::channel();
        self.transport.set_event_sink(sink);

        let heartbeat = Heartbeat::new(
            Arc::clone(&self.transport),
            self.config.heartbeat_interval,
            runtime.clone(),
        );

        let shared = Arc::new(Shared {
            outgoing: OutgoingLog::new(self.endpoint.clone(), self.decoders, Arc::clone(&self.logger)),
            endpoint: self.endpoint,
            transport: self.transport,
            heartbeat,
            handler: self.handler,
            lifecycle: self.lifecycle,
            logger: self.logger,
            connected: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        });

        let subscriptions = subscribe_lifecycle(&shared);

        let span = info_span!("relay.dispatch", endpoint = %shared.endpoint);
        let dispatcher = runtime.spawn(Dispatcher::new(Arc::clone(&shared)).run(events).instrument(span));

        info!("Relay connection to {} ready", shared.endpoint);
        Ok(RelayConnection {
            shared,
            dispatcher: Some(dispatcher),
            subscriptions,
        })
    }
}

/// Reopen on resume, close abnormally on suspend.
///
/// Callbacks hold only a weak reference so they never keep a torn-down
/// connection alive.
fn subscribe_lifecycle(shared: &Arc<Shared>) -> Vec<Subscription> {
    let on_active = {
        let weak = Arc::downgrade(shared);
        Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.logger.log("host became active, reopening");
                shared.open();
            }
        })
    };
    let on_suspend = {
        let weak = Arc::downgrade(shared);
        Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.logger.log("host will suspend, closing");
                shared.close(CloseCode::ABNORMAL);
            }
        })
    };

    vec![
        shared.lifecycle.subscribe(LifecycleSignal::BecameActive, on_active),
        shared.lifecycle.subscribe(LifecycleSignal::WillSuspend, on_suspend),
    ]
}

/// One logical connection to a relay bridge endpoint
pub struct RelayConnection {
    shared: Arc<Shared>,
    dispatcher: Option<JoinHandle<()>>,
    subscriptions: Vec<Subscription>,
}

impl RelayConnection {
    /// Start building a connection
    pub fn builder(endpoint: Endpoint, transport: Arc<dyn SocketTransport>) -> ConnectionBuilder {
        ConnectionBuilder::new(endpoint, transport)
    }

    /// Target endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Ask the transport to connect. Safe in any state.
    pub fn open(&self) {
        self.shared.open();
    }

    /// Stop the heartbeat and ask the transport to close with `code`.
    ///
    /// Does not wait for the socket to close; `on_disconnect` is the
    /// completion signal.
    pub fn close(&self, code: CloseCode) {
        self.shared.close(code);
    }

    /// Send `text` as one text frame if currently open, otherwise do nothing
    pub fn send(&self, text: &str) {
        self.shared.send(text);
    }

    /// Last connection state observed by the dispatcher
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Tear the connection down now instead of on drop
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.shared.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shared.heartbeat.disable();
        self.subscriptions.clear();
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        self.shared.transport.disconnect(CloseCode::NORMAL);
        info!("Relay connection to {} torn down", self.shared.endpoint);
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for RelayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConnection")
            .field("endpoint", &self.shared.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}
