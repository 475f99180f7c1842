//! WebSocket transport for relay bridges.
//!
//! Each `connect` spawns one socket task that owns the `tokio-tungstenite`
//! stream. Outgoing frames and close requests reach the task over a channel,
//! so the [`SocketTransport`] methods never block. Inbound frames are reported
//! through the installed [`TransportEventSink`].

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relay_wire::{CloseCode, Endpoint};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::TransportError;
use crate::lock;
use crate::transport::{SocketTransport, TransportEvent, TransportEventSink};

/// Close code reported when the stream ends without a close frame
const CLOSED_WITHOUT_FRAME: CloseCode = CloseCode(1006);

#[derive(Debug)]
enum Outbound {
    Text(String),
    Ping(Bytes),
    Close(CloseCode),
}

#[derive(Debug)]
struct ActiveSocket {
    id: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// [`SocketTransport`] over a client WebSocket (`ws://` or `wss://`)
pub struct WebSocketTransport {
    url: Url,
    runtime: Handle,
    sink: Mutex<Option<TransportEventSink>>,
    active: Arc<Mutex<Option<ActiveSocket>>>,
    next_id: AtomicU64,
}

impl WebSocketTransport {
    /// Create a transport for `url`.
    ///
    /// Must be called from within a Tokio runtime; socket tasks run on it.
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|e| TransportError::Address(format!("{}: {}", url, e)))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(TransportError::Address(format!(
                    "unsupported scheme {} in {}",
                    other, url
                )))
            }
        }
        let runtime = Handle::try_current().map_err(|e| TransportError::Runtime(e.to_string()))?;

        Ok(Self {
            url,
            runtime,
            sink: Mutex::new(None),
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a transport for the endpoint's bridge address
    pub fn for_endpoint(endpoint: &Endpoint) -> Result<Self, TransportError> {
        Self::new(endpoint.bridge())
    }

    /// Target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether a socket task is currently connecting or connected
    pub fn is_active(&self) -> bool {
        lock(&self.active)
            .as_ref()
            .map(|socket| !socket.outbound.is_closed())
            .unwrap_or(false)
    }

    fn queue(&self, frame: Outbound) {
        match lock(&self.active).as_ref() {
            Some(socket) => {
                if socket.outbound.send(frame).is_err() {
                    debug!("Socket {} already finished, dropping frame", socket.id);
                }
            }
            None => debug!("No socket to {}, dropping {:?}", self.url, frame),
        }
    }
}

impl SocketTransport for WebSocketTransport {
    fn set_event_sink(&self, sink: TransportEventSink) {
        *lock(&self.sink) = Some(sink);
    }

    fn connect(&self) {
        let Some(sink) = lock(&self.sink).clone() else {
            warn!("Connect to {} requested before an event sink was installed", self.url);
            return;
        };

        let mut active = lock(&self.active);
        if let Some(socket) = active.as_ref() {
            if !socket.outbound.is_closed() {
                debug!("Socket {} to {} already active, ignoring connect", socket.id, self.url);
                return;
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *active = Some(ActiveSocket {
            id,
            outbound: outbound_tx,
        });

        info!("Connecting socket {} to {}", id, self.url);
        self.runtime.spawn(run_socket(
            self.url.clone(),
            id,
            outbound_rx,
            sink,
            Arc::clone(&self.active),
        ));
    }

    fn disconnect(&self, code: CloseCode) {
        self.queue(Outbound::Close(code));
    }

    fn write_text(&self, text: String) {
        self.queue(Outbound::Text(text));
    }

    fn write_ping(&self, payload: Bytes) {
        self.queue(Outbound::Ping(payload));
    }
}

/// Clear the active slot if it still belongs to socket `id`
fn release(active: &Mutex<Option<ActiveSocket>>, id: u64) {
    let mut active = lock(active);
    if active.as_ref().map(|socket| socket.id) == Some(id) {
        *active = None;
    }
}

async fn run_socket(
    url: Url,
    id: u64,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    sink: TransportEventSink,
    active: Arc<Mutex<Option<ActiveSocket>>>,
) {
    let connecting = connect_async(url.as_str());
    tokio::pin!(connecting);

    let mut ws = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok((ws, _response)) => break ws,
                Err(e) => {
                    warn!("Socket {} failed to connect to {}: {}", id, url, e);
                    release(&active, id);
                    sink.emit(TransportEvent::Error(TransportError::Connect(e.to_string())));
                    return;
                }
            },
            frame = outbound.recv() => match frame {
                Some(Outbound::Close(code)) => {
                    debug!("Socket {} cancelled with {} before handshake", id, code);
                    release(&active, id);
                    sink.emit(TransportEvent::Cancelled);
                    return;
                }
                Some(other) => debug!("Socket {} not connected yet, dropping {:?}", id, other),
                None => {
                    release(&active, id);
                    sink.emit(TransportEvent::Cancelled);
                    return;
                }
            },
        }
    };

    info!("Socket {} connected to {}", id, url);
    sink.emit(TransportEvent::Connected);

    let mut closing = false;
    let mut peer_close: Option<(CloseCode, String)> = None;

    let terminal = loop {
        tokio::select! {
            frame = outbound.recv(), if !closing => {
                let result = match frame {
                    Some(Outbound::Text(text)) => ws.send(Message::Text(text)).await,
                    Some(Outbound::Ping(payload)) => ws.send(Message::Ping(payload.to_vec())).await,
                    Some(Outbound::Close(code)) => {
                        closing = true;
                        debug!("Socket {} closing with {}", id, code);
                        ws.close(Some(CloseFrame {
                            code: WsCloseCode::from(code.as_u16()),
                            reason: Cow::Borrowed(""),
                        }))
                        .await
                    }
                    None => {
                        closing = true;
                        ws.close(None).await
                    }
                };
                if let Err(e) = result {
                    if is_closed_error(&e) {
                        break closed_event(peer_close.take());
                    }
                    warn!("Socket {} write failed: {}", id, e);
                    break TransportEvent::Error(TransportError::Socket(e.to_string()));
                }
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    sink.emit(TransportEvent::Text(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    sink.emit(TransportEvent::Binary(Bytes::from(data)));
                }
                Some(Ok(Message::Ping(payload))) => {
                    sink.emit(TransportEvent::Ping(Bytes::from(payload)));
                }
                Some(Ok(Message::Pong(payload))) => {
                    sink.emit(TransportEvent::Pong(Bytes::from(payload)));
                }
                Some(Ok(Message::Close(frame))) => {
                    // The reply is flushed by the next poll; wait for the stream to end
                    peer_close = Some(
                        frame
                            .map(|f| (CloseCode(u16::from(f.code)), f.reason.into_owned()))
                            .unwrap_or((CloseCode::NORMAL, String::new())),
                    );
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) if is_closed_error(&e) => break closed_event(peer_close.take()),
                Some(Err(WsError::Protocol(e))) => {
                    warn!("Socket {} protocol error: {}", id, e);
                    break TransportEvent::Error(TransportError::Protocol(e.to_string()));
                }
                Some(Err(e)) => {
                    warn!("Socket {} read failed: {}", id, e);
                    break TransportEvent::Error(TransportError::Socket(e.to_string()));
                }
                None => break closed_event(peer_close.take()),
            },
        }
    };

    // Release before reporting so a reconnect from the handler is not ignored
    release(&active, id);
    match &terminal {
        TransportEvent::Disconnected { code, .. } if !code.is_normal() => {
            warn!("Socket {} to {} closed abnormally: {:?}", id, url, terminal)
        }
        _ => info!("Socket {} to {} finished: {:?}", id, url, terminal),
    }
    sink.emit(terminal);
}

fn is_closed_error(error: &WsError) -> bool {
    matches!(error, WsError::ConnectionClosed | WsError::AlreadyClosed)
}

fn closed_event(peer_close: Option<(CloseCode, String)>) -> TransportEvent {
    let (code, reason) = peer_close.unwrap_or((CLOSED_WITHOUT_FRAME, String::new()));
    TransportEvent::Disconnected { code, reason }
}
