//! Relay bridge client binary.
//!
//! Keeps one connection to a bridge topic open, prints inbound frames to
//! stdout and publishes stdin lines to the topic.

use clap::Parser;
use relay_session::{
    AlwaysActive, ConnectionConfig, ConnectionHandler, HostLifecycle, LifecycleProvider,
    RelayConnection, TracingLogger, TransportError, WebSocketTransport,
};
use relay_wire::{CloseCode, Endpoint, RelayMessage, RelayMessageKind};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::{LifecycleMode, RelayConfig};
use logging::RelayLogFormatter;

/// How long to wait for the close handshake before exiting
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Relay bridge client for a single topic
#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Relay bridge client for a single topic")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "relay.yaml")]
    config: PathBuf,

    /// Bridge URL, e.g. wss://bridge.example.org
    #[arg(long)]
    bridge: Option<String>,

    /// Topic to join
    #[arg(long)]
    topic: Option<String>,

    /// Heartbeat interval, e.g. 30s
    #[arg(long)]
    heartbeat_interval: Option<humantime::Duration>,

    /// Lifecycle signal source
    #[arg(long, value_enum)]
    lifecycle: Option<LifecycleMode>,

    /// Send stdin lines verbatim instead of wrapping them in publish envelopes
    #[arg(long)]
    raw: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Connection events forwarded from the dispatcher to the main loop
#[derive(Debug)]
enum ConsoleEvent {
    Connected,
    Disconnected,
}

/// Prints inbound frames and reports state changes to the main loop
struct ConsoleHandler {
    events: mpsc::UnboundedSender<ConsoleEvent>,
}

impl ConnectionHandler for ConsoleHandler {
    fn on_connect(&self) {
        info!("Connected to bridge");
        let _ = self.events.send(ConsoleEvent::Connected);
    }

    fn on_disconnect(&self, error: Option<&TransportError>) {
        match error {
            Some(e) => warn!("Disconnected from bridge: {}", e),
            None => info!("Disconnected from bridge"),
        }
        let _ = self.events.send(ConsoleEvent::Disconnected);
    }

    fn on_text_receive(&self, text: &str) {
        match serde_json::from_str::<RelayMessage>(text) {
            Ok(message) if message.kind == RelayMessageKind::Pub => {
                println!("[{}] {}", message.topic, message.payload);
            }
            _ => println!("{}", text),
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("relay={}", args.log_level).parse()?)
        .add_directive(format!("relay_session={}", args.log_level).parse()?)
        .add_directive(format!("relay_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(RelayLogFormatter::new("relay"))
        .init();

    info!("Starting reDB Relay v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RelayConfig::load_from_file(&args.config)?;
    if let Some(bridge) = args.bridge {
        config.bridge_url = bridge;
    }
    if let Some(topic) = args.topic {
        config.topic = topic;
    }
    if let Some(interval) = args.heartbeat_interval {
        config.heartbeat_interval = interval.to_string();
    }
    if let Some(lifecycle) = args.lifecycle {
        config.lifecycle = lifecycle;
    }

    let endpoint = Endpoint::new(config.bridge_url.as_str(), config.topic.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid endpoint: {}", e))?;
    let transport = Arc::new(
        WebSocketTransport::for_endpoint(&endpoint)
            .map_err(|e| anyhow::anyhow!("Failed to create transport: {}", e))?,
    );
    let bridge_url = transport.url().clone();

    let (host, lifecycle): (Option<HostLifecycle>, Arc<dyn LifecycleProvider>) = match config.lifecycle {
        LifecycleMode::AlwaysActive => (None, Arc::new(AlwaysActive)),
        LifecycleMode::Signals => {
            let host = HostLifecycle::new(true);
            (Some(host.clone()), Arc::new(host))
        }
    };

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let connection = RelayConnection::builder(endpoint.clone(), transport)
        .config(ConnectionConfig {
            heartbeat_interval: config.heartbeat()?,
        })
        .handler(Arc::new(ConsoleHandler { events: events_tx }))
        .lifecycle(lifecycle)
        .logger(Arc::new(TracingLogger::for_endpoint(&endpoint)))
        .build()?;

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to install SIGINT handler: {}", e))?;
    let (mut suspend, mut resume) = match host {
        Some(_) => (
            Some(signal(SignalKind::user_defined1())?),
            Some(signal(SignalKind::user_defined2())?),
        ),
        None => (None, None),
    };

    info!("Connecting to {} (topic {})", bridge_url, endpoint.topic());
    connection.open();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut close_code = CloseCode::NORMAL;
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                handle_console_event(&connection, &endpoint, &event, config.subscribe_on_connect)?;
            }
            line = stdin.next_line() => {
                match line? {
                    Some(line) => forward_line(&connection, &endpoint, &line, args.raw)?,
                    None => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                }
            }
            Some(()) = next_signal(&mut suspend) => {
                info!("Received SIGUSR1, suspending");
                if let Some(host) = &host {
                    host.will_suspend();
                }
            }
            Some(()) = next_signal(&mut resume) => {
                info!("Received SIGUSR2, resuming");
                if let Some(host) = &host {
                    host.became_active();
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal, shutting down");
                close_code = CloseCode::GOING_AWAY;
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal, shutting down");
                break;
            }
        }
    }

    if connection.is_open() {
        connection.close(close_code);
        let closed = tokio::time::timeout(CLOSE_GRACE, async {
            while let Some(event) = events.recv().await {
                if matches!(event, ConsoleEvent::Disconnected) {
                    break;
                }
            }
        })
        .await;
        if closed.is_err() {
            warn!("Bridge did not confirm close within {:?}", CLOSE_GRACE);
        }
    }
    connection.shutdown();

    info!("Relay stopped");
    Ok(())
}

/// React to a connection event; every connect (including reopens after a
/// resume) gets a fresh topic subscription
fn handle_console_event(
    connection: &RelayConnection,
    endpoint: &Endpoint,
    event: &ConsoleEvent,
    subscribe: bool,
) -> anyhow::Result<()> {
    if matches!(event, ConsoleEvent::Connected) && subscribe {
        debug!("Subscribing to topic {}", endpoint.topic());
        connection.send(&RelayMessage::subscribe(endpoint.topic()).to_json()?);
    }
    Ok(())
}

/// Send one stdin line, wrapped in a publish envelope unless `raw`
fn forward_line(connection: &RelayConnection, endpoint: &Endpoint, line: &str, raw: bool) -> anyhow::Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    if !connection.is_open() {
        warn!("Not connected, dropping input line");
        return Ok(());
    }

    if raw {
        connection.send(line);
    } else {
        connection.send(&RelayMessage::publish(endpoint.topic(), line, false).to_json()?);
    }
    Ok(())
}

/// Next delivery of an optional signal; pends forever when not installed
async fn next_signal(signal: &mut Option<Signal>) -> Option<()> {
    match signal {
        Some(signal) => signal.recv().await,
        None => std::future::pending().await,
    }
}
