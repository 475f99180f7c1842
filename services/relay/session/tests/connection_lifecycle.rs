//! Connection facade, dispatcher and lifecycle behavior against a mock transport.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use relay_session::{
    ConnectionConfig, HostLifecycle, LifecycleProvider, RelayConnection, TransportError,
    TransportEvent,
};
use relay_wire::CloseCode;

struct Fixture {
    transport: Arc<MockTransport>,
    handler: Arc<RecordingHandler>,
    logger: Arc<RecordingLogger>,
    connection: RelayConnection,
}

fn fixture(lifecycle: Option<HostLifecycle>) -> Fixture {
    let transport = MockTransport::new();
    let handler = RecordingHandler::new();
    let logger = RecordingLogger::new();

    let mut builder = RelayConnection::builder(endpoint(), transport.clone())
        .handler(handler.clone())
        .logger(logger.clone());
    if let Some(lifecycle) = lifecycle {
        builder = builder.lifecycle(Arc::new(lifecycle));
    }

    Fixture {
        transport,
        handler,
        logger,
        connection: builder.build().unwrap(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_and_close_reach_transport() {
    let f = fixture(None);

    f.connection.open();
    f.connection.open();
    f.connection.close(CloseCode::NORMAL);

    assert_eq!(
        f.transport.calls(),
        vec![Call::Connect, Call::Connect, Call::Disconnect(CloseCode::NORMAL)]
    );
    assert_eq!(f.connection.endpoint(), &endpoint());
}

#[tokio::test(start_paused = true)]
async fn test_send_while_closed_never_writes() {
    let f = fixture(None);

    f.connection.send("hello");
    settle().await;

    assert!(f.transport.texts().is_empty());
    assert!(f.logger.outgoing().is_empty());
    assert!(!f.connection.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_connected_event_opens_and_notifies_once() {
    let f = fixture(None);

    f.connection.open();
    f.transport.emit(TransportEvent::Connected);
    settle().await;

    assert!(f.connection.is_open());
    assert_eq!(f.handler.callbacks(), vec![Callback::Connect]);

    f.connection.send("hello");
    assert_eq!(f.transport.texts(), vec!["hello".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_events_while_active_notify() {
    let f = fixture(None);
    let reset = TransportError::Socket("connection reset".into());

    f.transport.emit(TransportEvent::Connected);
    f.transport.emit(TransportEvent::Error(reset.clone()));
    f.transport.emit(TransportEvent::Connected);
    f.transport.emit(disconnected());
    f.transport.emit(TransportEvent::Connected);
    f.transport.emit(TransportEvent::Cancelled);
    settle().await;

    assert_eq!(
        f.handler.callbacks(),
        vec![
            Callback::Connect,
            Callback::Disconnect(Some(reset)),
            Callback::Connect,
            Callback::Disconnect(None),
            Callback::Connect,
            Callback::Disconnect(None),
        ]
    );
    assert!(!f.connection.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_open_reports_error() {
    let f = fixture(None);
    let refused = TransportError::Connect("connection refused".into());

    f.connection.open();
    f.transport.emit(TransportEvent::Error(refused.clone()));
    settle().await;

    assert_eq!(f.handler.callbacks(), vec![Callback::Disconnect(Some(refused))]);
}

#[tokio::test(start_paused = true)]
async fn test_callbacks_alternate_on_duplicate_events() {
    let f = fixture(None);

    f.transport.emit(TransportEvent::Connected);
    f.transport.emit(TransportEvent::Connected);
    f.transport.emit(TransportEvent::Error(TransportError::Socket("eof".into())));
    f.transport.emit(disconnected());
    settle().await;

    assert_eq!(f.handler.connects(), 1);
    assert_eq!(f.handler.disconnects(), 1);
    assert_eq!(f.logger.containing("already reported"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_text_ping_pong_and_ignored_events() {
    let f = fixture(None);

    f.transport.emit(TransportEvent::Connected);
    f.transport.emit(TransportEvent::Text("first".into()));
    f.transport.emit(TransportEvent::Ping(Default::default()));
    f.transport.emit(TransportEvent::Pong(Default::default()));
    f.transport.emit(TransportEvent::ReconnectSuggested(true));
    f.transport.emit(TransportEvent::Binary(bytes::Bytes::from_static(b"\x01\x02")));
    f.transport.emit(TransportEvent::ViabilityChanged(false));
    f.transport.emit(TransportEvent::Text("second".into()));
    settle().await;

    assert_eq!(f.handler.texts(), vec!["first".to_string(), "second".to_string()]);
    assert_eq!(f.logger.containing("<== ping"), 1);
    assert_eq!(f.logger.containing("<== pong"), 1);
    assert_eq!(f.logger.containing("reconnect suggested: true"), 1);
    assert!(f.connection.is_open());
    // Pings are answered by the transport itself
    assert!(f.transport.texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_pings_only_while_connected() {
    let f = fixture(None);

    f.transport.emit(TransportEvent::Connected);
    settle().await;

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(f.transport.pings(), 1);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(f.transport.pings(), 2);

    f.transport.emit(disconnected());
    settle().await;
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(f.transport.pings(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_heartbeat_immediately() {
    let f = fixture(None);

    f.transport.emit(TransportEvent::Connected);
    settle().await;
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(f.transport.pings(), 1);

    f.connection.close(CloseCode::NORMAL);
    // No disconnect event arrives, state stays stale but no more pings
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(f.transport.pings(), 1);
    assert!(f.connection.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_custom_heartbeat_interval() {
    let transport = MockTransport::new();
    let connection = RelayConnection::builder(endpoint(), transport.clone())
        .config(ConnectionConfig {
            heartbeat_interval: Duration::from_secs(5),
        })
        .build()
        .unwrap();

    transport.emit(TransportEvent::Connected);
    settle().await;
    tokio::time::sleep(Duration::from_secs(21)).await;

    assert_eq!(transport.pings(), 4);
    drop(connection);
}

#[tokio::test(start_paused = true)]
async fn test_send_logs_exactly_one_line() {
    let f = fixture(None);
    f.transport.emit(TransportEvent::Connected);
    settle().await;

    let request = r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":[]}"#;
    f.connection.send(request);
    f.connection.send("not json");

    assert_eq!(
        f.logger.outgoing(),
        vec![
            "==> request ping (id 1) params=[]".to_string(),
            "==> not json".to_string(),
        ]
    );
    assert_eq!(f.transport.texts(), vec![request.to_string(), "not json".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_events_delivered_in_production_order() {
    let f = fixture(None);
    f.transport.emit(TransportEvent::Connected);

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let transport = f.transport.clone();
            thread::spawn(move || {
                for seq in 0..50 {
                    transport.emit(TransportEvent::Text(format!("{}:{}", producer, seq)));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    settle().await;

    let texts = f.handler.texts();
    assert_eq!(texts.len(), 200);
    for producer in 0..4 {
        let seqs: Vec<u32> = texts
            .iter()
            .filter_map(|t| t.split_once(':'))
            .filter(|(p, _)| *p == producer.to_string())
            .map(|(_, s)| s.parse().unwrap())
            .collect();
        assert_eq!(seqs, (0..50u32).collect::<Vec<_>>());
    }
}

#[tokio::test(start_paused = true)]
async fn test_suspend_and_resume_signals() {
    let host = HostLifecycle::new(true);
    let f = fixture(Some(host.clone()));

    // Regardless of state: nothing connected yet
    host.will_suspend();
    host.became_active();
    host.will_suspend();

    assert_eq!(
        f.transport.calls(),
        vec![
            Call::Disconnect(CloseCode::ABNORMAL),
            Call::Connect,
            Call::Disconnect(CloseCode::ABNORMAL),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_terminal_events_while_suspended_are_suppressed() {
    let host = HostLifecycle::new(true);
    let f = fixture(Some(host.clone()));

    f.connection.open();
    f.transport.emit(TransportEvent::Connected);
    settle().await;
    assert_eq!(f.handler.connects(), 1);

    host.will_suspend();
    assert_eq!(f.transport.count(&Call::Disconnect(CloseCode::ABNORMAL)), 1);

    f.transport.emit(TransportEvent::Error(TransportError::Socket("reset".into())));
    f.transport.emit(disconnected());
    f.transport.emit(TransportEvent::Cancelled);
    settle().await;

    assert_eq!(f.handler.disconnects(), 0);
    assert_eq!(f.logger.containing("while suspended"), 3);
    // Logical state is left stale until the host resumes
    assert!(f.connection.is_open());

    // Suspension already stopped the heartbeat
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(f.transport.pings(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_suspend_resume_scenario() {
    let host = HostLifecycle::new(true);
    let f = fixture(Some(host.clone()));

    f.connection.open();
    f.transport.emit(TransportEvent::Connected);
    settle().await;

    host.will_suspend();
    f.transport
        .emit(TransportEvent::Error(TransportError::Socket("software caused connection abort".into())));
    settle().await;
    assert_eq!(f.handler.disconnects(), 0);

    let connects_before = f.transport.count(&Call::Connect);
    host.became_active();
    assert_eq!(f.transport.count(&Call::Connect), connects_before + 1);
    assert!(host.is_active());

    // The transport reports the reopened socket
    f.transport.emit(TransportEvent::Connected);
    settle().await;
    assert!(f.connection.is_open());
    assert_eq!(f.handler.connects(), 2);
    assert_eq!(f.handler.disconnects(), 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(f.transport.pings(), 1);

    // Back in the foreground, a real disconnect is reported
    f.transport.emit(disconnected());
    settle().await;
    assert!(!f.connection.is_open());
    assert_eq!(
        f.handler.callbacks(),
        vec![Callback::Connect, Callback::Connect, Callback::Disconnect(None)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_resume_reports_connect() {
    let host = HostLifecycle::new(true);
    let f = fixture(Some(host.clone()));

    f.connection.open();
    f.transport.emit(TransportEvent::Connected);
    settle().await;

    host.will_suspend();
    f.transport.emit(TransportEvent::Error(TransportError::Socket("reset".into())));
    f.transport.emit(disconnected());
    settle().await;

    host.became_active();
    f.transport.emit(TransportEvent::Connected);
    settle().await;

    assert_eq!(f.handler.connects(), 2);
    assert_eq!(f.handler.callbacks(), vec![Callback::Connect, Callback::Connect]);
    assert_eq!(f.logger.containing("already reported"), 0);

    // A second Connected on the same socket is still only logged
    f.transport.emit(TransportEvent::Connected);
    settle().await;
    assert_eq!(f.handler.connects(), 2);
    assert_eq!(f.logger.containing("already reported"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connected_queued_before_close_keeps_heartbeat_stopped() {
    let f = fixture(None);

    f.connection.open();
    // Queued, but processed only after close() has returned
    f.transport.emit(TransportEvent::Connected);
    f.connection.close(CloseCode::NORMAL);
    settle().await;
    assert_eq!(f.handler.connects(), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(f.transport.pings(), 0);

    // The next open re-arms it
    f.connection.open();
    f.transport.emit(disconnected());
    f.transport.emit(TransportEvent::Connected);
    settle().await;
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(f.transport.pings(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_callbacks_after_teardown() {
    let host = HostLifecycle::new(true);
    let f = fixture(Some(host.clone()));
    assert_eq!(host.subscriber_count(), 2);

    f.transport.emit(TransportEvent::Connected);
    settle().await;

    let Fixture {
        transport,
        handler,
        connection,
        ..
    } = f;
    connection.shutdown();
    assert_eq!(host.subscriber_count(), 0);
    assert_eq!(transport.calls().last(), Some(&Call::Disconnect(CloseCode::NORMAL)));

    transport.emit(TransportEvent::Text("late".into()));
    transport.emit(disconnected());
    host.became_active();
    settle().await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(handler.callbacks(), vec![Callback::Connect]);
    assert_eq!(transport.count(&Call::Connect), 0);
    assert_eq!(transport.pings(), 0);
}

#[test]
fn test_build_outside_runtime_fails() {
    let result = RelayConnection::builder(endpoint(), MockTransport::new()).build();
    assert!(result.is_err());
}
