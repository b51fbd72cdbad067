//! End-to-end receiver tests against a local mock of Slack's Web API and
//! Socket Mode endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::{any, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sock2rtm_core::event::Event;
use sock2rtm_core::metrics::Metrics;
use sock2rtm_events::{ChannelFilter, Registry};
use sock2rtm_slack::{Ingestor, ReconnectConfig, SlackApi, SlackConfig, SocketModeClient, SocketModeReceiver};
use tokio::sync::mpsc;

struct MockSlack {
    ws_url: String,
    /// When false, `apps.connections.open` answers `ok: false`.
    accept: bool,
    connections: AtomicUsize,
    acks: mpsc::UnboundedSender<String>,
}

async fn connections_open(State(mock): State<Arc<MockSlack>>) -> Json<Value> {
    if mock.accept {
        Json(json!({"ok": true, "url": mock.ws_url}))
    } else {
        Json(json!({"ok": false, "error": "ratelimited"}))
    }
}

async fn link(State(mock): State<Arc<MockSlack>>, ws: WebSocketUpgrade) -> Response {
    let n = mock.connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| run_link(socket, mock, n))
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

/// First connection: hello, two events, then a refresh request.
/// Later connections: hello, then idle until closed.
async fn run_link(mut socket: WebSocket, mock: Arc<MockSlack>, n: usize) {
    let _ = socket.send(text(json!({"type": "hello", "num_connections": 1}))).await;

    if n == 0 {
        let message = json!({
            "envelope_id": "e1",
            "type": "events_api",
            "payload": {
                "type": "event_callback",
                "event": {"type": "message", "channel": "C1", "user": "U1", "text": "hello from slack", "ts": "1.1"},
            },
        });
        let mention = json!({
            "envelope_id": "e2",
            "type": "events_api",
            "payload": {"type": "event_callback", "event": {"type": "app_mention", "channel": "C1"}},
        });

        for envelope in [message, mention] {
            let _ = socket.send(text(envelope)).await;
            if let Some(Ok(Message::Text(ack))) = socket.recv().await {
                let ack: Value = serde_json::from_str(ack.as_str()).unwrap();
                let _ = mock.acks.send(ack["envelope_id"].as_str().unwrap().to_string());
            }
        }

        let _ = socket
            .send(text(json!({"type": "disconnect", "reason": "refresh_requested"})))
            .await;
    }

    while let Some(Ok(frame)) = socket.recv().await {
        if let Message::Close(_) = frame {
            break;
        }
    }
}

async fn spawn_mock(accept: bool) -> (Arc<MockSlack>, mpsc::UnboundedReceiver<String>, SlackConfig) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (acks, ack_rx) = mpsc::unbounded_channel();

    let mock = Arc::new(MockSlack {
        ws_url: format!("ws://{addr}/link/?ticket=t"),
        accept,
        connections: AtomicUsize::new(0),
        acks,
    });
    let router = Router::new()
        .route("/api/apps.connections.open", post(connections_open))
        .route("/link/", any(link))
        .with_state(Arc::clone(&mock));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let config = SlackConfig {
        bot_token: "xoxb-test".into(),
        app_token: "xapp-test".into(),
        api_url: format!("http://{addr}/api"),
        request_timeout: Duration::from_secs(5),
    };
    (mock, ack_rx, config)
}

fn fast_backoff() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        ..Default::default()
    }
}

/// Poll `check` until it holds or five seconds pass.
async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("Timed out waiting for: {what}");
}

// ---------------------------------------------------------------------------
// Test: events are acked, published, and a refresh request reconnects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receiver_acks_publishes_and_reconnects_on_disconnect() {
    let (mock, mut acks, config) = spawn_mock(true).await;
    let registry = Arc::new(Registry::default());
    let metrics = Arc::new(Metrics::new());
    let mut sub = registry.register(ChannelFilter::new(["C1"]), None).await;

    let receiver = SocketModeReceiver::start(
        SocketModeClient::new(SlackApi::new(config)),
        Ingestor::new(Arc::clone(&registry), Arc::clone(&metrics)),
        fast_backoff(),
    );

    let event = tokio::time::timeout(Duration::from_secs(5), sub.events.recv())
        .await
        .expect("event should arrive")
        .expect("channel open");
    match event.as_ref() {
        Event::Message(m) => assert_eq!(m.text, "hello from slack"),
        other => panic!("Expected Message, got {other:?}"),
    }

    assert_eq!(acks.recv().await.as_deref(), Some("e1"));
    assert_eq!(acks.recv().await.as_deref(), Some("e2"));

    eventually("second connection", || mock.connections.load(Ordering::SeqCst) == 2).await;
    eventually("two hellos", || metrics.snapshot().slack.hello == 2).await;

    receiver.shutdown(Duration::from_secs(5)).await;

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.slack.connecting, 2);
    assert_eq!(snapshot.slack.connected, 2);
    assert_eq!(snapshot.slack.disconnect, 1);
    assert_eq!(snapshot.messages.received_from_slack, 1);
    assert_eq!(snapshot.messages.unsupported_from_slack, 1);
}

// ---------------------------------------------------------------------------
// Test: failed opens back off and retry until shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receiver_retries_failed_opens_until_shutdown() {
    let (mock, _acks, config) = spawn_mock(false).await;
    let metrics = Arc::new(Metrics::new());

    let receiver = SocketModeReceiver::start(
        SocketModeClient::new(SlackApi::new(config)),
        Ingestor::new(Arc::new(Registry::default()), Arc::clone(&metrics)),
        fast_backoff(),
    );

    eventually("several attempts", || metrics.snapshot().slack.connecting >= 3).await;

    tokio::time::timeout(Duration::from_secs(2), receiver.shutdown(Duration::from_secs(1)))
        .await
        .expect("shutdown should be prompt");

    assert_eq!(metrics.snapshot().slack.connected, 0);
    assert_eq!(mock.connections.load(Ordering::SeqCst), 0);
}
