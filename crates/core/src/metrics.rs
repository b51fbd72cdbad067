//! Process-wide relay counters.
//!
//! [`Metrics`] is shared as `Arc<Metrics>` between the Socket Mode
//! receiver, the ingestion adapter and every delivery session. All
//! counters are lock-free atomics; [`Metrics::snapshot`] produces the
//! serialisable view served by `GET /metrics`.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;

/// Upstream Socket Mode connection lifecycle counters.
#[derive(Debug, Default)]
pub struct SlackCounters {
    pub hello: AtomicI64,
    pub connecting: AtomicI64,
    pub connected: AtomicI64,
    pub disconnect: AtomicI64,
}

/// Downstream WebSocket connection counters.
#[derive(Debug, Default)]
pub struct WebSocketCounters {
    pub total_connections: AtomicI64,
    /// Gauge: incremented on accept, decremented after teardown.
    pub current_connections: AtomicI64,
}

/// Event flow counters.
#[derive(Debug, Default)]
pub struct MessageCounters {
    pub received: AtomicI64,
    pub delivered: AtomicI64,
    pub unsupported: AtomicI64,
    pub write_errored: AtomicI64,
    /// Events not handed to a subscriber because its channel was full.
    pub dropped: AtomicI64,
}

#[derive(Debug, Default)]
pub struct Metrics {
    pub slack: SlackCounters,
    pub websocket: WebSocketCounters,
    pub messages: MessageCounters,
}

/// Add `n` to a counter.
pub fn add(counter: &AtomicI64, n: i64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

/// Increment a counter by one.
pub fn incr(counter: &AtomicI64) {
    add(counter, 1);
}

fn load(counter: &AtomicI64) -> i64 {
    counter.load(Ordering::Relaxed)
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of every counter.
    ///
    /// Counters are read one by one, so the snapshot is not atomic across
    /// fields.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            slack: SlackSnapshot {
                hello: load(&self.slack.hello),
                connecting: load(&self.slack.connecting),
                connected: load(&self.slack.connected),
                disconnect: load(&self.slack.disconnect),
            },
            websocket: WebSocketSnapshot {
                total_connections: load(&self.websocket.total_connections),
                current_connections: load(&self.websocket.current_connections),
            },
            messages: MessageSnapshot {
                received_from_slack: load(&self.messages.received),
                delivered_to_websocket: load(&self.messages.delivered),
                unsupported_from_slack: load(&self.messages.unsupported),
                write_errored_to_websocket: load(&self.messages.write_errored),
                dropped_slow_consumer: load(&self.messages.dropped),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub slack: SlackSnapshot,
    pub websocket: WebSocketSnapshot,
    pub messages: MessageSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackSnapshot {
    pub hello: i64,
    pub connecting: i64,
    pub connected: i64,
    pub disconnect: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebSocketSnapshot {
    pub total_connections: i64,
    pub current_connections: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSnapshot {
    pub received_from_slack: i64,
    pub delivered_to_websocket: i64,
    pub unsupported_from_slack: i64,
    pub write_errored_to_websocket: i64,
    pub dropped_slow_consumer: i64,
}
