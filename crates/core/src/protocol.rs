//! Well-known message type constants for the downstream WebSocket protocol.
//!
//! Downstream clients exchange small JSON objects of the shape
//! `{"type": "<kind>"}` with the server, alongside the relayed Slack
//! events.

/// First message written to every new downstream connection.
pub const MSG_TYPE_HELLO: &str = "hello";

/// Liveness probe sent by downstream clients.
pub const MSG_TYPE_PING: &str = "ping";

/// Reply to [`MSG_TYPE_PING`].
pub const MSG_TYPE_PONG: &str = "pong";

/// Slack inner event type for channel messages; the only kind relayed.
pub const EVENT_TYPE_MESSAGE: &str = "message";

/// Build the JSON text of a bare `{"type": kind}` control message.
pub fn control_message(kind: &str) -> String {
    serde_json::json!({ "type": kind }).to_string()
}
