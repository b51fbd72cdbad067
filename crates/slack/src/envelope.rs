//! Socket Mode envelope types and parser.
//!
//! Every Socket Mode frame is a JSON object with a `"type"` tag. Frames
//! that need a receipt carry an `"envelope_id"`; Events API frames wrap
//! the usual Events API body under `"payload"`.

use serde::Deserialize;
use serde_json::Value;
use sock2rtm_core::event::Event;

/// Envelope type for Events API deliveries.
pub const ENVELOPE_EVENTS_API: &str = "events_api";

/// Envelope type Slack sends once a connection is ready.
pub const ENVELOPE_HELLO: &str = "hello";

/// Envelope type Slack sends before closing a connection.
pub const ENVELOPE_DISCONNECT: &str = "disconnect";

/// Events API payload type that carries an inner event.
pub const PAYLOAD_EVENT_CALLBACK: &str = "event_callback";

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    num_connections: Option<u32>,
    #[serde(default)]
    retry_attempt: Option<u32>,
}

/// A classified Socket Mode frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Connection is ready to receive events.
    Hello { num_connections: Option<u32> },

    /// Slack is about to close this connection (`warning`,
    /// `refresh_requested`, `link_disabled`, ...).
    Disconnect { reason: Option<String> },

    /// An Events API delivery.
    EventsApi {
        envelope_id: Option<String>,
        /// Non-zero when Slack is redelivering an unacknowledged event.
        retry_attempt: u32,
        payload: EventsApiPayload,
    },

    /// Any other frame type (slash commands, interactivity, ...).
    Other {
        kind: String,
        envelope_id: Option<String>,
    },
}

/// The body of an Events API envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum EventsApiPayload {
    /// `event_callback`: carries one inner event.
    Callback(Event),
    /// Any other payload type (`url_verification`, `app_rate_limited`).
    Other { kind: String },
}

impl Envelope {
    /// Id to acknowledge, if this frame expects a receipt.
    pub fn envelope_id(&self) -> Option<&str> {
        match self {
            Envelope::EventsApi { envelope_id, .. } | Envelope::Other { envelope_id, .. } => {
                envelope_id.as_deref()
            }
            Envelope::Hello { .. } | Envelope::Disconnect { .. } => None,
        }
    }

    /// The frame's `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            Envelope::Hello { .. } => ENVELOPE_HELLO,
            Envelope::Disconnect { .. } => ENVELOPE_DISCONNECT,
            Envelope::EventsApi { .. } => ENVELOPE_EVENTS_API,
            Envelope::Other { kind, .. } => kind,
        }
    }
}

/// Parse a Socket Mode text frame.
///
/// Returns `Err` only for malformed JSON or a missing `type` tag; unknown
/// frame types become [`Envelope::Other`].
pub fn parse_envelope(text: &str) -> Result<Envelope, serde_json::Error> {
    let raw: RawEnvelope = serde_json::from_str(text)?;

    let envelope = match raw.kind.as_str() {
        ENVELOPE_HELLO => Envelope::Hello {
            num_connections: raw.num_connections,
        },
        ENVELOPE_DISCONNECT => Envelope::Disconnect { reason: raw.reason },
        ENVELOPE_EVENTS_API => Envelope::EventsApi {
            envelope_id: raw.envelope_id,
            retry_attempt: raw.retry_attempt.unwrap_or_default(),
            payload: parse_payload(raw.payload.unwrap_or(Value::Null)),
        },
        _ => Envelope::Other {
            kind: raw.kind,
            envelope_id: raw.envelope_id,
        },
    };
    Ok(envelope)
}

fn parse_payload(mut payload: Value) -> EventsApiPayload {
    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if kind == PAYLOAD_EVENT_CALLBACK {
        let inner = payload
            .get_mut("event")
            .map(Value::take)
            .unwrap_or(Value::Null);
        return EventsApiPayload::Callback(Event::from_value(inner));
    }
    EventsApiPayload::Other { kind }
}

/// JSON text of the receipt for `envelope_id`.
pub fn ack_message(envelope_id: &str) -> String {
    serde_json::json!({ "envelope_id": envelope_id }).to_string()
}
