//! Slack inner event model.
//!
//! Events arrive from Socket Mode as loosely-typed JSON. [`Event`] turns
//! them into a small sum type: the one kind the relay understands
//! ([`MessageEvent`]) and an [`Event::Unrecognized`] fallback that keeps
//! the raw payload around for logging and counting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::EVENT_TYPE_MESSAGE;

/// A Slack `message` event.
///
/// Only the fields the relay looks at are typed. Everything else is kept
/// in [`extra`](Self::extra) so that serialising the event for downstream
/// clients reproduces what Slack sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type", default = "message_type")]
    pub kind: String,

    /// Channel the message was posted in. This is the routing key.
    #[serde(default)]
    pub channel: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub ts: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<String>,

    /// Fields not modelled above (blocks, attachments, edited, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn message_type() -> String {
    EVENT_TYPE_MESSAGE.to_string()
}

impl MessageEvent {
    /// Minimal message event for `channel`, mostly useful in tests.
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: message_type(),
            channel: channel.into(),
            user: None,
            text: text.into(),
            ts: String::new(),
            subtype: None,
            thread_ts: None,
            channel_type: None,
            event_ts: None,
            extra: Map::new(),
        }
    }
}

/// An inner event delivered inside an Events API callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message(MessageEvent),
    /// Any event kind the relay does not route. `kind` is the `type`
    /// field if present, otherwise empty.
    Unrecognized { kind: String, raw: Value },
}

impl Event {
    /// Classify a raw inner event by its `type` field.
    ///
    /// A `message` event that does not fit [`MessageEvent`] is treated as
    /// unrecognized rather than rejected.
    pub fn from_value(raw: Value) -> Self {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if kind == EVENT_TYPE_MESSAGE {
            if let Ok(message) = MessageEvent::deserialize(&raw) {
                return Event::Message(message);
            }
        }

        Event::Unrecognized { kind, raw }
    }

    /// The event's `type` discriminator.
    pub fn kind(&self) -> &str {
        match self {
            Event::Message(m) => &m.kind,
            Event::Unrecognized { kind, .. } => kind,
        }
    }

    /// Key used by subscriber filters. Only message events with a
    /// non-empty channel have one.
    pub fn routing_key(&self) -> Option<&str> {
        match self {
            Event::Message(m) if !m.channel.is_empty() => Some(&m.channel),
            _ => None,
        }
    }

    /// JSON text written to downstream clients.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Event::Message(m) => serde_json::to_string(m),
            Event::Unrecognized { raw, .. } => serde_json::to_string(raw),
        }
    }
}

impl From<MessageEvent> for Event {
    fn from(message: MessageEvent) -> Self {
        Event::Message(message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_event_is_recognised() {
        let event = Event::from_value(json!({
            "type": "message",
            "channel": "C123",
            "user": "U1",
            "text": "hi",
            "ts": "1700000000.000100"
        }));
        match &event {
            Event::Message(m) => {
                assert_eq!(m.channel, "C123");
                assert_eq!(m.user.as_deref(), Some("U1"));
                assert_eq!(m.text, "hi");
            }
            other => panic!("Expected Message, got {other:?}"),
        }
        assert_eq!(event.routing_key(), Some("C123"));
        assert_eq!(event.kind(), "message");
    }

    #[test]
    fn other_kinds_are_unrecognized_without_routing_key() {
        let event = Event::from_value(json!({"type": "reaction_added", "item": {"channel": "C1"}}));
        assert_eq!(event.kind(), "reaction_added");
        assert!(event.routing_key().is_none());
    }

    #[test]
    fn missing_type_is_unrecognized() {
        let event = Event::from_value(json!({"channel": "C1"}));
        assert_eq!(event.kind(), "");
        assert!(event.routing_key().is_none());
    }

    #[test]
    fn message_without_channel_has_no_routing_key() {
        let event = Event::from_value(json!({"type": "message", "text": "orphan"}));
        assert!(matches!(event, Event::Message(_)));
        assert!(event.routing_key().is_none());
    }

    #[test]
    fn unknown_fields_survive_serialisation() {
        let raw = json!({
            "type": "message",
            "channel": "C9",
            "text": "with blocks",
            "ts": "1.2",
            "blocks": [{"type": "rich_text"}],
            "client_msg_id": "abc"
        });
        let event = Event::from_value(raw.clone());
        let back: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(back, raw);
    }
}
