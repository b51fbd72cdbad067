//! Ingestion adapter: classify Socket Mode envelopes and publish message
//! events to the registry.

use std::sync::Arc;

use sock2rtm_core::event::Event;
use sock2rtm_core::metrics::{self, Metrics};
use sock2rtm_events::{PublishReport, Registry};

use crate::envelope::{Envelope, EventsApiPayload};

/// What [`Ingestor::dispatch`] did with an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// A message event was handed to the registry.
    Published(PublishReport),
    /// Counted as unsupported and dropped.
    Unsupported,
    /// Connection lifecycle notice; counted, nothing published.
    Lifecycle,
    /// Slack asked us to drop this connection and open a new one.
    Disconnect,
}

/// Forwards recognised upstream events to the [`Registry`].
///
/// Acknowledgement happens before dispatch and is the caller's job (see
/// [`crate::processor`]); the ingestor itself never does I/O.
#[derive(Clone)]
pub struct Ingestor {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Ingestor {
    pub fn new(registry: Arc<Registry>, metrics: Arc<Metrics>) -> Self {
        Self { registry, metrics }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Classify one envelope and publish it if it is a message event.
    pub async fn dispatch(&self, envelope: Envelope) -> Disposition {
        match envelope {
            Envelope::EventsApi {
                payload: EventsApiPayload::Callback(event),
                envelope_id,
                retry_attempt,
            } => {
                if retry_attempt > 0 {
                    tracing::debug!(
                        envelope_id = envelope_id.as_deref().unwrap_or_default(),
                        retry_attempt,
                        "Redelivered event",
                    );
                }
                self.dispatch_event(event).await
            }
            Envelope::EventsApi {
                payload: EventsApiPayload::Other { kind },
                ..
            } => {
                metrics::incr(&self.metrics.messages.unsupported);
                tracing::warn!(payload_type = %kind, "Unsupported Events API payload received");
                Disposition::Unsupported
            }
            Envelope::Hello { num_connections } => {
                metrics::incr(&self.metrics.slack.hello);
                tracing::info!(?num_connections, "Socket Mode hello");
                Disposition::Lifecycle
            }
            Envelope::Disconnect { reason } => {
                metrics::incr(&self.metrics.slack.disconnect);
                tracing::info!(?reason, "Socket Mode disconnect received");
                Disposition::Disconnect
            }
            Envelope::Other { kind, .. } => {
                metrics::incr(&self.metrics.messages.unsupported);
                tracing::warn!(envelope_type = %kind, "Skipped unsupported envelope");
                Disposition::Unsupported
            }
        }
    }

    /// Count a frame that could not be parsed as an envelope.
    pub fn reject_undecodable(&self, raw: &str, error: &serde_json::Error) {
        metrics::incr(&self.metrics.messages.unsupported);
        tracing::warn!(error = %error, raw = %raw, "Failed to parse Socket Mode frame");
    }

    async fn dispatch_event(&self, event: Event) -> Disposition {
        match event {
            Event::Message(_) => {
                metrics::incr(&self.metrics.messages.received);
                tracing::debug!(channel = event.routing_key().unwrap_or_default(), "Publish message event");
                let report = self.registry.publish(event).await;
                if report.dropped > 0 {
                    metrics::add(&self.metrics.messages.dropped, report.dropped as i64);
                }
                Disposition::Published(report)
            }
            Event::Unrecognized { kind, .. } => {
                metrics::incr(&self.metrics.messages.unsupported);
                tracing::warn!(event_type = %kind, "Skipped unsupported inner event");
                Disposition::Unsupported
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use sock2rtm_core::event::MessageEvent;
    use sock2rtm_events::ChannelFilter;

    use super::*;
    use crate::envelope::parse_envelope;

    fn ingestor() -> (Ingestor, Arc<Registry>, Arc<Metrics>) {
        let registry = Arc::new(Registry::default());
        let metrics = Arc::new(Metrics::new());
        (
            Ingestor::new(Arc::clone(&registry), Arc::clone(&metrics)),
            registry,
            metrics,
        )
    }

    fn callback(event: Event) -> Envelope {
        Envelope::EventsApi {
            envelope_id: Some("env".into()),
            retry_attempt: 0,
            payload: EventsApiPayload::Callback(event),
        }
    }

    #[tokio::test]
    async fn message_event_is_published() {
        let (ingestor, registry, metrics) = ingestor();
        let mut sub = registry.register(ChannelFilter::new(["C1"]), None).await;

        let disposition = ingestor
            .dispatch(callback(MessageEvent::new("C1", "hi").into()))
            .await;

        assert_matches!(disposition, Disposition::Published(report) if report.delivered == 1);
        assert_eq!(metrics.snapshot().messages.received_from_slack, 1);
        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.routing_key(), Some("C1"));
    }

    #[tokio::test]
    async fn other_inner_event_is_unsupported() {
        let (ingestor, _registry, metrics) = ingestor();
        let event = Event::from_value(serde_json::json!({"type": "app_mention", "channel": "C1"}));

        assert_eq!(ingestor.dispatch(callback(event)).await, Disposition::Unsupported);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages.unsupported_from_slack, 1);
        assert_eq!(snapshot.messages.received_from_slack, 0);
    }

    #[tokio::test]
    async fn non_callback_payload_is_unsupported() {
        let (ingestor, _registry, metrics) = ingestor();
        let envelope = Envelope::EventsApi {
            envelope_id: None,
            retry_attempt: 0,
            payload: EventsApiPayload::Other {
                kind: "app_rate_limited".into(),
            },
        };
        assert_eq!(ingestor.dispatch(envelope).await, Disposition::Unsupported);
        assert_eq!(metrics.snapshot().messages.unsupported_from_slack, 1);
    }

    #[tokio::test]
    async fn lifecycle_envelopes_are_counted_not_published() {
        let (ingestor, _registry, metrics) = ingestor();

        let hello = parse_envelope(r#"{"type":"hello"}"#).unwrap();
        assert_eq!(ingestor.dispatch(hello).await, Disposition::Lifecycle);

        let bye = parse_envelope(r#"{"type":"disconnect","reason":"warning"}"#).unwrap();
        assert_eq!(ingestor.dispatch(bye).await, Disposition::Disconnect);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.slack.hello, 1);
        assert_eq!(snapshot.slack.disconnect, 1);
        assert_eq!(snapshot.messages.received_from_slack, 0);
    }

    #[tokio::test]
    async fn unknown_envelope_is_unsupported() {
        let (ingestor, _registry, metrics) = ingestor();
        let envelope = parse_envelope(r#"{"type":"interactive","envelope_id":"i1"}"#).unwrap();
        assert_eq!(ingestor.dispatch(envelope).await, Disposition::Unsupported);
        assert_eq!(metrics.snapshot().messages.unsupported_from_slack, 1);
    }

    #[tokio::test]
    async fn full_subscriber_channel_is_counted_as_dropped() {
        let registry = Arc::new(Registry::new(1));
        let metrics = Arc::new(Metrics::new());
        let ingestor = Ingestor::new(Arc::clone(&registry), Arc::clone(&metrics));
        let _sub = registry.register(ChannelFilter::new(["C1"]), None).await;

        for _ in 0..3 {
            ingestor
                .dispatch(callback(MessageEvent::new("C1", "x").into()))
                .await;
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages.received_from_slack, 3);
        assert_eq!(snapshot.messages.dropped_slow_consumer, 2);
    }
}
