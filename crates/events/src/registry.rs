//! In-process subscription registry with per-client de-duplication.
//!
//! [`Registry`] is the fan-out hub between the Slack ingestion adapter
//! (the single publisher) and downstream WebSocket sessions (one
//! subscriber each). It is designed to be shared via `Arc<Registry>`.
//!
//! Every operation takes the same mutex, so `register`, `unregister`,
//! `publish` and `shutdown` are linearizable with respect to each other.
//! A subscriber's channel is closed by dropping the registry-held sender,
//! which only ever happens under that mutex, so a publish can never send
//! into a channel that is being torn down.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use sock2rtm_core::event::Event;
use sock2rtm_core::types::{SubscriberId, Timestamp};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use crate::filter::ChannelFilter;

/// Default per-subscriber channel capacity.
pub const DEFAULT_CAPACITY: usize = 8;

/// Receive side of a subscriber's delivery channel.
pub type EventReceiver = mpsc::Receiver<Arc<Event>>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Entry {
    client_id: String,
    filter: ChannelFilter,
    sender: mpsc::Sender<Arc<Event>>,
    registered_at: Timestamp,
}

#[derive(Default)]
struct State {
    /// Insertion-ordered so "first subscriber of a client" is the one that
    /// registered earliest.
    subscribers: IndexMap<SubscriberId, Entry>,
    closed: bool,
}

/// Outcome of a single [`Registry::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers whose filter accepted the event.
    pub matched: usize,
    /// Subscribers the event was queued for.
    pub delivered: usize,
    /// Matching subscribers skipped because their client already got it.
    pub deduplicated: usize,
    /// Matching subscribers whose channel was full or already closed.
    pub dropped: usize,
}

pub struct Registry {
    state: Mutex<State>,
    capacity: usize,
}

impl Registry {
    /// Create a registry whose subscriber channels hold up to `capacity`
    /// undelivered events each (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity: capacity.max(1),
        }
    }

    /// Register interest in the channels accepted by `filter`.
    ///
    /// `client_id` groups subscriptions for de-duplication; when absent or
    /// empty the subscription forms its own group. After
    /// [`shutdown`](Self::shutdown) the returned subscription is not
    /// tracked and its channel is already closed.
    pub async fn register(
        self: &Arc<Self>,
        filter: ChannelFilter,
        client_id: Option<String>,
    ) -> Subscription {
        let id = uuid::Uuid::new_v4();
        let client_id = client_id
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| id.to_string());
        let (sender, events) = mpsc::channel(self.capacity);

        let handle = SubscriptionHandle {
            id,
            client_id: client_id.clone(),
            registry: Arc::clone(self),
        };

        let mut state = self.state.lock().await;
        if state.closed {
            tracing::warn!(sub_id = %id, client_id = %client_id, "Registry is shut down, subscription not tracked");
            return Subscription { handle, events };
        }

        let channels: Vec<&str> = filter.channels().collect();
        tracing::info!(
            sub_id = %id,
            client_id = %client_id,
            ?channels,
            subscribers = state.subscribers.len() + 1,
            "New subscriber",
        );

        state.subscribers.insert(
            id,
            Entry {
                client_id,
                filter,
                sender,
                registered_at: chrono::Utc::now(),
            },
        );

        Subscription { handle, events }
    }

    /// Remove a subscriber, closing its channel.
    ///
    /// Returns whether an entry was removed; unknown or already removed ids
    /// are a no-op.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let mut state = self.state.lock().await;
        match state.subscribers.shift_remove(&id) {
            Some(entry) => {
                let lifetime = chrono::Utc::now() - entry.registered_at;
                tracing::info!(
                    sub_id = %id,
                    client_id = %entry.client_id,
                    lifetime_secs = lifetime.num_seconds(),
                    "Unsubscribed",
                );
                true
            }
            None => {
                tracing::debug!(sub_id = %id, "Unsubscribe for unknown subscriber");
                false
            }
        }
    }

    /// Fan an event out to every matching subscriber, at most once per
    /// client id.
    ///
    /// Never waits on a subscriber: a full channel drops the event for
    /// that subscriber. The first matching subscriber of a client (in
    /// registration order) is the one attempted, even if its channel turns
    /// out to be full.
    pub async fn publish(&self, event: Event) -> PublishReport {
        let event = Arc::new(event);
        let mut report = PublishReport::default();

        let state = self.state.lock().await;
        if state.closed {
            tracing::debug!("Registry is shut down, event discarded");
            return report;
        }

        let mut served: HashSet<&str> = HashSet::with_capacity(state.subscribers.len());
        for (id, entry) in &state.subscribers {
            if !entry.filter.matches(&event) {
                tracing::trace!(sub_id = %id, "Skip publish, filter did not match");
                continue;
            }
            report.matched += 1;

            if !served.insert(entry.client_id.as_str()) {
                tracing::debug!(
                    sub_id = %id,
                    client_id = %entry.client_id,
                    "Skip publish, already sent to client",
                );
                report.deduplicated += 1;
                continue;
            }

            match entry.sender.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(sub_id = %id, "Channel for subscriber is full, event dropped");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(sub_id = %id, "Subscriber receiver is gone, event dropped");
                    report.dropped += 1;
                }
            }
        }

        report
    }

    /// Close every subscriber channel and stop accepting events.
    ///
    /// Idempotent. Returns the number of subscribers that were closed.
    pub async fn shutdown(&self) -> usize {
        let mut state = self.state.lock().await;
        state.closed = true;
        let count = state.subscribers.len();
        state.subscribers.clear();
        tracing::info!(count, "Registry shut down, closed all subscriber channels");
        count
    }

    /// Number of currently registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live registration: the delivery channel plus the handle that can
/// undo it.
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub events: EventReceiver,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.handle.id
    }

    /// Split into the unregister capability and the receiver, so the two
    /// can be owned by different tasks.
    pub fn into_parts(self) -> (SubscriptionHandle, EventReceiver) {
        (self.handle, self.events)
    }
}

/// Capability to unregister one subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    id: SubscriberId,
    client_id: String,
    registry: Arc<Registry>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Remove this subscription from its registry. Safe to call more than
    /// once.
    pub async fn unregister(&self) {
        self.registry.unregister(self.id).await;
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
