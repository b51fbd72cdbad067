//! Per-subscriber channel filter.

use std::collections::HashSet;

use sock2rtm_core::event::Event;

/// The set of channel ids a subscriber asked for.
///
/// Built once at registration time and never mutated afterwards, so the
/// publisher can evaluate it without further synchronisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    channels: HashSet<String>,
}

impl ChannelFilter {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }

    /// `true` iff the event has a routing key and it is one of ours.
    /// Events without a routing key never match.
    pub fn matches(&self, event: &Event) -> bool {
        event
            .routing_key()
            .is_some_and(|key| self.channels.contains(key))
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
