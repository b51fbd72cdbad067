//! sock2rtm fan-out engine.
//!
//! - [`Registry`]: in-process publish/subscribe hub that delivers each
//!   event at most once per client identity over bounded per-subscriber
//!   channels.
//! - [`ChannelFilter`]: the per-subscriber routing predicate.

pub mod filter;
pub mod registry;

pub use filter::ChannelFilter;
pub use registry::{EventReceiver, PublishReport, Registry, Subscription, SubscriptionHandle};
