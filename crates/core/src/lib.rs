//! Shared domain types for the sock2rtm relay.
//!
//! Nothing in here performs I/O: the event model, downstream routing
//! targets, protocol constants, relay counters and the common error type.

pub mod error;
pub mod event;
pub mod metrics;
pub mod protocol;
pub mod target;
pub mod types;
