//! Downstream WebSocket delivery.
//!
//! [`ws_handler`] validates the request and upgrades it; each upgraded
//! socket then runs one delivery session (see `session.rs`).

mod handler;
mod session;

pub use handler::ws_handler;
