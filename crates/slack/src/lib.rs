//! Slack side of the relay: Web API client and Socket Mode ingestion.

pub mod api;
pub mod client;
pub mod config;
pub mod envelope;
pub mod ingest;
pub mod processor;
pub mod receiver;
pub mod reconnect;

pub use api::{SlackApi, SlackApiError, SlackUser};
pub use client::{SocketModeClient, SocketModeError};
pub use config::SlackConfig;
pub use ingest::{Disposition, Ingestor};
pub use receiver::SocketModeReceiver;
pub use reconnect::ReconnectConfig;
