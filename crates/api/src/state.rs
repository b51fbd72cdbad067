use std::sync::Arc;

use sock2rtm_core::metrics::Metrics;
use sock2rtm_events::Registry;
use sock2rtm_slack::SlackApi;
use tokio::sync::Semaphore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Fan-out hub between the Socket Mode receiver and WebSocket sessions.
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
    /// Slack Web API client (start endpoint).
    pub slack_api: SlackApi,
    /// One permit per live WebSocket session.
    pub connection_limit: Arc<Semaphore>,
}

impl AppState {
    /// Build fresh state from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new(config.subscriber_buffer));
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));
        let slack_api = SlackApi::new(config.slack.clone());

        Self {
            config: Arc::new(config),
            registry,
            metrics: Arc::new(Metrics::new()),
            slack_api,
            connection_limit,
        }
    }
}
