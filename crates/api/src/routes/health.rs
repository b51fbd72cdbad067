use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Live WebSocket subscribers.
    pub subscribers: usize,
    /// False once the registry has been shut down.
    pub registry_open: bool,
}

/// GET /health -- returns service and registry health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry_open = !state.registry.is_closed().await;
    let status = if registry_open { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        subscribers: state.registry.subscriber_count().await,
        registry_open,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
