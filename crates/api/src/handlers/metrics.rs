use axum::extract::State;
use axum::Json;
use sock2rtm_core::metrics::MetricsSnapshot;

use crate::state::AppState;

/// GET /metrics -- point-in-time snapshot of the relay counters.
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
