pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Relay routes.
///
/// ```text
/// /start/{channels}[/{client_id}]        resolve members, return ws url
/// /websocket/{channels}[/{client_id}]    WebSocket subscription
/// /metrics                               counter snapshot
/// ```
pub fn relay_routes() -> Router<AppState> {
    Router::new()
        .route("/start/{*target}", get(handlers::start::start))
        .route("/websocket/{*target}", get(ws::ws_handler))
        .route("/metrics", get(handlers::metrics::metrics))
}
