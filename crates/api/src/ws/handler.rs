use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use sock2rtm_core::target::parse_target;

use crate::error::AppError;
use crate::state::AppState;
use crate::ws::session::run_session;

/// GET /websocket/{channels}[/{client_id}]
///
/// The target is validated and a connection permit taken before the
/// upgrade, so a malformed path (400) or a full server (503) never reaches
/// the registry.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(target): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let target = match parse_target(&target) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected WebSocket request");
            return AppError::from(e).into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    if state.registry.is_closed().await {
        return AppError::Unavailable("server is shutting down".into()).into_response();
    }

    let permit = match Arc::clone(&state.connection_limit).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(
                max_connections = state.config.max_connections,
                "Connection limit reached, rejecting WebSocket",
            );
            return AppError::Unavailable("too many connections".into()).into_response();
        }
    };

    ws.on_upgrade(move |socket| run_session(socket, state, target, permit))
}
