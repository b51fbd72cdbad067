use axum::extract::{Path, State};
use axum::http::header::HOST;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use sock2rtm_core::target::parse_target;
use sock2rtm_slack::SlackUser;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub ok: bool,
    /// WebSocket URL the client should connect to next.
    pub url: String,
    /// Distinct members of the requested channels.
    pub users: Vec<SlackUser>,
}

/// GET /start/{channels}[/{client_id}]
///
/// Resolves the channel members through the Web API and hands back the
/// matching `/websocket/...` URL on the host the client used.
pub async fn start(
    State(state): State<AppState>,
    Path(target): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<StartResponse>> {
    let target = parse_target(&target)?;
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing Host header".into()))?;

    tracing::info!(channels = ?target.channels, client_id = ?target.client_id, "Start requested");

    let users = state.slack_api.channel_members(&target.channels).await?;
    let url = format!("ws://{host}/websocket/{}", target.to_path());
    tracing::info!(url = %url, users = users.len(), "Start resolved");

    Ok(Json(StartResponse {
        ok: true,
        url,
        users,
    }))
}
