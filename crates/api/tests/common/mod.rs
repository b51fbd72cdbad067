#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use sock2rtm_api::config::ServerConfig;
use sock2rtm_api::router::build_app_router;
use sock2rtm_api::state::AppState;
use sock2rtm_slack::SlackConfig;

/// Host header sent by [`get`].
pub const TEST_HOST: &str = "relay.test:8888";

/// Build a test `ServerConfig` with safe defaults.
///
/// No settle delay, so sessions tear down immediately. Slack calls go to
/// `api_url`.
pub fn test_config(api_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_connections: 16,
        session_settle_secs: 0,
        subscriber_buffer: 8,
        slack: SlackConfig {
            bot_token: "xoxb-test".into(),
            app_token: "xapp-test".into(),
            api_url: api_url.to_string(),
            request_timeout: Duration::from_secs(5),
        },
    }
}

/// State whose Slack client points at an unreachable address.
pub fn test_state() -> AppState {
    AppState::new(test_config("http://127.0.0.1:9/api"))
}

/// Full application router, same middleware stack as production.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state).expect("test config is valid")
}

/// Send a GET through the router without a network listener.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("host", TEST_HOST)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve the app on an ephemeral local port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let app = build_test_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Mock Slack Web API
// ---------------------------------------------------------------------------

async fn conversations_members(Form(params): Form<HashMap<String, String>>) -> Json<Value> {
    match params.get("channel").map(String::as_str) {
        Some("C1") => Json(json!({"ok": true, "members": ["U1", "U2"]})),
        Some("C2") => Json(json!({"ok": true, "members": ["U2", "U3"]})),
        _ => Json(json!({"ok": false, "error": "channel_not_found"})),
    }
}

async fn users_info(Form(params): Form<HashMap<String, String>>) -> Json<Value> {
    let users: Vec<Value> = params
        .get("users")
        .map(String::as_str)
        .unwrap_or_default()
        .split(',')
        .map(|id| json!({"id": id, "name": format!("name-{id}"), "real_name": "Test User"}))
        .collect();
    Json(json!({"ok": true, "users": users}))
}

/// Serve a minimal Web API mock and return its base URL.
pub async fn spawn_mock_slack() -> String {
    let router = Router::new()
        .route("/api/conversations.members", post(conversations_members))
        .route("/api/users.info", post(users_info));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}
