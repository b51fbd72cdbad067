//! Integration tests for `GET /start/{channels}[/{client_id}]`.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, TEST_HOST};
use sock2rtm_api::state::AppState;

async fn app_with_mock_slack() -> axum::Router {
    let api_url = common::spawn_mock_slack().await;
    common::build_test_app(AppState::new(common::test_config(&api_url)))
}

// ---------------------------------------------------------------------------
// Test: members of all channels are resolved once each
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_returns_url_and_distinct_users() {
    let app = app_with_mock_slack().await;

    let response = get(app, "/start/C1,C2/viewer-1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(
        json["url"],
        format!("ws://{TEST_HOST}/websocket/C1,C2/viewer-1")
    );

    let ids: Vec<&str> = json["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["U1", "U2", "U3"]);
    assert_eq!(json["users"][0]["name"], "name-U1");
}

#[tokio::test]
async fn start_without_client_id_omits_it_from_url() {
    let app = app_with_mock_slack().await;
    let json = body_json(get(app, "/start/C1").await).await;
    assert_eq!(json["url"], format!("ws://{TEST_HOST}/websocket/C1"));
}

// ---------------------------------------------------------------------------
// Test: malformed target is a 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_with_no_channels_is_bad_request() {
    let app = common::build_test_app(common::test_state());

    let response = get(app, "/start/,,/viewer-1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: Web API failures are a 500 with a JSON error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_with_unknown_channel_is_server_error() {
    let app = app_with_mock_slack().await;

    let response = get(app, "/start/C1,CNOPE").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["code"], "SLACK_API_ERROR");
    assert!(json["error"].as_str().unwrap().contains("channel_not_found"));
}

#[tokio::test]
async fn start_with_unreachable_slack_is_server_error() {
    let app = common::build_test_app(common::test_state());
    let response = get(app, "/start/C1").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
