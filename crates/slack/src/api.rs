//! Slack Web API client.
//!
//! Wraps the handful of Web API methods the relay needs using
//! [`reqwest`]: token verification, opening Socket Mode connections, and
//! resolving channel membership for the start endpoint.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::SlackConfig;

/// `users.info` rejects more than this many ids per call.
pub const USERS_INFO_BATCH_SIZE: usize = 30;

/// Page size requested from `conversations.members`.
const MEMBERS_PAGE_LIMIT: u32 = 200;

/// HTTP client for the Slack Web API.
#[derive(Clone)]
pub struct SlackApi {
    client: reqwest::Client,
    config: SlackConfig,
}

/// Errors from the Slack Web API layer.
#[derive(Debug, thiserror::Error)]
pub enum SlackApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Slack returned a non-2xx status code.
    #[error("Slack API HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    /// Slack answered `{"ok": false, "error": ...}`.
    #[error("Slack API {method} failed: {error}")]
    Slack { method: &'static str, error: String },

    /// The body was not the shape we expected.
    #[error("Unexpected response from {method}: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of `auth.test`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTest {
    pub user_id: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpen {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Members {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct UsersInfo {
    #[serde(default)]
    users: Vec<SlackUser>,
}

/// A Slack user object. Fields beyond the id are passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlackApi {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    /// Verify the bot token. Returns the bot's own user id.
    pub async fn auth_test(&self) -> Result<AuthTest, SlackApiError> {
        self.call("auth.test", &self.config.bot_token, &[]).await
    }

    /// Ask Slack for a fresh Socket Mode WebSocket URL.
    ///
    /// Uses the app-level token; each URL is single-use.
    pub async fn open_connection(&self) -> Result<String, SlackApiError> {
        let open: ConnectionsOpen = self
            .call("apps.connections.open", &self.config.app_token, &[])
            .await?;
        Ok(open.url)
    }

    /// All member user ids of one conversation, following pagination.
    pub async fn conversation_members(&self, channel: &str) -> Result<Vec<String>, SlackApiError> {
        let limit = MEMBERS_PAGE_LIMIT.to_string();
        let mut cursor = String::new();
        let mut members = Vec::new();

        loop {
            let mut params = vec![("channel", channel), ("limit", limit.as_str())];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.as_str()));
            }

            let page: Members = self
                .call("conversations.members", &self.config.bot_token, &params)
                .await?;
            members.extend(page.members);

            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                return Ok(members);
            }
        }
    }

    /// Look up user objects for at most [`USERS_INFO_BATCH_SIZE`] ids.
    pub async fn users_info(&self, user_ids: &[String]) -> Result<Vec<SlackUser>, SlackApiError> {
        let users = user_ids.join(",");
        let info: UsersInfo = self
            .call(
                "users.info",
                &self.config.bot_token,
                &[("users", users.as_str()), ("include_locale", "true")],
            )
            .await?;
        Ok(info.users)
    }

    /// Resolve the distinct members of `channels` into user objects.
    ///
    /// Ids are de-duplicated in first-seen order and looked up in batches
    /// of [`USERS_INFO_BATCH_SIZE`].
    pub async fn channel_members(&self, channels: &[String]) -> Result<Vec<SlackUser>, SlackApiError> {
        let mut user_ids = Vec::new();
        for channel in channels {
            let ids = self.conversation_members(channel).await?;
            tracing::info!(channel = %channel, count = ids.len(), "Resolved channel members");
            user_ids.extend(ids);
        }
        let user_ids = unique(user_ids);

        let mut seen = HashSet::new();
        let mut users = Vec::with_capacity(user_ids.len());
        for batch in user_ids.chunks(USERS_INFO_BATCH_SIZE) {
            for user in self.users_info(batch).await? {
                if seen.insert(user.id.clone()) {
                    users.push(user);
                }
            }
        }
        Ok(users)
    }

    // ---- private helpers ----

    /// POST a form-encoded Web API call and decode a successful body.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        token: &str,
        params: &[(&str, &str)],
    ) -> Result<T, SlackApiError> {
        let response = self
            .client
            .post(format!("{}/{}", self.config.api_url, method))
            .bearer_auth(token)
            .timeout(self.config.request_timeout)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SlackApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        check_ok(method, body)
    }
}

/// Turn a Web API JSON body into `T`, surfacing `ok: false` as an error.
fn check_ok<T: DeserializeOwned>(method: &'static str, body: Value) -> Result<T, SlackApiError> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        return Err(SlackApiError::Slack { method, error });
    }
    serde_json::from_value(body).map_err(|source| SlackApiError::Decode { method, source })
}

/// Drop repeated ids, keeping the first occurrence.
fn unique(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
