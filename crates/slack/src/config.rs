//! Slack credentials and endpoint configuration.

use std::time::Duration;

/// Default Slack Web API base URL.
pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Upper bound for a single Web API call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens and base URL for talking to Slack.
#[derive(Clone)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`) for Web API calls.
    pub bot_token: String,
    /// App-level token (`xapp-...`) for opening Socket Mode connections.
    pub app_token: String,
    /// Web API base URL without trailing slash.
    pub api_url: String,
    /// Per-request timeout for Web API calls.
    pub request_timeout: Duration,
}

/// A required setting is missing.
#[derive(Debug, thiserror::Error)]
#[error("{0} must be set")]
pub struct MissingSetting(pub &'static str);

impl SlackConfig {
    /// Load from environment variables.
    ///
    /// | Variable          | Required | Default                 |
    /// |-------------------|----------|-------------------------|
    /// | `SLACK_BOT_TOKEN` | yes      | --                      |
    /// | `SLACK_APP_TOKEN` | yes      | --                      |
    /// | `SLACK_API_URL`   | no       | `https://slack.com/api` |
    pub fn from_env() -> Result<Self, MissingSetting> {
        let bot_token = non_empty_var("SLACK_BOT_TOKEN").ok_or(MissingSetting("SLACK_BOT_TOKEN"))?;
        let app_token = non_empty_var("SLACK_APP_TOKEN").ok_or(MissingSetting("SLACK_APP_TOKEN"))?;
        let api_url = non_empty_var("SLACK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            bot_token,
            app_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }
}

// Tokens are secrets; keep them out of logs.
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"<redacted>")
            .field("app_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_tokens() {
        let config = SlackConfig {
            bot_token: "xoxb-secret".into(),
            app_token: "xapp-secret".into(),
            api_url: DEFAULT_API_URL.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("slack.com"));
    }
}
