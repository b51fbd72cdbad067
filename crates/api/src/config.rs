use std::str::FromStr;

use sock2rtm_slack::config::MissingSetting;
use sock2rtm_slack::SlackConfig;

/// Server configuration loaded from environment variables.
///
/// Everything except the Slack tokens has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8888`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the Socket Mode receiver (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Concurrent WebSocket sessions accepted (default: `1024`).
    pub max_connections: usize,
    /// Delay between unsubscribing and dropping a socket (default: `3`).
    pub session_settle_secs: u64,
    /// Per-subscriber event buffer (default: `8`).
    pub subscriber_buffer: usize,
    /// Slack tokens and Web API base URL.
    pub slack: SlackConfig,
}

/// A setting is missing or unparsable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Missing(#[from] MissingSetting),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `8888`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `MAX_CONNECTIONS`       | `1024`                  |
    /// | `SESSION_SETTLE_SECS`   | `3`                     |
    /// | `SUBSCRIBER_BUFFER`     | `8`                     |
    ///
    /// Slack settings are read by [`SlackConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port: parse_var("PORT", 8888)?,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT_SECS", 30)?,
            max_connections: parse_var("MAX_CONNECTIONS", 1024)?,
            session_settle_secs: parse_var("SESSION_SETTLE_SECS", 3)?,
            subscriber_buffer: parse_var("SUBSCRIBER_BUFFER", sock2rtm_events::registry::DEFAULT_CAPACITY)?,
            slack: SlackConfig::from_env()?,
        })
    }
}

/// `EnvFilter` directives used when `RUST_LOG` is unset.
///
/// `DEBUG=true` (also `1`, `t`) lowers the relay's own crates to `debug`.
pub fn default_log_filter(debug: Option<&str>) -> &'static str {
    let debug = matches!(
        debug.map(str::trim),
        Some("1" | "t" | "T" | "true" | "TRUE" | "True")
    );
    if debug {
        "sock2rtm_api=debug,sock2rtm_slack=debug,sock2rtm_events=debug,tower_http=debug"
    } else {
        "sock2rtm_api=info,sock2rtm_slack=info,sock2rtm_events=info,tower_http=info"
    }
}

/// Read `name`, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
