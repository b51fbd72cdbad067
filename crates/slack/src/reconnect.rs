//! Exponential-backoff reconnection for the Socket Mode connection.
//!
//! When the upstream connection drops the receiver calls
//! [`reconnect_loop`], which keeps asking Slack for a new connection with
//! increasing delays until one succeeds or the [`CancellationToken`]
//! fires.

use std::time::Duration;

use sock2rtm_core::metrics::{self, Metrics};
use tokio_util::sync::CancellationToken;

use crate::client::{SocketModeClient, SocketModeConnection};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Connect once, counting the attempt.
pub async fn connect_counted(
    client: &SocketModeClient,
    metrics: &Metrics,
) -> Result<SocketModeConnection, crate::client::SocketModeError> {
    metrics::incr(&metrics.slack.connecting);
    client.connect().await
}

/// Retry with exponential backoff until connected.
///
/// Waits [`ReconnectConfig::initial_delay`] before the first attempt.
/// Returns `None` if `cancel` fires first.
pub async fn reconnect_loop(
    client: &SocketModeClient,
    metrics: &Metrics,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<SocketModeConnection> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to Slack",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            result = connect_counted(client, metrics) => {
                match result {
                    Ok(conn) => {
                        tracing::info!(attempt, "Reconnected to Slack");
                        return Some(conn);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
                    }
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
