use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use sock2rtm_api::config::{default_log_filter, ConfigError, ServerConfig};
use sock2rtm_api::router::build_app_router;
use sock2rtm_api::state::AppState;
use sock2rtm_core::metrics::Metrics;
use sock2rtm_slack::{
    Ingestor, ReconnectConfig, SlackApiError, SocketModeClient, SocketModeReceiver,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("SLACK_BOT_TOKEN is invalid: {0}")]
    Auth(#[source] SlackApiError),

    #[error("Invalid HOST address {0:?}")]
    Host(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                default_log_filter(std::env::var("DEBUG").ok().as_deref()).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "sock2rtm failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| StartupError::Host(config.host.clone()))?;
    let addr = SocketAddr::new(host, config.port);
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let settle = Duration::from_secs(config.session_settle_secs);

    // --- App state ---
    let state = AppState::new(config);

    // --- Token check ---
    let auth = state.slack_api.auth_test().await.map_err(StartupError::Auth)?;
    tracing::info!(user_id = %auth.user_id, team = ?auth.team, "Slack bot token verified");

    // --- Router ---
    let app = build_app_router(state.clone())?;

    // --- Socket Mode receiver ---
    let receiver = SocketModeReceiver::start(
        SocketModeClient::new(state.slack_api.clone()),
        Ingestor::new(Arc::clone(&state.registry), Arc::clone(&state.metrics)),
        ReconnectConfig::default(),
    );
    tracing::info!("Socket Mode receiver started");

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    receiver.shutdown(shutdown_timeout).await;
    tracing::info!("Socket Mode receiver shut down");

    let closed = state.registry.shutdown().await;
    tracing::info!(closed, "Closing remaining WebSocket sessions");
    drain_sessions(&state.metrics, settle + shutdown_timeout).await;

    tracing::info!("Graceful shutdown complete");
    served.map_err(StartupError::from)
}

/// Wait for open sessions to finish their teardown, up to `timeout`.
async fn drain_sessions(metrics: &Metrics, timeout: Duration) {
    let drained = tokio::time::timeout(timeout, async {
        while metrics.snapshot().websocket.current_connections > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            remaining = metrics.snapshot().websocket.current_connections,
            "Sessions still open at exit",
        );
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
