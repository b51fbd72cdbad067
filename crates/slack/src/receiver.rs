//! Long-lived Socket Mode receiver task.
//!
//! [`SocketModeReceiver::start`] spawns one task that connects, processes
//! envelopes and reconnects whenever the connection drops, until
//! [`SocketModeReceiver::shutdown`] is called.

use std::time::Duration;

use sock2rtm_core::metrics;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{SocketModeClient, SocketModeConnection};
use crate::ingest::Ingestor;
use crate::processor::{process_envelopes, SessionEnd};
use crate::reconnect::{connect_counted, reconnect_loop, ReconnectConfig};

/// Handle to the running receiver task.
pub struct SocketModeReceiver {
    cancel: CancellationToken,
    task_handle: JoinHandle<()>,
}

impl SocketModeReceiver {
    /// Spawn the connect -> process -> reconnect loop.
    pub fn start(client: SocketModeClient, ingestor: Ingestor, reconnect: ReconnectConfig) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let task_handle = tokio::spawn(async move {
            tracing::info!("Starting Socket Mode receiver");
            run_connection_loop(&client, &ingestor, &reconnect, &task_cancel).await;
            tracing::info!("Socket Mode receiver exited");
        });

        Self { cancel, task_handle }
    }

    /// Cancel the loop and wait up to `timeout` for it to exit.
    pub async fn shutdown(self, timeout: Duration) {
        tracing::info!("Shutting down Socket Mode receiver");
        self.cancel.cancel();

        if tokio::time::timeout(timeout, self.task_handle).await.is_err() {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Socket Mode receiver did not stop in time");
        }
    }
}

/// Connect -> process -> reconnect, until cancelled.
async fn run_connection_loop(
    client: &SocketModeClient,
    ingestor: &Ingestor,
    reconnect: &ReconnectConfig,
    cancel: &CancellationToken,
) {
    let mut immediate = true;

    loop {
        let Some(mut conn) = establish(client, ingestor, reconnect, cancel, immediate).await else {
            return; // cancelled
        };
        metrics::incr(&ingestor.metrics().slack.connected);

        let end = process_envelopes(&mut conn.ws_stream, ingestor, cancel).await;
        match &end {
            SessionEnd::Cancelled => return,
            SessionEnd::Disconnect => {
                tracing::info!(host = %conn.host, "Slack requested reconnect");
            }
            SessionEnd::Closed => {
                tracing::info!(host = %conn.host, "Connection lost, entering reconnect loop");
            }
            SessionEnd::Error(error) => {
                tracing::warn!(host = %conn.host, error = %error, "Connection failed, entering reconnect loop");
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        // A requested refresh reconnects right away; anything else backs off.
        immediate = end == SessionEnd::Disconnect;
    }
}

async fn establish(
    client: &SocketModeClient,
    ingestor: &Ingestor,
    reconnect: &ReconnectConfig,
    cancel: &CancellationToken,
    immediate: bool,
) -> Option<SocketModeConnection> {
    if immediate {
        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = connect_counted(client, ingestor.metrics()) => result,
        };
        match result {
            Ok(conn) => return Some(conn),
            Err(e) => {
                tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
            }
        }
    }
    reconnect_loop(client, ingestor.metrics(), reconnect, cancel).await
}
