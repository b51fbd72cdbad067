//! Socket Mode WebSocket client.
//!
//! [`SocketModeClient`] asks the Web API for a fresh connection URL
//! (`apps.connections.open`) and dials it. Each URL carries a one-time
//! ticket, so every reconnect goes through the Web API again.

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::api::{SlackApi, SlackApiError};

/// Raw Socket Mode stream.
pub type SocketModeStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Opens Socket Mode connections for one Slack app.
#[derive(Clone)]
pub struct SocketModeClient {
    api: SlackApi,
}

/// A live Socket Mode connection.
pub struct SocketModeConnection {
    /// Host of the URL handed out by `apps.connections.open`.
    pub host: String,
    pub ws_stream: SocketModeStream,
}

impl SocketModeClient {
    pub fn new(api: SlackApi) -> Self {
        Self { api }
    }

    /// Obtain a connection URL and complete the WebSocket handshake.
    pub async fn connect(&self) -> Result<SocketModeConnection, SocketModeError> {
        let url = self.api.open_connection().await?;
        // The query string holds the connection ticket.
        let host = url.split('?').next().unwrap_or_default().to_string();

        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| SocketModeError::Connection(format!("Failed to connect to {host}: {e}")))?;

        tracing::info!(host = %host, "Connected to Slack Socket Mode");

        Ok(SocketModeConnection { host, ws_stream })
    }
}

/// Errors from establishing a Socket Mode connection.
#[derive(Debug, thiserror::Error)]
pub enum SocketModeError {
    /// `apps.connections.open` failed.
    #[error("Failed to open connection: {0}")]
    Open(#[from] SlackApiError),

    /// The WebSocket handshake failed.
    #[error("Connection error: {0}")]
    Connection(String),
}
