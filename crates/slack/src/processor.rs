//! Socket Mode frame processing loop.
//!
//! Reads frames from one upstream connection, acknowledges every
//! envelope that carries an id, then hands it to the [`Ingestor`].

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use crate::envelope::{ack_message, parse_envelope};
use crate::ingest::{Disposition, Ingestor};

/// Slack redelivers an envelope that is not acknowledged within 3 seconds.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Why [`process_envelopes`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Slack sent a `disconnect` envelope.
    Disconnect,
    /// The socket was closed or the stream ended.
    Closed,
    /// Receiving or acknowledging failed.
    Error(String),
    /// The cancellation token fired; a Close frame was sent.
    Cancelled,
}

/// Process frames until the connection ends or `cancel` fires.
pub async fn process_envelopes<S>(
    ws: &mut S,
    ingestor: &Ingestor,
    cancel: &CancellationToken,
) -> SessionEnd
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = ws.close().await {
                    tracing::debug!(error = %e, "Close on cancel failed");
                }
                return SessionEnd::Cancelled;
            }
            frame = ws.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                if let Some(end) = handle_text_frame(ws, ingestor, &text).await {
                    return end;
                }
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!("Ignoring binary frame");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                // Handled by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Socket Mode connection closed by Slack");
                return SessionEnd::Closed;
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Socket Mode receive error");
                return SessionEnd::Error(e.to_string());
            }
            None => return SessionEnd::Closed,
        }
    }
}

/// Ack, then dispatch. Returns `Some` when the session should end.
async fn handle_text_frame<S>(ws: &mut S, ingestor: &Ingestor, text: &str) -> Option<SessionEnd>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let envelope = match parse_envelope(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            ingestor.reject_undecodable(text, &e);
            return None;
        }
    };

    if let Some(envelope_id) = envelope.envelope_id() {
        let ack = ws.send(Message::Text(ack_message(envelope_id)));
        match tokio::time::timeout(ACK_TIMEOUT, ack).await {
            Ok(Ok(())) => {
                tracing::trace!(envelope_id, "Acknowledged envelope");
            }
            Ok(Err(e)) => {
                tracing::error!(envelope_id, error = %e, "Failed to acknowledge envelope");
                return Some(SessionEnd::Error(e.to_string()));
            }
            Err(_) => {
                // Slack will redeliver; still forward this copy.
                tracing::warn!(envelope_id, "Acknowledgement timed out");
            }
        }
    }

    match ingestor.dispatch(envelope).await {
        Disposition::Disconnect => Some(SessionEnd::Disconnect),
        Disposition::Published(_) | Disposition::Unsupported | Disposition::Lifecycle => None,
    }
}
