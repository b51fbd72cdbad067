//! One downstream WebSocket session.
//!
//! Lifecycle: register -> greet -> active (outbound task + inbound loop)
//! -> unregister -> settle -> drop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use sock2rtm_core::metrics::{self, Metrics};
use sock2rtm_core::protocol::{control_message, MSG_TYPE_HELLO, MSG_TYPE_PING, MSG_TYPE_PONG};
use sock2rtm_core::target::Target;
use sock2rtm_core::types::SubscriberId;
use sock2rtm_events::{ChannelFilter, EventReceiver};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, OwnedSemaphorePermit};

use crate::state::AppState;

/// Pending liveness replies per session.
const CONTROL_BUFFER: usize = 4;

/// Client-to-server frame. Only the type tag is inspected.
#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type", default)]
    kind: String,
}

/// Drive one upgraded socket until the client leaves or the registry
/// closes its subscription.
///
/// `_permit` is held for the whole session, settle delay included.
pub(crate) async fn run_session<S>(
    socket: S,
    state: AppState,
    target: Target,
    _permit: OwnedSemaphorePermit,
) where
    S: Stream<Item = Result<Message, axum::Error>>
        + Sink<Message, Error = axum::Error>
        + Send
        + 'static,
{
    let metrics = Arc::clone(&state.metrics);
    let settle = Duration::from_secs(state.config.session_settle_secs);
    metrics::incr(&metrics.websocket.total_connections);
    metrics::incr(&metrics.websocket.current_connections);

    let filter = ChannelFilter::new(target.channels.iter().cloned());
    let (handle, events) = state
        .registry
        .register(filter, target.client_id.clone())
        .await
        .into_parts();
    let sub_id = handle.id();
    tracing::info!(
        sub_id = %sub_id,
        client_id = %handle.client_id(),
        channels = ?target.channels,
        "WebSocket connected",
    );

    let (mut sink, mut stream) = socket.split();

    let greeting = Message::Text(control_message(MSG_TYPE_HELLO).into());
    if let Err(e) = sink.send(greeting).await {
        tracing::warn!(sub_id = %sub_id, error = %e, "Failed to send greeting");
        handle.unregister().await;
        tokio::time::sleep(settle).await;
        drop((sink, stream));
        metrics::add(&metrics.websocket.current_connections, -1);
        return;
    }

    let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
    let send_task = tokio::spawn(forward_events(
        sink,
        events,
        control_rx,
        Arc::clone(&metrics),
        sub_id,
    ));

    read_client_messages(&mut stream, &control_tx, sub_id).await;

    // Unregistering closes the subscription channel, which ends the
    // outbound task once the buffered events are flushed.
    handle.unregister().await;
    drop(control_tx);
    let sink = match send_task.await {
        Ok(sink) => Some(sink),
        Err(e) => {
            tracing::error!(sub_id = %sub_id, error = %e, "Outbound task failed");
            None
        }
    };

    tokio::time::sleep(settle).await;
    drop((sink, stream));
    metrics::add(&metrics.websocket.current_connections, -1);
    tracing::info!(sub_id = %sub_id, "WebSocket disconnected");
}

/// Outbound half: forward subscription events and liveness replies.
///
/// Returns the sink after sending a Close frame once the subscription
/// channel has closed.
async fn forward_events<W>(
    mut sink: W,
    mut events: EventReceiver,
    mut control: mpsc::Receiver<String>,
    metrics: Arc<Metrics>,
    sub_id: SubscriberId,
) -> W
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!(sub_id = %sub_id, error = %e, "Close frame not sent");
                    }
                    return sink;
                };

                let json = match event.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(sub_id = %sub_id, error = %e, "Failed to encode event");
                        continue;
                    }
                };

                match sink.send(Message::Text(json.into())).await {
                    Ok(()) => metrics::incr(&metrics.messages.delivered),
                    Err(e) => {
                        metrics::incr(&metrics.messages.write_errored);
                        tracing::warn!(sub_id = %sub_id, error = %e, "Failed to write event");
                    }
                }
            }
            Some(reply) = control.recv() => {
                if let Err(e) = sink.send(Message::Text(reply.into())).await {
                    tracing::warn!(sub_id = %sub_id, error = %e, "Failed to write control reply");
                }
            }
        }
    }
}

/// Inbound half: runs until Close, a read error, end of stream, or the
/// outbound task stopping.
async fn read_client_messages<R>(
    stream: &mut R,
    control: &mpsc::Sender<String>,
    sub_id: SubscriberId,
) where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            () = control.closed() => {
                tracing::debug!(sub_id = %sub_id, "Subscription closed by server");
                break;
            }
        };
        let Some(frame) = frame else { break };

        match frame {
            Ok(Message::Text(text)) => handle_client_message(text.as_str().as_bytes(), control, sub_id),
            Ok(Message::Binary(bytes)) => handle_client_message(&bytes, control, sub_id),
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                tracing::debug!(sub_id = %sub_id, ?frame, "Client closed WebSocket");
                break;
            }
            Err(e) => {
                tracing::warn!(sub_id = %sub_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }
}

/// Never waits on the outbound task: a pong that does not fit is dropped.
fn handle_client_message(raw: &[u8], control: &mpsc::Sender<String>, sub_id: SubscriberId) {
    let message: ClientMessage = match serde_json::from_slice(raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(
                sub_id = %sub_id,
                error = %e,
                raw = %String::from_utf8_lossy(raw),
                "Cannot decode client message",
            );
            return;
        }
    };

    if message.kind == MSG_TYPE_PING {
        tracing::debug!(sub_id = %sub_id, "Ping received");
        match control.try_send(control_message(MSG_TYPE_PONG)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(sub_id = %sub_id, "Outbound busy, dropping pong");
            }
            // The outbound task has stopped; the read loop is about to end.
            Err(TrySendError::Closed(_)) => {}
        }
    } else {
        tracing::info!(sub_id = %sub_id, raw = %String::from_utf8_lossy(raw), "Client message");
    }
}
