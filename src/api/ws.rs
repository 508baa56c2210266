// =============================================================================
// WebSocket Handler: Push-based chart updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. An immediate full ChartSnapshot on connect.
//   2. A fresh snapshot every 500 ms whenever the state_version has changed
//      since the last push.
//
// Ping frames are answered with Pong; text frames are ignored (commands go
// through the REST endpoints).
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app_state::ChartState;

const PUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ChartState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted -- upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle.
///
/// Runs the push timer and the receive side under one `tokio::select!`.
async fn handle_ws_connection(socket: WebSocket, state: Arc<ChartState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut sequence: u64 = 0;

    let mut last_sent_version = state.current_state_version();
    if let Err(e) = send_snapshot(&mut sender, &state, &mut sequence).await {
        warn!(error = %e, "failed to send initial WebSocket snapshot");
        return;
    }

    let mut push_interval = interval(PUSH_INTERVAL);
    push_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let current_version = state.current_state_version();
                if current_version != last_sent_version {
                    if let Err(e) = send_snapshot(&mut sender, &state, &mut sequence).await {
                        debug!(error = %e, "WebSocket send failed -- disconnecting");
                        break;
                    }
                    last_sent_version = current_version;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send Pong -- disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket Close frame received -- disconnecting");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(msg = %text, "ignoring WebSocket text message");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error -- disconnecting");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Best effort; the peer may already be gone.
    let _ = sender.send(Message::Close(None)).await;
    info!(messages = sequence, "WebSocket connection closed");
}

/// Serialize and send the current ChartSnapshot.
async fn send_snapshot<S>(
    sender: &mut S,
    state: &ChartState,
    sequence: &mut u64,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let snapshot = state.build_snapshot();

    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            state.ws_sequence_number.fetch_add(1, Ordering::Relaxed);
            *sequence += 1;
            debug!(version = snapshot.version, seq = *sequence, "WebSocket snapshot sent");
            Ok(())
        }
        Err(e) => {
            // Not a network error; keep the connection.
            warn!(error = %e, "failed to serialize chart snapshot");
            Ok(())
        }
    }
}
