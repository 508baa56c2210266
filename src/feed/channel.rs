// =============================================================================
// Push Channels: OHLCV and ticker WebSocket streams
// =============================================================================
//
// A channel is one spawned task reading one WebSocket. The task never touches
// feed state: it forwards open / text / close as `FeedEvent`s tagged with the
// generation it was opened for. The controller holds the only
// `ChannelHandle` for each kind; closing or dropping the handle aborts the
// task, which is what guarantees at most one live channel per kind.
// =============================================================================

use futures_util::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::feed::{FeedEvent, FeedSender};
use crate::types::Selection;

/// Which push channel an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Ohlcv,
    Ticker,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ohlcv => write!(f, "ohlcv"),
            Self::Ticker => write!(f, "ticker"),
        }
    }
}

/// Build the channel URL for `kind` under `ws_base` (`ws://host:port`).
///
/// ```text
/// {ws_base}/ws/ohlcv/{exchange}/{symbol}/{timeframe}
/// {ws_base}/ws/ticker/{exchange}/{symbol}
/// ```
pub fn channel_url(ws_base: &str, kind: ChannelKind, selection: &Selection) -> String {
    let base = ws_base.trim_end_matches('/');
    match kind {
        ChannelKind::Ohlcv => format!(
            "{base}/ws/ohlcv/{}/{}/{}",
            selection.exchange, selection.symbol, selection.timeframe
        ),
        ChannelKind::Ticker => format!(
            "{base}/ws/ticker/{}/{}",
            selection.exchange, selection.symbol
        ),
    }
}

// ---------------------------------------------------------------------------
// Owned handle
// ---------------------------------------------------------------------------

/// Exclusive ownership of one running channel task.
pub struct ChannelHandle {
    kind: ChannelKind,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn spawned(kind: ChannelKind, generation: u64, task: JoinHandle<()>) -> Self {
        Self {
            kind,
            generation,
            task: Some(task),
        }
    }

    /// Abort the channel task immediately.
    pub fn close(mut self) {
        self.abort();
        debug!(kind = %self.kind, generation = self.generation, "channel closed");
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .field("running", &self.task.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Channel task
// ---------------------------------------------------------------------------

/// Connect to `url` and forward everything to `events` until the socket
/// closes, errors, or the controller goes away.
///
/// Exactly one `ChannelClosed` is sent unless the controller has dropped its
/// receiver or the task is aborted.
pub async fn run_channel(url: String, kind: ChannelKind, generation: u64, events: FeedSender) {
    info!(url = %url, kind = %kind, generation, "connecting to channel");

    let mut ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            error!(url = %url, kind = %kind, error = %e, "channel connect failed");
            let _ = events.send(FeedEvent::ChannelClosed {
                generation,
                kind,
                error: Some(format!("failed to connect to {url}: {e}")),
            });
            return;
        }
    };

    info!(kind = %kind, generation, "channel connected");
    if events.send(FeedEvent::ChannelOpened { generation, kind }).is_err() {
        return;
    }

    // Reading through the unsplit stream lets tungstenite answer pings.
    let error = loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let event = FeedEvent::ChannelMessage {
                    generation,
                    kind,
                    text,
                };
                if events.send(event).is_err() {
                    debug!(kind = %kind, "controller gone -- dropping channel");
                    return;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                info!(kind = %kind, frame = ?frame, "channel closed by server");
                break None;
            }
            // Ping / Pong / Binary / Frame carry nothing for us.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(kind = %kind, error = %e, "channel read error");
                break Some(e.to_string());
            }
            None => {
                warn!(kind = %kind, "channel stream ended");
                break None;
            }
        }
    };

    let _ = events.send(FeedEvent::ChannelClosed {
        generation,
        kind,
        error,
    });
}
