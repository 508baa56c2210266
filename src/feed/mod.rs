// =============================================================================
// Feed Module
// =============================================================================
//
// Everything that moves market data into the candle store:
//   - `client`     REST snapshot + trade journal fetches (reqwest)
//   - `channel`    push channels (tokio-tungstenite) behind an owned handle
//   - `messages`   classification of inbound channel messages
//   - `transport`  the seam between the controller and real I/O
//   - `trades`     periodic trade journal poller
//   - `controller` the state machine that owns the store
//
// All I/O completions come back to the controller as `FeedEvent`s on a single
// queue, so the store is only ever touched by one task.

pub mod channel;
pub mod client;
pub mod controller;
pub mod messages;
pub mod trades;
pub mod transport;

use tokio::sync::mpsc::UnboundedSender;

use crate::feed::channel::ChannelKind;
use crate::market_data::{Candle, TradeMarker};
use crate::runtime_config::IndicatorUpdate;
use crate::types::Selection;

pub use client::MarketClient;
pub use controller::FeedController;
pub use transport::LiveTransport;

/// Sending half of the controller's event queue.
pub type FeedSender = UnboundedSender<FeedEvent>;

/// Everything the feed controller reacts to. I/O completions carry the
/// selection `generation` they were started for; results for an older
/// generation are discarded.
#[derive(Debug)]
pub enum FeedEvent {
    // ── Commands ───────────────────────────────────────────────────────
    /// Switch to a new (instrument, timeframe) and re-run fetch+connect.
    Select(Selection),
    /// Re-run fetch+connect for the current selection.
    Retry,
    /// Enable/disable indicator families.
    SetIndicators(IndicatorUpdate),
    /// Tear everything down and stop the controller.
    Shutdown,

    // ── I/O completions ────────────────────────────────────────────────
    SnapshotFetched {
        generation: u64,
        result: anyhow::Result<Vec<Candle>>,
    },
    ChannelOpened {
        generation: u64,
        kind: ChannelKind,
    },
    ChannelMessage {
        generation: u64,
        kind: ChannelKind,
        text: String,
    },
    ChannelClosed {
        generation: u64,
        kind: ChannelKind,
        error: Option<String>,
    },
    ReconnectDue {
        generation: u64,
    },
    TradesPolled(Vec<TradeMarker>),
}
