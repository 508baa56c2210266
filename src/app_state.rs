// =============================================================================
// Shared Chart State
// =============================================================================
//
// What the renderer sees. The feed controller is the only writer of the
// dataset and status; the API handlers only read, and send commands back to
// the controller through its event queue.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for every published value.
//   - The dataset is swapped as a whole `Arc`, together with the status and
//     toggles under one lock, so a reader sees one publish or the next, never
//     a mix.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::chart::ComposedDataset;
use crate::feed::{FeedEvent, FeedSender};
use crate::market_data::{Ticker, TradeMarker};
use crate::runtime_config::IndicatorToggles;
use crate::types::FeedStatus;

/// One publish: the dataset and the status and toggles it was built from.
/// Always replaced together under a single lock.
struct Published {
    dataset: Arc<ComposedDataset>,
    status: FeedStatus,
    indicators: IndicatorToggles,
}

/// Shared across the controller and the API via `Arc<ChartState>`.
pub struct ChartState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every publish. The WebSocket feed uses this to detect
    /// changes and push updates.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    // ── Published by the controller ─────────────────────────────────────
    published: RwLock<Published>,
    ticker: RwLock<Option<Ticker>>,
    trades: RwLock<Vec<TradeMarker>>,

    // ── Command path ────────────────────────────────────────────────────
    commands: FeedSender,

    /// Exchange used when a selection request omits one.
    pub default_exchange: String,

    pub start_time: std::time::Instant,
}

impl ChartState {
    pub fn new(
        commands: FeedSender,
        default_exchange: impl Into<String>,
        indicators: IndicatorToggles,
    ) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),
            published: RwLock::new(Published {
                dataset: Arc::new(ComposedDataset::default()),
                status: FeedStatus::default(),
                indicators,
            }),
            ticker: RwLock::new(None),
            trades: RwLock::new(Vec::new()),
            commands,
            default_exchange: default_exchange.into(),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Writers (controller only) ───────────────────────────────────────

    /// Swap in a freshly composed dataset together with the status and
    /// indicator toggles it was built from.
    pub fn publish(&self, dataset: ComposedDataset, status: FeedStatus, indicators: IndicatorToggles) {
        let dataset = Arc::new(dataset);
        let mut published = self.published.write();
        *published = Published {
            dataset,
            status,
            indicators,
        };
        self.increment_version();
    }

    /// `None` clears the ticker (instrument change).
    pub fn set_ticker(&self, ticker: Option<Ticker>) {
        *self.ticker.write() = ticker;
        self.increment_version();
    }

    pub fn set_trades(&self, trades: Vec<TradeMarker>) {
        *self.trades.write() = trades;
        self.increment_version();
    }

    // ── Readers ─────────────────────────────────────────────────────────

    pub fn dataset(&self) -> Arc<ComposedDataset> {
        Arc::clone(&self.published.read().dataset)
    }

    pub fn status(&self) -> FeedStatus {
        self.published.read().status.clone()
    }

    pub fn indicators(&self) -> IndicatorToggles {
        self.published.read().indicators
    }

    pub fn ticker(&self) -> Option<Ticker> {
        self.ticker.read().clone()
    }

    pub fn trades(&self) -> Vec<TradeMarker> {
        self.trades.read().clone()
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Queue a command for the feed controller.
    pub fn send_command(&self, event: FeedEvent) -> Result<()> {
        self.commands
            .send(event)
            .map_err(|_| anyhow!("feed controller is not running"))
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Everything the renderer needs in one payload. Served by
    /// `GET /api/v1/dataset` (partially) and pushed over `/api/v1/ws`.
    pub fn build_snapshot(&self) -> ChartSnapshot {
        let ticker = self.ticker();
        let published = self.published.read();
        ChartSnapshot {
            version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            status: published.status.clone(),
            indicators: published.indicators,
            dataset: Arc::clone(&published.dataset),
            ticker,
        }
    }
}

/// Serialisable view of the chart state.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSnapshot {
    pub version: u64,
    /// Unix millis.
    pub server_time: i64,
    pub status: FeedStatus,
    pub indicators: IndicatorToggles,
    pub dataset: Arc<ComposedDataset>,
    pub ticker: Option<Ticker>,
}
