// =============================================================================
// Shared types used across the chart feed engine
// =============================================================================

use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Candle bucket width. The vocabulary is exhaustive: anything else is
/// rejected at the edge (config, API) before it reaches the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    /// All timeframes, shortest first.
    pub const ALL: [Timeframe; 14] = [
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H8,
        Self::H12,
        Self::D1,
        Self::D3,
        Self::W1,
    ];

    /// Wire representation used in URLs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H12 => "12h",
            Self::D1 => "1d",
            Self::D3 => "3d",
            Self::W1 => "1w",
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::M5
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        match Self::ALL.iter().find(|tf| tf.as_str() == wanted) {
            Some(tf) => Ok(*tf),
            None => bail!("unsupported timeframe: {s}"),
        }
    }
}

/// The (instrument, timeframe) pair the feed is currently scoped to.
///
/// `exchange` is the venue path segment, `symbol` the pair as the venue
/// spells it (e.g. `ADA/USD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl Selection {
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}@{}", self.exchange, self.symbol, self.timeframe)
    }
}

/// Feed controller lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedPhase {
    Idle,
    FetchingSnapshot,
    Connecting,
    Live,
    /// Channel dropped; waiting for a selection change, a manual retry or
    /// (when configured) the reconnect timer.
    Reconnecting,
    Closed,
}

impl Default for FeedPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for FeedPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::FetchingSnapshot => write!(f, "FetchingSnapshot"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Live => write!(f, "Live"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// A user-visible, non-fatal failure of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FeedFault {
    /// Historical fetch failed; live data may still arrive.
    SnapshotFailed(String),
    /// Live channel could not open or dropped with an error.
    ChannelFailed(String),
}

impl std::fmt::Display for FeedFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SnapshotFailed(msg) => write!(f, "snapshot fetch failed: {msg}"),
            Self::ChannelFailed(msg) => write!(f, "live channel failed: {msg}"),
        }
    }
}

/// Status summary published alongside every dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedStatus {
    pub phase: FeedPhase,
    pub selection: Option<Selection>,
    pub fault: Option<FeedFault>,
    pub candle_count: usize,
    pub anomalies: u64,
}
