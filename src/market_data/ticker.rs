// =============================================================================
// Ticker: last-trade / top-of-book summary for the selected instrument
// =============================================================================
//
// The ticker channel pushes a complete summary on every message. There is no
// merge: each message replaces the previous ticker wholesale.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Latest ticker summary. Every field is optional because venues leave
/// some of them null (e.g. `change` on a fresh listing).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub last: Option<f64>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub datetime: Option<String>,
}

/// Parse a ticker channel message.
///
/// Expected shape:
/// ```json
/// { "type": "ticker", "symbol": "ADA/USD", "last": 0.37, "bid": 0.369, ... }
/// ```
pub fn parse_ticker_message(text: &str) -> Result<Ticker> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse ticker JSON")?;

    if !root.is_object() {
        anyhow::bail!("ticker message is not a JSON object");
    }
    if let Some(kind) = root.get("type").and_then(|v| v.as_str()) {
        if kind != "ticker" {
            anyhow::bail!("unexpected message type on ticker channel: {kind}");
        }
    }

    serde_json::from_value(root).context("ticker message has unexpected field types")
}
