// =============================================================================
// Trade Markers: executed bot trades projected onto the chart
// =============================================================================
//
// The bot journal is an external, read-only source. Rows are parsed one at a
// time so a single malformed row never hides the rest of the journal.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// One executed trade, as much of it as the chart needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMarker {
    /// Trade open time, epoch milliseconds.
    #[serde(alias = "openTime", deserialize_with = "deserialize_open_time")]
    pub open_time: i64,
    #[serde(default, alias = "entryPrice")]
    pub entry_price: Option<f64>,
    #[serde(default, rename = "tp", alias = "take_profit", alias = "takeProfit")]
    pub take_profit: Option<f64>,
    #[serde(default, rename = "sl", alias = "stop_loss", alias = "stopLoss")]
    pub stop_loss: Option<f64>,
    pub symbol: String,
}

impl TradeMarker {
    /// Whether this trade belongs to the displayed instrument.
    pub fn matches_symbol(&self, symbol: &str) -> bool {
        normalize_symbol(&self.symbol) == normalize_symbol(symbol)
    }
}

/// Canonical form for instrument comparison: upper case, separators dropped.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

fn deserialize_open_time<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTime::deserialize(deserializer)? {
        RawTime::Millis(ms) => Ok(ms),
        RawTime::Fractional(ms) if ms.is_finite() => Ok(ms as i64),
        RawTime::Fractional(ms) => Err(serde::de::Error::custom(format!(
            "open_time is not finite: {ms}"
        ))),
        RawTime::Text(s) => parse_timestamp_ms(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a journal timestamp into epoch milliseconds.
///
/// Accepts RFC 3339 (`2024-01-01T12:00:00Z`), offset-less ISO 8601 which the
/// journal writes in UTC (`2024-01-01T12:00:00.123456`), and bare integers.
pub fn parse_timestamp_ms(s: &str) -> Result<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc().timestamp_millis());
    }
    s.parse::<i64>()
        .with_context(|| format!("unrecognised timestamp: {s}"))
}

/// Parse a `GET /bot/trades` body: `{ "trades": [ ... ] }`.
///
/// Malformed rows are logged and skipped; a body without a `trades` array is
/// an error.
pub fn parse_trades_payload(body: &serde_json::Value) -> Result<Vec<TradeMarker>> {
    let rows = body
        .get("trades")
        .and_then(|v| v.as_array())
        .context("trades response missing 'trades' array")?;

    let mut trades = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<TradeMarker>(row.clone()) {
            Ok(trade) => trades.push(trade),
            Err(e) => warn!(error = %e, row = %row, "skipping malformed trade row"),
        }
    }
    Ok(trades)
}
