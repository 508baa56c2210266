// =============================================================================
// Inbound OHLCV channel messages
// =============================================================================
//
// The candle channel multiplexes two kinds of JSON object, discriminated by a
// `type` field:
//
//   { "type": "initial_ohlcv", "data": [ {candle}, ... ] }   -> full replace
//   { "type": "ohlcv_update", "timestamp": .., "open": .., ... } -> merge one
//
// Anything else is an error for the caller to log and drop.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::market_data::Candle;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum OhlcvMessage {
    /// Complete history; replaces the store.
    #[serde(rename = "initial_ohlcv")]
    InitialOhlcv { data: Vec<Candle> },
    /// One candle with its fields flattened next to `type`.
    #[serde(rename = "ohlcv_update")]
    OhlcvUpdate(Candle),
}

/// Classify a text frame from the OHLCV channel.
pub fn parse_ohlcv_message(text: &str) -> Result<OhlcvMessage> {
    serde_json::from_str(text).context("failed to parse OHLCV channel message")
}

/// Body of `GET /ohlcv/...`.
#[derive(Debug, Deserialize)]
pub struct SnapshotResponse {
    pub data: Vec<Candle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_initial_snapshot() {
        let json = r#"{
            "type": "initial_ohlcv",
            "exchange": "kraken",
            "symbol": "ADA/USD",
            "timeframe": "5m",
            "data": [
                {"timestamp": 0, "datetime": "1970-01-01T00:00:00", "open": 1, "high": 2, "low": 0.5, "close": 1.5, "volume": 10},
                {"timestamp": 300000, "open": 1.5, "high": 2, "low": 1, "close": 1.8, "volume": 12}
            ]
        }"#;
        match parse_ohlcv_message(json).unwrap() {
            OhlcvMessage::InitialOhlcv { data } => {
                assert_eq!(data.len(), 2);
                assert_eq!(data[1].timestamp, 300_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn classifies_flattened_update() {
        let json = r#"{
            "type": "ohlcv_update", "exchange": "kraken", "symbol": "ADA/USD",
            "timeframe": "5m", "timestamp": 600000, "datetime": "1970-01-01T00:10:00",
            "open": 1.8, "high": 1.9, "low": 1.7, "close": 1.85, "volume": 3.5
        }"#;
        let msg = parse_ohlcv_message(json).unwrap();
        assert_eq!(
            msg,
            OhlcvMessage::OhlcvUpdate(Candle {
                timestamp: 600_000,
                open: 1.8,
                high: 1.9,
                low: 1.7,
                close: 1.85,
                volume: 3.5,
            })
        );
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(parse_ohlcv_message(r#"{"type":"ticker","last":1.0}"#).is_err());
        assert!(parse_ohlcv_message(r#"{"type":"ohlcv_update","timestamp":1}"#).is_err());
        assert!(parse_ohlcv_message(r#"{"data":[]}"#).is_err());
        assert!(parse_ohlcv_message("garbage").is_err());
    }

    #[test]
    fn snapshot_body_parses() {
        let body: SnapshotResponse = serde_json::from_str(
            r#"{"exchange":"kraken","symbol":"ADA/USD","timeframe":"5m","data":[{"timestamp":1,"open":1,"high":1,"low":1,"close":1,"volume":0}]}"#,
        )
        .unwrap();
        assert_eq!(body.data.len(), 1);
    }
}
