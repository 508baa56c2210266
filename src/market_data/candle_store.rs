use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle. `timestamp` is the bucket open time in epoch
/// milliseconds and is the only key used to correlate updates.
///
/// Unknown wire fields (`datetime`, `exchange`, `symbol`, `timeframe`) are
/// ignored on deserialisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// What [`CandleStore::apply_update`] did with an incoming candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The in-progress bar was revised.
    ReplacedTail,
    /// A bar older than the tail was revised in place. Unexpected.
    ReplacedInterior,
    /// A new bar opened.
    Appended,
    /// A bar with an unseen timestamp older than the tail was slotted into
    /// its sorted position. Unexpected.
    InsertedOutOfOrder,
}

impl UpdateOutcome {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::ReplacedInterior | Self::InsertedOutOfOrder)
    }
}

// ---------------------------------------------------------------------------
// CandleStore -- bounded, timestamp-keyed series for one selection
// ---------------------------------------------------------------------------

/// Ordered, bounded candle series for one (instrument, timeframe) pair.
///
/// Invariants held after every operation:
/// * timestamps strictly ascending (so at most one candle per timestamp),
/// * `len() <= max_candles`, oldest evicted first.
///
/// The store is owned by a single feed controller and is not shared, so it
/// carries no locking of its own.
#[derive(Debug, Clone)]
pub struct CandleStore {
    candles: VecDeque<Candle>,
    max_candles: usize,
    anomalies: u64,
}

impl CandleStore {
    /// Create an empty store that retains at most `max_candles` (minimum 1).
    pub fn new(max_candles: usize) -> Self {
        let max_candles = max_candles.max(1);
        Self {
            candles: VecDeque::with_capacity(max_candles + 1),
            max_candles,
            anomalies: 0,
        }
    }

    /// Discard everything and install `candles`, keeping the most recent
    /// `max_candles`.
    ///
    /// The source is expected to deliver ascending, unique timestamps. If it
    /// does not, the input is sorted and de-duplicated (last occurrence wins)
    /// so the store invariants still hold.
    pub fn replace_all(&mut self, candles: Vec<Candle>) {
        let ordered = candles
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp);

        let mut incoming = candles;
        if !ordered {
            warn!(
                count = incoming.len(),
                "snapshot not strictly ascending -- sorting and de-duplicating"
            );
            // Stable sort keeps arrival order among equal keys, so keeping the
            // last of each run means "last occurrence wins".
            incoming.sort_by_key(|c| c.timestamp);
            let mut deduped: Vec<Candle> = Vec::with_capacity(incoming.len());
            for candle in incoming {
                match deduped.last_mut() {
                    Some(last) if last.timestamp == candle.timestamp => *last = candle,
                    _ => deduped.push(candle),
                }
            }
            incoming = deduped;
        }

        let skip = incoming.len().saturating_sub(self.max_candles);
        self.candles.clear();
        self.candles.extend(incoming.into_iter().skip(skip));

        debug!(count = self.candles.len(), "candle store replaced");
    }

    /// Merge a single candle into the series.
    ///
    /// * Same timestamp as an existing bar: replace it in place.
    /// * Newer than the tail: append, evicting the oldest bar on overflow.
    /// * Unseen timestamp older than the tail: insert in sorted position.
    pub fn apply_update(&mut self, candle: Candle) -> UpdateOutcome {
        let tail_ts = self.candles.back().map(|c| c.timestamp);
        let outcome = match tail_ts {
            None => {
                self.candles.push_back(candle);
                UpdateOutcome::Appended
            }
            Some(ts) if ts == candle.timestamp => {
                if let Some(tail) = self.candles.back_mut() {
                    *tail = candle;
                }
                UpdateOutcome::ReplacedTail
            }
            Some(ts) if ts < candle.timestamp => {
                self.candles.push_back(candle);
                UpdateOutcome::Appended
            }
            Some(_) => match self
                .candles
                .binary_search_by_key(&candle.timestamp, |c| c.timestamp)
            {
                Ok(pos) => {
                    self.candles[pos] = candle;
                    UpdateOutcome::ReplacedInterior
                }
                Err(pos) => {
                    self.candles.insert(pos, candle);
                    UpdateOutcome::InsertedOutOfOrder
                }
            },
        };

        while self.candles.len() > self.max_candles {
            self.candles.pop_front();
        }

        if outcome.is_anomaly() {
            self.anomalies += 1;
            warn!(
                timestamp = candle.timestamp,
                tail = self.candles.back().map(|c| c.timestamp),
                outcome = ?outcome,
                "update did not target the tail candle"
            );
        }

        outcome
    }

    /// Drop all candles and the anomaly count (selection change).
    pub fn clear(&mut self) {
        self.candles.clear();
        self.anomalies = 0;
    }

    /// The full ordered series, oldest first.
    pub fn candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Number of non-tail updates seen since construction.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_MIN: i64 = 300_000;

    fn closes(store: &CandleStore) -> Vec<f64> {
        store.candles().iter().map(|c| c.close).collect()
    }

    fn sample_candle(timestamp: i64, close: f64) -> Candle {
        Candle {
            timestamp,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    fn series(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| sample_candle(i as i64 * FIVE_MIN, 100.0 + i as f64))
            .collect()
    }

    #[test]
    fn replace_all_keeps_most_recent() {
        let mut store = CandleStore::new(3);
        store.replace_all(series(5));
        assert_eq!(store.len(), 3);
        assert_eq!(closes(&store), vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn replace_all_returns_input_when_short() {
        let mut store = CandleStore::new(100);
        let input = series(10);
        store.replace_all(input.clone());
        let read: Vec<Candle> = store.candles().iter().copied().collect();
        assert_eq!(read, input);
    }

    #[test]
    fn replace_all_discards_previous_content() {
        let mut store = CandleStore::new(10);
        store.replace_all(series(5));
        store.replace_all(vec![sample_candle(42, 1.0)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.last().unwrap().timestamp, 42);
    }

    #[test]
    fn replace_all_sorts_and_dedups_unordered_input() {
        let mut store = CandleStore::new(10);
        store.replace_all(vec![
            sample_candle(2 * FIVE_MIN, 3.0),
            sample_candle(0, 1.0),
            sample_candle(FIVE_MIN, 2.0),
            sample_candle(FIVE_MIN, 2.5),
        ]);
        let ts: Vec<i64> = store.candles().iter().map(|c| c.timestamp).collect();
        assert_eq!(ts, vec![0, FIVE_MIN, 2 * FIVE_MIN]);
        assert_eq!(closes(&store), vec![1.0, 2.5, 3.0]);
    }

    #[test]
    fn tail_update_replaces_in_place() {
        let mut store = CandleStore::new(10);
        store.replace_all(series(4));

        let revised = Candle {
            high: 200.0,
            close: 150.0,
            ..sample_candle(3 * FIVE_MIN, 103.0)
        };
        assert_eq!(store.apply_update(revised), UpdateOutcome::ReplacedTail);
        assert_eq!(store.len(), 4);
        assert_eq!(*store.last().unwrap(), revised);
        assert_eq!(store.anomalies(), 0);
    }

    #[test]
    fn new_timestamp_appends_and_evicts() {
        let mut store = CandleStore::new(3);
        store.replace_all(series(3));

        let outcome = store.apply_update(sample_candle(3 * FIVE_MIN, 103.0));
        assert_eq!(outcome, UpdateOutcome::Appended);
        assert_eq!(store.len(), 3);
        assert_eq!(store.candles().front().unwrap().timestamp, FIVE_MIN);
        assert_eq!(store.last().unwrap().timestamp, 3 * FIVE_MIN);
    }

    #[test]
    fn update_on_empty_store_appends() {
        let mut store = CandleStore::new(3);
        assert_eq!(store.apply_update(sample_candle(0, 1.0)), UpdateOutcome::Appended);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn interior_update_is_anomaly_but_replaces() {
        let mut store = CandleStore::new(10);
        store.replace_all(series(4));

        let outcome = store.apply_update(sample_candle(FIVE_MIN, 999.0));
        assert_eq!(outcome, UpdateOutcome::ReplacedInterior);
        assert_eq!(store.len(), 4);
        assert_eq!(store.candles()[1].close, 999.0);
        assert_eq!(store.anomalies(), 1);
    }

    #[test]
    fn clear_starts_the_next_instrument_fresh() {
        let mut store = CandleStore::new(10);
        store.replace_all(series(4));
        store.apply_update(sample_candle(FIVE_MIN, 999.0));
        assert_eq!(store.anomalies(), 1);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.anomalies(), 0);

        store.replace_all(series(2));
        assert_eq!(store.apply_update(sample_candle(FIVE_MIN, 5.0)), UpdateOutcome::ReplacedTail);
        assert_eq!(store.anomalies(), 0);
    }

    #[test]
    fn stale_unseen_timestamp_keeps_order() {
        let mut store = CandleStore::new(10);
        store.replace_all(vec![sample_candle(0, 1.0), sample_candle(2 * FIVE_MIN, 3.0)]);

        let outcome = store.apply_update(sample_candle(FIVE_MIN, 2.0));
        assert_eq!(outcome, UpdateOutcome::InsertedOutOfOrder);
        assert_eq!(closes(&store), vec![1.0, 2.0, 3.0]);
        assert_eq!(store.anomalies(), 1);
    }

    #[test]
    fn five_minute_snapshot_scenario() {
        let mut store = CandleStore::new(100);
        store.replace_all(series(100));
        assert_eq!(store.len(), 100);

        let tail_ts = 99 * FIVE_MIN;
        let revised = Candle {
            timestamp: tail_ts,
            open: 199.0,
            high: 250.0,
            low: 150.0,
            close: 210.0,
            volume: 999.0,
        };
        store.apply_update(revised);
        assert_eq!(store.len(), 100);
        assert_eq!(*store.last().unwrap(), revised);
        // Everything before the tail is untouched.
        assert_eq!(store.candles()[98], sample_candle(98 * FIVE_MIN, 198.0));

        store.apply_update(sample_candle(100 * FIVE_MIN, 211.0));
        assert_eq!(store.len(), 100);
        assert_eq!(store.candles().front().unwrap().timestamp, FIVE_MIN);
        assert_eq!(store.last().unwrap().timestamp, 100 * FIVE_MIN);
    }

    #[test]
    fn candle_ignores_extra_wire_fields() {
        let json = r#"{
            "type": "ohlcv_update",
            "exchange": "kraken",
            "symbol": "ADA/USD",
            "timeframe": "5m",
            "timestamp": 1700000000000,
            "datetime": "2023-11-14T22:13:20",
            "open": 0.37,
            "high": 0.38,
            "low": 0.36,
            "close": 0.375,
            "volume": 12345.5
        }"#;
        let candle: Candle = serde_json::from_str(json).expect("should parse");
        assert_eq!(candle.timestamp, 1_700_000_000_000);
        assert!((candle.close - 0.375).abs() < f64::EPSILON);
    }
}
