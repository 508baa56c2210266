// =============================================================================
// Dataset Compositor: renderer-ready merge of candles, indicators & trades
// =============================================================================
//
// `compose` is a pure function of its inputs: the same candles, toggles,
// parameters and trades always produce a structurally equal dataset. The
// caller publishes each result behind an `Arc` and never mutates it again;
// the next change produces a fresh dataset.
//
// Layout:
//   - base OHLC series (always present) defining the shared time axis,
//   - one line series per enabled indicator output, tagged with a stable id,
//     a label and a style whose `axis` says where it belongs
//       Price      -> overlays drawn on the candle scale (EMA pair, Bollinger)
//       Oscillator -> a separate 0..100 scale (RSI)
//   - horizontal guide levels for the oscillator axis,
//   - trade-marker point series for the displayed instrument, one per
//     category, empty categories omitted.
// =============================================================================

use serde::Serialize;

use crate::indicators::{calculate_bollinger, calculate_ema, calculate_rsi, Series};
use crate::market_data::{Candle, TradeMarker};
use crate::runtime_config::{IndicatorParams, IndicatorToggles};
use crate::types::Selection;

// =============================================================================
// Dataset types
// =============================================================================

/// Which scale a series is drawn against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Price,
    Oscillator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: &'static str,
    pub width: f32,
    pub dashed: bool,
    pub axis: Axis,
}

/// One indicator output, index-aligned with `ComposedDataset::times`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    /// Stable identifier, unchanged across recompositions.
    pub id: &'static str,
    pub label: String,
    pub style: LineStyle,
    pub values: Series,
}

/// Fixed horizontal reference line (e.g. RSI 70).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideLevel {
    pub axis: Axis,
    pub value: f64,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Entry,
    TakeProfit,
    StopLoss,
}

impl MarkerKind {
    const ALL: [MarkerKind; 3] = [Self::Entry, Self::TakeProfit, Self::StopLoss];

    fn label(&self) -> &'static str {
        match self {
            Self::Entry => "Entry",
            Self::TakeProfit => "Take Profit",
            Self::StopLoss => "Stop Loss",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            Self::Entry => "#2962ff",
            Self::TakeProfit => "#26a69a",
            Self::StopLoss => "#ef5350",
        }
    }

    fn price_of(&self, trade: &TradeMarker) -> Option<f64> {
        match self {
            Self::Entry => trade.entry_price,
            Self::TakeProfit => trade.take_profit,
            Self::StopLoss => trade.stop_loss,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerPoint {
    pub time: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSeries {
    pub kind: MarkerKind,
    pub label: &'static str,
    pub color: &'static str,
    pub points: Vec<MarkerPoint>,
}

/// Everything a renderer needs for one frame of the chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposedDataset {
    pub selection: Option<Selection>,
    /// Shared time axis (candle timestamps, ascending).
    pub times: Vec<i64>,
    pub candles: Vec<Candle>,
    pub lines: Vec<LineSeries>,
    pub guides: Vec<GuideLevel>,
    pub markers: Vec<MarkerSeries>,
}

impl ComposedDataset {
    /// Look up a line series by its stable id.
    pub fn line(&self, id: &str) -> Option<&LineSeries> {
        self.lines.iter().find(|l| l.id == id)
    }
}

// =============================================================================
// Styles
// =============================================================================

const EMA_FAST_STYLE: LineStyle = LineStyle {
    color: "#f7a21b",
    width: 1.5,
    dashed: false,
    axis: Axis::Price,
};
const EMA_SLOW_STYLE: LineStyle = LineStyle {
    color: "#7e57c2",
    width: 1.5,
    dashed: false,
    axis: Axis::Price,
};
const BB_BAND_STYLE: LineStyle = LineStyle {
    color: "#90a4ae",
    width: 1.0,
    dashed: true,
    axis: Axis::Price,
};
const BB_MIDDLE_STYLE: LineStyle = LineStyle {
    color: "#90a4ae",
    width: 1.0,
    dashed: false,
    axis: Axis::Price,
};
const RSI_STYLE: LineStyle = LineStyle {
    color: "#ab47bc",
    width: 1.5,
    dashed: false,
    axis: Axis::Oscillator,
};

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

// =============================================================================
// Composition
// =============================================================================

/// Build a fresh dataset from the current candle series and settings.
///
/// `trades` may contain any instrument; only those matching the selection's
/// symbol are projected. Without a selection no markers are emitted.
pub fn compose(
    selection: Option<&Selection>,
    candles: Vec<Candle>,
    toggles: IndicatorToggles,
    params: &IndicatorParams,
    trades: &[TradeMarker],
) -> ComposedDataset {
    let times: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let mut lines = Vec::new();
    let mut guides = Vec::new();

    if toggles.ema {
        lines.push(LineSeries {
            id: "ema_fast",
            label: format!("EMA {}", params.ema_fast),
            style: EMA_FAST_STYLE,
            values: calculate_ema(&closes, params.ema_fast),
        });
        lines.push(LineSeries {
            id: "ema_slow",
            label: format!("EMA {}", params.ema_slow),
            style: EMA_SLOW_STYLE,
            values: calculate_ema(&closes, params.ema_slow),
        });
    }

    if toggles.bollinger {
        let bands = calculate_bollinger(&closes, params.bollinger_period, params.bollinger_std);
        let suffix = format!("({}, {})", params.bollinger_period, params.bollinger_std);
        lines.push(LineSeries {
            id: "bb_upper",
            label: format!("BB Upper {suffix}"),
            style: BB_BAND_STYLE,
            values: bands.upper,
        });
        lines.push(LineSeries {
            id: "bb_middle",
            label: format!("BB Middle {suffix}"),
            style: BB_MIDDLE_STYLE,
            values: bands.middle,
        });
        lines.push(LineSeries {
            id: "bb_lower",
            label: format!("BB Lower {suffix}"),
            style: BB_BAND_STYLE,
            values: bands.lower,
        });
    }

    if toggles.rsi {
        lines.push(LineSeries {
            id: "rsi",
            label: format!("RSI {}", params.rsi_period),
            style: RSI_STYLE,
            values: calculate_rsi(&closes, params.rsi_period),
        });
        guides.push(GuideLevel {
            axis: Axis::Oscillator,
            value: RSI_OVERBOUGHT,
            label: "Overbought",
        });
        guides.push(GuideLevel {
            axis: Axis::Oscillator,
            value: RSI_OVERSOLD,
            label: "Oversold",
        });
    }

    let markers = match selection {
        Some(sel) => trade_markers(&sel.symbol, trades),
        None => Vec::new(),
    };

    ComposedDataset {
        selection: selection.cloned(),
        times,
        candles,
        lines,
        guides,
        markers,
    }
}

/// Group the displayed instrument's trades into per-category point series.
fn trade_markers(symbol: &str, trades: &[TradeMarker]) -> Vec<MarkerSeries> {
    let relevant: Vec<&TradeMarker> = trades.iter().filter(|t| t.matches_symbol(symbol)).collect();

    MarkerKind::ALL
        .iter()
        .filter_map(|kind| {
            let points: Vec<MarkerPoint> = relevant
                .iter()
                .filter_map(|t| {
                    kind.price_of(t)
                        .filter(|p| p.is_finite())
                        .map(|price| MarkerPoint {
                            time: t.open_time,
                            price,
                        })
                })
                .collect();
            (!points.is_empty()).then(|| MarkerSeries {
                kind: *kind,
                label: kind.label(),
                color: kind.color(),
                points,
            })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timeframe;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 4.0 + i as f64 * 0.05;
                Candle {
                    timestamp: i as i64 * 300_000,
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0 + i as f64,
                }
            })
            .collect()
    }

    fn selection() -> Selection {
        Selection::new("kraken", "ADA/USD", Timeframe::M5)
    }

    fn trade(symbol: &str, entry: Option<f64>, tp: Option<f64>, sl: Option<f64>) -> TradeMarker {
        TradeMarker {
            open_time: 600_000,
            entry_price: entry,
            take_profit: tp,
            stop_loss: sl,
            symbol: symbol.to_string(),
        }
    }

    const ALL_ON: IndicatorToggles = IndicatorToggles {
        ema: true,
        rsi: true,
        bollinger: true,
    };

    #[test]
    fn base_series_always_present() {
        let ds = compose(
            Some(&selection()),
            candles(10),
            IndicatorToggles::default(),
            &IndicatorParams::default(),
            &[],
        );
        assert_eq!(ds.times.len(), 10);
        assert_eq!(ds.candles.len(), 10);
        assert!(ds.lines.is_empty());
        assert!(ds.guides.is_empty());
        assert!(ds.markers.is_empty());
    }

    #[test]
    fn every_line_is_index_aligned() {
        let ds = compose(Some(&selection()), candles(120), ALL_ON, &IndicatorParams::default(), &[]);
        assert_eq!(ds.lines.len(), 6);
        for line in &ds.lines {
            assert_eq!(line.values.len(), ds.times.len(), "{} misaligned", line.id);
        }
    }

    #[test]
    fn rsi_lives_on_oscillator_axis() {
        let ds = compose(Some(&selection()), candles(30), ALL_ON, &IndicatorParams::default(), &[]);
        assert_eq!(ds.line("rsi").unwrap().style.axis, Axis::Oscillator);
        assert_eq!(ds.line("ema_fast").unwrap().style.axis, Axis::Price);
        assert_eq!(ds.line("bb_middle").unwrap().style.axis, Axis::Price);
        assert!(ds.guides.iter().all(|g| g.axis == Axis::Oscillator));
    }

    #[test]
    fn composition_is_deterministic() {
        let params = IndicatorParams::default();
        let trades = vec![trade("ADA/USD", Some(100.0), Some(101.0), Some(99.0))];
        let a = compose(Some(&selection()), candles(100), ALL_ON, &params, &trades);
        let b = compose(Some(&selection()), candles(100), ALL_ON, &params, &trades);
        assert_eq!(a, b);
    }

    #[test]
    fn rsi_with_too_few_closes_is_undefined_then_removed() {
        let params = IndicatorParams::default();
        let on = IndicatorToggles {
            rsi: true,
            ..IndicatorToggles::default()
        };
        let ds = compose(Some(&selection()), candles(13), on, &params, &[]);
        let rsi = ds.line("rsi").expect("rsi enabled");
        assert_eq!(rsi.values.len(), 13);
        assert!(rsi.values.iter().all(Option::is_none));

        let ds = compose(Some(&selection()), candles(13), IndicatorToggles::default(), &params, &[]);
        assert!(ds.line("rsi").is_none());
        assert!(ds.guides.is_empty());
    }

    #[test]
    fn markers_filtered_to_instrument_and_empty_categories_skipped() {
        let trades = vec![
            trade("ADA/USD", Some(100.0), None, Some(98.0)),
            trade("XBT/USD", Some(40_000.0), Some(41_000.0), Some(39_000.0)),
            trade("adausd", Some(101.0), None, None),
        ];
        let ds = compose(
            Some(&selection()),
            candles(10),
            IndicatorToggles::default(),
            &IndicatorParams::default(),
            &trades,
        );
        let kinds: Vec<MarkerKind> = ds.markers.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MarkerKind::Entry, MarkerKind::StopLoss]);
        assert_eq!(ds.markers[0].points.len(), 2);
        assert_eq!(ds.markers[1].points, vec![MarkerPoint { time: 600_000, price: 98.0 }]);
    }

    #[test]
    fn no_selection_means_no_markers() {
        let trades = vec![trade("ADA/USD", Some(100.0), None, None)];
        let ds = compose(None, Vec::new(), ALL_ON, &IndicatorParams::default(), &trades);
        assert!(ds.markers.is_empty());
        assert!(ds.selection.is_none());
        assert!(ds.lines.iter().all(|l| l.values.is_empty()));
    }

    #[test]
    fn labels_follow_params() {
        let params = IndicatorParams {
            ema_fast: 9,
            ema_slow: 21,
            ..IndicatorParams::default()
        };
        let ds = compose(Some(&selection()), candles(30), ALL_ON, &params, &[]);
        assert_eq!(ds.line("ema_fast").unwrap().label, "EMA 9");
        assert_eq!(ds.line("ema_slow").unwrap().label, "EMA 21");
        assert_eq!(ds.line("bb_upper").unwrap().label, "BB Upper (20, 2)");
    }
}
