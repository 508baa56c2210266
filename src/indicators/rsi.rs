// =============================================================================
// Relative Strength Index (RSI): Wilder's Smoothing
// =============================================================================
//
// Step 1: Compute price changes (deltas) from consecutive closes.
// Step 2: Seed average gain / average loss with the mean of the first
//          `period` gains / losses. The first RSI lands on close `period`.
// Step 3: Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4: RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// A zero average loss saturates RSI at 100.
// =============================================================================

use super::Series;

/// Default look-back used by the chart.
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Compute the RSI series for `closes`, index-aligned with the input.
///
/// Indices `0..period` are `None` (the first `period` deltas seed the
/// averages). Values are clamped to `[0, 100]`.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `closes.len() < period + 1` => all `None`
/// - A non-finite close leaves the rest of the series `None`.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Series {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return result;
    }

    // --- Seed averages from the first `period` deltas -----------------------
    // `f64::max` swallows NaN, so finiteness is checked before folding.
    if closes[..=period].iter().any(|c| !c.is_finite()) {
        return result;
    }
    let (sum_gain, sum_loss) = closes[..=period]
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0_f64, 0.0_f64), |(g, l), d| (g + d.max(0.0), l + (-d).max(0.0)));

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    match rsi_from_averages(avg_gain, avg_loss) {
        Some(rsi) => result[period] = Some(rsi),
        None => return result,
    }

    // --- Wilder's smoothing for subsequent values ----------------------------
    for i in (period + 1)..closes.len() {
        let delta = closes[i] - closes[i - 1];
        if !delta.is_finite() {
            break;
        }
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => result[i] = Some(rsi),
            None => break,
        }
    }

    result
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// Returns `None` when either average is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if !avg_gain.is_finite() || !avg_loss.is_finite() {
        return None;
    }
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    rsi.is_finite().then(|| rsi.clamp(0.0, 100.0))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn rsi_period_zero() {
        assert_eq!(calculate_rsi(&[1.0, 2.0, 3.0], 0), vec![None; 3]);
    }

    #[test]
    fn rsi_fewer_than_period_closes_is_undefined() {
        // 14 closes => 13 deltas < 14.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), 14);
        assert!(series.iter().all(Option::is_none));
    }

    #[test]
    fn rsi_first_value_at_period() {
        let closes: Vec<f64> = (1..=15).map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert!(series[..14].iter().all(Option::is_none));
        assert!(series[14].is_some());
    }

    #[test]
    fn rsi_monotonic_rise_saturates_at_100() {
        let closes: Vec<f64> = (1..=40).map(|x| x as f64 * 1.5).collect();
        let series = calculate_rsi(&closes, 14);
        for v in series.iter().flatten() {
            assert!((0.0..=100.0).contains(v));
            assert!((v - 100.0).abs() < 1e-10, "expected 100.0, got {v}");
        }
    }

    #[test]
    fn rsi_converges_to_100_after_early_dip() {
        let mut closes = vec![10.0, 9.0, 8.0];
        closes.extend((0..200).map(|i| 8.0 + i as f64));
        let series = calculate_rsi(&closes, 14);
        let values: Vec<f64> = series.iter().flatten().copied().collect();
        assert!(values.windows(2).all(|w| w[1] >= w[0] - 1e-12));
        assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
        assert!(*values.last().unwrap() > 99.9);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14);
        for v in series.iter().flatten() {
            assert!(v.abs() < 1e-10, "expected 0.0, got {v}");
        }
    }

    #[test]
    fn rsi_wilder_reference_first_value() {
        // Classic Wilder worked example (first 15 closes).
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28,
        ];
        let series = calculate_rsi(&closes, 14);
        let first = series[14].unwrap();
        assert!((first - 70.464).abs() < 0.001, "got {first}");
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let series = calculate_rsi(&closes, 14);
        for v in series.iter().flatten() {
            assert!((0.0..=100.0).contains(v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_nan_truncates() {
        let mut closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        closes[17] = f64::NAN;
        let series = calculate_rsi(&closes, 14);
        assert!(series[16].is_some());
        assert!(series[17..].iter().all(Option::is_none));
    }
}
