// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value (at index `period - 1`) is seeded with the SMA of
// the first `period` closes.
// =============================================================================

use super::Series;

/// Compute the EMA series for the given `closes` slice and look-back `period`.
///
/// The result has the same length as `closes`. Indices before `period - 1`
/// are `None`; every later index is `Some` unless the recurrence hits a
/// non-finite value, after which the rest of the series is `None`.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `closes.len() < period` => all `None`
pub fn calculate_ema(closes: &[f64], period: usize) -> Series {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let sma: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return result;
    }
    result[period - 1] = Some(sma);

    let mut prev_ema = sma;
    for (i, &close) in closes.iter().enumerate().skip(period) {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            // A broken recurrence poisons everything after it.
            break;
        }
        result[i] = Some(ema);
        prev_ema = ema;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: build a simple ascending price series.
    fn ascending(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert_eq!(calculate_ema(&[1.0, 2.0, 3.0], 0), vec![None, None, None]);
    }

    #[test]
    fn ema_insufficient_data() {
        assert_eq!(calculate_ema(&[1.0, 2.0], 5), vec![None, None]);
    }

    #[test]
    fn ema_period_equals_length() {
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3);
        assert_eq!(ema.len(), 3);
        assert_eq!(&ema[..2], &[None, None]);
        // Should be the SMA = (2+4+6)/3 = 4.0
        assert!((ema[2].unwrap() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of [1,2,...,10]: SMA seed = 3.0, multiplier = 1/3.
        let closes = ascending(10);
        let ema = calculate_ema(&closes, 5);
        assert_eq!(ema.len(), 10);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        assert!((ema[4].unwrap() - expected).abs() < 1e-10);
        for i in 5..10 {
            expected = closes[i] * mult + expected * (1.0 - mult);
            let got = ema[i].unwrap();
            assert!((got - expected).abs() < 1e-10, "index {i}: got {got}, expected {expected}");
        }
    }

    #[test]
    fn ema_defined_exactly_from_period_minus_one() {
        for period in 1..=20 {
            let ema = calculate_ema(&ascending(30), period);
            for (i, v) in ema.iter().enumerate() {
                assert_eq!(v.is_some(), i + 1 >= period, "period {period}, index {i}");
            }
        }
    }

    #[test]
    fn ema_handles_nan_in_input() {
        let ema = calculate_ema(&[1.0, 2.0, 3.0, f64::NAN, 5.0], 3);
        // Seed survives, everything from the NaN on is undefined.
        assert_eq!(ema[2], Some(2.0));
        assert_eq!(&ema[3..], &[None, None]);
    }

    #[test]
    fn ema_is_deterministic() {
        let closes: Vec<f64> = (0..100).map(|i| (i as f64 * 0.7).sin() * 10.0 + 50.0).collect();
        assert_eq!(calculate_ema(&closes, 20), calculate_ema(&closes, 20));
    }
}
