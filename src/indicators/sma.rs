// =============================================================================
// Simple Moving Average (rolling mean)
// =============================================================================

use super::Series;

/// Trailing mean of `period` closes, index-aligned with the input.
///
/// Index `i` is defined once `i >= period - 1`. A window that contains a
/// non-finite close is `None`.
pub fn calculate_sma(closes: &[f64], period: usize) -> Series {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return result;
    }

    for (end, slot) in result.iter_mut().enumerate().skip(period - 1) {
        *slot = window_mean(&closes[end + 1 - period..=end]);
    }
    result
}

/// Mean of a non-empty window, `None` if any value is non-finite.
pub(crate) fn window_mean(window: &[f64]) -> Option<f64> {
    if window.is_empty() || window.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(window.iter().sum::<f64>() / window.len() as f64)
}
