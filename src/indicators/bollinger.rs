// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the population standard deviation
// of the same trailing window.

use super::sma::calculate_sma;
use super::Series;

pub const DEFAULT_BOLLINGER_PERIOD: usize = 20;
pub const DEFAULT_BOLLINGER_STD: f64 = 2.0;

/// The three bands, each index-aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

/// Calculate Bollinger Bands for the given closing prices.
///
/// `middle` is exactly [`calculate_sma`] for the same `period`; `upper` and
/// `lower` are defined wherever `middle` is, symmetric around it.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> BollingerBands {
    let middle = calculate_sma(closes, period);
    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];

    for (end, mean) in middle.iter().enumerate() {
        let Some(mean) = *mean else { continue };
        let window = &closes[end + 1 - period..=end];
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let offset = num_std * variance.sqrt();
        if offset.is_finite() {
            upper[end] = Some(mean + offset);
            lower[end] = Some(mean - offset);
        }
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}
