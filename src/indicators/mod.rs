// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator functions over a closing-price sequence.
// Every function returns a `Series` of exactly the input length, index-aligned
// with the candles it was computed from; warm-up and undefined points are
// `None`. No state is carried between calls, so re-running a function on the
// same input always produces the same output.

pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;

pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use rsi::calculate_rsi;

/// One optional value per candle.
pub type Series = Vec<Option<f64>>;
