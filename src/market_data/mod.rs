pub mod candle_store;
pub mod ticker;
pub mod trades;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle_store::{Candle, CandleStore};
pub use ticker::Ticker;
pub use trades::TradeMarker;
