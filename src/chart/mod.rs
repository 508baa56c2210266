// =============================================================================
// Chart Module
// =============================================================================
//
// Turns the candle series, indicator settings and bot trades into the single
// immutable structure handed to the renderer.

pub mod compositor;

pub use compositor::{compose, ComposedDataset};
