pub mod candle_buffer;
pub mod simulated_feed;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle_buffer::{Candle, CandleBuffer, CandleKey};
pub use simulated_feed::SimulatedFeed;
