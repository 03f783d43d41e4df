pub mod candle_buffer;
pub mod feed;
pub mod pyth;

pub use candle_buffer::{Candle, CandleBuffer, CandleKey};
pub use feed::MarketDataFeed;
pub use pyth::PythClient;
