//! Built-in collaborators: one market data source and stand-in sinks

pub mod dexscreener;
pub mod paper;
pub mod social;

pub use dexscreener::DexScreenerSource;
pub use paper::{PaperFill, PaperTradeSink};
pub use social::{LogContentSink, RateLimitedContentSink};
