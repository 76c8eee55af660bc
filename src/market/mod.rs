//! Market data aggregation
//!
//! Merges trade and liquidity feeds into a [`MarketSnapshot`](crate::domain::MarketSnapshot),
//! reading and writing through the cache and falling back to stale data when
//! upstream is down.

pub mod aggregator;
pub mod source;
pub mod volatility;

pub use aggregator::MarketDataAggregator;
pub use source::MarketDataSource;
pub use volatility::VolatilityTracker;
