use async_trait::async_trait;

use crate::domain::{LiquidityData, TradeData};
use crate::error::Result;

/// Upstream provider of trade and pool data. Calls may fail transiently.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_trade(&self, symbol: &str) -> Result<TradeData>;

    async fn fetch_liquidity(&self, symbol: &str) -> Result<LiquidityData>;

    fn name(&self) -> &'static str;
}
