use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReceipt {
    pub tx_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostReceipt {
    pub post_id: String,
}

/// Swaps `amount` of `from` into `to`
#[async_trait]
pub trait TradeSink: Send + Sync {
    async fn execute_trade(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        slippage_bps: u32,
    ) -> Result<TradeReceipt>;

    fn name(&self) -> &'static str {
        "trade"
    }
}

/// Publishes text to a social channel
#[async_trait]
pub trait ContentSink: Send + Sync {
    async fn publish(&self, text: &str) -> Result<PostReceipt>;

    fn name(&self) -> &'static str {
        "content"
    }
}
