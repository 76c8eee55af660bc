use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, VigilError};
use crate::executor::{TradeReceipt, TradeSink};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperFill {
    pub tx_id: String,
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub slippage_bps: u32,
    pub at: DateTime<Utc>,
}

/// Trade sink that only records fills. No chain, no signing.
#[derive(Debug, Default)]
pub struct PaperTradeSink {
    fills: Mutex<Vec<PaperFill>>,
}

impl PaperTradeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fills(&self) -> Vec<PaperFill> {
        self.fills.lock().await.clone()
    }
}

#[async_trait]
impl TradeSink for PaperTradeSink {
    async fn execute_trade(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        slippage_bps: u32,
    ) -> Result<TradeReceipt> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(VigilError::Validation(format!("invalid amount {}", amount)));
        }
        if from == to {
            return Err(VigilError::Validation(format!("cannot swap {} into itself", from)));
        }

        let fill = PaperFill {
            tx_id: format!("paper-{}", Uuid::new_v4()),
            from: from.to_string(),
            to: to.to_string(),
            amount,
            slippage_bps,
            at: Utc::now(),
        };
        info!(
            tx_id = %fill.tx_id,
            from,
            to,
            amount,
            slippage_bps,
            "📝 Paper fill"
        );

        let receipt = TradeReceipt {
            tx_id: fill.tx_id.clone(),
        };
        self.fills.lock().await.push(fill);
        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "paper"
    }
}
