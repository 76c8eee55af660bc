use std::sync::Arc;
use tokio::sync::{Mutex, RwLockReadGuard};
use tracing::{info, warn};

use super::sinks::{ContentSink, TradeSink};
use crate::agent::CycleEpoch;
use crate::config::AppConfig;
use crate::domain::{Action, ActionResult, Decision};
use crate::error::{ErrorKind, VigilError};
use crate::retry::{supervise_gated, RetryPolicy};

/// Epoch a call belongs to. `None` means the call is not tied to a cycle.
type Scope<'a> = Option<(&'a CycleEpoch, u64)>;

/// Permit for one sink attempt: `Some(None)` when unscoped, `None` once the epoch has moved on
async fn clearance(scope: Scope<'_>) -> Option<Option<RwLockReadGuard<'_, u64>>> {
    match scope {
        None => Some(None),
        Some((epoch, value)) => epoch.pin(value).await.map(Some),
    }
}

/// Turns decisions into sink calls with bounded retries
pub struct ActionExecutor {
    trade_sink: Arc<dyn TradeSink>,
    content_sink: Arc<dyn ContentSink>,
    policy: RetryPolicy,
    base_amount: f64,
    slippage_bps: u32,
    quote_asset: String,
    /// One side effect at a time, whoever asks for it
    sink_lock: Mutex<()>,
}

impl ActionExecutor {
    pub fn new(
        trade_sink: Arc<dyn TradeSink>,
        content_sink: Arc<dyn ContentSink>,
        config: &AppConfig,
    ) -> Self {
        Self {
            trade_sink,
            content_sink,
            policy: RetryPolicy::from_config(&config.agent),
            base_amount: config.agent.base_amount,
            slippage_bps: config.agent.slippage_bps,
            quote_asset: config.market.quote_asset.clone(),
            sink_lock: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Trade size for a decision: `base_amount * confidence`
    pub fn amount_for(&self, decision: &Decision) -> f64 {
        self.base_amount * decision.confidence
    }

    /// Execute a decision. HOLD never reaches a sink.
    pub async fn execute(&self, decision: &Decision) -> ActionResult {
        self.run(decision, None).await
    }

    /// Execute on behalf of a cycle started under `cycle_epoch`.
    ///
    /// Each sink attempt runs pinned to that epoch, so once `epoch` advances
    /// no further attempt is made and the result carries [`ErrorKind::Internal`].
    pub async fn execute_within(
        &self,
        decision: &Decision,
        epoch: &CycleEpoch,
        cycle_epoch: u64,
    ) -> ActionResult {
        self.run(decision, Some((epoch, cycle_epoch))).await
    }

    async fn run(&self, decision: &Decision, scope: Scope<'_>) -> ActionResult {
        match decision.action {
            Action::Hold => ActionResult::skipped(),
            Action::Buy => {
                self.trade(decision, &self.quote_asset, &decision.symbol, scope)
                    .await
            }
            Action::Sell => {
                self.trade(decision, &decision.symbol, &self.quote_asset, scope)
                    .await
            }
            Action::Post => self.post(decision, scope).await,
        }
    }

    async fn trade(
        &self,
        decision: &Decision,
        from: &str,
        to: &str,
        scope: Scope<'_>,
    ) -> ActionResult {
        let amount = self.amount_for(decision);
        if !(amount.is_finite() && amount > 0.0) {
            warn!(symbol = %decision.symbol, amount, "Trade amount is not positive, skipping");
            return ActionResult::skipped();
        }

        let _guard = self.sink_lock.lock().await;
        let sink = self.trade_sink.as_ref();
        let slippage_bps = self.slippage_bps;

        let outcome = supervise_gated(
            &self.policy,
            sink.name(),
            || clearance(scope),
            |_| sink.execute_trade(from, to, amount, slippage_bps),
        )
        .await;

        match outcome.result {
            Ok(receipt) => {
                info!(
                    action = %decision.action,
                    from,
                    to,
                    amount,
                    slippage_bps,
                    tx_id = %receipt.tx_id,
                    attempts = outcome.attempts,
                    "Trade executed"
                );
                ActionResult::success(outcome.attempts, receipt.tx_id)
            }
            Err(VigilError::Cancelled) => {
                info!(
                    action = %decision.action,
                    attempts = outcome.attempts,
                    "Trade abandoned, cycle superseded"
                );
                ActionResult::failed(outcome.attempts, ErrorKind::Internal)
            }
            Err(e) => {
                warn!(
                    action = %decision.action,
                    from,
                    to,
                    amount,
                    attempts = outcome.attempts,
                    "Trade failed: {}",
                    e
                );
                ActionResult::failed(outcome.attempts, e.kind())
            }
        }
    }

    async fn post(&self, decision: &Decision, scope: Scope<'_>) -> ActionResult {
        let Some(text) = decision.content.as_deref().filter(|t| !t.trim().is_empty()) else {
            warn!(symbol = %decision.symbol, "POST decision without content");
            return ActionResult::failed(0, ErrorKind::Internal);
        };

        let _guard = self.sink_lock.lock().await;
        let sink = self.content_sink.as_ref();

        let outcome = supervise_gated(
            &self.policy,
            sink.name(),
            || clearance(scope),
            |_| sink.publish(text),
        )
        .await;

        match outcome.result {
            Ok(receipt) => {
                info!(
                    post_id = %receipt.post_id,
                    attempts = outcome.attempts,
                    "Market update published"
                );
                ActionResult::success(outcome.attempts, receipt.post_id)
            }
            Err(e) => {
                warn!(attempts = outcome.attempts, "Publish failed: {}", e);
                ActionResult::failed(outcome.attempts, e.kind())
            }
        }
    }
}
