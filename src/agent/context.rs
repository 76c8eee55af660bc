use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::controller::{CycleRunner, ModeHook};
use super::epoch::CycleEpoch;
use super::ledger::{CycleLedger, CycleRecord, CycleStats};
use crate::config::AppConfig;
use crate::domain::{Action, ActionResult, Decision, MarketSnapshot, Mode};
use crate::error::Result;
use crate::executor::ActionExecutor;
use crate::market::MarketDataAggregator;
use crate::strategy::{ContentComposer, DecisionEngine, TemplateComposer};

/// Explicit context threaded through every cycle and command
pub struct Agent {
    config: AppConfig,
    aggregator: Arc<MarketDataAggregator>,
    engine: DecisionEngine,
    executor: Arc<ActionExecutor>,
    composer: Arc<dyn ContentComposer>,
    epoch: Arc<CycleEpoch>,
    ledger: Mutex<CycleLedger>,
    /// Cycles started since auto mode was last entered; drives the post cadence
    auto_cycles: AtomicU64,
    stale_discarded: AtomicU64,
}

/// What happened to a cycle once it finished
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Recorded(CycleRecord),
    /// The epoch moved on while the cycle ran; nothing was executed or recorded after that
    Stale { epoch: u64 },
}

impl CycleOutcome {
    pub fn record(&self) -> Option<&CycleRecord> {
        match self {
            CycleOutcome::Recorded(record) => Some(record),
            CycleOutcome::Stale { .. } => None,
        }
    }
}

impl Agent {
    pub fn new(
        config: AppConfig,
        aggregator: MarketDataAggregator,
        executor: ActionExecutor,
    ) -> Self {
        Self {
            engine: DecisionEngine::from_config(&config),
            config,
            aggregator: Arc::new(aggregator),
            executor: Arc::new(executor),
            composer: Arc::new(TemplateComposer::default()),
            epoch: Arc::new(CycleEpoch::new()),
            ledger: Mutex::new(CycleLedger::default()),
            auto_cycles: AtomicU64::new(0),
            stale_discarded: AtomicU64::new(0),
        }
    }

    pub fn with_composer(mut self, composer: Arc<dyn ContentComposer>) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_ledger_capacity(mut self, capacity: usize) -> Self {
        self.ledger = Mutex::new(CycleLedger::new(capacity));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.market.symbol
    }

    /// Shared with the [`ModeController`](super::ModeController) that drives this agent
    pub fn epoch(&self) -> Arc<CycleEpoch> {
        self.epoch.clone()
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub async fn stats(&self) -> CycleStats {
        self.ledger.lock().await.stats()
    }

    pub async fn recent_cycles(&self, n: usize) -> Vec<CycleRecord> {
        self.ledger.lock().await.recent(n)
    }

    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded.load(Ordering::SeqCst)
    }

    /// Fetch, decide, execute, record. Every stage runs after the previous one finishes.
    pub async fn run_once(&self, epoch: u64) -> CycleOutcome {
        let started_at = Utc::now();
        let symbol = self.symbol().to_string();
        let n = self.auto_cycles.fetch_add(1, Ordering::SeqCst) + 1;

        let snapshot = match self.aggregator.get_snapshot(&symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(epoch, %symbol, "Cycle skipped, no market data: {}", e);
                let result = ActionResult::skipped_with(e.kind());
                return self
                    .record(epoch, &symbol, None, result, started_at)
                    .await;
            }
        };

        let mut decision = self.engine.decide(&snapshot);
        if self.post_due(n, &decision) {
            decision = self.with_content(&snapshot, decision).await;
        }

        if !self.epoch.is_current(epoch).await {
            return self.discard(epoch, "before execution");
        }

        let result = self
            .executor
            .execute_within(&decision, &self.epoch, epoch)
            .await;
        info!(
            epoch,
            cycle = n,
            %symbol,
            action = %decision.action,
            confidence = decision.confidence,
            risk = %decision.risk_level,
            status = %result.status,
            attempts = result.attempts,
            "Cycle finished"
        );

        self.record(epoch, &symbol, Some(decision), result, started_at)
            .await
    }

    fn post_due(&self, n: u64, decision: &Decision) -> bool {
        let every = self.config.market.post_every_n_cycles as u64;
        every > 0 && decision.action == Action::Hold && n % every == 0
    }

    async fn with_content(&self, snapshot: &MarketSnapshot, decision: Decision) -> Decision {
        match self.composer.compose(snapshot, &decision).await {
            Ok(text) => decision.into_post(text),
            Err(e) => {
                warn!(symbol = %snapshot.symbol, "Could not compose market update: {}", e);
                decision
            }
        }
    }

    async fn record(
        &self,
        epoch: u64,
        symbol: &str,
        decision: Option<Decision>,
        result: ActionResult,
        started_at: chrono::DateTime<Utc>,
    ) -> CycleOutcome {
        let Some(_pinned) = self.epoch.pin(epoch).await else {
            return self.discard(epoch, "after execution");
        };

        let record = CycleRecord {
            id: Uuid::new_v4(),
            epoch,
            symbol: symbol.to_string(),
            decision,
            result,
            started_at,
            finished_at: Utc::now(),
        };
        self.ledger.lock().await.push(record.clone());
        CycleOutcome::Recorded(record)
    }

    fn discard(&self, epoch: u64, stage: &str) -> CycleOutcome {
        self.stale_discarded.fetch_add(1, Ordering::SeqCst);
        info!(epoch, stage, "Mode changed during cycle, discarding result");
        CycleOutcome::Stale { epoch }
    }

    /// Snapshot for `symbol`, or the configured symbol
    pub async fn market(&self, symbol: Option<&str>) -> Result<MarketSnapshot> {
        let symbol = symbol.unwrap_or(self.symbol());
        self.aggregator.get_snapshot(symbol).await
    }

    /// Snapshot plus the decision it would produce; nothing is executed
    pub async fn analyze(&self, symbol: Option<&str>) -> Result<(MarketSnapshot, Decision)> {
        let snapshot = self.market(symbol).await?;
        let decision = self.engine.decide(&snapshot);
        Ok((snapshot, decision))
    }

    /// Compose and publish a market update right away
    pub async fn post(&self, symbol: Option<&str>) -> Result<(Decision, ActionResult)> {
        let (snapshot, decision) = self.analyze(symbol).await?;
        let text = self.composer.compose(&snapshot, &decision).await?;
        let decision = decision.into_post(text);
        let result = self.executor.execute(&decision).await;
        Ok((decision, result))
    }
}

#[async_trait]
impl CycleRunner for Agent {
    async fn run_cycle(&self, epoch: u64) {
        self.run_once(epoch).await;
    }
}

#[async_trait]
impl ModeHook for Agent {
    async fn on_enter(&self, mode: Mode) {
        if mode == Mode::Auto {
            self.auto_cycles.store(0, Ordering::SeqCst);
            info!(symbol = %self.symbol(), "Autonomous loop engaged");
        }
    }

    async fn on_exit(&self, mode: Mode) {
        if mode == Mode::Auto {
            let stats = self.stats().await;
            info!(
                recorded = stats.recorded,
                succeeded = stats.succeeded,
                failed = stats.failed,
                skipped = stats.skipped,
                stale = self.stale_discarded(),
                "Autonomous loop disengaged"
            );
        }
        debug!(%mode, "Left mode");
    }
}
