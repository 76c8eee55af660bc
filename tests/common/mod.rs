#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vigil::agent::{Agent, CommandRouter, ModeController};
use vigil::cache::{BreakerConfig, CacheLayer, MemoryStore};
use vigil::config::AppConfig;
use vigil::domain::{LiquidityData, Mode, TradeData};
use vigil::error::{Result, VigilError};
use vigil::executor::{ActionExecutor, ContentSink, PostReceipt, TradeReceipt, TradeSink};
use vigil::market::{MarketDataAggregator, MarketDataSource};

/// Configurable market feed with optional latency
pub struct StubSource {
    pub volume: f64,
    pub liquidity: f64,
    pub change: f64,
    pub delay: Duration,
    pub down: AtomicBool,
    pub calls: AtomicU32,
}

impl StubSource {
    pub fn new(volume: f64, liquidity: f64, change: f64) -> Self {
        Self {
            volume,
            liquidity,
            change,
            delay: Duration::ZERO,
            down: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl MarketDataSource for StubSource {
    async fn fetch_trade(&self, _symbol: &str) -> Result<TradeData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.down.load(Ordering::SeqCst) {
            return Err(VigilError::TransientFetch("upstream 503".into()));
        }
        Ok(TradeData {
            price: Some(0.002),
            volume_24h: Some(self.volume),
            price_change_24h: Some(self.change),
            last_trade_time: None,
        })
    }

    async fn fetch_liquidity(&self, _symbol: &str) -> Result<LiquidityData> {
        tokio::time::sleep(self.delay).await;
        if self.down.load(Ordering::SeqCst) {
            return Err(VigilError::TransientFetch("upstream 503".into()));
        }
        Ok(LiquidityData {
            liquidity_usd: Some(self.liquidity),
            market_cap: Some(5_000_000.0),
        })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Trade sink that takes `delay` per call and tracks concurrency
#[derive(Default)]
pub struct SlowTradeSink {
    pub delay: Duration,
    pub calls: AtomicU32,
    active: AtomicU32,
    pub overlapped: AtomicBool,
}

impl SlowTradeSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TradeSink for SlowTradeSink {
    async fn execute_trade(
        &self,
        _from: &str,
        _to: &str,
        _amount: f64,
        _slippage_bps: u32,
    ) -> Result<TradeReceipt> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(TradeReceipt {
            tx_id: format!("tx-{}", n),
        })
    }
}

/// Trade sink whose every call is rejected
#[derive(Default)]
pub struct RejectingTradeSink {
    pub calls: AtomicU32,
}

#[async_trait]
impl TradeSink for RejectingTradeSink {
    async fn execute_trade(
        &self,
        _from: &str,
        _to: &str,
        _amount: f64,
        _slippage_bps: u32,
    ) -> Result<TradeReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(VigilError::Execution("route not found".into()))
    }
}

/// Content sink counting publishes
#[derive(Default)]
pub struct CountingContentSink {
    pub published: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl ContentSink for CountingContentSink {
    async fn publish(&self, text: &str) -> Result<PostReceipt> {
        let mut published = self.published.lock().unwrap();
        published.push(text.to_string());
        Ok(PostReceipt {
            post_id: format!("post-{}", published.len()),
        })
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_symbol("BONK");
    config.agent.retry_base_delay_ms = 100;
    config.agent.cycle_interval_ms = 1_000;
    config
}

pub fn agent(
    config: &AppConfig,
    source: Arc<dyn MarketDataSource>,
    trades: Arc<dyn TradeSink>,
    content: Arc<dyn ContentSink>,
) -> Arc<Agent> {
    let cache = Arc::new(CacheLayer::new(
        Arc::new(MemoryStore::new()),
        BreakerConfig::default(),
        config.max_staleness(),
    ));
    let aggregator = MarketDataAggregator::new(source, cache, config);
    let executor = ActionExecutor::new(trades, content, config);
    Arc::new(Agent::new(config.clone(), aggregator, executor))
}

pub fn router(config: &AppConfig, agent: Arc<Agent>) -> CommandRouter {
    let controller = Arc::new(
        ModeController::new(agent.epoch(), agent.clone(), config.agent.cycle_interval())
            .with_hook(Mode::Auto, agent.clone()),
    );
    CommandRouter::new(agent, controller)
}
