use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::source::MarketDataSource;
use super::volatility::VolatilityTracker;
use crate::cache::CacheLayer;
use crate::config::{AppConfig, ThresholdConfig};
use crate::domain::{coerce, ConfidenceLevel, LiquidityData, MarketSnapshot, TradeData};
use crate::error::{Result, VigilError};
use crate::retry::{supervise, RetryPolicy};

/// Builds market snapshots from a [`MarketDataSource`], cached through [`CacheLayer`]
pub struct MarketDataAggregator {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<CacheLayer>,
    thresholds: ThresholdConfig,
    ttl_seconds: u64,
    max_staleness: Duration,
    fetch_policy: RetryPolicy,
    /// Serializes live fetches so a chat command never races an auto cycle
    fetch_lock: Mutex<()>,
    volatility: Mutex<VolatilityTracker>,
}

impl MarketDataAggregator {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: Arc<CacheLayer>,
        config: &AppConfig,
    ) -> Self {
        Self {
            source,
            cache,
            thresholds: config.thresholds.clone(),
            ttl_seconds: config.agent.cache_ttl_s as u64,
            max_staleness: config.max_staleness(),
            fetch_policy: RetryPolicy::from_config(&config.agent),
            fetch_lock: Mutex::new(()),
            volatility: Mutex::new(VolatilityTracker::default()),
        }
    }

    /// Override the retry policy used for upstream fetches
    pub fn with_fetch_policy(mut self, policy: RetryPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn cache_key(symbol: &str) -> String {
        format!("marketData:{}", symbol)
    }

    /// Cached snapshot if fresh, otherwise a live one; stale within the ceiling if upstream fails
    pub async fn get_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let key = Self::cache_key(symbol);

        if let Some(snapshot) = self.cache.get_json::<MarketSnapshot>(&key).await {
            debug!(symbol, "Serving snapshot from cache");
            return Ok(snapshot);
        }

        match self.fetch_live(symbol).await {
            Ok(snapshot) => {
                self.cache.set_json(&key, &snapshot, self.ttl_seconds).await;
                Ok(snapshot)
            }
            Err(e) => self.degraded_snapshot(symbol, &key, e).await,
        }
    }

    /// Skip the cache read and fetch from upstream, refreshing the cache on success
    pub async fn refresh(&self, symbol: &str) -> Result<MarketSnapshot> {
        let snapshot = self.fetch_live(symbol).await?;
        self.cache
            .set_json(&Self::cache_key(symbol), &snapshot, self.ttl_seconds)
            .await;
        Ok(snapshot)
    }

    async fn fetch_live(&self, symbol: &str) -> Result<MarketSnapshot> {
        let _guard = self.fetch_lock.lock().await;
        let source = self.source.as_ref();

        let (trade, liquidity) = tokio::join!(
            supervise(&self.fetch_policy, "fetch_trade", |_| source.fetch_trade(symbol)),
            supervise(&self.fetch_policy, "fetch_liquidity", |_| source
                .fetch_liquidity(symbol)),
        );

        let trade = trade.result.map_err(|e| transient(source.name(), "trade", e))?;
        let liquidity = liquidity
            .result
            .map_err(|e| transient(source.name(), "liquidity", e))?;

        let snapshot = self.merge(symbol, &trade, &liquidity).await;
        info!(
            symbol,
            price = snapshot.price,
            volume_24h = snapshot.volume_24h,
            liquidity = snapshot.liquidity_usd,
            confidence = %snapshot.confidence_level,
            "Fetched live market snapshot"
        );
        Ok(snapshot)
    }

    async fn merge(
        &self,
        symbol: &str,
        trade: &TradeData,
        liquidity: &LiquidityData,
    ) -> MarketSnapshot {
        let volume_24h = coerce(trade.volume_24h);
        let liquidity_usd = coerce(liquidity.liquidity_usd);
        let price_change_24h = coerce(trade.price_change_24h);

        let volatility = self
            .volatility
            .lock()
            .await
            .observe(symbol, price_change_24h);

        MarketSnapshot {
            symbol: symbol.to_string(),
            price: coerce(trade.price),
            volume_24h,
            market_cap: coerce(liquidity.market_cap),
            price_change_24h,
            liquidity_usd,
            volatility,
            confidence_level: ConfidenceLevel::classify(
                volume_24h,
                liquidity_usd,
                &self.thresholds,
            ),
            captured_at: Utc::now(),
            degraded: false,
        }
    }

    async fn degraded_snapshot(
        &self,
        symbol: &str,
        key: &str,
        cause: VigilError,
    ) -> Result<MarketSnapshot> {
        let previous = self
            .cache
            .peek(key)
            .await
            .and_then(|entry| serde_json::from_str::<MarketSnapshot>(&entry.value).ok());

        let Some(previous) = previous else {
            warn!(symbol, "Live fetch failed and nothing cached: {}", cause);
            return Err(VigilError::DataUnavailable(format!(
                "{}: {}",
                symbol, cause
            )));
        };

        let age = previous.age_at(Utc::now());
        let ceiling = chrono::Duration::from_std(self.max_staleness)
            .unwrap_or_else(|_| chrono::Duration::zero());
        if age > ceiling {
            warn!(
                symbol,
                age_secs = age.num_seconds(),
                ceiling_secs = ceiling.num_seconds(),
                "Cached snapshot too stale to serve: {}",
                cause
            );
            return Err(VigilError::DataUnavailable(format!(
                "{}: last snapshot is {}s old ({})",
                symbol,
                age.num_seconds(),
                cause
            )));
        }

        warn!(
            symbol,
            age_secs = age.num_seconds(),
            "Serving degraded snapshot: {}",
            cause
        );
        Ok(previous.into_degraded())
    }
}

fn transient(source: &str, feed: &str, e: VigilError) -> VigilError {
    match e {
        VigilError::TransientFetch(_) => e,
        other => VigilError::TransientFetch(format!("{} {} feed: {}", source, feed, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BreakerConfig, MemoryStore};
    use crate::domain::MarketSnapshot;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct StubSource {
        trade: TradeData,
        liquidity: LiquidityData,
        down: AtomicBool,
        calls: AtomicU32,
    }

    impl StubSource {
        fn new(volume: f64, liquidity: f64) -> Self {
            Self {
                trade: TradeData {
                    price: Some(0.002),
                    volume_24h: Some(volume),
                    price_change_24h: Some(4.5),
                    last_trade_time: None,
                },
                liquidity: LiquidityData {
                    liquidity_usd: Some(liquidity),
                    market_cap: None,
                },
                down: AtomicBool::new(false),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for StubSource {
        async fn fetch_trade(&self, _symbol: &str) -> Result<TradeData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(VigilError::TransientFetch("502 bad gateway".into()));
            }
            Ok(self.trade.clone())
        }

        async fn fetch_liquidity(&self, _symbol: &str) -> Result<LiquidityData> {
            if self.down.load(Ordering::SeqCst) {
                return Err(VigilError::TransientFetch("502 bad gateway".into()));
            }
            Ok(self.liquidity.clone())
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn cache() -> Arc<CacheLayer> {
        Arc::new(CacheLayer::new(
            Arc::new(MemoryStore::new()),
            BreakerConfig::default(),
            Duration::from_secs(3_600),
        ))
    }

    fn aggregator(source: Arc<StubSource>, cache: Arc<CacheLayer>, ttl: u32) -> MarketDataAggregator {
        let mut config = AppConfig::for_symbol("BONK");
        config.agent.cache_ttl_s = ttl;
        MarketDataAggregator::new(source, cache, &config).with_fetch_policy(RetryPolicy::none())
    }

    fn old_snapshot(age_secs: i64) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BONK".into(),
            price: 0.001,
            volume_24h: 20_000.0,
            market_cap: 0.0,
            price_change_24h: 1.0,
            liquidity_usd: 20_000.0,
            volatility: Default::default(),
            confidence_level: ConfidenceLevel::Medium,
            captured_at: Utc::now() - chrono::Duration::seconds(age_secs),
            degraded: false,
        }
    }

    #[tokio::test]
    async fn merges_and_classifies_high_confidence() {
        let source = Arc::new(StubSource::new(150_000.0, 60_000.0));
        let agg = aggregator(source, cache(), 300);

        let snapshot = agg.get_snapshot("BONK").await.unwrap();
        assert_eq!(snapshot.confidence_level, ConfidenceLevel::High);
        assert_eq!(snapshot.market_cap, 0.0);
        assert_eq!(snapshot.price, 0.002);
        assert!(!snapshot.degraded);
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let source = Arc::new(StubSource::new(20_000.0, 20_000.0));
        let agg = aggregator(source.clone(), cache(), 300);

        let first = agg.get_snapshot("BONK").await.unwrap();
        let second = agg.get_snapshot("BONK").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        agg.refresh("BONK").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn serves_stale_snapshot_within_ceiling() {
        let source = Arc::new(StubSource::new(20_000.0, 20_000.0));
        source.down.store(true, Ordering::SeqCst);
        let cache = cache();
        // Expired entry (ttl 0) holding a snapshot captured 100s ago
        cache
            .set_json(&MarketDataAggregator::cache_key("BONK"), &old_snapshot(100), 0)
            .await;

        let agg = aggregator(source, cache, 300);
        let snapshot = agg.get_snapshot("BONK").await.unwrap();
        assert!(snapshot.degraded);
        assert_eq!(snapshot.price, 0.001);
    }

    #[tokio::test]
    async fn stale_beyond_ceiling_is_unavailable() {
        let source = Arc::new(StubSource::new(20_000.0, 20_000.0));
        source.down.store(true, Ordering::SeqCst);
        let cache = cache();
        cache
            .set_json(&MarketDataAggregator::cache_key("BONK"), &old_snapshot(700), 0)
            .await;

        let agg = aggregator(source, cache, 300);
        let err = agg.get_snapshot("BONK").await.unwrap_err();
        assert!(matches!(err, VigilError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn nothing_cached_and_upstream_down_is_unavailable() {
        let source = Arc::new(StubSource::new(20_000.0, 20_000.0));
        source.down.store(true, Ordering::SeqCst);
        let agg = aggregator(source, cache(), 300);

        let err = agg.get_snapshot("BONK").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataUnavailable);
    }
}
