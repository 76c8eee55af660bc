mod common;

use async_trait::async_trait;
use mockall::mock;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{
    agent, router, test_config, CountingContentSink, RejectingTradeSink, SlowTradeSink, StubSource,
};
use vigil::domain::{Action, ActionStatus, Mode};
use vigil::error::{ErrorKind, Result, VigilError};
use vigil::executor::{ContentSink, PostReceipt, TradeReceipt, TradeSink};

mock! {
    pub Trades {}

    #[async_trait]
    impl TradeSink for Trades {
        async fn execute_trade(
            &self,
            from: &str,
            to: &str,
            amount: f64,
            slippage_bps: u32,
        ) -> Result<TradeReceipt>;
    }
}

mock! {
    pub Posts {}

    #[async_trait]
    impl ContentSink for Posts {
        async fn publish(&self, text: &str) -> Result<PostReceipt>;
    }
}

/// 150k volume through a 60k pool, rising: high confidence BUY
fn bullish() -> Arc<StubSource> {
    Arc::new(StubSource::new(150_000.0, 60_000.0, 4.0))
}

#[tokio::test(start_paused = true)]
async fn three_sink_failures_fail_the_cycle_without_a_fourth_attempt() {
    let config = test_config();
    let mut trades = MockTrades::new();
    trades
        .expect_execute_trade()
        .times(3)
        .returning(|_, _, _, _| Err(VigilError::Execution("slippage exceeded".into())));

    let agent = agent(
        &config,
        bullish(),
        Arc::new(trades),
        Arc::new(MockPosts::new()),
    );

    let outcome = agent.run_once(0).await;
    let record = outcome.record().expect("cycle should be recorded");
    assert_eq!(record.action(), Some(Action::Buy));
    assert_eq!(record.result.status, ActionStatus::Failed);
    assert_eq!(record.result.attempts, 3);
    assert_eq!(record.result.error, Some(ErrorKind::Execution));
    assert_eq!(agent.stats().await.failed, 1);
}

#[tokio::test]
async fn buy_amount_scales_with_confidence() {
    let config = test_config();
    let mut trades = MockTrades::new();
    trades
        .expect_execute_trade()
        .times(1)
        .returning(|from, to, amount, slippage_bps| {
            assert_eq!((from, to), ("SOL", "BONK"));
            assert!((amount - 0.09).abs() < 1e-9, "amount was {amount}");
            assert_eq!(slippage_bps, 100);
            Ok(TradeReceipt {
                tx_id: "5xSig".into(),
            })
        });

    let agent = agent(
        &config,
        bullish(),
        Arc::new(trades),
        Arc::new(MockPosts::new()),
    );

    let outcome = agent.run_once(0).await;
    let record = outcome.record().unwrap();
    assert!(record.result.is_success());
    assert_eq!(record.result.reference.as_deref(), Some("5xSig"));
    assert_eq!(agent.stats().await.trades, 1);
}

#[tokio::test]
async fn low_confidence_holds_without_contacting_sinks() {
    let config = test_config();
    let mut trades = MockTrades::new();
    trades.expect_execute_trade().never();
    let mut posts = MockPosts::new();
    posts.expect_publish().never();

    // medium bucket scores 0.6, below the 0.7 minimum
    let source = Arc::new(StubSource::new(20_000.0, 20_000.0, 8.0));
    let agent = agent(&config, source, Arc::new(trades), Arc::new(posts));

    let outcome = agent.run_once(0).await;
    let record = outcome.record().unwrap();
    assert_eq!(record.action(), Some(Action::Hold));
    assert_eq!(record.result.status, ActionStatus::Skipped);
    assert_eq!(record.result.attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn missing_market_data_is_recorded_as_skipped() {
    let config = test_config();
    let source = bullish();
    source.down.store(true, Ordering::SeqCst);
    let mut trades = MockTrades::new();
    trades.expect_execute_trade().never();

    let agent = agent(
        &config,
        source.clone(),
        Arc::new(trades),
        Arc::new(MockPosts::new()),
    );

    let outcome = agent.run_once(0).await;
    let record = outcome.record().unwrap();
    assert!(record.decision.is_none());
    assert_eq!(record.result.status, ActionStatus::Skipped);
    assert_eq!(record.result.error, Some(ErrorKind::DataUnavailable));
    // each feed is retried before giving up
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn hold_becomes_a_post_on_the_configured_cadence() {
    let mut config = test_config();
    config.market.post_every_n_cycles = 2;
    let content = Arc::new(CountingContentSink::default());
    let source = Arc::new(StubSource::new(20_000.0, 20_000.0, 0.0));

    let agent = agent(
        &config,
        source,
        Arc::new(SlowTradeSink::default()),
        content.clone(),
    );

    let first = agent.run_once(0).await;
    assert_eq!(first.record().unwrap().action(), Some(Action::Hold));

    let second = agent.run_once(0).await;
    let record = second.record().unwrap();
    assert_eq!(record.action(), Some(Action::Post));
    assert!(record.result.is_success());

    let published = content.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert!(published[0].starts_with("$BONK market update"));
}

#[tokio::test(start_paused = true)]
async fn stop_discards_a_cycle_still_fetching() {
    let config = test_config();
    let source = Arc::new(bullish_with_delay(Duration::from_secs(2)));
    let mut trades = MockTrades::new();
    trades.expect_execute_trade().never();

    let agent = agent(
        &config,
        source.clone(),
        Arc::new(trades),
        Arc::new(MockPosts::new()),
    );
    let router = router(&config, agent.clone());

    router.controller().enter_auto().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    router.controller().stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(agent.stats().await.recorded, 0);
    assert_eq!(agent.stale_discarded(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_during_execution_suppresses_the_record() {
    let config = test_config();
    let trades = Arc::new(SlowTradeSink::new(Duration::from_secs(2)));

    let agent = agent(
        &config,
        bullish(),
        trades.clone(),
        Arc::new(CountingContentSink::default()),
    );
    let router = router(&config, agent.clone());

    router.controller().enter_auto().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(trades.calls.load(Ordering::SeqCst), 1);

    router.controller().stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    // the call was already out, but its result never lands
    assert!(agent.recent_cycles(10).await.is_empty());
    assert_eq!(agent.stale_discarded(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_between_retries_prevents_further_trades() {
    let config = test_config();
    let trades = Arc::new(RejectingTradeSink::default());

    let agent = agent(
        &config,
        bullish(),
        trades.clone(),
        Arc::new(CountingContentSink::default()),
    );
    let router = router(&config, agent.clone());

    router.controller().enter_auto().await.unwrap();
    // first attempt rejected, now inside the 100ms backoff
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(trades.calls.load(Ordering::SeqCst), 1);

    router.controller().stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(trades.calls.load(Ordering::SeqCst), 1);
    assert_eq!(agent.stats().await.recorded, 0);
    assert_eq!(agent.stale_discarded(), 1);
}

#[tokio::test(start_paused = true)]
async fn pausing_auto_stops_further_ticks() {
    let config = test_config();
    let agent = agent(
        &config,
        bullish(),
        Arc::new(SlowTradeSink::default()),
        Arc::new(CountingContentSink::default()),
    );
    let router = router(&config, agent.clone());

    router.controller().enter_auto().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    router.controller().enter_chat().await.unwrap();

    let ticks = router.controller().scheduler_stats().ticks;
    assert!(ticks >= 3, "expected ticks while in auto, got {ticks}");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(router.controller().scheduler_stats().ticks, ticks);
    assert_eq!(router.controller().mode().await, Mode::Chat);
}

#[tokio::test(start_paused = true)]
async fn slow_cycles_never_overlap() {
    let mut config = test_config();
    config.agent.cycle_interval_ms = 100;
    let trades = Arc::new(SlowTradeSink::new(Duration::from_millis(250)));

    let agent = agent(
        &config,
        bullish(),
        trades.clone(),
        Arc::new(CountingContentSink::default()),
    );
    let router = router(&config, agent.clone());

    router.controller().enter_auto().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    router.controller().enter_chat().await.unwrap();

    let stats = router.controller().scheduler_stats();
    assert!(!trades.overlapped.load(Ordering::SeqCst));
    assert!(stats.skipped > 0, "expected skipped ticks, got {:?}", stats);
    assert!(trades.calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(stats.started + stats.skipped, stats.ticks);
}

fn bullish_with_delay(delay: Duration) -> StubSource {
    StubSource::new(150_000.0, 60_000.0, 4.0).with_delay(delay)
}
