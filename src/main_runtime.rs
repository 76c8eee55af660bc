use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vigil::adapters::{DexScreenerSource, LogContentSink, PaperTradeSink, RateLimitedContentSink};
use vigil::agent::{Agent, CommandRouter, ModeController};
use vigil::cache::{BreakerConfig, CacheLayer, MemoryStore};
use vigil::config::{AppConfig, LoggingConfig};
use vigil::domain::Mode;
use vigil::error::Result;
use vigil::executor::ActionExecutor;
use vigil::market::MarketDataAggregator;
use vigil::strategy::TemplateComposer;

/// Posts allowed per hour by the content sink
const MAX_POSTS_PER_HOUR: usize = 4;

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let log_dir = std::env::var("VIGIL_LOG_DIR").ok();

    // `rolling::daily` panics if it cannot create the first file, so check writability first
    let file_layer = log_dir.as_ref().and_then(|log_dir| {
        if std::fs::create_dir_all(log_dir).is_err() {
            eprintln!(
                "Warning: Could not create log directory {}, file logging disabled",
                log_dir
            );
            return None;
        }
        let test_path = std::path::Path::new(log_dir).join(".vigil_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(log_dir, "vigil.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Lives as long as the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    });

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(filter)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/vigil.log", dir);
    }
}

/// Wire the built-in collaborators into an agent and its controller
pub async fn build(config: &AppConfig) -> Result<CommandRouter> {
    let cache = Arc::new(CacheLayer::new(
        Arc::new(MemoryStore::new()),
        BreakerConfig {
            failure_threshold: config.cache.failure_threshold,
            cooldown: Duration::from_millis(config.cache.breaker_cooldown_ms),
        },
        config.max_staleness(),
    ));
    cache.connect().await;

    let source = Arc::new(DexScreenerSource::from_config(config)?);
    let aggregator = MarketDataAggregator::new(source, cache, config);

    let content = Arc::new(RateLimitedContentSink::new(
        Arc::new(LogContentSink),
        MAX_POSTS_PER_HOUR,
        Duration::from_secs(3_600),
    ));
    let executor = ActionExecutor::new(Arc::new(PaperTradeSink::new()), content, config);

    let composer = TemplateComposer {
        signature: (config.market.symbol.len() <= 10).then(|| format!("#{}", config.market.symbol)),
    };
    let agent = Arc::new(
        Agent::new(config.clone(), aggregator, executor).with_composer(Arc::new(composer)),
    );
    let controller = Arc::new(
        ModeController::new(agent.epoch(), agent.clone(), config.agent.cycle_interval())
            .with_hook(Mode::Auto, agent.clone()),
    );

    Ok(CommandRouter::new(agent, controller))
}
