use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, VigilError};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub market: MarketConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Core loop options. These are the only knobs the decision loop reads.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Minimum decision confidence required to trade (0.0 - 1.0)
    pub min_confidence: f64,
    /// Trade size at full confidence, in units of the spent asset
    pub base_amount: f64,
    /// Slippage tolerance passed to the trade sink
    pub slippage_bps: u32,
    /// Scheduler tick interval
    pub cycle_interval_ms: u32,
    /// Market snapshot cache TTL
    pub cache_ttl_s: u32,
    /// Maximum attempts per action (and per upstream fetch)
    pub max_retries: u32,
    /// Linear backoff base between attempts
    pub retry_base_delay_ms: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            base_amount: 0.1,
            slippage_bps: 100,
            cycle_interval_ms: 60_000,
            cache_ttl_s: 300,
            max_retries: 3,
            retry_base_delay_ms: 5_000,
        }
    }
}

impl AgentConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms as u64)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms as u64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Token symbol (or mint/pair address) the agent watches
    pub symbol: String,
    /// Asset spent on BUY and received on SELL
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Chain id used by the DexScreener source
    #[serde(default = "default_chain")]
    pub chain: String,
    /// Post a market update every N auto cycles (0 disables)
    #[serde(default)]
    pub post_every_n_cycles: u32,
}

fn default_quote_asset() -> String {
    "SOL".to_string()
}

fn default_chain() -> String {
    "solana".to_string()
}

/// Volume / liquidity cutoffs for confidence and risk buckets.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    pub high_volume: f64,
    pub high_liquidity: f64,
    pub medium_volume: f64,
    pub medium_liquidity: f64,
    /// volume / liquidity above which liquidity is considered thin
    pub max_turnover_ratio: f64,
    /// Confidence score assigned to each confidence level
    pub low_score: f64,
    pub medium_score: f64,
    pub high_score: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high_volume: 100_000.0,
            high_liquidity: 50_000.0,
            medium_volume: 10_000.0,
            medium_liquidity: 10_000.0,
            max_turnover_ratio: 10.0,
            low_score: 0.3,
            medium_score: 0.6,
            high_score: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Consecutive backing-store failures that open the breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Time the breaker stays open before a probe is allowed
    #[serde(default = "default_breaker_cooldown_ms")]
    pub breaker_cooldown_ms: u64,
    /// Oldest snapshot served in degraded mode; defaults to 2x TTL
    #[serde(default)]
    pub max_staleness_s: Option<u64>,
}

fn default_failure_threshold() -> u32 {
    1
}

fn default_breaker_cooldown_ms() -> u64 {
    30_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            breaker_cooldown_ms: default_breaker_cooldown_ms(),
            max_staleness_s: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info,vigil=debug".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        Self::load_with_symbol(config_dir, None)
    }

    /// Load configuration, with `symbol` taking precedence over every source
    pub fn load_with_symbol<P: AsRef<Path>>(config_dir: P, symbol: Option<&str>) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        let defaults = AgentConfig::default();

        let builder = Config::builder()
            .set_default("agent.min_confidence", defaults.min_confidence)?
            .set_default("agent.base_amount", defaults.base_amount)?
            .set_default("agent.slippage_bps", defaults.slippage_bps as i64)?
            .set_default("agent.cycle_interval_ms", defaults.cycle_interval_ms as i64)?
            .set_default("agent.cache_ttl_s", defaults.cache_ttl_s as i64)?
            .set_default("agent.max_retries", defaults.max_retries as i64)?
            .set_default("agent.retry_base_delay_ms", defaults.retry_base_delay_ms as i64)?
            .set_default("logging.level", "info,vigil=debug")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("VIGIL_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // VIGIL_AGENT__MIN_CONFIDENCE, VIGIL_MARKET__SYMBOL, ...
            .add_source(
                Environment::with_prefix("VIGIL")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("market.symbol", symbol)?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            VigilError::FatalConfig(errors.join("; "))
        })?;
        Ok(config)
    }

    /// Defaults for a symbol, used by tests and `--symbol` without a config file
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            agent: AgentConfig::default(),
            market: MarketConfig {
                symbol: symbol.to_string(),
                quote_asset: default_quote_asset(),
                chain: default_chain(),
                post_every_n_cycles: 0,
            },
            thresholds: ThresholdConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Staleness ceiling for degraded snapshots
    pub fn max_staleness(&self) -> Duration {
        let secs = self
            .cache
            .max_staleness_s
            .unwrap_or(self.agent.cache_ttl_s as u64 * 2);
        Duration::from_secs(secs)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let agent = &self.agent;

        if !(0.0..=1.0).contains(&agent.min_confidence) {
            errors.push("agent.min_confidence must be between 0 and 1".to_string());
        }
        if !agent.base_amount.is_finite() || agent.base_amount <= 0.0 {
            errors.push("agent.base_amount must be positive".to_string());
        }
        if agent.slippage_bps > 10_000 {
            errors.push("agent.slippage_bps must not exceed 10000".to_string());
        }
        if agent.cycle_interval_ms == 0 {
            errors.push("agent.cycle_interval_ms must be positive".to_string());
        }
        if agent.cache_ttl_s == 0 {
            errors.push("agent.cache_ttl_s must be positive".to_string());
        }
        if agent.max_retries == 0 {
            errors.push("agent.max_retries must be at least 1".to_string());
        }

        if self.market.symbol.trim().is_empty() {
            errors.push("market.symbol is required".to_string());
        }

        let t = &self.thresholds;
        if t.medium_volume > t.high_volume || t.medium_liquidity > t.high_liquidity {
            errors.push("medium thresholds must not exceed high thresholds".to_string());
        }
        for (name, score) in [
            ("low_score", t.low_score),
            ("medium_score", t.medium_score),
            ("high_score", t.high_score),
        ] {
            if !(0.0..=1.0).contains(&score) {
                errors.push(format!("thresholds.{name} must be between 0 and 1"));
            }
        }

        if self.cache.failure_threshold == 0 {
            errors.push("cache.failure_threshold must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::for_symbol("BONK");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn staleness_ceiling_defaults_to_twice_ttl() {
        let config = AppConfig::for_symbol("BONK");
        assert_eq!(config.max_staleness(), Duration::from_secs(600));

        let mut config = config;
        config.cache.max_staleness_s = Some(42);
        assert_eq!(config.max_staleness(), Duration::from_secs(42));
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut config = AppConfig::for_symbol(" ");
        config.agent.min_confidence = 1.5;
        config.agent.max_retries = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("min_confidence")));
        assert!(errors.iter().any(|e| e.contains("max_retries")));
        assert!(errors.iter().any(|e| e.contains("market.symbol")));
    }

    #[test]
    fn missing_symbol_is_fatal_at_load() {
        let dir = std::env::temp_dir().join(format!("vigil-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let err = AppConfig::load_from(&dir).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FatalConfig);

        std::fs::write(
            dir.join("default.toml"),
            "[market]\nsymbol = \"BONK\"\n\n[agent]\nmin_confidence = 0.8\n",
        )
        .unwrap();
        let config = AppConfig::load_from(&dir).unwrap();
        assert_eq!(config.market.symbol, "BONK");
        assert_eq!(config.agent.min_confidence, 0.8);
        assert_eq!(config.agent.max_retries, 3);

        let overridden = AppConfig::load_with_symbol(&dir, Some("WIF")).unwrap();
        assert_eq!(overridden.market.symbol, "WIF");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
