//! DexScreener market data source
//!
//! Endpoint: `https://api.dexscreener.com/token-pairs/v1/{chain}/{token}`,
//! an array of trading pairs for the token. Both feeds are served from the
//! deepest pair quoted in the configured quote asset.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::AppConfig;
use crate::domain::{LiquidityData, TradeData};
use crate::error::{Result, VigilError};
use crate::market::MarketDataSource;

const DEFAULT_BASE_URL: &str = "https://api.dexscreener.com";
/// Both feeds of one cycle share a response fetched within this window
const PAIR_REUSE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    pub pair_address: Option<String>,
    pub quote_token: DexToken,
    pub price_usd: Option<String>,
    #[serde(default)]
    pub volume: Option<Window>,
    #[serde(default)]
    pub price_change: Option<Window>,
    #[serde(default)]
    pub liquidity: Option<DexLiquidity>,
    pub market_cap: Option<f64>,
    pub fdv: Option<f64>,
    /// Milliseconds since epoch
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexToken {
    pub symbol: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Window {
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexLiquidity {
    pub usd: Option<f64>,
}

impl DexPair {
    fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }

    fn trade_data(&self) -> TradeData {
        TradeData {
            price: self.price_usd.as_deref().and_then(|p| p.parse().ok()),
            volume_24h: self.volume.as_ref().and_then(|v| v.h24),
            price_change_24h: self.price_change.as_ref().and_then(|v| v.h24),
            last_trade_time: None,
        }
    }

    fn liquidity_data(&self) -> LiquidityData {
        LiquidityData {
            liquidity_usd: self.liquidity_usd(),
            market_cap: self.market_cap.or(self.fdv),
        }
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<Utc>> {
        self.pair_created_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// Pick the deepest pair, preferring ones quoted in `quote_asset`
fn best_pair(pairs: Vec<DexPair>, quote_asset: &str) -> Option<DexPair> {
    let depth = |p: &DexPair| p.liquidity_usd().unwrap_or(0.0);
    let (quoted, others): (Vec<_>, Vec<_>) = pairs
        .into_iter()
        .partition(|p| p.quote_token.symbol.eq_ignore_ascii_case(quote_asset));
    let pool = if quoted.is_empty() { others } else { quoted };
    pool.into_iter()
        .max_by(|a, b| depth(a).total_cmp(&depth(b)))
}

pub struct DexScreenerSource {
    client: reqwest::Client,
    base_url: String,
    chain: String,
    quote_asset: String,
    recent: Mutex<Option<(String, Instant, DexPair)>>,
}

impl DexScreenerSource {
    pub fn new(chain: &str, quote_asset: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            chain: chain.to_string(),
            quote_asset: quote_asset.to_string(),
            recent: Mutex::new(None),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.market.chain, &config.market.quote_asset)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn pair(&self, token: &str) -> Result<DexPair> {
        let mut recent = self.recent.lock().await;
        if let Some((cached_token, at, pair)) = recent.as_ref() {
            if cached_token == token && at.elapsed() < PAIR_REUSE {
                return Ok(pair.clone());
            }
        }

        let url = format!("{}/token-pairs/v1/{}/{}", self.base_url, self.chain, token);
        debug!(%url, "Fetching DexScreener pairs");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(VigilError::RateLimited(format!("dexscreener: {}", status)));
        }
        if status.is_server_error() {
            return Err(VigilError::TransientFetch(format!("dexscreener: {}", status)));
        }
        if !status.is_success() {
            return Err(VigilError::DataUnavailable(format!(
                "dexscreener {} for {}",
                status, token
            )));
        }

        let pairs: Vec<DexPair> = response.json().await?;
        let pair = best_pair(pairs, &self.quote_asset)
            .ok_or_else(|| VigilError::DataUnavailable(format!("no pairs for {}", token)))?;

        *recent = Some((token.to_string(), Instant::now(), pair.clone()));
        Ok(pair)
    }
}

#[async_trait]
impl MarketDataSource for DexScreenerSource {
    async fn fetch_trade(&self, symbol: &str) -> Result<TradeData> {
        Ok(self.pair(symbol).await?.trade_data())
    }

    async fn fetch_liquidity(&self, symbol: &str) -> Result<LiquidityData> {
        Ok(self.pair(symbol).await?.liquidity_data())
    }

    fn name(&self) -> &'static str {
        "dexscreener"
    }
}
