use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ThresholdConfig;

/// Coarse confidence bucket derived from volume and liquidity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Bucket a (volume, liquidity) pair. Both cutoffs are strict.
    pub fn classify(volume: f64, liquidity: f64, thresholds: &ThresholdConfig) -> Self {
        if volume > thresholds.high_volume && liquidity > thresholds.high_liquidity {
            ConfidenceLevel::High
        } else if volume > thresholds.medium_volume && liquidity > thresholds.medium_liquidity {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn score(&self, thresholds: &ThresholdConfig) -> f64 {
        match self {
            ConfidenceLevel::Low => thresholds.low_score,
            ConfidenceLevel::Medium => thresholds.medium_score,
            ConfidenceLevel::High => thresholds.high_score,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Volatility reading for a snapshot, in percent of 24h price change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volatility {
    pub current: f64,
    pub average: f64,
    /// 1.0 when current is at or below the average, shrinking toward 0.5 as it spikes
    pub adjustment_factor: f64,
}

impl Default for Volatility {
    fn default() -> Self {
        Self {
            current: 0.0,
            average: 0.0,
            adjustment_factor: 1.0,
        }
    }
}

/// Normalized market view for one symbol at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub price_change_24h: f64,
    pub liquidity_usd: f64,
    pub volatility: Volatility,
    pub confidence_level: ConfidenceLevel,
    pub captured_at: DateTime<Utc>,
    /// Served from an expired cache entry because the live fetch failed
    #[serde(default)]
    pub degraded: bool,
}

impl MarketSnapshot {
    /// Age of the snapshot relative to `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.captured_at)
    }

    /// Copy of this snapshot tagged as served in degraded mode
    pub fn into_degraded(mut self) -> Self {
        self.degraded = true;
        self
    }
}

/// Trade data returned by a market data source. Missing fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeData {
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub last_trade_time: Option<DateTime<Utc>>,
}

/// Pool / pair data returned by a market data source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiquidityData {
    pub liquidity_usd: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Coerce a missing or non-finite upstream value to zero
pub fn coerce(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}
