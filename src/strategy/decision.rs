use tracing::debug;

use crate::config::{AppConfig, ThresholdConfig};
use crate::domain::{Action, Decision, MarketSnapshot, RiskLevel};

/// Confidence-gated policy turning a snapshot into a decision. Holds no state.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    min_confidence: f64,
    thresholds: ThresholdConfig,
}

impl DecisionEngine {
    pub fn new(min_confidence: f64, thresholds: ThresholdConfig) -> Self {
        Self {
            min_confidence,
            thresholds,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.agent.min_confidence, config.thresholds.clone())
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Decide using the snapshot's own confidence bucket, damped by its volatility factor
    pub fn decide(&self, snapshot: &MarketSnapshot) -> Decision {
        let confidence = snapshot.confidence_level.score(&self.thresholds)
            * snapshot.volatility.adjustment_factor;
        self.decide_with_confidence(snapshot, confidence)
    }

    /// Decide with an externally supplied confidence score
    pub fn decide_with_confidence(&self, snapshot: &MarketSnapshot, confidence: f64) -> Decision {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let price = non_negative(snapshot.price);
        let volume = non_negative(snapshot.volume_24h);
        let liquidity = non_negative(snapshot.liquidity_usd);
        let momentum = if snapshot.price_change_24h.is_finite() {
            snapshot.price_change_24h
        } else {
            0.0
        };

        let risk_level = self.risk_level(volume, liquidity);
        let mut reasons = vec![format!(
            "confidence {:.2} ({} bucket) vs minimum {:.2}",
            confidence, snapshot.confidence_level, self.min_confidence
        )];
        reasons.push(format!(
            "volume ${:.0}, liquidity ${:.0} -> risk {}",
            volume, liquidity, risk_level
        ));
        if snapshot.volatility.adjustment_factor < 1.0 {
            reasons.push(format!(
                "volatility {:.1}% above average {:.1}%",
                snapshot.volatility.current, snapshot.volatility.average
            ));
        }
        if snapshot.degraded {
            reasons.push("market data is stale (degraded mode)".to_string());
        }

        let action = if confidence < self.min_confidence {
            reasons.push("confidence below minimum, holding".to_string());
            Action::Hold
        } else if price == 0.0 {
            reasons.push("no usable price, holding".to_string());
            Action::Hold
        } else if momentum > 0.0 {
            reasons.push(format!("positive momentum {:+.2}%", momentum));
            Action::Buy
        } else if momentum < 0.0 {
            reasons.push(format!("negative momentum {:+.2}%", momentum));
            Action::Sell
        } else {
            reasons.push("flat momentum, holding".to_string());
            Action::Hold
        };

        debug!(
            symbol = %snapshot.symbol,
            %action,
            confidence,
            %risk_level,
            "Decision computed"
        );

        Decision {
            symbol: snapshot.symbol.clone(),
            action,
            confidence,
            risk_level,
            reasons,
            content: None,
        }
    }

    /// Risk from pool depth, escalated when volume dwarfs liquidity
    pub fn risk_level(&self, volume: f64, liquidity: f64) -> RiskLevel {
        let volume = non_negative(volume);
        let liquidity = non_negative(liquidity);
        let t = &self.thresholds;

        if liquidity == 0.0 {
            return RiskLevel::High;
        }
        if volume / liquidity > t.max_turnover_ratio {
            return RiskLevel::High;
        }

        if liquidity > t.high_liquidity && volume > t.medium_volume {
            RiskLevel::Low
        } else if liquidity > t.medium_liquidity {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
