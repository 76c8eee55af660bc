use std::collections::{HashMap, VecDeque};

use crate::domain::Volatility;

const DEFAULT_WINDOW: usize = 24;
const MIN_ADJUSTMENT: f64 = 0.5;

/// Rolling per-symbol history of absolute 24h price change
#[derive(Debug, Clone)]
pub struct VolatilityTracker {
    window: usize,
    history: HashMap<String, VecDeque<f64>>,
}

impl VolatilityTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            history: HashMap::new(),
        }
    }

    /// Record a fresh observation and return the resulting reading
    pub fn observe(&mut self, symbol: &str, price_change_24h: f64) -> Volatility {
        let current = if price_change_24h.is_finite() {
            price_change_24h.abs()
        } else {
            0.0
        };

        let samples = self.history.entry(symbol.to_string()).or_default();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(current);

        let average = samples.iter().sum::<f64>() / samples.len() as f64;
        let adjustment_factor = if current > average && current > 0.0 {
            (average / current).clamp(MIN_ADJUSTMENT, 1.0)
        } else {
            1.0
        };

        Volatility {
            current,
            average,
            adjustment_factor,
        }
    }

    pub fn samples(&self, symbol: &str) -> usize {
        self.history.get(symbol).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for VolatilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
