use async_trait::async_trait;

use crate::domain::{Decision, MarketSnapshot};
use crate::error::Result;

/// Produces the text published for a POST action.
///
/// An LLM-backed implementation plugs in here; [`TemplateComposer`] needs no
/// external service.
#[async_trait]
pub trait ContentComposer: Send + Sync {
    async fn compose(&self, snapshot: &MarketSnapshot, decision: &Decision) -> Result<String>;
}

/// Fixed-format market update
#[derive(Debug, Clone, Default)]
pub struct TemplateComposer {
    /// Appended to every post, e.g. a cashtag or hashtag
    pub signature: Option<String>,
}

const MAX_POST_CHARS: usize = 280;

#[async_trait]
impl ContentComposer for TemplateComposer {
    async fn compose(&self, snapshot: &MarketSnapshot, decision: &Decision) -> Result<String> {
        let direction = if snapshot.price_change_24h > 0.0 {
            "up"
        } else if snapshot.price_change_24h < 0.0 {
            "down"
        } else {
            "flat"
        };

        let mut text = format!(
            "${} market update: ${} ({} {:.2}% 24h). Volume ${}, liquidity ${}. Confidence {}, risk {}.",
            snapshot.symbol,
            format_price(snapshot.price),
            direction,
            snapshot.price_change_24h.abs(),
            compact(snapshot.volume_24h),
            compact(snapshot.liquidity_usd),
            snapshot.confidence_level,
            decision.risk_level.as_str().to_lowercase(),
        );
        if let Some(signature) = &self.signature {
            text.push(' ');
            text.push_str(signature);
        }

        Ok(truncate(text, MAX_POST_CHARS))
    }
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{:.2}", price)
    } else {
        format!("{:.8}", price)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

fn compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000_000.0 {
        format!("{:.1}B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{:.0}", value)
    }
}

fn truncate(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut cut: String = text.chars().take(max_chars - 1).collect();
    cut.push('…');
    cut
}
