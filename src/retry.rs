//! Retry policy and the supervisor loop that applies it

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::error::{Result, VigilError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Wait after attempt `n` is `base_delay * n`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::linear(config.max_retries, config.retry_base_delay())
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::linear(1, Duration::ZERO)
    }

    /// Delay between attempt `attempt` and `attempt + 1` (1-indexed)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(5))
    }
}

/// Result of a supervised operation together with how many attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Run `op` under `policy`. `op` receives the 1-indexed attempt number.
///
/// Non-retryable errors end the loop immediately.
pub async fn supervise<T, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    supervise_gated(policy, label, || async { Some(()) }, op).await
}

/// Like [`supervise`], but every attempt first asks `gate` for a permit.
///
/// The permit is held for the duration of the attempt. The gate is also
/// consulted before each backoff sleep. Once it returns `None` the loop ends
/// with [`VigilError::Cancelled`] and `op` is not called again.
pub async fn supervise_gated<T, P, G, GFut, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut gate: G,
    mut op: F,
) -> RetryOutcome<T>
where
    G: FnMut() -> GFut,
    GFut: Future<Output = Option<P>>,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max = policy.attempts();
    let mut attempt = 0;

    loop {
        let Some(permit) = gate().await else {
            return cancelled(label, attempt);
        };
        attempt += 1;
        let result = op(attempt).await;
        drop(permit);

        match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "Succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(e) => {
                if attempt >= max || !e.is_retryable() {
                    warn!(label, attempt, max, "Giving up: {}", e);
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                if gate().await.is_none() {
                    return cancelled(label, attempt);
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    label,
                    attempt,
                    max,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed: {}. Retrying...",
                    e
                );
                sleep(delay).await;
            }
        }
    }
}

fn cancelled<T>(label: &str, attempts: u32) -> RetryOutcome<T> {
    debug!(label, attempts, "Gate closed, no further attempts");
    RetryOutcome {
        result: Err(VigilError::Cancelled),
        attempts,
    }
}
