//! Circuit breaker for the cache backing store
//!
//! Closed passes calls through. After `failure_threshold` consecutive failures
//! the breaker opens and calls are refused without touching the store. Once the
//! cooldown has elapsed a single probe is let through (HalfOpen): success closes
//! the breaker, failure reopens it and restarts the cooldown.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Store considered down - calls bypassed
    Open,
    /// Cooldown elapsed - one probe allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
    /// Time spent Open before a probe is allowed
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 1,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Published on every state change
#[derive(Debug, Clone)]
pub struct BreakerEvent {
    pub from: CircuitState,
    pub to: CircuitState,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Answer to "may I call the store?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Allowed,
    /// The single HalfOpen trial call
    Probe,
    Rejected,
}

impl Permit {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Permit::Rejected)
    }
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    last_error: Option<String>,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
    events: broadcast::Sender<BreakerEvent>,
    total_trips: AtomicU64,
    rejected_calls: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
                last_error: None,
            }),
            events,
            total_trips: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BreakerConfig::default())
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Ask for permission to call the backing store
    pub async fn acquire(&self) -> Permit {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => Permit::Allowed,
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if cooled {
                    inner.probe_in_flight = true;
                    self.transition(&mut inner, CircuitState::HalfOpen, "cooldown elapsed");
                    Permit::Probe
                } else {
                    self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                    Permit::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                    Permit::Rejected
                } else {
                    inner.probe_in_flight = true;
                    Permit::Probe
                }
            }
        }
    }

    /// Record a successful store call
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
        if inner.state != CircuitState::Closed {
            inner.opened_at = None;
            inner.last_error = None;
            self.transition(&mut inner, CircuitState::Closed, "probe succeeded");
        }
    }

    /// Record a failed store call
    pub async fn record_failure(&self, reason: &str) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;
        inner.probe_in_flight = false;
        inner.last_error = Some(reason.to_string());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.opened_at = Some(Instant::now());
                self.total_trips.fetch_add(1, Ordering::Relaxed);
                self.transition(&mut inner, CircuitState::Open, reason);
            }
            CircuitState::Closed if inner.consecutive_failures >= self.config.failure_threshold => {
                inner.opened_at = Some(Instant::now());
                self.total_trips.fetch_add(1, Ordering::Relaxed);
                self.transition(&mut inner, CircuitState::Open, reason);
            }
            CircuitState::Closed => {
                debug!(
                    failures = inner.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Cache backend failure: {}",
                    reason
                );
            }
            // A straggler from before the trip; the cooldown keeps running
            CircuitState::Open => {}
        }
    }

    pub async fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock().await;
        BreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_error: inner.last_error.clone(),
            total_trips: self.total_trips.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, reason: &str) {
        let from = inner.state;
        inner.state = to;

        match to {
            CircuitState::Open => warn!(%from, "Cache circuit breaker OPEN: {}", reason),
            CircuitState::HalfOpen => info!("Cache circuit breaker HALF-OPEN, probing backend"),
            CircuitState::Closed => info!(%from, "Cache circuit breaker CLOSED: {}", reason),
        }

        let _ = self.events.send(BreakerEvent {
            from,
            to,
            reason: reason.to_string(),
            at: Utc::now(),
        });
    }
}

/// Statistics for monitoring
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub total_trips: u64,
    pub rejected_calls: u64,
}
