//! TTL cache in front of a fallible backing store
//!
//! Values are stored wrapped in a [`CacheEntry`] envelope carrying their own
//! expiry, so expiry is decided here rather than by the store. The store is
//! asked to retain entries for `ttl + stale_retention`, which keeps expired
//! entries around for [`CacheLayer::peek`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::breaker::{BreakerConfig, BreakerEvent, BreakerStats, CircuitBreaker};
use super::store::CacheBackingStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &str, value: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: now + ttl,
        }
    }

    /// A read at or after `expires_at` is a miss
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    bypassed: AtomicU64,
    backend_errors: AtomicU64,
}

/// Snapshot of cache metrics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bypassed: u64,
    pub backend_errors: u64,
    pub breaker: BreakerStats,
}

pub struct CacheLayer {
    store: Arc<dyn CacheBackingStore>,
    breaker: CircuitBreaker,
    stale_retention: Duration,
    counters: CacheCounters,
}

impl CacheLayer {
    pub fn new(
        store: Arc<dyn CacheBackingStore>,
        breaker: BreakerConfig,
        stale_retention: Duration,
    ) -> Self {
        Self {
            store,
            breaker: CircuitBreaker::new(breaker),
            stale_retention,
            counters: CacheCounters::default(),
        }
    }

    /// Breaker transitions, for the caller to log or display
    pub fn subscribe_breaker(&self) -> broadcast::Receiver<BreakerEvent> {
        self.breaker.subscribe()
    }

    /// Connect the backing store. A failure opens the breaker but is not an error.
    pub async fn connect(&self) -> bool {
        if !self.breaker.acquire().await.is_allowed() {
            return false;
        }
        match self.store.connect().await {
            Ok(()) => {
                self.breaker.record_success().await;
                debug!(store = self.store.name(), "Cache backend connected");
                true
            }
            Err(e) => {
                self.backend_failed("connect", &e.to_string()).await;
                false
            }
        }
    }

    /// Fresh value for `key`, or `None` on miss, expiry, or unavailable backend
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.fetch_entry(key).await {
            Some(entry) if !entry.is_expired_at(Utc::now()) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cache hit");
                Some(entry.value)
            }
            Some(_) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cache entry expired");
                None
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Entry for `key` regardless of expiry
    pub async fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.fetch_entry(key).await
    }

    pub async fn set(&self, key: &str, value: &str, ttl_seconds: u64) {
        let ttl = Duration::from_secs(ttl_seconds);
        let entry = CacheEntry::new(key, value, ttl, Utc::now());
        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, "Failed to encode cache entry: {}", e);
                return;
            }
        };

        if !self.permit(key).await {
            return;
        }
        match self
            .store
            .set(key, &payload, ttl + self.stale_retention)
            .await
        {
            Ok(()) => self.breaker.record_success().await,
            Err(e) => self.backend_failed("set", &e.to_string()).await,
        }
    }

    pub async fn delete(&self, key: &str) {
        if !self.permit(key).await {
            return;
        }
        match self.store.delete(key).await {
            Ok(()) => self.breaker.record_success().await,
            Err(e) => self.backend_failed("delete", &e.to_string()).await,
        }
    }

    pub async fn flush_all(&self) {
        if !self.permit("*").await {
            return;
        }
        match self.store.flush_all().await {
            Ok(()) => self.breaker.record_success().await,
            Err(e) => self.backend_failed("flush_all", &e.to_string()).await,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        decode(key, &raw)
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl_seconds).await,
            Err(e) => warn!(key, "Failed to encode cache value: {}", e),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            bypassed: self.counters.bypassed.load(Ordering::Relaxed),
            backend_errors: self.counters.backend_errors.load(Ordering::Relaxed),
            breaker: self.breaker.stats().await,
        }
    }

    async fn fetch_entry(&self, key: &str) -> Option<CacheEntry> {
        if !self.permit(key).await {
            return None;
        }
        match self.store.get(key).await {
            Ok(Some(raw)) => {
                self.breaker.record_success().await;
                decode(key, &raw)
            }
            Ok(None) => {
                self.breaker.record_success().await;
                None
            }
            Err(e) => {
                self.backend_failed("get", &e.to_string()).await;
                None
            }
        }
    }

    async fn permit(&self, key: &str) -> bool {
        if self.breaker.acquire().await.is_allowed() {
            true
        } else {
            self.counters.bypassed.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Cache backend bypassed, breaker open");
            false
        }
    }

    async fn backend_failed(&self, op: &str, reason: &str) {
        self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
        warn!(store = self.store.name(), op, "Cache backend error: {}", reason);
        self.breaker.record_failure(reason).await;
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, "Discarding undecodable cache payload: {}", e);
            None
        }
    }
}
