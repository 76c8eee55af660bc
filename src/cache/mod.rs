//! Market data cache
//!
//! - TTL-checked reads over a pluggable backing store
//! - Circuit breaker that turns backend outages into cache misses

pub mod breaker;
pub mod layer;
pub mod store;

pub use breaker::{BreakerConfig, BreakerEvent, CircuitBreaker, CircuitState, Permit};
pub use layer::{CacheEntry, CacheLayer, CacheStats};
pub use store::{CacheBackingStore, MemoryStore};
