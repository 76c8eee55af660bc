pub mod adapters;
pub mod agent;
pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod market;
pub mod retry;
pub mod strategy;

pub use agent::{Agent, CommandRouter, CycleEpoch, ModeController, Scheduler};
pub use cache::{CacheLayer, CircuitBreaker, CircuitState};
pub use config::AppConfig;
pub use domain::{Action, ActionResult, ActionStatus, Decision, MarketSnapshot, Mode};
pub use error::{ErrorKind, Result, VigilError};
pub use executor::{ActionExecutor, ContentSink, TradeSink};
pub use market::{MarketDataAggregator, MarketDataSource};
pub use strategy::DecisionEngine;
