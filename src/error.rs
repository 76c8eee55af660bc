use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum VigilError {
    // Configuration errors (startup only)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    FatalConfig(String),

    // Upstream data errors
    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Cache backend error: {0}")]
    CacheBackend(String),

    // Sink errors
    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // Mode / command errors
    #[error("Invalid mode transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command '{command}' is not available in {mode} mode")]
    CommandUnavailable { command: String, mode: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    // Network / serialization errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for VigilError
pub type Result<T> = std::result::Result<T, VigilError>;

/// Coarse error taxonomy recorded on cycle results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransientFetch,
    CacheBackend,
    DataUnavailable,
    Execution,
    FatalConfig,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::TransientFetch => "transient_fetch",
            ErrorKind::CacheBackend => "cache_backend",
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::Execution => "execution",
            ErrorKind::FatalConfig => "fatal_config",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

impl VigilError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VigilError::Config(_) | VigilError::FatalConfig(_) => ErrorKind::FatalConfig,
            VigilError::TransientFetch(_) | VigilError::Http(_) => ErrorKind::TransientFetch,
            VigilError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            VigilError::CacheBackend(_) => ErrorKind::CacheBackend,
            VigilError::Execution(_) | VigilError::RateLimited(_) => ErrorKind::Execution,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether a retry of the same call could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VigilError::TransientFetch(_)
                | VigilError::Http(_)
                | VigilError::Execution(_)
                | VigilError::RateLimited(_)
                | VigilError::CacheBackend(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_into_taxonomy() {
        assert_eq!(
            VigilError::TransientFetch("timeout".into()).kind(),
            ErrorKind::TransientFetch
        );
        assert_eq!(
            VigilError::RateLimited("429".into()).kind(),
            ErrorKind::Execution
        );
        assert_eq!(
            VigilError::FatalConfig("missing".into()).kind(),
            ErrorKind::FatalConfig
        );
        assert_eq!(VigilError::Cancelled.kind(), ErrorKind::Internal);
    }

    #[test]
    fn validation_is_not_retryable() {
        assert!(!VigilError::Validation("bad".into()).is_retryable());
        assert!(VigilError::Execution("rejected".into()).is_retryable());
    }
}
