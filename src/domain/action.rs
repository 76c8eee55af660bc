use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Success => write!(f, "SUCCESS"),
            ActionStatus::Failed => write!(f, "FAILED"),
            ActionStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Outcome of executing (or skipping) a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    pub attempts: u32,
    pub error: Option<ErrorKind>,
    /// Transaction id or post id returned by the sink
    pub reference: Option<String>,
}

impl ActionResult {
    pub fn success(attempts: u32, reference: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Success,
            attempts,
            error: None,
            reference: Some(reference.into()),
        }
    }

    pub fn failed(attempts: u32, error: ErrorKind) -> Self {
        Self {
            status: ActionStatus::Failed,
            attempts,
            error: Some(error),
            reference: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: ActionStatus::Skipped,
            attempts: 0,
            error: None,
            reference: None,
        }
    }

    /// Skipped because the cycle could not run (e.g. no market data)
    pub fn skipped_with(error: ErrorKind) -> Self {
        Self {
            error: Some(error),
            ..Self::skipped()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} attempt(s)", self.status, self.attempts)?;
        if let Some(reference) = &self.reference {
            write!(f, " [{}]", reference)?;
        }
        if let Some(error) = &self.error {
            write!(f, " ({})", error)?;
        }
        Ok(())
    }
}
