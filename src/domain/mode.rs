use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Nothing running
    Idle,
    /// Interactive commands only
    Chat,
    /// Scheduler driving decision cycles
    Auto,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Idle, Mode::Chat, Mode::Auto];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Chat => "chat",
            Mode::Auto => "auto",
        }
    }

    /// Check if this mode can transition to another mode
    pub fn can_transition_to(&self, target: Mode) -> bool {
        use Mode::*;

        match (self, target) {
            (Idle, Chat) | (Auto, Chat) => true,
            (Idle, Auto) | (Chat, Auto) => true,
            // stop is valid from anywhere
            (_, Idle) => true,
            _ => false,
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Idle
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
