use std::fmt;

use crate::domain::{ActionResult, Decision, MarketSnapshot, Mode};
use crate::error::{Result, VigilError};

/// Names of the commands a mode can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Market,
    Analyze,
    Post,
    Pause,
    Resume,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        CommandKind::Market,
        CommandKind::Analyze,
        CommandKind::Post,
        CommandKind::Pause,
        CommandKind::Resume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Market => "market",
            CommandKind::Analyze => "analyze",
            CommandKind::Post => "post",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            CommandKind::Market => "market [symbol]    show the current market snapshot",
            CommandKind::Analyze => "analyze [symbol]   snapshot plus the decision it would produce",
            CommandKind::Post => "post [symbol]      publish a market update now",
            CommandKind::Pause => "pause              stop the autonomous loop, back to chat",
            CommandKind::Resume => "resume             start the autonomous loop",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed interactive command. `None` symbol means the configured one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Market { symbol: Option<String> },
    Analyze { symbol: Option<String> },
    Post { symbol: Option<String> },
    Pause,
    Resume,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| VigilError::Validation("empty command".into()))?;
        let kind = CommandKind::from_name(name)
            .ok_or_else(|| VigilError::UnknownCommand(name.to_string()))?;
        let args: Vec<&str> = parts.collect();

        let symbol = match (kind, args.as_slice()) {
            (CommandKind::Pause | CommandKind::Resume, []) => None,
            (CommandKind::Pause | CommandKind::Resume, _) => {
                return Err(VigilError::Validation(format!(
                    "'{}' takes no arguments",
                    kind
                )))
            }
            (_, []) => None,
            (_, [symbol]) => Some(symbol.trim_start_matches('$').to_string()),
            (_, _) => {
                return Err(VigilError::Validation(format!(
                    "usage: {}",
                    kind.usage()
                )))
            }
        };

        Ok(match kind {
            CommandKind::Market => Command::Market { symbol },
            CommandKind::Analyze => Command::Analyze { symbol },
            CommandKind::Post => Command::Post { symbol },
            CommandKind::Pause => Command::Pause,
            CommandKind::Resume => Command::Resume,
        })
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Market { .. } => CommandKind::Market,
            Command::Analyze { .. } => CommandKind::Analyze,
            Command::Post { .. } => CommandKind::Post,
            Command::Pause => CommandKind::Pause,
            Command::Resume => CommandKind::Resume,
        }
    }
}

/// Result of a command, rendered for the front end by `Display`
#[derive(Debug, Clone)]
pub enum CommandOutput {
    Market(MarketSnapshot),
    Analysis {
        snapshot: MarketSnapshot,
        decision: Decision,
    },
    Posted {
        decision: Decision,
        result: ActionResult,
    },
    ModeChanged {
        from: Mode,
        to: Mode,
    },
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Market(snapshot) => write_snapshot(f, snapshot),
            CommandOutput::Analysis { snapshot, decision } => {
                write_snapshot(f, snapshot)?;
                writeln!(f)?;
                writeln!(f, "Decision: {}", decision)?;
                for reason in &decision.reasons {
                    writeln!(f, "  - {}", reason)?;
                }
                Ok(())
            }
            CommandOutput::Posted { decision, result } => {
                if let Some(content) = &decision.content {
                    writeln!(f, "{}", content)?;
                }
                write!(f, "Post {}", result)
            }
            CommandOutput::ModeChanged { from, to } => {
                write!(f, "Mode: {} -> {}", from, to)
            }
        }
    }
}

fn write_snapshot(f: &mut fmt::Formatter<'_>, s: &MarketSnapshot) -> fmt::Result {
    writeln!(
        f,
        "{}{}",
        s.symbol,
        if s.degraded { " (stale)" } else { "" }
    )?;
    writeln!(f, "  Price:       ${}", s.price)?;
    writeln!(f, "  24h change:  {:+.2}%", s.price_change_24h)?;
    writeln!(f, "  Volume 24h:  ${:.0}", s.volume_24h)?;
    writeln!(f, "  Liquidity:   ${:.0}", s.liquidity_usd)?;
    writeln!(f, "  Market cap:  ${:.0}", s.market_cap)?;
    writeln!(
        f,
        "  Volatility:  {:.2}% (avg {:.2}%)",
        s.volatility.current, s.volatility.average
    )?;
    write!(f, "  Confidence:  {}", s.confidence_level)
}
