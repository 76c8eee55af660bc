//! Vigil CLI
//!
//! Commands:
//! - `vigil chat` - interactive shell, autonomous loop on demand
//! - `vigil auto` - run the autonomous loop until interrupted
//! - `vigil once` - run a single decision cycle and print it

pub mod shell;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Autonomous market agent
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about = "Closed-loop market agent for a single token")]
pub struct Cli {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, global = true, default_value = "config", env = "VIGIL_CONFIG_DIR")]
    pub config: PathBuf,

    /// Override the watched symbol
    #[arg(long, global = true)]
    pub symbol: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Interactive shell (default)
    Chat,
    /// Autonomous loop, stops on Ctrl+C
    Auto,
    /// One decision cycle, then exit
    Once,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_chat_with_config_dir() {
        let cli = Cli::try_parse_from(["vigil"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.symbol.is_none());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vigil", "auto", "--symbol", "WIF", "--config", "/etc/vigil"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Auto));
        assert_eq!(cli.symbol.as_deref(), Some("WIF"));
        assert_eq!(cli.config, PathBuf::from("/etc/vigil"));
    }
}
