use std::sync::Arc;
use tracing::debug;

use super::command::{Command, CommandOutput};
use super::controller::ModeController;
use super::context::Agent;
use crate::error::{Result, VigilError};

/// Maps interactive commands onto agent and controller operations
pub struct CommandRouter {
    agent: Arc<Agent>,
    controller: Arc<ModeController>,
}

impl CommandRouter {
    pub fn new(agent: Arc<Agent>, controller: Arc<ModeController>) -> Self {
        Self { agent, controller }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn controller(&self) -> &Arc<ModeController> {
        &self.controller
    }

    /// Parse and run one input line
    pub async fn dispatch_line(&self, line: &str) -> Result<CommandOutput> {
        let command = Command::parse(line)?;
        self.dispatch(command).await
    }

    pub async fn dispatch(&self, command: Command) -> Result<CommandOutput> {
        let kind = command.kind();
        if !self.controller.supports(kind).await {
            return Err(VigilError::CommandUnavailable {
                command: kind.to_string(),
                mode: self.controller.mode().await.to_string(),
            });
        }
        debug!(command = %kind, "Dispatching command");

        match command {
            Command::Market { symbol } => {
                let snapshot = self.agent.market(symbol.as_deref()).await?;
                Ok(CommandOutput::Market(snapshot))
            }
            Command::Analyze { symbol } => {
                let (snapshot, decision) = self.agent.analyze(symbol.as_deref()).await?;
                Ok(CommandOutput::Analysis { snapshot, decision })
            }
            Command::Post { symbol } => {
                let (decision, result) = self.agent.post(symbol.as_deref()).await?;
                Ok(CommandOutput::Posted { decision, result })
            }
            Command::Pause => {
                let event = self.controller.enter_chat().await?;
                Ok(CommandOutput::ModeChanged {
                    from: event.from,
                    to: event.to,
                })
            }
            Command::Resume => {
                let event = self.controller.enter_auto().await?;
                Ok(CommandOutput::ModeChanged {
                    from: event.from,
                    to: event.to,
                })
            }
        }
    }
}
