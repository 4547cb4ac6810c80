use std::net::SocketAddr;
use std::sync::Arc;

use breba_protocol::DEFAULT_PORT;
use tracing::info;

use crate::agent::Agent;
use crate::container_executor::ContainerCommandExecutor;
use crate::errors::ExecutorError;
use crate::executor::CommandExecutor;
use crate::input_provider::AgentInputProvider;
use crate::reports::DocumentReport;
use crate::reports::GoalReport;

/// Verifies a document by running its commands, goal by goal, against a
/// shell server.
pub struct DocumentAnalyzer {
    agent: Arc<dyn Agent>,
    server_addr: SocketAddr,
}

impl DocumentAnalyzer {
    /// Analyzer aimed at a server on the loopback default port.
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self::with_address(agent, SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }

    pub fn with_address(agent: Arc<dyn Agent>, server_addr: SocketAddr) -> Self {
        Self { agent, server_addr }
    }

    /// Run every goal's commands and fold the verdicts into a report.
    ///
    /// Each goal gets a fresh executor, so its commands share one shell
    /// session and goals never leak state into each other.
    pub fn analyze(
        &self,
        document: &str,
        file: impl Into<String>,
    ) -> Result<DocumentReport, ExecutorError> {
        let goals = self.agent.fetch_goals(document);
        info!(goals = goals.len(), "analyzing document");
        let mut goal_reports = Vec::with_capacity(goals.len());
        for goal in goals {
            let commands = self.agent.fetch_commands(document, &goal);
            info!(goal = %goal.name, commands = commands.len(), "verifying goal");
            let provider = AgentInputProvider::new(Arc::clone(&self.agent));
            let mut executor =
                ContainerCommandExecutor::with_address(Box::new(provider), self.server_addr)?;
            let command_reports = executor.execute_commands_sync(&commands, self.agent.as_ref())?;
            goal_reports.push(GoalReport {
                goal_name: goal.name,
                goal_description: goal.description,
                command_reports,
            });
        }
        Ok(DocumentReport {
            file: file.into(),
            goal_reports,
        })
    }
}
