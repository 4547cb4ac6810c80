//! Documentation verification by running a doc's commands in a live shell.
//!
//! An [`Agent`] extracts goals and commands from a document; a
//! [`CommandExecutor`] runs those commands in a persistent shell session and
//! captures their output, answering interactive prompts through an
//! [`InputProvider`]; the [`DocumentAnalyzer`] folds the per-command verdicts
//! into goal and document level reports.

mod agent;
mod analyzer;
mod container_executor;
mod environment;
mod errors;
mod executor;
mod input_provider;
mod local_executor;
mod reports;

pub use agent::Agent;
pub use agent::Goal;
pub use analyzer::DocumentAnalyzer;
pub use container_executor::ContainerCommandExecutor;
pub use container_executor::SOCKET_ERROR_TEXT;
pub use environment::EnvironmentProvisioner;
pub use environment::ExecutionEnvironment;
pub use errors::ExecutorError;
pub use executor::CommandExecutor;
pub use input_provider::AgentInputProvider;
pub use input_provider::InputProvider;
pub use input_provider::NO_OP_ANSWER;
pub use local_executor::LocalCommandExecutor;
pub use reports::CommandReport;
pub use reports::DocumentReport;
pub use reports::GoalReport;
pub use reports::ProjectReport;
