use serde::Deserialize;
use serde::Serialize;

use crate::reports::CommandReport;

/// Something a user is trying to accomplish with the documentation, as
/// extracted by the analysis collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub name: String,
    pub description: String,
}

/// The analysis collaborator: extracts goals and commands from a document,
/// judges command output, and answers interactive prompts. Implementations
/// typically sit in front of a language model; this crate only depends on
/// the interface.
pub trait Agent: Send + Sync {
    /// Goals a reader can accomplish via a terminal, per the document.
    fn fetch_goals(&self, document: &str) -> Vec<Goal>;

    /// The commands the document says will accomplish `goal`, in order.
    fn fetch_commands(&self, document: &str, goal: &Goal) -> Vec<String>;

    /// Verdict on one command's captured console output.
    fn analyze_output(&self, output: &str) -> CommandReport;

    /// Answer to a pending prompt in `output`, or the designated no-op
    /// answer when nothing is being asked.
    fn provide_input(&self, output: &str) -> String;
}
