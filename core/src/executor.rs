use crate::agent::Agent;
use crate::errors::ExecutorError;
use crate::reports::CommandReport;

/// Runs commands in a persistent shell session and captures their output.
///
/// Errors surface only when a session cannot be brought up; once commands are
/// running, failures degrade to whatever output was captured so the analysis
/// can still render a verdict.
pub trait CommandExecutor {
    /// Run one command and return its captured console output, prompts and
    /// injected answers included. Opens a single-use session when the caller
    /// has not opened one.
    fn execute_command(&mut self, command: &str) -> Result<String, ExecutorError>;

    /// Run `commands` strictly in order within one session (auto-opened and
    /// closed when the caller has not opened one), handing each command's
    /// output to `agent` for a verdict.
    fn execute_commands_sync(
        &mut self,
        commands: &[String],
        agent: &dyn Agent,
    ) -> Result<Vec<CommandReport>, ExecutorError>;
}

/// Remove the completion marker from captured output: every `"<marker>\n"`
/// line, plus a bare trailing marker when the newline never made it through.
pub(crate) fn strip_marker(text: &str, marker: &str) -> String {
    let with_newline = format!("{marker}\n");
    let stripped = text.replace(&with_newline, "");
    if stripped.contains(marker) {
        stripped.replacen(marker, "", 1)
    } else {
        stripped
    }
}
