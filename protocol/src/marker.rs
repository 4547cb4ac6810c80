use shlex::QuoteError;

use crate::directive::CommandId;

/// Marker text echoed by the shell once `command_id`'s command has finished.
pub fn completion_marker(command_id: &CommandId) -> String {
    format!("Completed {command_id}")
}

/// Wrap `command` so the shell emits the completion marker on both the
/// success and the failure branch.
pub fn wrap_command(command: &str, command_id: &CommandId) -> String {
    let marker = completion_marker(command_id);
    format!("{command} && echo {marker} || echo {marker}")
}

/// Line that makes the shell print `$ <command>` verbatim, delimiting command
/// boundaries in the output stream. Quoting keeps the shell from expanding
/// anything inside the command text.
pub fn echo_line(command: &str) -> Result<String, QuoteError> {
    let quoted = shlex::try_quote(command)?;
    Ok(format!("echo $ {quoted}"))
}
