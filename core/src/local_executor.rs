use std::time::Duration;

use breba_process::InteractiveProcess;
use breba_process::InteractiveProcessError;
use breba_protocol::CommandId;
use breba_protocol::completion_marker;
use breba_protocol::echo_line;
use breba_protocol::wrap_command;
use tracing::debug;
use tracing::warn;

use crate::agent::Agent;
use crate::errors::ExecutorError;
use crate::executor::CommandExecutor;
use crate::executor::strip_marker;
use crate::input_provider::InputProvider;
use crate::reports::CommandReport;

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const STARTUP_QUIET: Duration = Duration::from_millis(100);

/// Executor that drives an interactive shell in this process, no server in
/// between. Useful when the commands are safe to run where the analyzer
/// runs.
pub struct LocalCommandExecutor {
    input_provider: Box<dyn InputProvider>,
    process: Option<InteractiveProcess>,
}

impl LocalCommandExecutor {
    pub fn new(input_provider: Box<dyn InputProvider>) -> Self {
        Self {
            input_provider,
            process: None,
        }
    }

    /// Spawn the session shell. Errors when a session is already open.
    pub fn open_session(&mut self) -> Result<(), ExecutorError> {
        if self.process.is_some() {
            return Err(ExecutorError::AlreadyConnected);
        }
        let process = InteractiveProcess::spawn().map_err(ExecutorError::spawn_shell)?;
        let noise = process.drain(STARTUP_QUIET);
        if !noise.is_empty() {
            debug!(noise = %noise, "discarded shell startup output");
        }
        self.process = Some(process);
        Ok(())
    }

    /// Kill the session shell. Errors when no session is open.
    pub fn close_session(&mut self) -> Result<(), ExecutorError> {
        match self.process.take() {
            Some(process) => {
                process.close();
                Ok(())
            }
            None => Err(ExecutorError::NotConnected),
        }
    }

    /// Echo the command, run it wrapped with a completion marker, and read
    /// until the marker arrives or the output goes quiet for good. A timeout
    /// with fresh output since the last consultation asks the input provider
    /// about it; a timeout with nothing new gives up with what was captured.
    fn run_in_shell(&mut self, command: &str) -> String {
        let Some(process) = self.process.as_ref() else {
            return String::new();
        };
        let command_id = CommandId::random();
        let marker = completion_marker(&command_id);

        match echo_line(command) {
            Ok(line) => {
                if let Err(err) = process.send_command(&line) {
                    warn!(error = ?err, "failed to write the echo line");
                }
            }
            Err(err) => {
                warn!(error = ?err, "command cannot be shell-quoted; skipping its echo line");
            }
        }
        if let Err(err) = process.send_command(&wrap_command(command, &command_id)) {
            warn!(error = ?err, "failed to write the command");
            return String::new();
        }

        let mut transcript = String::new();
        let mut new_output = String::new();
        loop {
            match process.read_nonblocking(READ_TIMEOUT) {
                Ok(chunk) => {
                    transcript.push_str(&chunk);
                    new_output.push_str(&chunk);
                    if transcript.contains(&marker) {
                        debug!("completion marker observed");
                        break;
                    }
                }
                Err(InteractiveProcessError::ReadTimeout { .. }) => {
                    if new_output.is_empty() {
                        debug!("no further output; giving up on this command");
                        break;
                    }
                    // Consult the provider about the output that arrived
                    // since the last consultation, then clear the tracker so
                    // back-to-back timeouts never re-ask about judged text.
                    let input = self.input_provider.get_input(&new_output);
                    new_output.clear();
                    if let Some(input) = input {
                        transcript.push_str(&input);
                        if let Err(err) = process.send_command(&input) {
                            warn!(error = ?err, "failed to answer the prompt");
                            break;
                        }
                    }
                }
                Err(err) => {
                    debug!(error = ?err, "end of process output");
                    break;
                }
            }
        }
        strip_marker(&transcript, &marker)
    }
}

impl CommandExecutor for LocalCommandExecutor {
    fn execute_command(&mut self, command: &str) -> Result<String, ExecutorError> {
        if self.process.is_none() {
            self.open_session()?;
            let output = self.run_in_shell(command);
            self.close_session()?;
            return Ok(output);
        }
        Ok(self.run_in_shell(command))
    }

    fn execute_commands_sync(
        &mut self,
        commands: &[String],
        agent: &dyn Agent,
    ) -> Result<Vec<CommandReport>, ExecutorError> {
        let auto_session = self.process.is_none();
        if auto_session {
            self.open_session()?;
        }
        let mut reports = Vec::with_capacity(commands.len());
        for command in commands {
            let output = self.run_in_shell(command);
            reports.push(agent.analyze_output(&output));
        }
        if auto_session {
            self.close_session()?;
        }
        Ok(reports)
    }
}
