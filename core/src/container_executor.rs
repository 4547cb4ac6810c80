use std::net::SocketAddr;
use std::time::Duration;

use breba_protocol::DEFAULT_PORT;
use breba_pty_client::AsyncPtyClient;
use breba_pty_client::PtyServerResponse;
use tokio::runtime::Builder;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::agent::Agent;
use crate::errors::ExecutorError;
use crate::executor::CommandExecutor;
use crate::executor::strip_marker;
use crate::input_provider::InputProvider;
use crate::reports::CommandReport;

/// Returned in place of output when a directive cannot be sent at all.
pub const SOCKET_ERROR_TEXT: &str = "Error occurred due to socket error. See log for details";

/// How long one streaming pull waits before the retry/input policy runs.
const STREAM_TIMEOUT: Duration = Duration::from_millis(500);
/// Consecutive non-productive timeouts tolerated before giving up.
const MAX_RETRIES: u32 = 2;
/// Connection allowance; servers booting inside a container take a while.
const CONNECT_WAIT: Duration = Duration::from_secs(15);

/// Executor that runs commands through the shell server, one connection per
/// session.
///
/// All public methods are synchronous: the executor owns a single-thread
/// runtime and bridges into it with `block_on`, so callers can invoke it
/// from whatever worker thread they happen to be on. Async callers use
/// [`ContainerCommandExecutor::execute_command_async`] instead.
pub struct ContainerCommandExecutor {
    input_provider: Box<dyn InputProvider>,
    server_addr: SocketAddr,
    client: Option<AsyncPtyClient>,
    runtime: Runtime,
}

impl ContainerCommandExecutor {
    /// Executor aimed at a server on the loopback default port.
    pub fn new(input_provider: Box<dyn InputProvider>) -> Result<Self, ExecutorError> {
        Self::with_address(input_provider, SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }

    pub fn with_address(
        input_provider: Box<dyn InputProvider>,
        server_addr: SocketAddr,
    ) -> Result<Self, ExecutorError> {
        let runtime = Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(ExecutorError::runtime)?;
        Ok(Self {
            input_provider,
            server_addr,
            client: None,
            runtime,
        })
    }

    /// Open the session connection. Errors when one is already open.
    pub fn connect(&mut self) -> Result<(), ExecutorError> {
        if self.client.is_some() {
            return Err(ExecutorError::AlreadyConnected);
        }
        let mut client = AsyncPtyClient::new(self.server_addr);
        self.runtime
            .block_on(client.connect_with_retry(CONNECT_WAIT))
            .map_err(ExecutorError::connect)?;
        self.client = Some(client);
        Ok(())
    }

    /// Close the session connection. Errors when none is open.
    pub fn disconnect(&mut self) -> Result<(), ExecutorError> {
        match self.client.take() {
            Some(mut client) => {
                self.runtime.block_on(client.disconnect());
                Ok(())
            }
            None => Err(ExecutorError::NotConnected),
        }
    }

    /// Async counterpart of `execute_command`, for callers already inside a
    /// runtime. Opens a single-use session when none is open.
    pub async fn execute_command_async(&mut self, command: &str) -> Result<String, ExecutorError> {
        let auto_session = self.client.is_none();
        if auto_session {
            let mut client = AsyncPtyClient::new(self.server_addr);
            client
                .connect_with_retry(CONNECT_WAIT)
                .await
                .map_err(ExecutorError::connect)?;
            self.client = Some(client);
        }
        let Self {
            input_provider,
            client,
            ..
        } = self;
        let output = match client.as_mut() {
            Some(client) => do_execute(client, input_provider.as_ref(), command).await,
            None => SOCKET_ERROR_TEXT.to_string(),
        };
        if auto_session {
            if let Some(mut client) = self.client.take() {
                client.disconnect().await;
            }
        }
        Ok(output)
    }

    fn blocking_execute(&mut self, command: &str) -> String {
        let Self {
            input_provider,
            client,
            runtime,
            ..
        } = self;
        match client.as_mut() {
            Some(client) => {
                runtime.block_on(do_execute(client, input_provider.as_ref(), command))
            }
            None => SOCKET_ERROR_TEXT.to_string(),
        }
    }
}

impl CommandExecutor for ContainerCommandExecutor {
    fn execute_command(&mut self, command: &str) -> Result<String, ExecutorError> {
        if self.client.is_none() {
            self.connect()?;
            let output = self.blocking_execute(command);
            self.disconnect()?;
            return Ok(output);
        }
        Ok(self.blocking_execute(command))
    }

    fn execute_commands_sync(
        &mut self,
        commands: &[String],
        agent: &dyn Agent,
    ) -> Result<Vec<CommandReport>, ExecutorError> {
        let auto_session = self.client.is_none();
        if auto_session {
            self.connect()?;
        }
        let mut reports = Vec::with_capacity(commands.len());
        for command in commands {
            let output = self.blocking_execute(command);
            reports.push(agent.analyze_output(&output));
        }
        if auto_session {
            self.disconnect()?;
        }
        Ok(reports)
    }
}

async fn do_execute(
    client: &mut AsyncPtyClient,
    input_provider: &dyn InputProvider,
    command: &str,
) -> String {
    match client.send_command(command).await {
        Some(mut response) => read_response(client, input_provider, &mut response).await,
        None => SOCKET_ERROR_TEXT.to_string(),
    }
}

/// Stream a command's output with the retry/input policy.
///
/// Every received chunk resets the retry counter. A timed-out pull consults
/// the input provider, but only when the chunk count grew since the last
/// consultation, and only about the newest chunk; a successfully sent answer
/// joins the transcript and also resets the counter. Two consecutive
/// non-productive timeouts give up with whatever was captured.
async fn read_response(
    client: &mut AsyncPtyClient,
    input_provider: &dyn InputProvider,
    response: &mut PtyServerResponse,
) -> String {
    let mut retries: u32 = 0;
    let mut chunks: Vec<String> = Vec::new();
    let mut gate = InputGate::new();
    loop {
        while let Some(chunk) = response.next_chunk(STREAM_TIMEOUT).await {
            debug!(chunk = %chunk, "chunk from shell server");
            chunks.push(chunk);
            retries = 0;
        }
        if response.completed() || response.closed() {
            break;
        }
        debug!(retries, "no new output within the stream timeout");
        if provide_input(client, input_provider, &mut gate, &mut chunks).await {
            retries = 0;
        } else {
            retries += 1;
        }
        if retries >= MAX_RETRIES {
            debug!("giving up waiting for more output");
            break;
        }
    }
    let transcript = chunks.concat();
    match response.completion_marker() {
        Some(marker) => strip_marker(&transcript, marker),
        None => transcript,
    }
}

/// Ask the provider about fresh output and forward its answer to the shell.
/// Returns whether an answer was actually delivered.
async fn provide_input(
    client: &mut AsyncPtyClient,
    input_provider: &dyn InputProvider,
    gate: &mut InputGate,
    chunks: &mut Vec<String>,
) -> bool {
    let Some(newest) = gate.newest_unseen(chunks) else {
        return false;
    };
    let Some(input) = input_provider.get_input(&newest) else {
        return false;
    };
    if client.send_input(&input).await {
        // The shell does not echo injected input, so keep the answer in the
        // transcript ourselves, and teach the gate not to re-judge it.
        chunks.push(input);
        gate.mark_seen(chunks.len());
        true
    } else {
        false
    }
}

/// Tracks which chunks the input provider has already been consulted about:
/// it is asked again only when the chunk count grew, and it only ever sees
/// the newest chunk.
struct InputGate {
    seen_chunks: usize,
}

impl InputGate {
    fn new() -> Self {
        Self { seen_chunks: 0 }
    }

    fn newest_unseen(&mut self, chunks: &[String]) -> Option<String> {
        if chunks.is_empty() || chunks.len() == self.seen_chunks {
            return None;
        }
        self.seen_chunks = chunks.len();
        chunks.last().cloned()
    }

    fn mark_seen(&mut self, count: usize) {
        self.seen_chunks = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    struct NeverAnswer;

    impl InputProvider for NeverAnswer {
        fn get_input(&self, _console_output: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn the_gate_only_opens_when_chunks_arrive() {
        let mut gate = InputGate::new();
        assert_eq!(gate.newest_unseen(&[]), None);

        let chunks = vec!["$ ls\n".to_string()];
        assert_eq!(gate.newest_unseen(&chunks), Some("$ ls\n".to_string()));
        assert_eq!(gate.newest_unseen(&chunks), None);

        let chunks = vec!["$ ls\n".to_string(), "README.md\n".to_string()];
        assert_eq!(gate.newest_unseen(&chunks), Some("README.md\n".to_string()));
    }

    #[test]
    fn marked_chunks_are_never_re_judged() {
        let mut gate = InputGate::new();
        let mut chunks = vec!["Proceed? ".to_string()];
        assert!(gate.newest_unseen(&chunks).is_some());

        chunks.push("yes".to_string());
        gate.mark_seen(chunks.len());
        assert_eq!(gate.newest_unseen(&chunks), None);
    }

    #[test]
    fn a_failed_send_surfaces_the_socket_error_text() {
        let addr: SocketAddr = "127.0.0.1:9".parse().expect("static addr");
        let mut executor =
            ContainerCommandExecutor::with_address(Box::new(NeverAnswer), addr).expect("runtime");
        // A client that was never connected: sends fail, and the executor
        // must degrade to the error text instead of erroring out.
        executor.client = Some(AsyncPtyClient::new(addr));
        let output = executor.execute_command("ls").expect("session exists");
        assert_eq!(output, SOCKET_ERROR_TEXT);
    }
}
