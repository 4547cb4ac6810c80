use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use breba_protocol::CommandId;
use breba_protocol::DEFAULT_PORT;
use breba_protocol::Directive;
use breba_protocol::completion_marker;
use breba_protocol::write_frame;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::errors::ClientError;
use crate::response::CHUNK_CAPACITY;
use crate::response::PtyServerResponse;

const RETRY_POLL: Duration = Duration::from_millis(250);

/// Client side of the shell server connection.
///
/// The read half is shared behind a lock so that a handed-out
/// [`PtyServerResponse`] can keep streaming while the client sends further
/// directives, input injection included.
pub struct AsyncPtyClient {
    server_addr: SocketAddr,
    reader: Option<Arc<Mutex<tokio::net::tcp::OwnedReadHalf>>>,
    writer: Option<tokio::net::tcp::OwnedWriteHalf>,
}

impl AsyncPtyClient {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            reader: None,
            writer: None,
        }
    }

    /// A client aimed at a server on the loopback default port.
    pub fn local_default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Single connection attempt. Replaces any previous connection.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let stream = TcpStream::connect(self.server_addr)
            .await
            .map_err(|err| ClientError::connect(self.server_addr, err))?;
        self.install(stream);
        Ok(())
    }

    /// Retry connecting every 250ms until `max_wait` has elapsed. Servers
    /// booting inside a container take a while to start listening.
    pub async fn connect_with_retry(&mut self, max_wait: Duration) -> Result<(), ClientError> {
        let started = Instant::now();
        loop {
            match TcpStream::connect(self.server_addr).await {
                Ok(stream) => {
                    self.install(stream);
                    return Ok(());
                }
                Err(err) => {
                    if started.elapsed() >= max_wait {
                        debug!(error = ?err, "giving up on connecting to the shell server");
                        return Err(ClientError::ConnectTimeout { waited: max_wait });
                    }
                    debug!(error = ?err, "shell server not accepting connections yet");
                    tokio::time::sleep(RETRY_POLL).await;
                }
            }
        }
    }

    /// Shut the write half down and drop the connection. Safe to call when
    /// already disconnected.
    pub async fn disconnect(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.reader = None;
    }

    /// Frame `payload` and send it. Transport failures are logged and
    /// reported as `false` so callers decide how to recover.
    pub async fn send_message(&mut self, payload: &str) -> bool {
        let Some(writer) = self.writer.as_mut() else {
            warn!("cannot send message: client is not connected");
            return false;
        };
        match write_frame(writer, payload.as_bytes()).await {
            Ok(()) => true,
            Err(err) => {
                error!(error = ?err, "failed to send message to shell server");
                false
            }
        }
    }

    /// Send a run directive under a fresh command id and return the response
    /// accumulator bound to that id's completion marker.
    pub async fn send_command(&mut self, command: &str) -> Option<PtyServerResponse> {
        let command_id = CommandId::random();
        let directive = Directive::run_command(command, command_id.clone());
        let payload = match serde_json::to_string(&directive) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = ?err, "failed to encode run directive");
                return None;
            }
        };
        if !self.send_message(&payload).await {
            return None;
        }
        let reader = self.reader.clone()?;
        Some(PtyServerResponse::new(
            reader,
            Some(completion_marker(&command_id)),
        ))
    }

    /// Send text to the shell's stdin, for commands waiting on a prompt.
    pub async fn send_input(&mut self, input: &str) -> bool {
        let directive = Directive::provide_input(input);
        match serde_json::to_string(&directive) {
            Ok(payload) => self.send_message(&payload).await,
            Err(err) => {
                error!(error = ?err, "failed to encode input directive");
                false
            }
        }
    }

    /// Ask the server to shut down. The returned accumulator carries no
    /// completion marker; drain it with a timeout to read the closing ack.
    pub async fn send_quit(&mut self) -> Option<PtyServerResponse> {
        let payload = match serde_json::to_string(&Directive::Quit) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = ?err, "failed to encode quit directive");
                return None;
            }
        };
        if !self.send_message(&payload).await {
            return None;
        }
        let reader = self.reader.clone()?;
        Some(PtyServerResponse::new(reader, None))
    }

    /// One raw read from the server stream, waiting at most `timeout`.
    /// `None` on timeout, EOF, or when not connected.
    pub async fn next_chunk(&mut self, timeout: Duration) -> Option<String> {
        let reader = self.reader.clone()?;
        let mut guard = reader.lock().await;
        let mut buf = [0u8; CHUNK_CAPACITY];
        match tokio::time::timeout(timeout, guard.read(&mut buf)).await {
            Err(_) => None,
            Ok(Ok(0)) => None,
            Ok(Ok(n)) => Some(String::from_utf8_lossy(&buf[..n]).into_owned()),
            Ok(Err(err)) => {
                warn!(error = ?err, "reading from shell server failed");
                None
            }
        }
    }

    fn install(&mut self, stream: TcpStream) {
        let (read_half, write_half) = stream.into_split();
        self.reader = Some(Arc::new(Mutex::new(read_half)));
        self.writer = Some(write_half);
    }
}
