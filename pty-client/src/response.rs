use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::Mutex;
use tracing::warn;

pub(crate) const CHUNK_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// More output may still arrive.
    Pending,
    /// The bound completion marker appeared in the accumulated output.
    Completed,
    /// The most recent pull timed out. The next pull resumes reading.
    TimedOut,
    /// The server closed the connection.
    Closed,
}

/// Accumulates one command's output from the shared server stream.
///
/// The server interleaves nothing: commands run one at a time, so everything
/// read between sending a command and seeing its completion marker belongs to
/// that command.
pub struct PtyServerResponse {
    reader: Arc<Mutex<OwnedReadHalf>>,
    marker: Option<String>,
    status: ResponseStatus,
    accumulated: String,
}

impl PtyServerResponse {
    pub(crate) fn new(reader: Arc<Mutex<OwnedReadHalf>>, marker: Option<String>) -> Self {
        Self {
            reader,
            marker,
            status: ResponseStatus::Pending,
            accumulated: String::new(),
        }
    }

    /// Pull the next raw chunk, waiting at most `timeout`.
    ///
    /// Returns `None` once the response is complete or the stream is closed,
    /// and on a pull that times out; a timed-out response resumes on the next
    /// pull. The marker may arrive split across chunks, so completion is
    /// judged against the accumulated text.
    pub async fn next_chunk(&mut self, timeout: Duration) -> Option<String> {
        if matches!(
            self.status,
            ResponseStatus::Completed | ResponseStatus::Closed
        ) {
            return None;
        }
        self.status = ResponseStatus::Pending;

        let mut guard = self.reader.lock().await;
        let mut buf = [0u8; CHUNK_CAPACITY];
        match tokio::time::timeout(timeout, guard.read(&mut buf)).await {
            Err(_) => {
                self.status = ResponseStatus::TimedOut;
                None
            }
            Ok(Ok(0)) => {
                self.status = ResponseStatus::Closed;
                None
            }
            Ok(Ok(n)) => {
                drop(guard);
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                self.accumulated.push_str(&chunk);
                if let Some(marker) = &self.marker {
                    if self.accumulated.contains(marker.as_str()) {
                        self.status = ResponseStatus::Completed;
                    }
                }
                Some(chunk)
            }
            Ok(Err(err)) => {
                warn!(error = ?err, "reading from shell server failed");
                self.status = ResponseStatus::Closed;
                None
            }
        }
    }

    /// Drain chunks until the response completes, times out, or closes, then
    /// return the accumulated text with the completion marker stripped.
    pub async fn text(&mut self, timeout: Duration) -> String {
        while self.next_chunk(timeout).await.is_some() {}
        self.stripped_text()
    }

    pub fn completed(&self) -> bool {
        self.status == ResponseStatus::Completed
    }

    pub fn timed_out(&self) -> bool {
        self.status == ResponseStatus::TimedOut
    }

    pub fn closed(&self) -> bool {
        self.status == ResponseStatus::Closed
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// The completion marker this response is bound to, if any. A quit ack
    /// carries none and terminates on timeout or EOF instead.
    pub fn completion_marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    fn stripped_text(&self) -> String {
        let Some(marker) = &self.marker else {
            return self.accumulated.clone();
        };
        let with_newline = format!("{marker}\n");
        if self.accumulated.contains(&with_newline) {
            self.accumulated.replacen(&with_newline, "", 1)
        } else {
            self.accumulated.replacen(marker.as_str(), "", 1)
        }
    }
}
