use std::sync::Arc;
use std::time::Duration;

use breba_process::InteractiveProcess;
use breba_process::InteractiveProcessError;
use breba_protocol::CommandId;
use breba_protocol::Directive;
use breba_protocol::completion_marker;
use breba_protocol::echo_line;
use breba_protocol::read_frame;
use breba_protocol::wrap_command;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::errors::ServerError;

/// How often the output pump wakes to check for shell output and
/// cancellation.
const OUTPUT_POLL: Duration = Duration::from_millis(500);
/// Quiet window used to swallow whatever the shell prints on startup.
const STARTUP_QUIET: Duration = Duration::from_millis(100);
const COMMAND_QUEUE_DEPTH: usize = 128;
const OUTPUT_CHANNEL_DEPTH: usize = 64;
const SHUTDOWN_ACK: &str = "Server will shut down now.";

struct QueuedCommand {
    command: String,
    command_id: CommandId,
}

/// Serve one client connection with its own interactive shell.
///
/// Three pieces cooperate here: a blocking pump that moves shell output into
/// an async channel, a scheduler that runs queued commands one at a time and
/// streams their output to the socket, and the directive loop below that
/// reads frames and dispatches them. Input directives skip the queue so a
/// prompting command can be answered while it is still streaming.
pub(crate) async fn serve_connection(
    stream: TcpStream,
    shutdown: CancellationToken,
    server_shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let process = tokio::task::spawn_blocking(
        || -> Result<InteractiveProcess, InteractiveProcessError> {
            let process = InteractiveProcess::spawn()?;
            let noise = process.drain(STARTUP_QUIET);
            if !noise.is_empty() {
                debug!(noise = %noise, "discarded shell startup output");
            }
            Ok(process)
        },
    )
    .await
    .map_err(|err| ServerError::io(std::io::Error::other(err)))?
    .map_err(ServerError::spawn_shell)?;
    let process = Arc::new(process);

    let (mut read_half, write_half) = stream.into_split();
    let writer = Arc::new(Mutex::new(write_half));

    let (output_tx, output_rx) = mpsc::channel::<String>(OUTPUT_CHANNEL_DEPTH);
    let pump = {
        let process = Arc::clone(&process);
        let shutdown = shutdown.clone();
        tokio::task::spawn_blocking(move || {
            loop {
                if shutdown.is_cancelled() {
                    break;
                }
                match process.read_nonblocking(OUTPUT_POLL) {
                    Ok(chunk) => {
                        if output_tx.blocking_send(chunk).is_err() {
                            break;
                        }
                    }
                    Err(InteractiveProcessError::ReadTimeout { .. }) => {}
                    Err(_) => break,
                }
            }
        })
    };

    let (cmd_tx, cmd_rx) = mpsc::channel::<QueuedCommand>(COMMAND_QUEUE_DEPTH);
    let scheduler = {
        let process = Arc::clone(&process);
        let writer = Arc::clone(&writer);
        let shutdown = shutdown.clone();
        tokio::spawn(run_scheduler(process, writer, cmd_rx, output_rx, shutdown))
    };

    let result = loop {
        let frame = tokio::select! {
            () = shutdown.cancelled() => break Ok(()),
            frame = read_frame(&mut read_half) => frame,
        };
        match frame {
            Ok(None) => {
                info!("client closed the directive stream");
                break Ok(());
            }
            Ok(Some(payload)) => match serde_json::from_slice::<Directive>(&payload) {
                Ok(Directive::RunCommand {
                    command,
                    command_id,
                }) => {
                    debug!(command = %command, id = %command_id, "queueing command");
                    let queued = QueuedCommand {
                        command,
                        command_id,
                    };
                    if cmd_tx.send(queued).await.is_err() {
                        break Ok(());
                    }
                }
                Ok(Directive::ProvideInput { input }) => {
                    debug!("forwarding input to the shell");
                    if let Err(err) = process.send_command(&input) {
                        warn!(error = ?err, "failed to forward input to the shell");
                    }
                }
                Ok(Directive::Quit) => {
                    info!("quit directive received; shutting the server down");
                    shutdown.cancel();
                    let mut writer = writer.lock().await;
                    let _ = writer.write_all(SHUTDOWN_ACK.as_bytes()).await;
                    server_shutdown.cancel();
                    break Ok(());
                }
                Err(err) => {
                    warn!(error = ?err, "received an undecodable directive");
                    let reply = format!("Invalid directive: {err}");
                    let mut writer = writer.lock().await;
                    if writer.write_all(reply.as_bytes()).await.is_err() {
                        break Ok(());
                    }
                }
            },
            Err(err) => break Err(ServerError::transport(err)),
        }
    };

    shutdown.cancel();
    drop(cmd_tx);
    process.close();
    let _ = scheduler.await;
    let _ = pump.await;
    result
}

/// Pull queued commands and run them strictly one at a time. Exiting for any
/// reason cancels the connection: a shell that can no longer run commands is
/// not worth keeping a directive stream open for.
async fn run_scheduler(
    process: Arc<InteractiveProcess>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    mut cmd_rx: mpsc::Receiver<QueuedCommand>,
    mut output_rx: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) {
    loop {
        let queued = tokio::select! {
            () = shutdown.cancelled() => break,
            queued = cmd_rx.recv() => match queued {
                Some(queued) => queued,
                None => break,
            },
        };
        if !run_one_command(&process, &writer, &mut output_rx, &shutdown, &queued).await {
            break;
        }
    }
    shutdown.cancel();
}

/// Echo the command, run it wrapped with its completion marker, and stream
/// output until the marker has gone out. Returns `false` when the connection
/// or the shell is done for.
async fn run_one_command(
    process: &InteractiveProcess,
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    output_rx: &mut mpsc::Receiver<String>,
    shutdown: &CancellationToken,
    queued: &QueuedCommand,
) -> bool {
    match echo_line(&queued.command) {
        Ok(line) => {
            if process.send_command(&line).is_err() {
                return false;
            }
        }
        Err(err) => {
            warn!(error = ?err, "command cannot be shell-quoted; skipping its echo line");
        }
    }
    let wrapped = wrap_command(&queued.command, &queued.command_id);
    if process.send_command(&wrapped).is_err() {
        return false;
    }
    let marker = completion_marker(&queued.command_id);
    stream_until_marker(writer, output_rx, shutdown, &marker).await
}

/// Forward output chunks to the client until the completion marker has been
/// sent. The marker may arrive split across reads, so detection joins each
/// chunk with a carry tail; the bytes forwarded to the client are untouched.
async fn stream_until_marker(
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    output_rx: &mut mpsc::Receiver<String>,
    shutdown: &CancellationToken,
    marker: &str,
) -> bool {
    let carry_len = marker.len().saturating_sub(1);
    let mut carry = String::new();
    loop {
        let chunk = tokio::select! {
            () = shutdown.cancelled() => return false,
            chunk = output_rx.recv() => match chunk {
                Some(chunk) => chunk,
                None => return false,
            },
        };
        {
            let mut writer = writer.lock().await;
            if writer.write_all(chunk.as_bytes()).await.is_err() {
                return false;
            }
        }
        let window = format!("{carry}{chunk}");
        if window.contains(marker) {
            return true;
        }
        let tail_start = window
            .char_indices()
            .rev()
            .nth(carry_len.saturating_sub(1))
            .map_or(0, |(idx, _)| idx);
        carry = window[tail_start..].to_string();
    }
}
