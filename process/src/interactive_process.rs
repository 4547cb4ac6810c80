use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use portable_pty::ChildKiller;
use portable_pty::CommandBuilder;
use portable_pty::PtySize;
use portable_pty::native_pty_system;
use tracing::warn;

use crate::errors::InteractiveProcessError;

const DEFAULT_SHELL: &str = "/bin/bash";
/// First line fed to the shell: silence tty echo and CR/NL translation so the
/// stream carries only what commands print, disable history expansion, then
/// print a readiness probe.
const SETUP_LINE: &str = "stty -echo -onlcr 2> /dev/null; set +H; echo __shell_ready__";
const READY_PROBE: &str = "__shell_ready__";
const READY_WAIT: Duration = Duration::from_secs(2);
const DRAIN_MAX: Duration = Duration::from_secs(2);

/// A long-lived interactive shell on a PTY.
///
/// Reads and writes go through dedicated threads, so `send_command` never
/// blocks on a full PTY buffer and `read_nonblocking` returns within its
/// timeout regardless of what the shell is doing.
pub struct InteractiveProcess {
    writer_tx: mpsc::Sender<Vec<u8>>,
    output_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    exited: Arc<AtomicBool>,
}

impl InteractiveProcess {
    /// Spawn `/bin/bash` on a fresh PTY with prompts and echo neutralized,
    /// and wait until the shell has confirmed its terminal settings.
    pub fn spawn() -> Result<Self, InteractiveProcessError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(InteractiveProcessError::spawn)?;

        let mut command = CommandBuilder::new(DEFAULT_SHELL);
        command.arg("--noediting");
        command.arg("--norc");
        command.arg("--noprofile");
        command.env("PS1", "");
        command.env("PS2", "");
        command.env("TERM", "dumb");

        let mut child = pair
            .slave
            .spawn_command(command)
            .map_err(InteractiveProcessError::spawn)?;
        let killer = child.clone_killer();

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(InteractiveProcessError::spawn)?;
        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>();
        thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if output_tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        let mut writer = pair
            .master
            .take_writer()
            .map_err(InteractiveProcessError::spawn)?;
        let (writer_tx, writer_rx) = mpsc::channel::<Vec<u8>>();
        thread::spawn(move || {
            while let Ok(bytes) = writer_rx.recv() {
                if writer.write_all(&bytes).is_err() || writer.flush().is_err() {
                    break;
                }
            }
        });

        let exited = Arc::new(AtomicBool::new(false));
        let wait_exited = Arc::clone(&exited);
        thread::spawn(move || {
            let _ = child.wait();
            wait_exited.store(true, Ordering::SeqCst);
        });

        let process = Self {
            writer_tx,
            output_rx: Mutex::new(output_rx),
            killer: Mutex::new(killer),
            exited,
        };
        process.send_command(SETUP_LINE)?;
        process.await_ready();
        Ok(process)
    }

    /// Queue `command` for the shell's stdin, appending a newline when the
    /// caller left one off. Never blocks on the shell consuming it.
    pub fn send_command(&self, command: &str) -> Result<(), InteractiveProcessError> {
        let mut line = command.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.writer_tx.send(line.into_bytes()).map_err(|_| {
            InteractiveProcessError::read_write(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "shell stdin writer is gone",
            ))
        })
    }

    /// Return whatever output arrives within `timeout`, coalescing everything
    /// already buffered into one string. `ReadTimeout` means the shell stayed
    /// silent; `Terminated` means the process is gone and fully drained.
    pub fn read_nonblocking(&self, timeout: Duration) -> Result<String, InteractiveProcessError> {
        let Ok(receiver) = self.output_rx.lock() else {
            return Err(InteractiveProcessError::Terminated);
        };
        match receiver.recv_timeout(timeout) {
            Ok(first) => {
                let mut bytes = first;
                while let Ok(more) = receiver.try_recv() {
                    bytes.extend_from_slice(&more);
                }
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(RecvTimeoutError::Timeout) => Err(InteractiveProcessError::ReadTimeout { timeout }),
            Err(RecvTimeoutError::Disconnected) => Err(InteractiveProcessError::Terminated),
        }
    }

    /// Read until a `quiet` window passes with no output, bounded overall.
    /// Used once after startup so leftover shell noise never reaches callers.
    pub fn drain(&self, quiet: Duration) -> String {
        let deadline = Instant::now() + DRAIN_MAX;
        let mut drained = String::new();
        while Instant::now() < deadline {
            match self.read_nonblocking(quiet) {
                Ok(chunk) => drained.push_str(&chunk),
                Err(_) => break,
            }
        }
        drained
    }

    /// Whether the shell process has exited. Buffered output may still be
    /// readable after this turns true.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Kill the shell, tolerating a process that is already gone.
    pub fn close(&self) {
        if let Ok(mut killer) = self.killer.lock() {
            let _ = killer.kill();
        }
    }

    /// Wait (bounded) for the readiness probe, which proves the `stty` call
    /// ran before it. Echo is still on while the setup line itself is typed,
    /// so the probe text appears twice; only a line that is exactly the probe
    /// counts.
    fn await_ready(&self) {
        let deadline = Instant::now() + READY_WAIT;
        let mut seen = String::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("shell readiness probe did not arrive within {READY_WAIT:?}");
                return;
            }
            match self.read_nonblocking(remaining) {
                Ok(chunk) => {
                    seen.push_str(&chunk);
                    if seen
                        .lines()
                        .any(|line| line.trim_end_matches('\r') == READY_PROBE)
                    {
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    }
}

impl Drop for InteractiveProcess {
    fn drop(&mut self) {
        self.close();
    }
}
