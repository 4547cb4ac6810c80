use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InteractiveProcessError {
    #[error("failed to spawn interactive shell: {pty_error}")]
    Spawn { pty_error: anyhow::Error },

    #[error("no output arrived within {timeout:?}")]
    ReadTimeout { timeout: Duration },

    #[error("shell process exited and its remaining output was drained")]
    Terminated,

    #[error("shell pipe failed: {error}")]
    ReadWrite {
        #[source]
        error: std::io::Error,
    },
}

impl InteractiveProcessError {
    pub(crate) fn spawn(pty_error: anyhow::Error) -> Self {
        Self::Spawn { pty_error }
    }

    pub(crate) fn read_write(error: std::io::Error) -> Self {
        Self::ReadWrite { error }
    }
}
