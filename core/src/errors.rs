use breba_process::InteractiveProcessError;
use breba_pty_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn the interactive shell: {error}")]
    SpawnShell {
        #[source]
        error: InteractiveProcessError,
    },

    #[error("failed to reach the shell server: {error}")]
    Connect {
        #[source]
        error: ClientError,
    },

    #[error("a session is already open")]
    AlreadyConnected,

    #[error("no session is open")]
    NotConnected,

    #[error("failed to start the executor runtime: {error}")]
    Runtime {
        #[source]
        error: std::io::Error,
    },
}

impl ExecutorError {
    pub(crate) fn spawn_shell(error: InteractiveProcessError) -> Self {
        Self::SpawnShell { error }
    }

    pub(crate) fn connect(error: ClientError) -> Self {
        Self::Connect { error }
    }

    pub(crate) fn runtime(error: std::io::Error) -> Self {
        Self::Runtime { error }
    }
}
