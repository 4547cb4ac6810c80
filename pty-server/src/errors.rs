use std::net::SocketAddr;

use breba_process::InteractiveProcessError;
use breba_protocol::FramingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind shell server to {addr}: {error}")]
    Bind {
        addr: SocketAddr,
        #[source]
        error: std::io::Error,
    },

    #[error("failed to spawn the interactive shell: {error}")]
    SpawnShell {
        #[source]
        error: InteractiveProcessError,
    },

    #[error("directive stream broke: {error}")]
    Transport {
        #[source]
        error: FramingError,
    },

    #[error("server socket error: {error}")]
    Io {
        #[source]
        error: std::io::Error,
    },
}

impl ServerError {
    pub(crate) fn bind(addr: SocketAddr, error: std::io::Error) -> Self {
        Self::Bind { addr, error }
    }

    pub(crate) fn spawn_shell(error: InteractiveProcessError) -> Self {
        Self::SpawnShell { error }
    }

    pub(crate) fn transport(error: FramingError) -> Self {
        Self::Transport { error }
    }

    pub(crate) fn io(error: std::io::Error) -> Self {
        Self::Io { error }
    }
}
