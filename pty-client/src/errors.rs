use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to shell server at {addr}: {error}")]
    Connect {
        addr: SocketAddr,
        #[source]
        error: std::io::Error,
    },

    #[error("shell server did not accept a connection within {waited:?}")]
    ConnectTimeout { waited: Duration },
}

impl ClientError {
    pub(crate) fn connect(addr: SocketAddr, error: std::io::Error) -> Self {
        Self::Connect { addr, error }
    }
}
