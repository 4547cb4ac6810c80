use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::connection;
use crate::errors::ServerError;

/// Listening shell server.
///
/// `bind` then `serve`; the accept loop runs until the shutdown token is
/// cancelled, which happens when a client sends a quit directive or the owner
/// cancels the token it obtained from [`PtyServer::shutdown_token`].
pub struct PtyServer {
    listener: TcpListener,
    shutdown: CancellationToken,
}

impl PtyServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::bind(addr, err))?;
        Ok(Self {
            listener,
            shutdown: CancellationToken::new(),
        })
    }

    /// The bound address. Useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::io)
    }

    /// A handle that stops the accept loop (and all connections) when
    /// cancelled. Cloned freely.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept connections until shut down. Each connection runs its own
    /// shell; a connection failing or closing never stops the listener.
    pub async fn serve(self) -> Result<(), ServerError> {
        loop {
            let accepted = tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "client connected");
                    let conn_shutdown = self.shutdown.child_token();
                    let server_shutdown = self.shutdown.clone();
                    tokio::spawn(async move {
                        match connection::serve_connection(stream, conn_shutdown, server_shutdown)
                            .await
                        {
                            Ok(()) => info!(%peer, "connection closed"),
                            Err(err) => warn!(%peer, error = ?err, "connection failed"),
                        }
                    });
                }
                Err(err) => {
                    // Transient accept failures (fd exhaustion and the like)
                    // must not kill the listener.
                    warn!(error = ?err, "failed to accept a connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        info!("shell server stopped accepting connections");
        Ok(())
    }
}
