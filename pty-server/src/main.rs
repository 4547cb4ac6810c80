use std::net::IpAddr;
use std::net::SocketAddr;

use breba_protocol::DEFAULT_PORT;
use breba_pty_server::PtyServer;
use clap::Parser;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "breba-pty-server",
    about = "Runs shell commands for remote clients over TCP"
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn setup_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let addr = SocketAddr::new(cli.host, cli.port);
    let server = PtyServer::bind(addr).await?;
    info!(addr = %server.local_addr()?, "shell server listening");
    server.serve().await?;
    Ok(())
}
