use anyhow::Result;
use clap::Parser;
use dns_forwarder::config::{ServerConfig, DEFAULT_PORT};
use dns_forwarder::dns_server::DNSServer;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser)]
#[command(name = "dns-forwarder")]
#[command(about = "Caching DNS forwarder")]
struct Cli {
    /// UDP port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = ServerConfig::with_port(cli.port);
    let server = DNSServer::new(config.clone())?;
    info!(
        listen = %server.local_addr()?,
        upstream = %config.upstream,
        "DNS server started"
    );

    server.start();

    Ok(())
}
