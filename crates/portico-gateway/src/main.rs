use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use portico_gateway::context::GatewayContext;
use portico_gateway::proxy::transport::HyperTransport;
use portico_gateway::registry::ProfileRegistry;
use portico_gateway::server::GatewayServer;

#[derive(Parser, Debug)]
#[command(
    name = "portico-gateway",
    about = "Configuration-driven interface gateway with per-interface mocking"
)]
struct Args {
    /// Path to the interface configuration document
    #[arg(short, long, env = "PORTICO_CONFIG", default_value = "interface.json")]
    config: String,

    /// Listen port
    #[arg(short, long, env = "PORTICO_PORT", default_value = "8080")]
    port: u16,

    /// Listen host
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let registry = ProfileRegistry::load_file(&args.config)
        .with_context(|| format!("loading interface configuration from {}", args.config))?;
    let ctx = Arc::new(GatewayContext::new(
        registry,
        Arc::new(HyperTransport::new()),
    ));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("invalid listen address")?;
    GatewayServer::new(addr, ctx).run().await
}
