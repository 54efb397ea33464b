#![forbid(unsafe_code)]

use clap::Parser;
use keystone_gateway_lib::{config::load_from_path, proxy, Gateway};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Keystone Gateway (multi-tenant reverse proxy)")]
struct Cli {
    /// Path to configuration YAML file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Listen address (host:port), overrides server.port
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let addr_str = cli.addr.unwrap_or_else(|| cfg.server.listen_addr());
    let addr: SocketAddr = match addr_str.parse() {
        Ok(addr) => addr,
        Err(_) => {
            error!(%addr_str, "invalid listen address");
            std::process::exit(1);
        }
    };

    info!(tenants = cfg.tenants.len(), %addr, "configuration loaded");

    let gateway = match Gateway::build(cfg) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!(%err, "failed to build gateway");
            std::process::exit(1);
        }
    };

    if let Err(err) = proxy::run(gateway, addr).await {
        error!(%err, "gateway exited with error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
