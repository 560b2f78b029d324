//! Main entry point for the Rust Caching Proxy

use clap::Parser;
use rust_caching_proxy::{
    console,
    init_logger_with_config,
    log_info,
    proxy::{ProxyServer, ProxyState},
    ProxyConfig,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rust-caching-proxy")]
#[command(about = "A caching and blocking HTTP forward proxy with an operator console")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Address to listen on, e.g. 127.0.0.1:8080 (overrides the config file)
    listen_addr: Option<SocketAddr>,

    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ProxyConfig::load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });
    if let Some(listen_addr) = cli.listen_addr {
        config.listen_addr = listen_addr;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }

    init_logger_with_config(&config.log_level);

    log_info!("🚀 Starting web proxy...");

    let state = Arc::new(ProxyState::from_config(&config));

    // Eviction runs for the lifetime of the process, independent of any request
    Arc::clone(&state.cache).spawn_evictor(config.cache.sweep_interval());

    if config.console.enabled {
        console::spawn(Arc::clone(&state));
    }

    ProxyServer::new(config.listen_addr, state).start().await
}
