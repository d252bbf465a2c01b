//! # beacon-gateway
//!
//! Gateway binary — the composition root. Constructs the ownership store,
//! channel registry, validator, and server explicitly, then serves until
//! interrupted.

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_server::access::InMemoryOwnershipStore;
use beacon_server::config::ServerConfig;
use beacon_server::metrics::install_recorder;
use beacon_server::server::GatewayServer;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Beacon gateway server.
#[derive(Parser, Debug)]
#[command(name = "beacon-gateway", about = "Beacon real-time gateway")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "9310")]
    port: u16,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Disable the Prometheus /metrics endpoint.
    #[arg(long)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig {
        host: cli.host,
        port: cli.port,
        ..ServerConfig::default()
    };
    if let Some(max) = cli.max_connections {
        config.max_connections = max;
    }

    // Dev wiring: an in-memory ownership store. Production deployments
    // implement `OwnershipStore` against the real persistence layer.
    let store = Arc::new(InMemoryOwnershipStore::new());

    let mut server = GatewayServer::new(config.clone(), store);
    if !cli.no_metrics {
        if let Some(handle) = install_recorder() {
            server = server.with_metrics_handle(handle);
        }
    }

    let router = server.router();
    let shutdown = server.shutdown().clone();

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local_addr = listener.local_addr().context("no local address")?;
    info!(%local_addr, "gateway listening");

    let signal_shutdown = shutdown.clone();
    let _signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_shutdown.shutdown();
        }
    });

    let token = shutdown.token();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("server error")?;

    info!("gateway stopped");
    Ok(())
}
