//! Edge Router
//!
//! Routes every request for a hosted site: resolves the hostname to an
//! environment, applies its redirect/rewrite/proxy rules, and picks the
//! deployment that serves it under percentage rollouts.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing::EdgeRouter ──▶ store (HostResolver)
//!                          │                 │
//!                          │                 ├──▶ routing::cache (EnvironmentSnapshot)
//!                          │                 ├──▶ rules (first match → Outcome)
//!                          │                 └──▶ rollout (TrafficSplitter)
//!                          ▼
//!     Client Response ◀── redirect | proxy upstream | serve from deployment origin
//!
//!     Cross-cutting: config (+ watcher), observability, lifecycle, admin API
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_router::config::{loader::load_config, watcher::ConfigWatcher, EdgeConfig};
use edge_router::http::HttpServer;
use edge_router::lifecycle::{self, Shutdown};
use edge_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "edge-router", version, about = "Edge router for hosted sites")]
struct Args {
    /// Path to the TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };

    logging::init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-router starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        sites = config.sites.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Keep the watcher alive for the lifetime of the process.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = tokio::sync::mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone());

    let admin = if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        Some((admin_listener, server.admin_app()))
    } else {
        None
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                return;
            }
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        });
    }

    let edge = server.run(listener, config_updates, shutdown.subscribe());
    match admin {
        Some((admin_listener, app)) => {
            let admin_shutdown = shutdown.subscribe();
            let admin = async move {
                axum::serve(admin_listener, app)
                    .with_graceful_shutdown(lifecycle::shutdown::wait(admin_shutdown))
                    .await
            };
            futures_util::future::try_join(edge, admin).await?;
        }
        None => edge.await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
