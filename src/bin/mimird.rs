//! mimird: the Mimir cache daemon.
//!
//! Builds the caches described in the configuration file, loads them,
//! refreshes them in the background and serves the management API over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mimir::CacheNotifier;
use mimir::server::{Config, create_router};

/// Mimir daemon, a refreshable cache service.
#[derive(Parser)]
#[command(name = "mimird")]
#[command(version = mimir::version::PKG_VERSION)]
#[command(about = "Mimir cache daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    // Parse address
    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| mimir::MimirError::Configuration(format!("Invalid address: {e}")))?;

    // Build and load caches
    let notifier = Arc::new(CacheNotifier::new());
    let registry = Arc::new(config.build_registry(notifier)?);
    registry.initialize_all().await?;

    let _schedulers = registry.spawn_schedulers(&config.scheduler.to_scheduler_config());

    info!(version = mimir::version::PKG_VERSION, %addr, caches = registry.len(), "mimird starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, create_router(Arc::clone(&registry)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("mimird stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
