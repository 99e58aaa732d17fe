//! Hi-Fi Playback Engine - Process Entry Point
//!
//! Parses CLI flags, starts the control-plane HTTP/WebSocket server, and
//! drives the analyzer pump for the lifetime of the process.

mod error;
mod routes;
mod ws;

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hifi_core::Engine;
use routes::AppState;

/// Hi-Fi playback engine control server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory to cache resampled tracks in. Caching is disabled if unset.
    #[arg(long)]
    resample_cache_dir: Option<std::path::PathBuf>,

    /// Address to bind the HTTP/WebSocket control server on.
    #[arg(long, default_value = "127.0.0.1:5555")]
    bind: SocketAddr,

    /// `tracing_subscriber::EnvFilter` directive, e.g. "info" or "hifi_core=debug".
    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let engine = Arc::new(Engine::new(args.resample_cache_dir.clone()));

    let pump_handle = tokio::spawn(hifi_core::run_analyzer_pump(Arc::clone(&engine)));

    let app = routes::create_router(AppState { engine: Arc::clone(&engine) });
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "control server listening");

    // Printed (and flushed) only once the server is actually accepting
    // connections, so a parent process can synchronize on this line.
    println!("FLASK_SERVER_READY");
    std::io::stdout().flush()?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pump_handle.abort();
    let _ = tokio::time::timeout(Duration::from_secs(2), pump_handle).await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
