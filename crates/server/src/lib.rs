//! Live-reload HTTP server
//!
//! This crate wires the filesystem watcher to connected browsers: it serves
//! the reload script and the watched files, accepts WebSocket connections and
//! pushes a reload instruction to every client after each coalesced change.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod broadcaster;
mod http_server;
mod registry;
mod templates;

pub use broadcaster::{reload_message, Broadcaster};
pub use http_server::{build_router, AppState};
pub use registry::{
    BroadcastReport, ClientId, ClientRegistry, ReloadClient, DEFAULT_WRITE_TIMEOUT,
};

// Re-export error types from core
pub use reloadwatch_core::error::{Error, Result, ResultExt};

use reloadwatch_core::Config;
use reloadwatch_watcher::{FileWatcher, WatcherConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Run the live-reload server with the given configuration.
///
/// It:
/// 1. Walks `config.root_dir` and starts watching it
/// 2. Starts the coalescing and broadcasting tasks
/// 3. Binds the listener and serves until Ctrl+C
///
/// Failing to create the watcher or to bind the port is returned as an error;
/// everything after startup is logged and absorbed.
pub async fn run_server(config: Config) -> Result<()> {
    let watcher = FileWatcher::new(WatcherConfig::from(&config));
    let (ticks, _coalescer) = watcher.spawn(&config.root_dir)?;

    let registry = Arc::new(ClientRegistry::new());
    tokio::spawn(Broadcaster::new(Arc::clone(&registry), config.delay).run(ticks));

    let app = build_router(AppState {
        registry,
        root_dir: config.root_dir.clone(),
    });

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!("Unable to listen for Ctrl+C, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
