//! files-bridge server binary.
//!
//! Launches the MCP file server as a child process, then serves the REST
//! API, the WebSocket endpoint and the browser page until Ctrl+C / SIGTERM.

use std::sync::Arc;

use clap::Parser;
use files_bridge_core::{Connection, ProcessConnector};
use files_bridge_web::{build_router, AppState, Config};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("Starting files-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("  Host: {}", config.host);
    info!("  Port: {}", config.port);
    info!("  Storage: {}", config.storage_dir.display());
    info!(
        "  MCP server: {} {}",
        config.server_command, config.server_path
    );

    let connector = Arc::new(ProcessConnector::new(config.process_spec()));
    let connection = Arc::new(Connection::new(connector));

    let shutdown_rx = create_shutdown_signal();
    let state = AppState::new(connection).with_shutdown(shutdown_rx.clone());

    if config.auto_connect {
        if let Err(e) = state.connect().await {
            warn!("Initial connection failed: {}", e);
            warn!("  POST /api/connect to retry");
        }
    } else {
        info!("  Auto-connect disabled, waiting for POST /api/connect");
    }

    let app = build_router(state.clone(), config.body_limit());

    // Bind and serve
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|&v| v).await;
        })
        .await?;

    let final_state = state.disconnect().await;
    info!("MCP connection state: {:?}", final_state);
    info!("Server shutdown complete");
    Ok(())
}

/// Create a shutdown signal that triggers on Ctrl+C or SIGTERM.
fn create_shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            info!("Received Ctrl+C, initiating shutdown");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
            info!("Received SIGTERM, initiating shutdown");
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        let _ = tx.send(true);
    });

    rx
}
