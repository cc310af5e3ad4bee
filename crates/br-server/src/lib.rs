//! br-server: HTTP front end for blobreel.
//!
//! Serves decrypted streams with byte-range support, plus health and
//! Prometheus endpoints, and shuts down gracefully on SIGINT/SIGTERM.

pub mod context;
pub mod error;
pub mod middleware;
pub mod range;
pub mod router;
pub mod routes;
pub mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use br_core::config::Config;
use br_core::{Error, Result};
use br_player::Player;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the blobreel server.
///
/// Builds the player from `config`, binds the listener and serves until a
/// shutdown signal arrives, then drains background work.
pub async fn start(config: Config) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let metrics = telemetry::install_recorder();
    let player = Player::from_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Config(format!("invalid server address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {addr}");

    let ctx = AppContext::new(config, player, metrics);
    serve(listener, ctx, CancellationToken::new()).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Serve on an already bound listener until a signal arrives or `cancel`
/// fires.
pub async fn serve(listener: TcpListener, ctx: AppContext, cancel: CancellationToken) -> Result<()> {
    let player = Arc::clone(&ctx.player);
    let app = router::build_router(ctx);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    player.shutdown().await;
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
