//! ContentSync - periodic Marketing Cloud content block synchronization
//!
//! Main entry point.

use anyhow::Context as _;
use contentsync_app::telemetry::{self, LogFormat};
use contentsync_app::AppContext;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    let dotenv = dotenvy::dotenv();

    telemetry::init(LogFormat::from_env())?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "Could not load .env file"),
    }

    let config = contentsync_infra::config::load().context("failed to load configuration")?;

    let mut ctx = AppContext::new(config).await?;
    ctx.start().await?;
    info!("ContentSync started");

    shutdown_signal().await;
    info!("Shutdown signal received");

    ctx.shutdown().await
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
