//! Signal handling for graceful shutdown.

use tokio::signal::unix::{SignalKind, signal};

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C). If a handler cannot be
/// installed, that signal is ignored and the other still works.
pub async fn shutdown_signal() {
    let sigterm = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    let sigint = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = sigterm => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}
