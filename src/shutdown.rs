//! Process signal handling.

use tokio_util::sync::CancellationToken;

/// Waits for SIGINT (Ctrl+C) or SIGTERM, then cancels `token`.
///
/// Returns early without cancelling if `token` is cancelled by someone else.
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(target: "botpoll::main", error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(target: "botpoll::main", error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = token.cancelled() => return,
        () = ctrl_c => {
            tracing::info!(target: "botpoll::main", "Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        }
        () = terminate => {
            tracing::info!(target: "botpoll::main", "Received SIGTERM, initiating graceful shutdown...");
        }
    }

    token.cancel();
}
