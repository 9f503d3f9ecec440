//! OS signal handling.
//!
//! SIGINT (Ctrl-C) and SIGTERM both fire the shutdown gate. A second signal
//! after the gate fired is only logged; the drain timeout bounds how long
//! shutdown can take.

use tokio::signal;

use crate::lifecycle::Shutdown;

/// Wait for SIGINT or SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Fire `shutdown` on the first OS signal; keep logging later ones.
pub fn spawn_signal_handler(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            wait_for_signal().await;
            if shutdown.trigger() {
                tracing::info!("Shutdown signal received");
            } else {
                tracing::warn!("Shutdown already in progress");
            }
        }
    })
}
