//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Ctrl-C (SIGINT) cancels the run; there is no reload signal, the
//!   config watcher covers that

use crate::lifecycle::Shutdown;

/// Wait for Ctrl-C, then trigger `shutdown`.
pub async fn ctrl_c(shutdown: Shutdown) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::warn!("Interrupt received, cancelling run"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            // Never resolve: without a signal handler the run completes normally.
            std::future::pending::<()>().await;
        }
    }
    shutdown.trigger();
}
