//! Graceful shutdown coordination.
//!
//! A [`ShutdownCoordinator`] owns the cancellation token that tells the HTTP
//! server to stop accepting connections. [`shutdown_signal`] resolves on
//! SIGTERM, SIGINT (Ctrl-C elsewhere) or programmatic cancellation, and the
//! server then gets `shutdown.timeout_seconds` to drain in-flight requests.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Shutdown coordinator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    timeout_seconds: u64,
}

impl ShutdownCoordinator {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            timeout_seconds,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Drive `server` to completion, giving it at most the configured timeout
    /// once shutdown has been requested.
    ///
    /// Returns `true` if the server finished draining in time.
    pub async fn drain<F>(&self, server: F) -> bool
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(server);
        tokio::select! {
            _ = &mut server => return true,
            _ = self.token.cancelled() => {}
        }

        let timeout = Duration::from_secs(self.timeout_seconds);
        match tokio::time::timeout(timeout, server).await {
            Ok(()) => {
                info!("All in-flight requests completed");
                true
            }
            Err(_) => {
                warn!(
                    timeout_seconds = self.timeout_seconds,
                    "Shutdown timeout expired with requests still in flight"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Signal handling
// ---------------------------------------------------------------------------

/// Resolves when a shutdown signal is received, then cancels the coordinator.
pub async fn shutdown_signal(coordinator: ShutdownCoordinator) {
    let token = coordinator.token();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
                    _ = sigint.recv() => info!("Shutdown signal received (SIGINT)"),
                    _ = token.cancelled() => info!("Shutdown signal received (token cancelled)"),
                }
            }
            _ => {
                warn!("Failed to install unix signal handlers, falling back to Ctrl-C");
                wait_for_ctrl_c(&token).await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c(&token).await;

    coordinator.trigger();
}

async fn wait_for_ctrl_c(token: &CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => info!("Shutdown signal received (Ctrl-C)"),
            Err(e) => {
                warn!(error = %e, "Ctrl-C handler failed, waiting for cancellation");
                token.cancelled().await;
            }
        },
        _ = token.cancelled() => info!("Shutdown signal received (token cancelled)"),
    }
}
