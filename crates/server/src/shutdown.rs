//! Graceful shutdown coordination
//!
//! A single [`CancellationToken`] is the shutdown signal for the listener and
//! for any pipeline work the binary runs outside of a request.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the root shutdown token and hands out clones or children of it
///
/// Cloning the controller shares the same token.
///
/// # Example
///
/// ```ignore
/// let shutdown = ShutdownController::with_signals();
///
/// // The listener stops with the controller
/// let server_token = shutdown.child_token();
/// tokio::spawn(async move { http_server.run(server_token).await });
///
/// // Block until Ctrl+C, SIGTERM or a manual `shutdown()`
/// shutdown.wait_for_shutdown().await;
/// ```
#[derive(Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel on Ctrl+C, or SIGTERM on unix
    ///
    /// Spawns a background task, so it must be called inside a tokio runtime.
    /// If a signal handler cannot be installed a warning is logged and the
    /// controller only stops through [`shutdown`](Self::shutdown).
    pub fn with_signals() -> Self {
        let controller = Self::new();
        let token = controller.token.clone();

        tokio::spawn(async move {
            wait_for_signal().await;
            token.cancel();
        });

        controller
    }

    /// Cancelled with this controller, but can also be cancelled on its own
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token and every child handed out so far
    pub fn shutdown(&self) {
        info!("Manual shutdown triggered");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to listen for SIGTERM: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Token cancelled on the first shutdown signal
pub fn shutdown_signal() -> CancellationToken {
    ShutdownController::with_signals().token()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_shutdown() {
        let controller = ShutdownController::new();
        let token = controller.child_token();

        assert!(!controller.is_cancelled());
        assert!(!token.is_cancelled());

        controller.shutdown();
        controller.wait_for_shutdown().await;

        assert!(controller.is_cancelled());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_token_independence() {
        let controller = ShutdownController::new();
        let request = controller.child_token();
        let server = controller.child_token();

        request.cancel();
        assert!(request.is_cancelled());
        assert!(!server.is_cancelled());
        assert!(!controller.is_cancelled());

        controller.shutdown();
        assert!(server.is_cancelled());
    }
}
