//! Server lifecycle traits
//!
//! [`Server`] is what the binary drives; [`ServerExt`] adds the spawn and
//! signal-handling wrappers every implementor gets for free.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A long-running listener driven by a cancellation token
///
/// # Implementors
///
/// - [`HttpServer`](crate::http::HttpServer) - the axum listener serving the chain API
///
/// # Example
///
/// ```ignore
/// use server::{HttpServer, ServerConfig, ServerExt};
///
/// let config = ServerConfig::http_only("0.0.0.0", 8080);
/// let server = HttpServer::new(config, router);
///
/// // Stops on Ctrl+C or SIGTERM
/// server.run_with_signals().await?;
/// ```
#[async_trait]
pub trait Server: Send + Sync + 'static {
    /// Short identifier used in logs and the `server` metric label
    fn name(&self) -> &str;

    /// Bound address while running
    fn address(&self) -> Option<SocketAddr>;

    fn is_running(&self) -> bool;

    /// Serve until `shutdown` is cancelled, then drain in-flight requests
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Token whose cancellation stops accepting new connections
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the listener fails
    /// while serving. A clean drain after cancellation returns `Ok(())`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let token = CancellationToken::new();
    /// let handle = tokio::spawn({
    ///     let token = token.clone();
    ///     async move { server.run(token).await }
    /// });
    ///
    /// token.cancel();
    /// handle.await??;
    /// ```
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

/// Convenience wrappers over [`Server::run`]
pub trait ServerExt: Server + Sized {
    /// Run on a new task; cancel the returned token to stop it
    ///
    /// # Example
    ///
    /// ```ignore
    /// let (handle, token) = server.spawn();
    /// // ... exercise the API ...
    /// token.cancel();
    /// handle.await??;
    /// ```
    fn spawn(self) -> (tokio::task::JoinHandle<Result<()>>, CancellationToken) {
        let token = CancellationToken::new();
        let token_clone = token.clone();
        let handle = tokio::spawn(async move { self.run(token_clone).await });
        (handle, token)
    }

    /// Run until Ctrl+C or SIGTERM
    ///
    /// Installs a [`ShutdownController`](crate::shutdown::ShutdownController)
    /// with signal handlers, so it must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`Server::run`] returns.
    fn run_with_signals(self) -> impl std::future::Future<Output = Result<()>> + Send {
        async move {
            let shutdown = crate::shutdown::ShutdownController::with_signals();
            self.run(shutdown.token()).await
        }
    }
}

impl<T: Server + Sized> ServerExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdleServer;

    #[async_trait]
    impl Server for IdleServer {
        fn name(&self) -> &str {
            "idle"
        }

        fn address(&self) -> Option<SocketAddr> {
            None
        }

        fn is_running(&self) -> bool {
            false
        }

        async fn run(&self, shutdown: CancellationToken) -> Result<()> {
            shutdown.cancelled().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_server_ext_spawn() {
        let (handle, token) = IdleServer.spawn();
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }
}
