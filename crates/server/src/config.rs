//! Server configuration

use crate::error::{Result, ServerError};
use std::net::SocketAddr;
use std::time::Duration;

/// Default HTTP port for the chain API
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default per-request deadline enforced by the timeout layer
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Bind and middleware settings for the HTTP server
///
/// ```
/// use server::config::ServerConfig;
///
/// let config = ServerConfig::http_only("127.0.0.1", 8080)
///     .with_cors_origins(vec!["http://localhost:3000".to_string()]);
/// assert_eq!(config.cors_origins.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// `None` disables the listener
    pub http_port: Option<u16>,
    /// Allowed browser origins; empty allows any
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn http_only(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            http_port: Some(port),
            ..Default::default()
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get HTTP socket address
    pub fn http_addr(&self) -> Option<Result<SocketAddr>> {
        self.http_port.map(|port| {
            format!("{}:{}", self.host, port)
                .parse()
                .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, port)))
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: Some(DEFAULT_HTTP_PORT),
            cors_origins: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
