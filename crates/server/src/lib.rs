//! HTTP server infrastructure for Periscope
//!
//! - [`HttpServer`] - Axum listener with the shared middleware stack
//! - [`health`] - `GET /health`
//! - [`ShutdownController`] - signal-driven cancellation

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod shutdown;
pub mod traits;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use health::{health_routes, HealthState, HealthStatus};
pub use http::{with_middleware, HttpServer};
pub use shutdown::{shutdown_signal, ShutdownController};
pub use traits::{Server, ServerExt};
