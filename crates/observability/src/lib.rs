//! Logging and metrics for Periscope
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("periscope", LogFormat::Pretty)?;
//! observability::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, DEFAULT_FILTER};
pub use metrics::{init_metrics, ServerMetrics, UpstreamMetrics};
