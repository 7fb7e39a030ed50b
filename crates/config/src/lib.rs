//! Configuration for Periscope
//!
//! A single YAML document (`periscope.yaml` by default) with `${VAR}`
//! environment substitution. Optional tunables left out of the file fall back
//! to the values in [`defaults`]; [`validate_config`] reports which ones did.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "periscope.yaml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PeriscopeConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub details: DetailsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream market data provider
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as the `apiKey` query parameter, never logged
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_second: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or_else(default_timeout_seconds))
    }

    pub fn rate_limit_per_second(&self) -> f64 {
        self.rate_limit_per_second.unwrap_or_else(default_rate_limit_per_second)
    }

    pub fn burst(&self) -> u32 {
        self.burst.unwrap_or_else(default_burst)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_seconds: None,
            rate_limit_per_second: None,
            burst: None,
        }
    }
}

/// Chain pagination
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PaginationConfig {
    /// Page cap per chain fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    /// `limit` sent with the first page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl PaginationConfig {
    pub fn max_pages(&self) -> usize {
        self.max_pages.unwrap_or_else(default_max_pages)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or_else(default_page_size)
    }
}

/// Detail enrichment
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DetailsConfig {
    /// Tickers per provider call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Upper bound on tickers in one API details request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selection: Option<usize>,
    /// Upper bound on tickers in one batcher call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tickers: Option<usize>,
}

impl DetailsConfig {
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or_else(default_batch_size)
    }

    pub fn max_selection(&self) -> usize {
        self.max_selection.unwrap_or_else(default_max_selection)
    }

    pub fn max_tickers(&self) -> usize {
        self.max_tickers.unwrap_or_else(default_max_tickers)
    }
}

/// HTTP API listener
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Prometheus exporter port; no exporter when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
    /// Allowed browser origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            metrics_port: None,
            cors_origins: Vec::new(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `pretty`, `json` or `compact`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}
