use crate::*;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Environment variable holding the provider credential
pub const API_KEY_ENV: &str = "MASSIVE_API_KEY";

/// Environment variable overriding the provider base URL
pub const BASE_URL_ENV: &str = "MASSIVE_BASE_URL";

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PeriscopeConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    debug!("Config file content length: {} bytes", content.len());

    parse_config(&content)
}

/// Parse a YAML document after environment substitution
pub fn parse_config(content: &str) -> Result<PeriscopeConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    let config: PeriscopeConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Load `path`, or `periscope.yaml` when present, or build from the environment
///
/// An empty `provider.api_key` is filled from `MASSIVE_API_KEY` in every case.
pub fn load_config_or_env(path: Option<&Path>) -> Result<PeriscopeConfig> {
    let config = match path {
        Some(path) => load_config(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => load_config(DEFAULT_CONFIG_FILE)?,
        None => {
            info!("No config file found, using environment");
            PeriscopeConfig::default()
        }
    };

    Ok(apply_env(config, |name| env::var(name).ok()))
}

fn apply_env(mut config: PeriscopeConfig, lookup: impl Fn(&str) -> Option<String>) -> PeriscopeConfig {
    if config.provider.api_key.trim().is_empty() {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            debug!("Using provider api key from {}", API_KEY_ENV);
            config.provider.api_key = key;
        }
    }
    if let Some(base_url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
        debug!(%base_url, "Using provider base url from {}", BASE_URL_ENV);
        config.provider.base_url = base_url;
    }
    config
}

/// Configuration written by `periscope init`
#[instrument]
pub fn generate_default_config() -> PeriscopeConfig {
    PeriscopeConfig {
        provider: ProviderConfig {
            base_url: default_base_url(),
            api_key: format!("${{{}}}", API_KEY_ENV),
            timeout_seconds: Some(default_timeout_seconds()),
            rate_limit_per_second: Some(default_rate_limit_per_second()),
            burst: Some(default_burst()),
        },
        pagination: PaginationConfig {
            max_pages: Some(default_max_pages()),
            page_size: Some(default_page_size()),
        },
        details: DetailsConfig {
            batch_size: Some(default_batch_size()),
            max_selection: Some(default_max_selection()),
            max_tickers: Some(default_max_tickers()),
        },
        server: ServerConfig::default(),
        logging: LoggingConfig::default(),
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &PeriscopeConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;
    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
