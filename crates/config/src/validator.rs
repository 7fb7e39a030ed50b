use crate::*;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("provider.api_key is required (set it in the file or via MASSIVE_API_KEY)")]
    MissingApiKey,

    #[error("Environment variable '{var}' is missing or invalid: {message}")]
    InvalidEnvVar { var: String, message: String },

    #[error("Invalid base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field} must be a positive number")]
    InvalidPositiveFloat { field: String },

    #[error("{field} must not exceed {max}, got {value}")]
    ExceedsProviderLimit { field: String, value: u64, max: u64 },

    #[error("details.max_selection ({max_selection}) must not exceed details.max_tickers ({max_tickers})")]
    SelectionAboveTickerLimit { max_selection: usize, max_tickers: usize },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("server.metrics_port {0} conflicts with server.http_port")]
    PortConflict(u16),

    #[error("Invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

pub fn validate_config(config: &PeriscopeConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_provider(&config.provider, &mut report);
    validate_pagination(&config.pagination, &mut report);
    validate_details(&config.details, &mut report);
    validate_server(&config.server, &mut report);

    if observability::LogFormat::parse(&config.logging.format).is_none() {
        report.add_error(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }

    report
}

fn validate_provider(provider: &ProviderConfig, report: &mut ValidationReport) {
    let key = provider.api_key.trim();
    if key.is_empty() {
        report.add_error(ValidationError::MissingApiKey);
    } else if has_unresolved_env_vars(key) {
        for var in unresolved_env_vars(key) {
            report.add_error(ValidationError::InvalidEnvVar {
                var,
                message: "provider api key placeholder was not substituted".to_string(),
            });
        }
    }

    match Url::parse(&provider.base_url) {
        Ok(url) => match url.scheme() {
            "https" => {}
            "http" => report.add_warning(
                "provider.base_url",
                "Plain http sends the api key unencrypted",
            ),
            other => report.add_error(ValidationError::InvalidBaseUrl {
                url: provider.base_url.clone(),
                message: format!("unsupported scheme '{}'", other),
            }),
        },
        Err(e) => report.add_error(ValidationError::InvalidBaseUrl {
            url: provider.base_url.clone(),
            message: e.to_string(),
        }),
    }

    match provider.timeout_seconds {
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "provider.timeout_seconds".to_string(),
        }),
        Some(_) => {}
        None => report.add_default("provider.timeout_seconds", &default_timeout_seconds().to_string()),
    }

    match provider.rate_limit_per_second {
        Some(rate) if !rate.is_finite() || rate <= 0.0 => {
            report.add_error(ValidationError::InvalidPositiveFloat {
                field: "provider.rate_limit_per_second".to_string(),
            })
        }
        Some(_) => {}
        None => report.add_default(
            "provider.rate_limit_per_second",
            &default_rate_limit_per_second().to_string(),
        ),
    }

    match provider.burst {
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "provider.burst".to_string(),
        }),
        Some(burst) if f64::from(burst) > provider.rate_limit_per_second() => report.add_warning(
            "provider.burst",
            "Burst larger than the per-second rate allows short spikes above the plan limit",
        ),
        Some(_) => {}
        None => report.add_default("provider.burst", &default_burst().to_string()),
    }
}

fn validate_pagination(pagination: &PaginationConfig, report: &mut ValidationReport) {
    match pagination.max_pages {
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "pagination.max_pages".to_string(),
        }),
        Some(_) => {}
        None => report.add_default("pagination.max_pages", &default_max_pages().to_string()),
    }

    match pagination.page_size {
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "pagination.page_size".to_string(),
        }),
        Some(size) if size > PROVIDER_MAX_PAGE_SIZE => {
            report.add_error(ValidationError::ExceedsProviderLimit {
                field: "pagination.page_size".to_string(),
                value: u64::from(size),
                max: u64::from(PROVIDER_MAX_PAGE_SIZE),
            })
        }
        Some(_) => {}
        None => report.add_default("pagination.page_size", &default_page_size().to_string()),
    }
}

fn validate_details(details: &DetailsConfig, report: &mut ValidationReport) {
    match details.batch_size {
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "details.batch_size".to_string(),
        }),
        Some(size) if size > PROVIDER_MAX_PAGE_SIZE as usize => {
            report.add_error(ValidationError::ExceedsProviderLimit {
                field: "details.batch_size".to_string(),
                value: size as u64,
                max: u64::from(PROVIDER_MAX_PAGE_SIZE),
            })
        }
        Some(_) => {}
        None => report.add_default("details.batch_size", &default_batch_size().to_string()),
    }

    if details.max_selection == Some(0) {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "details.max_selection".to_string(),
        });
    } else if details.max_selection.is_none() {
        report.add_default("details.max_selection", &default_max_selection().to_string());
    }

    if details.max_tickers == Some(0) {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "details.max_tickers".to_string(),
        });
    } else if details.max_tickers.is_none() {
        report.add_default("details.max_tickers", &default_max_tickers().to_string());
    }

    if details.max_selection() > details.max_tickers() {
        report.add_error(ValidationError::SelectionAboveTickerLimit {
            max_selection: details.max_selection(),
            max_tickers: details.max_tickers(),
        });
    }
}

fn validate_server(server: &ServerConfig, report: &mut ValidationReport) {
    if server.http_port == 0 {
        report.add_warning("server.http_port", "Port 0 binds an ephemeral port");
    }

    if let Some(port) = server.metrics_port {
        if port == server.http_port && port != 0 {
            report.add_error(ValidationError::PortConflict(port));
        }
    }

    if server.request_timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "server.request_timeout_seconds".to_string(),
        });
    }

    for origin in &server.cors_origins {
        let valid = Url::parse(origin)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
            .unwrap_or(false);
        if !valid {
            report.add_error(ValidationError::InvalidCorsOrigin(origin.clone()));
        }
    }
}
