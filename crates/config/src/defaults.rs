pub const DEFAULT_BASE_URL: &str = "https://api.massive.com/v3";

/// Largest page or batch the provider accepts
pub const PROVIDER_MAX_PAGE_SIZE: u32 = 250;

pub fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

pub fn default_timeout_seconds() -> u64 {
    10
}

pub fn default_rate_limit_per_second() -> f64 {
    10.0
}

pub fn default_burst() -> u32 {
    1
}

pub fn default_max_pages() -> usize {
    20
}

pub fn default_page_size() -> u32 {
    PROVIDER_MAX_PAGE_SIZE
}

pub fn default_batch_size() -> usize {
    PROVIDER_MAX_PAGE_SIZE as usize
}

pub fn default_max_selection() -> usize {
    250
}

pub fn default_max_tickers() -> usize {
    5000
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    8080
}

pub fn default_request_timeout_seconds() -> u64 {
    60
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}
