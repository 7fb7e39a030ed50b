//! Prometheus metrics
//!
//! Recording through these helpers is a no-op until [`init_metrics`] installs
//! the exporter, so library code and tests can record unconditionally.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter, serving `/metrics` on `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Inbound HTTP metrics
///
/// Handles are looked up on every call against whichever recorder is current,
/// so instances built before [`init_metrics`] still report once it runs.
///
/// * `server_requests_total{server, status}`
/// * `server_request_duration_seconds{server}`
/// * `server_in_flight_requests{server}`
#[derive(Debug, Clone)]
pub struct ServerMetrics {
    server_name: String,
}

impl ServerMetrics {
    pub fn new(server_name: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
        }
    }

    /// Record a completed request
    pub fn record_request(&self, duration: Duration, status_code: u16) {
        counter!(
            "server_requests_total",
            "server" => self.server_name.clone(),
            "status" => status_code.to_string()
        )
        .increment(1);
        histogram!("server_request_duration_seconds", "server" => self.server_name.clone())
            .record(duration.as_secs_f64());
    }

    pub fn request_started(&self) {
        gauge!("server_in_flight_requests", "server" => self.server_name.clone()).increment(1.0);
    }

    pub fn request_finished(&self) {
        gauge!("server_in_flight_requests", "server" => self.server_name.clone()).decrement(1.0);
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

/// Outbound provider metrics
///
/// * `upstream_requests_total{provider, endpoint, outcome}`
/// * `upstream_request_duration_seconds{provider, endpoint}`
/// * `upstream_limiter_wait_seconds{provider}`
/// * `upstream_pages_total{provider}`
/// * `upstream_truncations_total{provider}`
/// * `upstream_price_injections_total{provider, result}`
/// * `upstream_detail_batches_total{provider}`
#[derive(Debug, Clone)]
pub struct UpstreamMetrics {
    provider: String,
}

impl UpstreamMetrics {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
        }
    }

    /// Record one outbound call; `outcome` is `ok` or an error code
    pub fn record_request(&self, endpoint: &'static str, outcome: &'static str, duration: Duration) {
        counter!(
            "upstream_requests_total",
            "provider" => self.provider.clone(),
            "endpoint" => endpoint,
            "outcome" => outcome
        )
        .increment(1);
        histogram!(
            "upstream_request_duration_seconds",
            "provider" => self.provider.clone(),
            "endpoint" => endpoint
        )
        .record(duration.as_secs_f64());
    }

    pub fn record_limiter_wait(&self, waited: Duration) {
        histogram!("upstream_limiter_wait_seconds", "provider" => self.provider.clone())
            .record(waited.as_secs_f64());
    }

    pub fn record_pages(&self, pages: u64) {
        counter!("upstream_pages_total", "provider" => self.provider.clone()).increment(pages);
    }

    pub fn record_truncated(&self) {
        counter!("upstream_truncations_total", "provider" => self.provider.clone()).increment(1);
    }

    pub fn record_price_injection(&self, injected: bool) {
        let result = if injected { "injected" } else { "failed" };
        counter!(
            "upstream_price_injections_total",
            "provider" => self.provider.clone(),
            "result" => result
        )
        .increment(1);
    }

    pub fn record_detail_batches(&self, batches: u64) {
        counter!("upstream_detail_batches_total", "provider" => self.provider.clone())
            .increment(batches);
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}
