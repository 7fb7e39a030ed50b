//! Guard applied around every outbound provider call
//!
//! Order is fixed: take a rate-limit token, then run the call under the
//! client timeout, racing both against the caller's cancellation token.

use observability::UpstreamMetrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::MarketDataError;
use crate::rate_limiter::RateLimiter;
use crate::Result;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared limiter + timeout + metrics for provider calls
#[derive(Clone)]
pub struct UpstreamGuard {
    limiter: Arc<dyn RateLimiter>,
    timeout: Duration,
    metrics: UpstreamMetrics,
}

impl UpstreamGuard {
    pub fn new(limiter: Arc<dyn RateLimiter>, timeout: Duration, metrics: UpstreamMetrics) -> Self {
        Self {
            limiter,
            timeout,
            metrics,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn metrics(&self) -> &UpstreamMetrics {
        &self.metrics
    }

    /// Run `call` once a token is available.
    ///
    /// Nothing is sent if cancellation wins the wait for a token.
    pub async fn call<T, F>(&self, endpoint: &'static str, cancel: &CancellationToken, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.limiter.acquire(cancel).await?;

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MarketDataError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(MarketDataError::Timeout(self.timeout)),
            },
        };

        let elapsed = started.elapsed();
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        self.metrics.record_request(endpoint, outcome, elapsed);
        debug!(endpoint, outcome, elapsed_ms = elapsed.as_millis() as u64, "Provider call finished");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::NoopLimiter;
    use assert_matches::assert_matches;

    fn guard(timeout: Duration) -> UpstreamGuard {
        UpstreamGuard::new(Arc::new(NoopLimiter), timeout, UpstreamMetrics::new("test"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let token = CancellationToken::new();
        let result: Result<()> = guard(Duration::from_secs(10))
            .call("slow", &token, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        assert_matches!(result, Err(MarketDataError::Timeout(d)) if d == Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_in_flight_call() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result: Result<()> = guard(Duration::from_secs(10))
            .call("slow", &token, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert_matches!(result, Err(MarketDataError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_before_token_skips_call() {
        let token = CancellationToken::new();
        token.cancel();
        let mut called = false;

        let result = guard(Duration::from_secs(1))
            .call("never", &token, async {
                called = true;
                Ok(())
            })
            .await;

        assert_matches!(result, Err(MarketDataError::Cancelled));
        assert!(!called);
    }
}
