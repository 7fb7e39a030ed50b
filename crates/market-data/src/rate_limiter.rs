//! Outbound rate limiting
//!
//! One limiter instance is shared by every component that talks to the
//! provider, so the aggregate request rate across concurrent fetches stays
//! within budget. Waiters queue on a fair mutex and are served in arrival
//! order; the holder sleeps until the bucket refills.

use async_trait::async_trait;
use observability::UpstreamMetrics;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::MarketDataError;
use crate::Result;

/// Default sustained rate against the provider
pub const DEFAULT_RATE_PER_SECOND: f64 = 10.0;

/// Default burst allowance
pub const DEFAULT_BURST: u32 = 1;

/// Gate in front of every outbound call
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait for a token.
    ///
    /// Fails with [`MarketDataError::Cancelled`] if `cancel` fires first; the
    /// caller must then skip its outbound call.
    async fn acquire(&self, cancel: &CancellationToken) -> Result<()>;
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, rate_per_second: f64, burst: u32) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate_per_second).min(burst as f64);
        self.last_refill = now;
    }
}

/// Token bucket limiter
#[derive(Debug)]
pub struct TokenBucketLimiter {
    rate_per_second: f64,
    burst: u32,
    state: Mutex<BucketState>,
    metrics: UpstreamMetrics,
}

impl TokenBucketLimiter {
    /// Create a limiter allowing `rate_per_second` sustained with `burst` capacity
    pub fn new(name: &str, rate_per_second: f64, burst: u32) -> Result<Self> {
        if !rate_per_second.is_finite() || rate_per_second <= 0.0 {
            return Err(MarketDataError::Config(format!(
                "rate limit must be positive, got {}",
                rate_per_second
            )));
        }
        let burst = burst.max(1);

        Ok(Self {
            rate_per_second,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
            metrics: UpstreamMetrics::new(name),
        })
    }

    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();

        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MarketDataError::Cancelled),
            guard = self.state.lock() => guard,
        };

        loop {
            if cancel.is_cancelled() {
                return Err(MarketDataError::Cancelled);
            }

            state.refill(self.rate_per_second, self.burst);

            // Tolerate float drift from the refill arithmetic
            if state.tokens >= 1.0 - 1e-9 {
                state.tokens = (state.tokens - 1.0).max(0.0);
                let waited = started.elapsed();
                self.metrics.record_limiter_wait(waited);
                trace!(waited_ms = waited.as_millis() as u64, "Rate limit token acquired");
                return Ok(());
            }

            let deficit = 1.0 - state.tokens;
            let wait = Duration::from_secs_f64(deficit / self.rate_per_second);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MarketDataError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

/// Limiter that never waits; only honours cancellation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLimiter;

#[async_trait]
impl RateLimiter for NoopLimiter {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MarketDataError::Cancelled);
        }
        Ok(())
    }
}
