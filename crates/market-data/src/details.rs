//! Detail lookups in provider-sized batches

use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::MarketDataError;
use crate::provider::SnapshotProvider;
use crate::types::{Contract, PROVIDER_MAX_PAGE_SIZE};
use crate::upstream::UpstreamGuard;
use crate::Result;

/// Tickers per provider request
pub const DEFAULT_BATCH_SIZE: usize = PROVIDER_MAX_PAGE_SIZE as usize;

/// Upper bound on tickers accepted in one call
pub const DEFAULT_MAX_TICKERS: usize = 5000;

/// Splits ticker lists into batches and fetches them serially
pub struct DetailBatcher {
    provider: Arc<dyn SnapshotProvider>,
    guard: UpstreamGuard,
    batch_size: usize,
    max_tickers: usize,
}

impl DetailBatcher {
    pub fn new(provider: Arc<dyn SnapshotProvider>, guard: UpstreamGuard) -> Self {
        Self {
            provider,
            guard,
            batch_size: DEFAULT_BATCH_SIZE,
            max_tickers: DEFAULT_MAX_TICKERS,
        }
    }

    /// Batch size, clamped to 1..=provider maximum
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, DEFAULT_BATCH_SIZE);
        self
    }

    pub fn with_max_tickers(mut self, max_tickers: usize) -> Self {
        self.max_tickers = max_tickers.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fetch snapshots for `tickers`.
    ///
    /// Batches go out one at a time in input order; the first failing batch
    /// aborts the call and earlier results are dropped. Tickers the provider
    /// does not know are simply absent from the result.
    #[instrument(skip(self, tickers, cancel), fields(requested = tickers.len()))]
    pub async fn fetch_details(
        &self,
        tickers: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Contract>> {
        let tickers = self.prepare(tickers)?;
        let batches: Vec<&[String]> = tickers.chunks(self.batch_size).collect();
        let total = batches.len();
        let mut contracts = Vec::with_capacity(tickers.len());

        for (index, batch) in batches.into_iter().enumerate() {
            let page = self
                .guard
                .call("contract_snapshots", cancel, self.provider.contract_snapshots(batch))
                .await
                .map_err(|e| {
                    warn!(batch = index + 1, total, error = %e, "Detail batch failed");
                    e
                })?;
            debug!(batch = index + 1, total, returned = page.results.len(), "Detail batch received");
            contracts.extend(page.results);
        }

        self.guard.metrics().record_detail_batches(total as u64);
        info!(tickers = tickers.len(), batches = total, returned = contracts.len(), "Details fetched");
        Ok(contracts)
    }

    /// Trim, reject blanks, enforce the size bound and drop repeats
    fn prepare(&self, tickers: &[String]) -> Result<Vec<String>> {
        if tickers.is_empty() {
            return Err(MarketDataError::validation("at least one contract ticker is required"));
        }
        if tickers.len() > self.max_tickers {
            return Err(MarketDataError::validation(format!(
                "too many contract tickers: {} (max {})",
                tickers.len(),
                self.max_tickers
            )));
        }

        let mut seen = HashSet::with_capacity(tickers.len());
        let mut prepared = Vec::with_capacity(tickers.len());
        for (position, raw) in tickers.iter().enumerate() {
            let ticker = raw.trim();
            if ticker.is_empty() {
                return Err(MarketDataError::validation(format!(
                    "contract ticker at position {} is blank",
                    position
                )));
            }
            if seen.insert(ticker.to_string()) {
                prepared.push(ticker.to_string());
            }
        }
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::synthetic_contracts;
    use crate::provider::MockSnapshotProvider;
    use crate::rate_limiter::NoopLimiter;
    use assert_matches::assert_matches;
    use observability::UpstreamMetrics;
    use std::time::Duration;

    fn batcher(provider: Arc<MockSnapshotProvider>) -> DetailBatcher {
        let guard = UpstreamGuard::new(
            Arc::new(NoopLimiter),
            Duration::from_secs(10),
            UpstreamMetrics::new("test"),
        );
        DetailBatcher::new(provider, guard)
    }

    fn tickers(contracts: &[Contract]) -> Vec<String> {
        contracts.iter().filter_map(|c| c.ticker().map(str::to_string)).collect()
    }

    #[tokio::test]
    async fn test_300_tickers_make_two_ordered_batches() {
        let contracts = synthetic_contracts("SPY", 0, 300);
        let wanted = tickers(&contracts);
        let provider = Arc::new(MockSnapshotProvider::new().with_contracts(contracts));

        let result = batcher(provider.clone())
            .fetch_details(&wanted, &CancellationToken::new())
            .await
            .unwrap();

        let batches = provider.detail_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], wanted[..250].to_vec());
        assert_eq!(batches[1], wanted[250..].to_vec());
        assert_eq!(tickers(&result), wanted);
    }

    #[tokio::test]
    async fn test_unknown_tickers_are_absent() {
        let contracts = synthetic_contracts("SPY", 0, 2);
        let mut wanted = tickers(&contracts);
        wanted.push("O:NOPE".into());
        let provider = Arc::new(MockSnapshotProvider::new().with_contracts(contracts));

        let result = batcher(provider)
            .fetch_details(&wanted, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_batch_aborts_the_call() {
        let contracts = synthetic_contracts("SPY", 0, 600);
        let wanted = tickers(&contracts);
        let provider = Arc::new(
            MockSnapshotProvider::new()
                .with_contracts(contracts)
                .with_detail_failure(1, MarketDataError::upstream(500, "boom")),
        );

        let result = batcher(provider.clone())
            .fetch_details(&wanted, &CancellationToken::new())
            .await;

        assert_matches!(result, Err(MarketDataError::Upstream { status: 500, .. }));
        // Third batch never sent
        assert_eq!(provider.detail_batches().len(), 2);
    }

    #[tokio::test]
    async fn test_input_validation() {
        let provider = Arc::new(MockSnapshotProvider::new());
        let b = batcher(provider.clone()).with_max_tickers(3);
        let token = CancellationToken::new();

        assert_matches!(b.fetch_details(&[], &token).await, Err(MarketDataError::Validation(_)));
        assert_matches!(
            b.fetch_details(&["O:A".into(), "  ".into()], &token).await,
            Err(MarketDataError::Validation(_))
        );
        let too_many: Vec<String> = (0..4).map(|i| format!("O:{}", i)).collect();
        assert_matches!(b.fetch_details(&too_many, &token).await, Err(MarketDataError::Validation(_)));
        assert!(provider.detail_batches().is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_are_requested_once() {
        let provider = Arc::new(MockSnapshotProvider::new());
        let wanted = vec![" O:A".to_string(), "O:B".into(), "O:A".into()];

        batcher(provider.clone())
            .with_batch_size(1)
            .fetch_details(&wanted, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            provider.detail_batches(),
            vec![vec!["O:A".to_string()], vec!["O:B".to_string()]]
        );
    }
}
