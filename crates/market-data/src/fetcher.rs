//! Paginated chain acquisition
//!
//! Follows the provider's continuation cursor until it runs out or the page
//! cap is hit. The result is all-or-nothing: any page failure discards what
//! was accumulated.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::provider::{PageRequest, SnapshotProvider};
use crate::types::{normalize_symbol, Catalog, ChainFilters};
use crate::upstream::UpstreamGuard;
use crate::Result;

/// Default number of pages fetched before truncating
pub const DEFAULT_MAX_PAGES: usize = 20;

/// Fetches a complete chain catalog for one underlying
pub struct ChainFetcher {
    provider: Arc<dyn SnapshotProvider>,
    guard: UpstreamGuard,
    max_pages: usize,
}

impl ChainFetcher {
    pub fn new(provider: Arc<dyn SnapshotProvider>, guard: UpstreamGuard) -> Self {
        Self {
            provider,
            guard,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Override the page cap (minimum 1)
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Fetch every page of the chain for `symbol`.
    ///
    /// Invalid input fails before any provider call. Contracts keep provider
    /// order across pages. `truncated` is set when the cap stopped pagination
    /// while a cursor was still present.
    #[instrument(skip(self, filters, cancel), fields(max_pages = self.max_pages))]
    pub async fn fetch_chain(
        &self,
        symbol: &str,
        filters: &ChainFilters,
        cancel: &CancellationToken,
    ) -> Result<Catalog> {
        let symbol = normalize_symbol(symbol)?;
        filters.validate()?;

        let mut catalog = Catalog::default();
        let mut request = PageRequest::First {
            symbol: symbol.clone(),
            filters: filters.clone(),
        };
        let mut pages = 0usize;

        loop {
            let page = match self
                .guard
                .call("chain_page", cancel, self.provider.chain_page(&request))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(symbol = %symbol, page = pages + 1, error = %e, "Chain page failed, discarding partial catalog");
                    return Err(e);
                }
            };
            pages += 1;

            if pages == 1 {
                catalog.status = page.status.clone();
                catalog.request_id = page.request_id.clone();
            }
            debug!(page = pages, contracts = page.results.len(), "Chain page received");

            let cursor = page.cursor().map(str::to_string);
            catalog.results.extend(page.results);

            match cursor {
                None => break,
                Some(_) if pages >= self.max_pages => {
                    warn!(symbol = %symbol, pages, "Page cap reached with more data available");
                    catalog.truncated = true;
                    self.guard.metrics().record_truncated();
                    break;
                }
                Some(next) => request = PageRequest::Cursor(next),
            }
        }

        self.guard.metrics().record_pages(pages as u64);
        info!(
            symbol = %symbol,
            pages,
            contracts = catalog.len(),
            truncated = catalog.truncated,
            "Chain fetched"
        );
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketDataError;
    use crate::provider::mock::{page, synthetic_contracts};
    use crate::provider::MockSnapshotProvider;
    use crate::types::ChainPage;
    use crate::rate_limiter::{NoopLimiter, TokenBucketLimiter};
    use assert_matches::assert_matches;
    use observability::UpstreamMetrics;
    use std::time::Duration;

    fn fetcher(provider: Arc<MockSnapshotProvider>) -> ChainFetcher {
        let guard = UpstreamGuard::new(
            Arc::new(NoopLimiter),
            Duration::from_secs(10),
            UpstreamMetrics::new("test"),
        );
        ChainFetcher::new(provider, guard)
    }

    #[tokio::test]
    async fn test_pages_are_concatenated_in_order() {
        let stamped = |mut p: ChainPage, status: &str, request_id: &str| {
            p.status = status.to_string();
            p.request_id = request_id.to_string();
            p
        };
        let provider = Arc::new(MockSnapshotProvider::new().with_pages(vec![
            stamped(page(synthetic_contracts("SPY", 0, 250), Some("https://x/2")), "OK", "r1"),
            stamped(page(synthetic_contracts("SPY", 250, 250), Some("https://x/3")), "DELAYED", "r2"),
            stamped(page(synthetic_contracts("SPY", 500, 10), None), "DELAYED", "r3"),
        ]));
        let catalog = fetcher(provider.clone())
            .fetch_chain("spy", &ChainFilters::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(catalog.len(), 510);
        assert!(!catalog.truncated);
        assert_eq!(catalog.status, "OK");
        assert_eq!(catalog.request_id, "r1");
        assert_eq!(catalog.results[0].ticker(), synthetic_contracts("SPY", 0, 1)[0].ticker());
        assert_eq!(catalog.results[509].ticker(), synthetic_contracts("SPY", 509, 1)[0].ticker());

        let requests = provider.chain_requests();
        assert_eq!(requests.len(), 3);
        assert_matches!(&requests[0], PageRequest::First { symbol, .. } if symbol == "SPY");
        assert_eq!(requests[1], PageRequest::Cursor("https://x/2".into()));
        assert_eq!(requests[2], PageRequest::Cursor("https://x/3".into()));
    }

    #[tokio::test]
    async fn test_endless_cursor_is_capped() {
        let provider = Arc::new(MockSnapshotProvider::new().with_endless_cursor(250));
        let catalog = fetcher(provider.clone())
            .fetch_chain("SPY", &ChainFilters::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(provider.chain_requests().len(), DEFAULT_MAX_PAGES);
        assert_eq!(catalog.len(), 250 * DEFAULT_MAX_PAGES);
        assert!(catalog.truncated);
    }

    #[tokio::test]
    async fn test_custom_cap_applies() {
        let provider = Arc::new(MockSnapshotProvider::new().with_endless_cursor(10));
        let catalog = fetcher(provider.clone())
            .with_max_pages(3)
            .fetch_chain("SPY", &ChainFilters::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(provider.chain_requests().len(), 3);
        assert_eq!(catalog.len(), 30);
        assert!(catalog.truncated);
    }

    #[tokio::test]
    async fn test_single_page_without_cursor() {
        let provider = Arc::new(
            MockSnapshotProvider::new().with_pages(vec![page(synthetic_contracts("SPY", 0, 3), Some(""))]),
        );
        let catalog = fetcher(provider.clone())
            .fetch_chain("SPY", &ChainFilters::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(provider.chain_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mid_pagination_failure_discards_everything() {
        let provider = Arc::new(
            MockSnapshotProvider::new()
                .with_pages(vec![page(synthetic_contracts("SPY", 0, 250), Some("https://x/2"))])
                .with_page_error(MarketDataError::upstream(502, "bad gateway")),
        );
        let result = fetcher(provider.clone())
            .fetch_chain("SPY", &ChainFilters::default(), &CancellationToken::new())
            .await;

        assert_matches!(result, Err(MarketDataError::Upstream { status: 502, .. }));
        assert_eq!(provider.chain_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_calls() {
        let provider = Arc::new(MockSnapshotProvider::new().with_endless_cursor(1));
        let f = fetcher(provider.clone());
        let token = CancellationToken::new();

        assert_matches!(
            f.fetch_chain("  ", &ChainFilters::default(), &token).await,
            Err(MarketDataError::Validation(_))
        );
        let bad_limit = ChainFilters {
            limit: Some(1000),
            ..Default::default()
        };
        assert_matches!(
            f.fetch_chain("SPY", &bad_limit, &token).await,
            Err(MarketDataError::Validation(_))
        );
        assert!(provider.chain_requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_call() {
        let provider = Arc::new(MockSnapshotProvider::new().with_endless_cursor(1));
        let token = CancellationToken::new();
        token.cancel();

        let result = fetcher(provider.clone())
            .fetch_chain("SPY", &ChainFilters::default(), &token)
            .await;

        assert_matches!(result, Err(MarketDataError::Cancelled));
        assert!(provider.chain_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_page_times_out() {
        let provider = Arc::new(
            MockSnapshotProvider::new()
                .with_endless_cursor(1)
                .with_latency(Duration::from_secs(30)),
        );
        let result = fetcher(provider)
            .fetch_chain("SPY", &ChainFilters::default(), &CancellationToken::new())
            .await;

        assert_matches!(result, Err(MarketDataError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_page_is_rate_limited() {
        let provider = Arc::new(MockSnapshotProvider::new().with_endless_cursor(1));
        let guard = UpstreamGuard::new(
            Arc::new(TokenBucketLimiter::new("test", 10.0, 1).unwrap()),
            Duration::from_secs(10),
            UpstreamMetrics::new("test"),
        );
        let start = tokio::time::Instant::now();

        ChainFetcher::new(provider, guard)
            .with_max_pages(5)
            .fetch_chain("SPY", &ChainFilters::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(395));
    }
}
