//! Chain service: the pipeline wired behind one shared rate limiter

use chrono::NaiveDate;
use observability::UpstreamMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::aggregate::{aggregate, ChainView};
use crate::details::{DetailBatcher, DEFAULT_BATCH_SIZE, DEFAULT_MAX_TICKERS};
use crate::fetcher::{ChainFetcher, DEFAULT_MAX_PAGES};
use crate::merge::{merge_with_report, MergeReport};
use crate::price::{PriceInjection, PriceInjector};
use crate::provider::SnapshotProvider;
use crate::rate_limiter::{RateLimiter, TokenBucketLimiter, DEFAULT_BURST, DEFAULT_RATE_PER_SECOND};
use crate::types::{normalize_symbol, ChainFilters, Contract};
use crate::upstream::{UpstreamGuard, DEFAULT_TIMEOUT};
use crate::Result;

/// Tunables for the pipeline components
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub timeout: Duration,
    pub rate_per_second: f64,
    pub burst: u32,
    pub max_pages: usize,
    pub batch_size: usize,
    pub max_tickers: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            burst: DEFAULT_BURST,
            max_pages: DEFAULT_MAX_PAGES,
            batch_size: DEFAULT_BATCH_SIZE,
            max_tickers: DEFAULT_MAX_TICKERS,
        }
    }
}

/// Entry point used by the HTTP API and the CLI
pub struct ChainService {
    fetcher: ChainFetcher,
    injector: PriceInjector,
    batcher: DetailBatcher,
}

impl ChainService {
    /// Build the service with a token bucket limiter from `settings`
    pub fn new(provider: Arc<dyn SnapshotProvider>, settings: &PipelineSettings) -> Result<Self> {
        let limiter = TokenBucketLimiter::new("provider", settings.rate_per_second, settings.burst)?;
        Ok(Self::with_limiter(provider, Arc::new(limiter), settings))
    }

    /// Build the service around an existing limiter
    pub fn with_limiter(
        provider: Arc<dyn SnapshotProvider>,
        limiter: Arc<dyn RateLimiter>,
        settings: &PipelineSettings,
    ) -> Self {
        let guard = UpstreamGuard::new(limiter, settings.timeout, UpstreamMetrics::new("provider"));

        Self {
            fetcher: ChainFetcher::new(Arc::clone(&provider), guard.clone())
                .with_max_pages(settings.max_pages),
            injector: PriceInjector::new(Arc::clone(&provider), guard.clone()),
            batcher: DetailBatcher::new(provider, guard)
                .with_batch_size(settings.batch_size)
                .with_max_tickers(settings.max_tickers),
        }
    }

    /// Fetch the full catalog for `symbol` and backfill the underlying price
    #[instrument(skip(self, filters, cancel))]
    pub async fn load_chain(
        &self,
        symbol: &str,
        filters: &ChainFilters,
        cancel: &CancellationToken,
    ) -> Result<PriceInjection> {
        let symbol = normalize_symbol(symbol)?;
        let catalog = self.fetcher.fetch_chain(&symbol, filters, cancel).await?;
        self.injector
            .inject_underlying_price(catalog, &symbol, cancel)
            .await
    }

    /// Fetch detail snapshots for a selection of contract tickers
    pub async fn load_details(
        &self,
        tickers: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Contract>> {
        self.batcher.fetch_details(tickers, cancel).await
    }

    /// Fetch details for `tickers` and fold them into `base`
    #[instrument(skip(self, base, tickers, cancel), fields(base = base.len(), selected = tickers.len()))]
    pub async fn enrich(
        &self,
        base: &[Contract],
        tickers: &[String],
        cancel: &CancellationToken,
    ) -> Result<MergeReport> {
        let detail = self.batcher.fetch_details(tickers, cancel).await?;
        let report = merge_with_report(base, &detail);
        info!(enriched = report.enriched, orphaned = report.orphaned.len(), "Selection enriched");
        Ok(report)
    }

    /// Strike ladder for one expiration (or all when `None`)
    pub fn view(
        &self,
        contracts: &[Contract],
        expiration: Option<NaiveDate>,
        current_price: f64,
    ) -> ChainView {
        aggregate(contracts, expiration, current_price)
    }
}

/// Tickers of the `count` contracts whose strikes sit closest to `price`.
///
/// Ties keep catalog order. Contracts without a ticker or strike are ignored.
pub fn nearest_tickers(contracts: &[Contract], price: f64, count: usize) -> Vec<String> {
    let mut ranked: Vec<(f64, usize, &str)> = contracts
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match (c.ticker(), c.strike()) {
            (Some(t), Some(s)) if s.is_finite() => Some(((s - price).abs(), i, t)),
            _ => None,
        })
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    ranked
        .into_iter()
        .take(count)
        .map(|(_, _, t)| t.to_string())
        .collect()
}
