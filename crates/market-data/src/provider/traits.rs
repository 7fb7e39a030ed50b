//! SnapshotProvider trait definition

use async_trait::async_trait;

use crate::types::{ChainFilters, ChainPage, UnderlyingSnapshot};
use crate::Result;

/// Which chain page to request
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// First page, built from the symbol and caller filters
    First { symbol: String, filters: ChainFilters },
    /// Follow-up page addressed by the provider's continuation cursor
    Cursor(String),
}

/// Client trait for the upstream snapshot API - transport agnostic
///
/// Implementations perform exactly one request per call. Rate limiting,
/// timeouts and cancellation are applied by the caller.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch one page of the options chain snapshot
    async fn chain_page(&self, request: &PageRequest) -> Result<ChainPage>;

    /// Fetch the underlying's snapshot (latest session prices)
    async fn underlying_snapshot(&self, symbol: &str) -> Result<UnderlyingSnapshot>;

    /// Fetch full snapshots for specific contract tickers.
    ///
    /// `tickers` never exceeds the provider's per-request maximum.
    async fn contract_snapshots(&self, tickers: &[String]) -> Result<ChainPage>;
}
