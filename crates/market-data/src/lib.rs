//! Options chain acquisition and enrichment for Periscope
//!
//! This crate pulls paginated options chain snapshots from the upstream
//! provider, enriches a selected subset with detail snapshots, and reshapes
//! the result into a strike-indexed view.
//!
//! # Core Components
//!
//! - [`rate_limiter`] - Shared token bucket in front of every outbound call
//! - [`provider`] - Provider trait, HTTP client and scripted mock
//! - [`fetcher`] - Cursor-following chain fetch with a page cap
//! - [`price`] - Best-effort underlying price backfill
//! - [`details`] - Detail lookups in provider-sized batches
//! - [`merge`] - Field-precedence merge of detail into base snapshots
//! - [`aggregate`] - Strike ladder with the current price marker
//! - [`service`] - The above wired together
//! - `api` - Axum routes (feature `api`)
//!
//! # Key Invariants
//!
//! - Chain and detail fetches are all-or-nothing per call
//! - Identity fields never regress to absent during a merge
//! - Merge and aggregation are pure and deterministic
//! - Aggregated strikes are strictly increasing

pub mod aggregate;
pub mod details;
pub mod error;
pub mod fetcher;
pub mod merge;
pub mod price;
pub mod provider;
pub mod rate_limiter;
pub mod service;
pub mod types;
pub mod upstream;

#[cfg(feature = "api")]
pub mod api;

pub use aggregate::{aggregate, expirations, ChainRow, ChainView, CurrentPriceMarker, StrikeRow};
pub use details::DetailBatcher;
pub use error::MarketDataError;
pub use fetcher::ChainFetcher;
pub use merge::{merge, merge_with_report, MergeReport};
pub use price::{InjectionOutcome, PriceInjection, PriceInjector};
pub use provider::{MockSnapshotProvider, PageRequest, SnapshotProvider};
pub use rate_limiter::{NoopLimiter, RateLimiter, TokenBucketLimiter};
pub use service::{nearest_tickers, ChainService, PipelineSettings};
pub use types::{Catalog, ChainFilters, Contract, ContractType};
pub use upstream::UpstreamGuard;

#[cfg(feature = "client")]
pub use provider::HttpSnapshotProvider;

pub type Result<T> = std::result::Result<T, MarketDataError>;
