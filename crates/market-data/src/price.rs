//! Underlying price injection
//!
//! Backfills the latest underlying price onto contracts that lack it.
//! A failed lookup never fails the catalog; the outcome is reported to the
//! caller instead. Only cancellation propagates as an error.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::MarketDataError;
use crate::provider::SnapshotProvider;
use crate::types::{Catalog, UnderlyingAsset};
use crate::upstream::UpstreamGuard;
use crate::Result;

/// What happened to the underlying price
#[derive(Debug, Clone, PartialEq)]
pub enum InjectionOutcome {
    /// Price fetched; `updated` contracts had missing fields filled
    Injected { price: f64, updated: usize },
    /// Lookup failed or returned no usable price; catalog untouched
    Failed { reason: String },
}

impl InjectionOutcome {
    pub fn is_injected(&self) -> bool {
        matches!(self, InjectionOutcome::Injected { .. })
    }

    pub fn price(&self) -> Option<f64> {
        match self {
            InjectionOutcome::Injected { price, .. } => Some(*price),
            InjectionOutcome::Failed { .. } => None,
        }
    }
}

/// Catalog after injection, with the outcome
#[derive(Debug, Clone)]
pub struct PriceInjection {
    pub catalog: Catalog,
    pub outcome: InjectionOutcome,
}

/// Looks up the underlying's latest price and injects it
pub struct PriceInjector {
    provider: Arc<dyn SnapshotProvider>,
    guard: UpstreamGuard,
}

impl PriceInjector {
    pub fn new(provider: Arc<dyn SnapshotProvider>, guard: UpstreamGuard) -> Self {
        Self { provider, guard }
    }

    /// Inject the latest price of `symbol` into `catalog`.
    ///
    /// Only a missing `underlying_asset.price` or `underlying_asset.ticker` is
    /// written; values already present are never replaced.
    #[instrument(skip(self, catalog, cancel), fields(contracts = catalog.len()))]
    pub async fn inject_underlying_price(
        &self,
        mut catalog: Catalog,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<PriceInjection> {
        let lookup = self
            .guard
            .call("underlying_snapshot", cancel, self.provider.underlying_snapshot(symbol))
            .await;

        let price = match lookup {
            Ok(snapshot) => match snapshot.latest_price() {
                Some(price) if price.is_finite() && price > 0.0 => Ok(price),
                Some(price) => Err(format!("provider returned unusable price {}", price)),
                None => Err("provider returned no session close".to_string()),
            },
            Err(MarketDataError::Cancelled) => return Err(MarketDataError::Cancelled),
            Err(e) => Err(e.to_string()),
        };

        let outcome = match price {
            Ok(price) => {
                let updated = apply_price(&mut catalog, symbol, price);
                info!(symbol, price, updated, "Underlying price injected");
                InjectionOutcome::Injected { price, updated }
            }
            Err(reason) => {
                warn!(symbol, reason = %reason, "Underlying price unavailable, serving catalog without it");
                InjectionOutcome::Failed { reason }
            }
        };
        self.guard.metrics().record_price_injection(outcome.is_injected());

        Ok(PriceInjection { catalog, outcome })
    }
}

fn apply_price(catalog: &mut Catalog, symbol: &str, price: f64) -> usize {
    let mut updated = 0;
    for contract in &mut catalog.results {
        let asset = contract.underlying_asset.get_or_insert_with(UnderlyingAsset::default);
        let mut changed = false;
        if asset.price.is_none() {
            asset.price = Some(price);
            changed = true;
        }
        if asset.ticker.is_none() {
            asset.ticker = Some(symbol.to_string());
            changed = true;
        }
        if changed {
            updated += 1;
        }
    }
    updated
}
