//! Folding detail snapshots into a served catalog
//!
//! Pure and deterministic: the output depends only on the two inputs, and
//! neither input is modified.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::types::Contract;

/// Merge result with bookkeeping for callers that want to report it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub contracts: Vec<Contract>,
    /// Base contracts that received detail fields
    pub enriched: usize,
    /// Detail tickers with no counterpart in the base set, sorted
    pub orphaned: Vec<String>,
}

/// Merge `detail` into `base`, keyed by contract ticker.
///
/// The output has exactly one entry per base contract, in base order. Each
/// top-level block present in the detail record replaces the base block; a
/// block the detail record lacks keeps the base value, so identity can never
/// regress to absent. Detail records whose ticker is not in `base` are dropped.
pub fn merge(base: &[Contract], detail: &[Contract]) -> Vec<Contract> {
    merge_with_report(base, detail).contracts
}

/// [`merge`], also returning what was enriched and what was dropped
pub fn merge_with_report(base: &[Contract], detail: &[Contract]) -> MergeReport {
    // Later duplicates replace earlier ones
    let by_ticker: HashMap<&str, &Contract> = detail
        .iter()
        .filter_map(|c| c.ticker().map(|t| (t, c)))
        .collect();

    let mut enriched = 0;
    let mut matched: HashSet<&str> = HashSet::with_capacity(by_ticker.len());
    let contracts = base
        .iter()
        .map(|b| match b.ticker().and_then(|t| by_ticker.get(t).map(|d| (t, *d))) {
            Some((ticker, d)) => {
                enriched += 1;
                matched.insert(ticker);
                overlay(b, d)
            }
            None => b.clone(),
        })
        .collect();

    let mut orphaned: Vec<String> = by_ticker
        .keys()
        .filter(|t| !matched.contains(*t))
        .map(|t| t.to_string())
        .collect();
    orphaned.sort();

    if !orphaned.is_empty() {
        debug!(count = orphaned.len(), "Ignoring detail contracts absent from the base catalog");
    }

    MergeReport {
        contracts,
        enriched,
        orphaned,
    }
}

fn overlay(base: &Contract, detail: &Contract) -> Contract {
    Contract {
        ticker: detail.ticker.clone().or_else(|| base.ticker.clone()),
        details: detail.details.clone().or_else(|| base.details.clone()),
        greeks: detail.greeks.or(base.greeks),
        implied_volatility: detail.implied_volatility.or(base.implied_volatility),
        open_interest: detail.open_interest.or(base.open_interest),
        last_quote: detail.last_quote.or(base.last_quote),
        last_trade: detail.last_trade.or(base.last_trade),
        day: detail.day.or(base.day),
        session: detail.session.or(base.session),
        underlying_asset: detail
            .underlying_asset
            .clone()
            .or_else(|| base.underlying_asset.clone()),
    }
}
