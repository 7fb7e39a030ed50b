//! Scripted snapshot provider for tests and offline runs

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::MarketDataError;
use crate::provider::traits::{PageRequest, SnapshotProvider};
use crate::types::{
    ChainPage, Contract, ContractType, Session, UnderlyingResult, UnderlyingSnapshot,
};
use crate::Result;

/// Mock provider that replays scripted responses and records every call
pub struct MockSnapshotProvider {
    pages: Mutex<VecDeque<Result<ChainPage>>>,
    endless_page_size: Option<usize>,
    underlying: Mutex<Option<Result<UnderlyingSnapshot>>>,
    contracts: HashMap<String, Contract>,
    detail_failure: Option<(usize, MarketDataError)>,
    latency: Option<Duration>,
    chain_requests: Mutex<Vec<PageRequest>>,
    detail_batches: Mutex<Vec<Vec<String>>>,
    underlying_requests: Mutex<Vec<String>>,
}

impl MockSnapshotProvider {
    /// Create a mock with nothing scripted
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(VecDeque::new()),
            endless_page_size: None,
            underlying: Mutex::new(None),
            contracts: HashMap::new(),
            detail_failure: None,
            latency: None,
            chain_requests: Mutex::new(Vec::new()),
            detail_batches: Mutex::new(Vec::new()),
            underlying_requests: Mutex::new(Vec::new()),
        }
    }

    /// Script chain pages, served in order
    pub fn with_pages(self, pages: Vec<ChainPage>) -> Self {
        self.pages.lock().extend(pages.into_iter().map(Ok));
        self
    }

    /// Script a failing chain page after any pages already queued
    pub fn with_page_error(self, error: MarketDataError) -> Self {
        self.pages.lock().push_back(Err(error));
        self
    }

    /// Once scripted pages run out, keep returning full pages that always carry a cursor
    pub fn with_endless_cursor(mut self, page_size: usize) -> Self {
        self.endless_page_size = Some(page_size);
        self
    }

    /// Underlying snapshot reporting `price` as the session close
    pub fn with_underlying_price(self, symbol: &str, price: f64) -> Self {
        let snapshot = UnderlyingSnapshot {
            status: "OK".to_string(),
            request_id: "mock-underlying".to_string(),
            results: vec![UnderlyingResult {
                ticker: symbol.to_string(),
                name: symbol.to_string(),
                kind: "stocks".to_string(),
                session: Some(Session {
                    close: Some(price),
                    ..Default::default()
                }),
            }],
        };
        *self.underlying.lock() = Some(Ok(snapshot));
        self
    }

    /// Underlying snapshot response used verbatim
    pub fn with_underlying_snapshot(self, snapshot: UnderlyingSnapshot) -> Self {
        *self.underlying.lock() = Some(Ok(snapshot));
        self
    }

    /// Underlying snapshot request fails with `error`
    pub fn with_underlying_error(self, error: MarketDataError) -> Self {
        *self.underlying.lock() = Some(Err(error));
        self
    }

    /// Contracts served by detail lookups, keyed by ticker
    pub fn with_contracts(mut self, contracts: Vec<Contract>) -> Self {
        for contract in contracts {
            if let Some(ticker) = contract.ticker() {
                self.contracts.insert(ticker.to_string(), contract);
            }
        }
        self
    }

    /// The detail request with zero-based index `batch` fails with `error`
    pub fn with_detail_failure(mut self, batch: usize, error: MarketDataError) -> Self {
        self.detail_failure = Some((batch, error));
        self
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Chain page requests received so far
    pub fn chain_requests(&self) -> Vec<PageRequest> {
        self.chain_requests.lock().clone()
    }

    /// Ticker batches received by detail lookups so far
    pub fn detail_batches(&self) -> Vec<Vec<String>> {
        self.detail_batches.lock().clone()
    }

    /// Symbols requested from the underlying snapshot endpoint
    pub fn underlying_requests(&self) -> Vec<String> {
        self.underlying_requests.lock().clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockSnapshotProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotProvider for MockSnapshotProvider {
    async fn chain_page(&self, request: &PageRequest) -> Result<ChainPage> {
        let index = {
            let mut requests = self.chain_requests.lock();
            requests.push(request.clone());
            requests.len()
        };
        self.simulate_latency().await;

        if let Some(scripted) = self.pages.lock().pop_front() {
            return scripted;
        }

        match self.endless_page_size {
            Some(size) => Ok(page(
                synthetic_contracts("MOCK", index * size, size),
                Some(&format!("https://mock.invalid/v3/snapshot/options/MOCK?cursor={}", index)),
            )),
            None => Err(MarketDataError::upstream(500, "mock: no scripted page")),
        }
    }

    async fn underlying_snapshot(&self, symbol: &str) -> Result<UnderlyingSnapshot> {
        self.underlying_requests.lock().push(symbol.to_string());
        self.simulate_latency().await;

        match &*self.underlying.lock() {
            Some(scripted) => scripted.clone(),
            None => Err(MarketDataError::upstream(404, "mock: no underlying scripted")),
        }
    }

    async fn contract_snapshots(&self, tickers: &[String]) -> Result<ChainPage> {
        let batch = {
            let mut batches = self.detail_batches.lock();
            batches.push(tickers.to_vec());
            batches.len() - 1
        };
        self.simulate_latency().await;

        if let Some((failing, error)) = &self.detail_failure {
            if *failing == batch {
                return Err(error.clone());
            }
        }

        let results = tickers
            .iter()
            .filter_map(|t| self.contracts.get(t).cloned())
            .collect();
        Ok(page(results, None))
    }
}

/// Build a provider page
pub fn page(results: Vec<Contract>, next_url: Option<&str>) -> ChainPage {
    ChainPage {
        status: "OK".to_string(),
        request_id: "mock-request".to_string(),
        results,
        next_url: next_url.map(str::to_string),
    }
}

/// `count` distinct contracts alternating call/put on a 5-point strike grid
pub fn synthetic_contracts(symbol: &str, offset: usize, count: usize) -> Vec<Contract> {
    (offset..offset + count)
        .map(|i| {
            let contract_type = if i % 2 == 0 {
                ContractType::Call
            } else {
                ContractType::Put
            };
            let strike = 100.0 + (i / 2) as f64 * 5.0;
            let ticker = format!(
                "O:{}250117{}{:08}",
                symbol,
                if contract_type == ContractType::Call { 'C' } else { 'P' },
                (strike * 1000.0) as u64
            );
            Contract::with_identity(ticker, contract_type, strike, "2025-01-17")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainFilters;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_scripted_pages_are_served_in_order() {
        let provider = MockSnapshotProvider::new()
            .with_pages(vec![page(vec![], Some("next")), page(vec![], None)])
            .with_page_error(MarketDataError::upstream(503, "down"));

        let first = PageRequest::First {
            symbol: "SPY".into(),
            filters: ChainFilters::default(),
        };
        assert_eq!(provider.chain_page(&first).await.unwrap().cursor(), Some("next"));
        assert_eq!(provider.chain_page(&first).await.unwrap().cursor(), None);
        assert_matches!(
            provider.chain_page(&first).await,
            Err(MarketDataError::Upstream { status: 503, .. })
        );
        assert_eq!(provider.chain_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_detail_lookup_skips_unknown_tickers() {
        let contracts = synthetic_contracts("SPY", 0, 4);
        let known = contracts[1].ticker().unwrap().to_string();
        let provider = MockSnapshotProvider::new().with_contracts(contracts);

        let result = provider
            .contract_snapshots(&[known.clone(), "O:UNKNOWN".to_string()])
            .await
            .unwrap();

        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].ticker(), Some(known.as_str()));
    }

    #[test]
    fn test_synthetic_contracts_are_unique() {
        let contracts = synthetic_contracts("SPY", 0, 500);
        let tickers: std::collections::HashSet<_> =
            contracts.iter().filter_map(|c| c.ticker()).collect();
        assert_eq!(tickers.len(), 500);
    }
}
