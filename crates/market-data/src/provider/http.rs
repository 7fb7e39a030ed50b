//! HTTP client for the upstream snapshot API

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::MarketDataError;
use crate::provider::traits::{PageRequest, SnapshotProvider};
use crate::types::{ChainPage, UnderlyingSnapshot};
use crate::Result;

/// Default provider endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.massive.com/v3";

/// Query parameter carrying the credential
const API_KEY_PARAM: &str = "apiKey";

/// HTTP-based snapshot provider
pub struct HttpSnapshotProvider {
    client: Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl HttpSnapshotProvider {
    /// Create a new HTTP provider.
    ///
    /// `timeout` bounds each individual request at the transport level.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(MarketDataError::Config("provider api key is empty".to_string()));
        }

        // Trailing slash so relative joins keep the version prefix
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| MarketDataError::Config(format!("invalid base url '{}': {}", base_url, e)))?;
        if base_url.host_str().is_none() {
            return Err(MarketDataError::Config(format!("base url '{}' has no host", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Config(e.to_string()))?;

        debug!(
            base_url = %base_url,
            api_key = %mask_api_key(&api_key),
            timeout_ms = timeout.as_millis() as u64,
            "Snapshot provider configured"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            timeout,
        })
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MarketDataError::Config(format!("cannot build url for '{}': {}", path, e)))
    }

    /// First page of the chain snapshot for `symbol`
    pub fn chain_url(&self, symbol: &str, filters: &crate::types::ChainFilters) -> Result<Url> {
        let mut url = self.join(&format!("snapshot/options/{}", symbol))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in filters.query_pairs() {
                query.append_pair(key, &value);
            }
            query.append_pair(API_KEY_PARAM, &self.api_key);
        }
        Ok(url)
    }

    /// Continuation URL with our credential re-attached.
    ///
    /// The provider's cursor never carries the key, and a cursor pointing at
    /// another host is refused so the key is never sent elsewhere.
    pub fn cursor_url(&self, cursor: &str) -> Result<Url> {
        let parsed = Url::parse(cursor)
            .map_err(|e| MarketDataError::Decode(format!("invalid continuation cursor: {}", e)))?;

        if parsed.host_str() != self.base_url.host_str() || parsed.scheme() != self.base_url.scheme() {
            return Err(MarketDataError::Decode(format!(
                "continuation cursor points at unexpected host {:?}",
                parsed.host_str()
            )));
        }

        let retained: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| k != API_KEY_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut url = parsed;
        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(API_KEY_PARAM, &self.api_key);
        Ok(url)
    }

    /// Unified snapshot for a single underlying
    pub fn underlying_url(&self, symbol: &str) -> Result<Url> {
        let mut url = self.join("snapshot")?;
        url.query_pairs_mut()
            .append_pair("ticker", symbol)
            .append_pair(API_KEY_PARAM, &self.api_key);
        Ok(url)
    }

    /// Unified snapshot for a set of contract tickers
    pub fn details_url(&self, tickers: &[String]) -> Result<Url> {
        let mut url = self.join("snapshot")?;
        url.query_pairs_mut()
            .append_pair("ticker.any_of", &tickers.join(","))
            .append_pair("limit", &tickers.len().to_string())
            .append_pair(API_KEY_PARAM, &self.api_key);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, endpoint: &'static str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint, status = status.as_u16(), "Provider returned error status");
            return Err(MarketDataError::upstream(status.as_u16(), body));
        }

        let bytes = response.bytes().await.map_err(|e| self.map_transport(e))?;
        serde_json::from_slice(&bytes).map_err(MarketDataError::from)
    }

    /// Translate a reqwest failure, stripping the URL so the key never reaches logs
    fn map_transport(&self, err: reqwest::Error) -> MarketDataError {
        if err.is_timeout() {
            return MarketDataError::Timeout(self.timeout);
        }
        if err.is_decode() {
            return MarketDataError::Decode(err.without_url().to_string());
        }
        MarketDataError::Transport(err.without_url().to_string())
    }
}

/// Show only the first few characters of a credential
pub fn mask_api_key(key: &str) -> String {
    let visible: String = key.chars().take(3).collect();
    format!("{}***", visible)
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    async fn chain_page(&self, request: &PageRequest) -> Result<ChainPage> {
        let url = match request {
            PageRequest::First { symbol, filters } => self.chain_url(symbol, filters)?,
            PageRequest::Cursor(cursor) => self.cursor_url(cursor)?,
        };
        self.get_json(url, "chain_page").await
    }

    async fn underlying_snapshot(&self, symbol: &str) -> Result<UnderlyingSnapshot> {
        let url = self.underlying_url(symbol)?;
        self.get_json(url, "underlying_snapshot").await
    }

    async fn contract_snapshots(&self, tickers: &[String]) -> Result<ChainPage> {
        let url = self.details_url(tickers)?;
        self.get_json(url, "contract_snapshots").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainFilters, ContractType};
    use assert_matches::assert_matches;

    fn provider() -> HttpSnapshotProvider {
        HttpSnapshotProvider::new("https://api.example.com/v3/", "secret-key", Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(HttpSnapshotProvider::new("https://api.example.com/v3", "", Duration::from_secs(1)).is_err());
        assert!(HttpSnapshotProvider::new("not a url", "k", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_chain_url_carries_filters_and_key() {
        let filters = ChainFilters {
            limit: Some(250),
            contract_type: Some(ContractType::Put),
            ..Default::default()
        };
        let url = provider().chain_url("SPY", &filters).unwrap();

        assert_eq!(url.path(), "/v3/snapshot/options/SPY");
        assert_eq!(url.query(), Some("limit=250&contract_type=put&apiKey=secret-key"));
    }

    #[test]
    fn test_cursor_url_reattaches_key_once() {
        let url = provider()
            .cursor_url("https://api.example.com/v3/snapshot/options/SPY?cursor=abc&apiKey=stale")
            .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("cursor".to_string(), "abc".to_string()),
                ("apiKey".to_string(), "secret-key".to_string()),
            ]
        );
    }

    #[test]
    fn test_cursor_to_foreign_host_is_refused() {
        assert_matches!(
            provider().cursor_url("https://evil.example.net/v3/snapshot?cursor=abc"),
            Err(MarketDataError::Decode(_))
        );
        assert_matches!(provider().cursor_url("::garbage"), Err(MarketDataError::Decode(_)));
    }

    #[test]
    fn test_underlying_and_details_urls() {
        let p = provider();
        let url = p.underlying_url("SPY").unwrap();
        assert_eq!(url.path(), "/v3/snapshot");
        assert_eq!(url.query(), Some("ticker=SPY&apiKey=secret-key"));

        let tickers = vec!["O:A".to_string(), "O:B".to_string()];
        let url = p.details_url(&tickers).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("ticker.any_of".to_string(), "O:A,O:B".to_string()));
        assert_eq!(pairs[1], ("limit".to_string(), "2".to_string()));
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("abcdef123"), "abc***");
        assert_eq!(mask_api_key("ab"), "ab***");
    }
}
