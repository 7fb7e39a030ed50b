//! Shared types for the options chain pipeline
//!
//! Field names follow the provider's snapshot JSON so records can be passed
//! through to callers untouched. Every provider field is optional: the
//! provider omits whole blocks depending on plan and market hours, and the
//! merge step relies on `None` meaning "not known" rather than "zero".

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MarketDataError;
use crate::Result;

/// Maximum contracts the provider returns per page / per detail request
pub const PROVIDER_MAX_PAGE_SIZE: u32 = 250;

/// Contract kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Call,
    Put,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Call => "call",
            ContractType::Put => "put",
        }
    }
}

impl FromStr for ContractType {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "call" => Ok(ContractType::Call),
            "put" => Ok(ContractType::Put),
            other => Err(MarketDataError::validation(format!(
                "invalid contract_type '{}', expected call or put",
                other
            ))),
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exercise style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStyle {
    American,
    European,
    Bermudan,
}

impl FromStr for ExerciseStyle {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "american" => Ok(ExerciseStyle::American),
            "european" => Ok(ExerciseStyle::European),
            "bermudan" => Ok(ExerciseStyle::Bermudan),
            other => Err(MarketDataError::validation(format!(
                "unknown exercise style '{}'",
                other
            ))),
        }
    }
}

/// Unknown enum strings from the provider become `None` instead of failing the page.
fn lenient_enum<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// Contract identity, set once at acquisition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_enum",
        skip_serializing_if = "Option::is_none"
    )]
    pub contract_type: Option<ContractType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_enum",
        skip_serializing_if = "Option::is_none"
    )]
    pub exercise_style: Option<ExerciseStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_per_contract: Option<i32>,
}

impl ContractDetails {
    /// Expiration normalized to a calendar date
    pub fn expiration(&self) -> Option<NaiveDate> {
        self.expiration_date.as_deref().and_then(normalize_date)
    }
}

/// Option Greeks as reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vega: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rho: Option<f64>,
}

/// Most recent bid/ask
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LastQuote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_size: Option<i64>,
}

impl LastQuote {
    pub fn mid_price(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}

/// Most recent trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LastTrade {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

/// OHLCV for the current trading day
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayBar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
}

impl DayBar {
    /// Percent change from the day's open to `current_price`
    pub fn percent_change(&self, current_price: f64) -> Option<f64> {
        match self.open {
            Some(open) if open > 0.0 => Some((current_price - open) / open * 100.0),
            _ => None,
        }
    }
}

/// Session block returned by the unified snapshot endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
}

/// Underlying reference carried on each contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingAsset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// One option contract snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Top-level ticker, set by the unified snapshot endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ContractDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeks: Option<Greeks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_interest: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quote: Option<LastQuote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trade: Option<LastTrade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<DayBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying_asset: Option<UnderlyingAsset>,
}

impl Contract {
    /// Contract carrying only an identity record
    pub fn with_identity(
        ticker: impl Into<String>,
        contract_type: ContractType,
        strike_price: f64,
        expiration_date: impl Into<String>,
    ) -> Self {
        Self {
            details: Some(ContractDetails {
                ticker: Some(ticker.into()),
                contract_type: Some(contract_type),
                strike_price: Some(strike_price),
                expiration_date: Some(expiration_date.into()),
                exercise_style: None,
                shares_per_contract: None,
            }),
            ..Default::default()
        }
    }

    /// Identity key: the details ticker, else the top-level one
    pub fn ticker(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.ticker.as_deref())
            .or(self.ticker.as_deref())
    }

    pub fn strike(&self) -> Option<f64> {
        self.details.as_ref().and_then(|d| d.strike_price)
    }

    pub fn contract_type(&self) -> Option<ContractType> {
        self.details.as_ref().and_then(|d| d.contract_type)
    }

    pub fn expiration(&self) -> Option<NaiveDate> {
        self.details.as_ref().and_then(|d| d.expiration())
    }

    /// Last traded price of the contract
    pub fn last_price(&self) -> Option<f64> {
        self.last_trade.and_then(|t| t.price)
    }

    pub fn day_open(&self) -> Option<f64> {
        self.day.and_then(|d| d.open)
    }
}

/// Complete catalog for one underlying, as served to callers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub status: String,
    pub request_id: String,
    pub results: Vec<Contract>,
    /// Pagination stopped at the page cap while the provider still had more
    #[serde(default)]
    pub truncated: bool,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// One page of a provider snapshot response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainPage {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub results: Vec<Contract>,
    /// Continuation cursor; absent or empty on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
}

impl ChainPage {
    /// The continuation cursor, treating an empty string as absent
    pub fn cursor(&self) -> Option<&str> {
        self.next_url.as_deref().filter(|c| !c.is_empty())
    }
}

/// Underlying (stock/index) snapshot response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingSnapshot {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub results: Vec<UnderlyingResult>,
}

impl UnderlyingSnapshot {
    /// Latest price: the session close of the first result
    pub fn latest_price(&self) -> Option<f64> {
        self.results
            .first()
            .and_then(|r| r.session)
            .and_then(|s| s.close)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingResult {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

/// Optional filters for a chain request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainFilters {
    /// Page size requested from the provider
    pub limit: Option<u32>,
    pub strike_price: Option<f64>,
    pub expiration_date: Option<NaiveDate>,
    pub contract_type: Option<ContractType>,
}

impl ChainFilters {
    /// Build filters from raw query-string values
    pub fn parse(
        limit: Option<u32>,
        strike_price: Option<f64>,
        expiration_date: Option<&str>,
        contract_type: Option<&str>,
    ) -> Result<Self> {
        let expiration_date = match expiration_date.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                MarketDataError::validation(format!(
                    "invalid expiration_date '{}', expected YYYY-MM-DD",
                    raw
                ))
            })?),
            None => None,
        };

        let contract_type = match contract_type.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };

        let filters = Self {
            limit,
            strike_price,
            expiration_date,
            contract_type,
        };
        filters.validate()?;
        Ok(filters)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = self.limit {
            if limit == 0 || limit > PROVIDER_MAX_PAGE_SIZE {
                return Err(MarketDataError::validation(format!(
                    "limit must be between 1 and {}, got {}",
                    PROVIDER_MAX_PAGE_SIZE, limit
                )));
            }
        }
        if let Some(strike) = self.strike_price {
            if !strike.is_finite() || strike <= 0.0 {
                return Err(MarketDataError::validation(format!(
                    "strike_price must be a positive number, got {}",
                    strike
                )));
            }
        }
        Ok(())
    }

    /// Query pairs for the provider, in a stable order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(strike) = self.strike_price {
            pairs.push(("strike_price", strike.to_string()));
        }
        if let Some(expiration) = self.expiration_date {
            pairs.push(("expiration_date", expiration.format("%Y-%m-%d").to_string()));
        }
        if let Some(contract_type) = self.contract_type {
            pairs.push(("contract_type", contract_type.as_str().to_string()));
        }
        pairs
    }
}

/// Validate and normalize an underlying symbol (`SPY`, `brk.b`, `I:SPX`)
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        return Err(MarketDataError::validation("symbol is required"));
    }
    if symbol.len() > 32 {
        return Err(MarketDataError::validation(format!(
            "symbol '{}' is too long",
            symbol
        )));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-' | '_'))
    {
        return Err(MarketDataError::validation(format!(
            "symbol '{}' contains invalid characters",
            symbol
        )));
    }
    Ok(symbol.to_ascii_uppercase())
}

/// Normalize an ISO date or timestamp string to a calendar date
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}
