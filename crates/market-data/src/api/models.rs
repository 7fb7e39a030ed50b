//! API models for the options chain endpoints

use serde::{Deserialize, Serialize};

use crate::types::{Catalog, Contract};

/// Query string of the chain endpoint.
///
/// Everything arrives as text so malformed values get our own error body.
#[derive(Debug, Default, Deserialize)]
pub struct ChainQuery {
    pub limit: Option<String>,
    pub strike_price: Option<String>,
    pub expiration_date: Option<String>,
    pub contract_type: Option<String>,
}

/// Response of the chain endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub status: String,
    pub request_id: String,
    pub results: Vec<Contract>,
    pub truncated: bool,
}

impl From<Catalog> for ChainResponse {
    fn from(catalog: Catalog) -> Self {
        Self {
            status: catalog.status,
            request_id: catalog.request_id,
            results: catalog.results,
            truncated: catalog.truncated,
        }
    }
}

/// Request body of the details endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct DetailsRequest {
    pub contract_tickers: Vec<String>,
}

/// Response of the details endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct DetailsResponse {
    pub status: String,
    pub request_id: String,
    pub results: Vec<Contract>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
