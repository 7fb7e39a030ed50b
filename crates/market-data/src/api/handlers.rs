//! API handlers for the options chain endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::models::*;
use crate::error::MarketDataError;
use crate::price::InjectionOutcome;
use crate::service::ChainService;
use crate::types::{ChainFilters, PROVIDER_MAX_PAGE_SIZE};

/// Header set when the underlying price was backfilled
pub const PRICE_INJECTED_HEADER: &str = "x-stock-price-injected";

/// Header set when the underlying price lookup failed
pub const PRICE_FETCH_FAILED_HEADER: &str = "x-stock-price-fetch-failed";

/// Default upper bound on tickers in one details request
pub const DEFAULT_MAX_SELECTION: usize = 250;

pub struct ApiState {
    pub service: Arc<ChainService>,
    pub max_selection: usize,
}

/// Error returned by the handlers
#[derive(Debug)]
pub struct ApiError {
    pub error: MarketDataError,
    pub request_id: String,
}

impl ApiError {
    fn new(error: MarketDataError, request_id: &str) -> Self {
        Self {
            error,
            request_id: request_id.to_string(),
        }
    }
}

/// HTTP status for a pipeline error
pub fn status_for(error: &MarketDataError) -> StatusCode {
    match error {
        MarketDataError::Validation(_) => StatusCode::BAD_REQUEST,
        MarketDataError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        MarketDataError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        MarketDataError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        MarketDataError::Transport(_) | MarketDataError::Decode(_) => StatusCode::BAD_GATEWAY,
        MarketDataError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.error.code().to_string(),
                message: self.error.to_string(),
                request_id: Some(self.request_id),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn parse_chain_query(query: &ChainQuery) -> Result<ChainFilters, MarketDataError> {
    let limit = match query.limit.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| MarketDataError::validation(format!("invalid limit '{}'", raw)))?,
        None => PROVIDER_MAX_PAGE_SIZE,
    };
    let strike_price = match query.strike_price.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<f64>()
                .map_err(|_| MarketDataError::validation(format!("invalid strike_price '{}'", raw)))?,
        ),
        None => None,
    };

    ChainFilters::parse(
        Some(limit),
        strike_price,
        query.expiration_date.as_deref(),
        query.contract_type.as_deref(),
    )
}

/// GET the full chain for an underlying
pub async fn get_chain(
    State(state): State<Arc<ApiState>>,
    Path(ticker): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let filters = parse_chain_query(&query).map_err(|e| ApiError::new(e, &request_id))?;

    // Dropping the request future cancels the pipeline
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let loaded = state
        .service
        .load_chain(&ticker, &filters, &cancel)
        .await
        .map_err(|e| {
            warn!(request_id = %request_id, ticker = %ticker, error = %e, "Chain request failed");
            ApiError::new(e, &request_id)
        })?;

    let price_header = match &loaded.outcome {
        InjectionOutcome::Injected { .. } => PRICE_INJECTED_HEADER,
        InjectionOutcome::Failed { .. } => PRICE_FETCH_FAILED_HEADER,
    };
    info!(
        request_id = %request_id,
        ticker = %ticker,
        contracts = loaded.catalog.len(),
        truncated = loaded.catalog.truncated,
        "Chain served"
    );

    let body = Json(ChainResponse::from(loaded.catalog));
    Ok((
        [(HeaderName::from_static(price_header), HeaderValue::from_static("true"))],
        body,
    )
        .into_response())
}

/// POST detail snapshots for a selection of contracts
pub async fn get_details(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<DetailsRequest>, JsonRejection>,
) -> Result<Json<DetailsResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let Json(req) = payload.map_err(|rejection| {
        ApiError::new(
            MarketDataError::validation(format!("invalid request body: {}", rejection.body_text())),
            &request_id,
        )
    })?;
    let count = req.contract_tickers.len();
    if count == 0 || count > state.max_selection {
        return Err(ApiError::new(
            MarketDataError::validation(format!(
                "contract_tickers must contain between 1 and {} entries, got {}",
                state.max_selection, count
            )),
            &request_id,
        ));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let results = state
        .service
        .load_details(&req.contract_tickers, &cancel)
        .await
        .map_err(|e| {
            warn!(request_id = %request_id, error = %e, "Details request failed");
            ApiError::new(e, &request_id)
        })?;

    info!(request_id = %request_id, requested = count, returned = results.len(), "Details served");
    Ok(Json(DetailsResponse {
        status: "OK".to_string(),
        request_id,
        results,
    }))
}
