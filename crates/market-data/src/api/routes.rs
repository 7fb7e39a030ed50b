//! API routes for the options chain endpoints

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::*;
use crate::service::ChainService;

/// Create the options router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/options/details", post(get_details))
        .route("/api/v1/options/:ticker", get(get_chain))
        .with_state(Arc::new(state))
}

/// Get the API state for the router
pub fn create_api_state(service: ChainService, max_selection: usize) -> ApiState {
    ApiState {
        service: Arc::new(service),
        max_selection: max_selection.max(1),
    }
}
