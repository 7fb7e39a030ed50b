//! HTTP API for the options chain pipeline.
//!
//! - `GET /api/v1/options/:ticker` - full chain with the underlying price backfilled
//! - `POST /api/v1/options/details` - detail snapshots for a selection

pub mod handlers;
pub mod models;
pub mod routes;

pub use handlers::{ApiState, DEFAULT_MAX_SELECTION, PRICE_FETCH_FAILED_HEADER, PRICE_INJECTED_HEADER};
pub use routes::{create_api_state, create_router};
