//! HTTP front end for the CoinPulse aggregator.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /api/coins?page=&perPage=&currency=` | `{ data, meta }` |
//! | `GET /api/global` | `{ data, meta }` |
//! | `GET /api/trending` | `{ data, meta }` |
//! | `GET /api/health` | health report |
//!
//! Invalid query parameters answer `400`; exhausted providers with nothing
//! cached answer `503`. Both carry `{ error: { code, message } }`.

mod api;
mod error;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use coinpulse_core::AggregatorService;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use api::{CoinsParams, DataResponse, ResponseMeta};
pub use error::ApiError;

#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<AggregatorService>,
    /// Cancelled on shutdown; every request runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: Arc<AggregatorService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/coins", get(api::coins))
        .route("/api/global", get(api::global))
        .route("/api/trending", get(api::trending))
        .route("/api/health", get(api::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
