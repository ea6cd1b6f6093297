use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use coinpulse_core::{
    AggregatorError, CanonicalCoin, CoinsQuery, Freshness, GlobalMarketSnapshot, HealthReport,
    ProviderId, QueryOutcome, SourceAttempt, TrendingList,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinsParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub currency: Option<String>,
}

impl CoinsParams {
    fn into_query(self) -> Result<CoinsQuery, ApiError> {
        let defaults = CoinsQuery::default();
        let currency = self.currency.unwrap_or(defaults.currency);
        Ok(CoinsQuery::new(
            self.page.unwrap_or(defaults.page),
            self.per_page.unwrap_or(defaults.per_page),
            &currency,
        )?)
    }
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub source: Option<ProviderId>,
    pub stale: bool,
    pub cached: bool,
    pub latency_ms: u64,
    pub attempts: Vec<SourceAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_age_ms: Option<u64>,
}

impl<T> From<QueryOutcome<T>> for DataResponse<T> {
    fn from(outcome: QueryOutcome<T>) -> Self {
        Self {
            meta: ResponseMeta {
                source: outcome.source,
                stale: outcome.freshness == Freshness::Stale,
                cached: outcome.freshness == Freshness::Cached,
                latency_ms: outcome.latency_ms,
                attempts: outcome.attempts,
                stale_age_ms: outcome.stale_age_ms,
            },
            data: outcome.data,
        }
    }
}

type ApiResult<T> = Result<Json<DataResponse<T>>, ApiError>;

fn respond<T>(result: Result<QueryOutcome<T>, AggregatorError>) -> ApiResult<T> {
    Ok(Json(DataResponse::from(result?)))
}

pub async fn coins(
    State(state): State<AppState>,
    params: Result<Query<CoinsParams>, QueryRejection>,
) -> ApiResult<Vec<CanonicalCoin>> {
    let Query(params) = params.map_err(|rejection| ApiError::BadQuery(rejection.body_text()))?;
    let query = params.into_query()?;
    let cancel = state.shutdown.child_token();
    respond(state.service.list_coins(&query, &cancel).await)
}

pub async fn global(State(state): State<AppState>) -> ApiResult<GlobalMarketSnapshot> {
    let cancel = state.shutdown.child_token();
    respond(state.service.global_market(&cancel).await)
}

pub async fn trending(State(state): State<AppState>) -> ApiResult<TrendingList> {
    let cancel = state.shutdown.child_token();
    respond(state.service.trending(&cancel).await)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health_report())
}
