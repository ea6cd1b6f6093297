use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coinpulse_core::{AggregatorError, ValidationError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid query: {0}")]
    BadQuery(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Aggregator(AggregatorError),
}

impl From<AggregatorError> for ApiError {
    fn from(error: AggregatorError) -> Self {
        match error {
            AggregatorError::InvalidRequest(validation) => Self::Validation(validation),
            other => Self::Aggregator(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadQuery(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Aggregator(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadQuery(_) | Self::Validation(_) => "request.invalid",
            Self::Aggregator(error) => error.code(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use coinpulse_core::Endpoint;

    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let invalid = ApiError::from(AggregatorError::from(ValidationError::InvalidPage { value: 0 }));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), "request.invalid");

        let exhausted = ApiError::from(AggregatorError::AllSourcesExhausted {
            endpoint: Endpoint::Coins,
            attempts: Vec::new(),
        });
        assert_eq!(exhausted.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(exhausted.code(), "aggregator.all_sources_exhausted");
    }
}
