use std::fmt::{Display, Formatter};

use coinpulse_core::{AggregatorError, Freshness, ProviderId, SourceAttempt, UtcDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "v1.0.0";

/// Request identifier (UUID v4) for end-to-end request tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Output document printed for every command.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub meta: EnvelopeMeta,
    pub data: T,
    pub errors: Vec<EnvelopeError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: RequestId,
    pub schema_version: &'static str,
    pub generated_at: UtcDateTime,
    /// Provider that answered; absent for cache hits, stale data and failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Freshness>,
    pub stale: bool,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_age_ms: Option<u64>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<SourceAttempt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnvelopeMeta {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            request_id: RequestId::new_v4(),
            schema_version: SCHEMA_VERSION,
            generated_at: UtcDateTime::now(),
            source: None,
            freshness: None,
            stale: false,
            cache_hit: false,
            stale_age_ms: None,
            latency_ms,
            attempts: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl From<&AggregatorError> for EnvelopeError {
    fn from(error: &AggregatorError) -> Self {
        let retryable = match error {
            AggregatorError::AllSourcesExhausted { .. } | AggregatorError::Cancelled { .. } => {
                Some(true)
            }
            AggregatorError::InvalidRequest(_) => Some(false),
        };
        Self {
            code: error.code().to_owned(),
            message: error.to_string(),
            retryable,
        }
    }
}
