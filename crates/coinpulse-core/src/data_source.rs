//! Adapter contract and request/error types.
//!
//! Every provider implements [`MarketDataSource`]. An adapter performs exactly
//! one outbound HTTP call per fetch, translates the provider response into the
//! canonical schema and reports every problem as a [`ProviderError`]; it never
//! swallows a failure. Interpreting failures is the aggregator's job.
//!
//! | Endpoint | Request | Response |
//! |----------|---------|----------|
//! | Coins | [`CoinsQuery`] | `Vec<CanonicalCoin>` |
//! | Global | - | [`GlobalMarketSnapshot`] |
//! | Trending | - | [`TrendingList`] |

use std::any::Any;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_client::HttpError;
use crate::{CanonicalCoin, GlobalMarketSnapshot, ProviderId, TrendingList, ValidationError};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 250;
pub const DEFAULT_CURRENCY: &str = "usd";

/// Canonical query kind, used for capability checks, cache keys and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Coins,
    Global,
    Trending,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coins => "coins",
            Self::Global => "global",
            Self::Trending => "trending",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoints a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub coins: bool,
    pub global: bool,
    pub trending: bool,
}

impl CapabilitySet {
    pub const fn new(coins: bool, global: bool, trending: bool) -> Self {
        Self {
            coins,
            global,
            trending,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true)
    }

    pub const fn coins_only() -> Self {
        Self::new(true, false, false)
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Coins => self.coins,
            Endpoint::Global => self.global,
            Endpoint::Trending => self.trending,
        }
    }
}

/// Classification of a single adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Transport,
    Timeout,
    HttpStatus,
    Decode,
    EmptyPayload,
    RateLimited,
    Unsupported,
    Panicked,
}

impl ProviderErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Transport => "provider.transport",
            Self::Timeout => "provider.timeout",
            Self::HttpStatus => "provider.http_status",
            Self::Decode => "provider.decode",
            Self::EmptyPayload => "provider.empty_payload",
            Self::RateLimited => "provider.rate_limited",
            Self::Unsupported => "provider.unsupported",
            Self::Panicked => "provider.panicked",
        }
    }
}

/// Typed failure of one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider}: {cause} ({})", .kind.code())]
pub struct ProviderError {
    provider: ProviderId,
    kind: ProviderErrorKind,
    http_status: Option<u16>,
    cause: String,
}

impl ProviderError {
    pub fn new(provider: ProviderId, kind: ProviderErrorKind, cause: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            http_status: None,
            cause: cause.into(),
        }
    }

    pub fn transport(provider: ProviderId, error: &HttpError) -> Self {
        let kind = if error.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Transport
        };
        Self::new(provider, kind, error.message())
    }

    /// Non-2xx response. 429 is classified as rate limiting.
    pub fn http_status(provider: ProviderId, status: u16) -> Self {
        let kind = if status == 429 {
            ProviderErrorKind::RateLimited
        } else {
            ProviderErrorKind::HttpStatus
        };
        Self {
            provider,
            kind,
            http_status: Some(status),
            cause: format!("upstream returned status {status}"),
        }
    }

    pub fn decode(provider: ProviderId, error: impl Display) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Decode,
            format!("failed to parse response: {error}"),
        )
    }

    pub fn timeout(provider: ProviderId, after_ms: u128) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Timeout,
            format!("no response within {after_ms}ms"),
        )
    }

    pub fn empty(provider: ProviderId, endpoint: Endpoint) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::EmptyPayload,
            format!("returned an empty {endpoint} result"),
        )
    }

    pub fn unsupported(provider: ProviderId, endpoint: Endpoint) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Unsupported,
            format!("endpoint '{endpoint}' is not supported by this source"),
        )
    }

    /// Adapter call that unwound instead of returning.
    pub fn panicked(provider: ProviderId, payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        Self::new(
            provider,
            ProviderErrorKind::Panicked,
            format!("adapter panicked: {detail}"),
        )
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub const fn status(&self) -> Option<u16> {
        self.http_status
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }
}

/// Parameters of the coin listing query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoinsQuery {
    pub page: u32,
    pub per_page: u32,
    pub currency: String,
}

impl CoinsQuery {
    pub fn new(page: u32, per_page: u32, currency: &str) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::InvalidPage { value: page });
        }
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(ValidationError::InvalidPerPage {
                value: per_page,
                max: MAX_PER_PAGE,
            });
        }
        let last_rank = (page - 1)
            .checked_mul(per_page)
            .and_then(|offset| offset.checked_add(per_page));
        if last_rank.is_none() {
            return Err(ValidationError::PageOutOfRange { page, per_page });
        }

        let currency = currency.trim().to_ascii_lowercase();
        let valid_currency = (3..=5).contains(&currency.len())
            && currency.chars().all(|ch| ch.is_ascii_alphabetic());
        if !valid_currency {
            return Err(ValidationError::InvalidCurrency { value: currency });
        }

        Ok(Self {
            page,
            per_page,
            currency,
        })
    }

    /// Zero-based index of the first entry on this page.
    pub const fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Deterministic cache signature. USD, the default currency, keeps the short form.
    pub fn cache_key(&self) -> String {
        if self.currency == DEFAULT_CURRENCY {
            format!("coins_page{}_perPage{}", self.page, self.per_page)
        } else {
            format!(
                "coins_page{}_perPage{}_{}",
                self.page, self.per_page, self.currency
            )
        }
    }
}

impl Default for CoinsQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            currency: String::from(DEFAULT_CURRENCY),
        }
    }
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Provider adapter contract.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// concurrent query. An endpoint outside [`capabilities`](Self::capabilities)
/// must return [`ProviderErrorKind::Unsupported`] without touching the network.
pub trait MarketDataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    /// Fetches one page of the coin listing, ordered by market cap.
    fn coins<'a>(&'a self, query: &'a CoinsQuery) -> SourceFuture<'a, Vec<CanonicalCoin>>;

    /// Fetches whole-market aggregates.
    fn global(&self) -> SourceFuture<'_, GlobalMarketSnapshot>;

    /// Fetches the provider's trending list.
    fn trending(&self) -> SourceFuture<'_, TrendingList>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_query_uses_short_cache_key() {
        assert_eq!(CoinsQuery::default().cache_key(), "coins_page1_perPage50");
    }

    #[test]
    fn non_usd_currency_is_part_of_cache_key() {
        let query = CoinsQuery::new(2, 100, " EUR ").expect("valid query");
        assert_eq!(query.currency, "eur");
        assert_eq!(query.cache_key(), "coins_page2_perPage100_eur");
        assert_eq!(query.offset(), 100);
    }

    #[test]
    fn rejects_out_of_range_pagination() {
        assert!(matches!(
            CoinsQuery::new(0, 50, "usd"),
            Err(ValidationError::InvalidPage { .. })
        ));
        assert!(matches!(
            CoinsQuery::new(1, 251, "usd"),
            Err(ValidationError::InvalidPerPage { .. })
        ));
        assert!(matches!(
            CoinsQuery::new(1, 50, "us1"),
            Err(ValidationError::InvalidCurrency { .. })
        ));
    }

    #[test]
    fn rejects_pages_whose_ranks_overflow() {
        assert_eq!(
            CoinsQuery::new(u32::MAX, 250, "usd"),
            Err(ValidationError::PageOutOfRange {
                page: u32::MAX,
                per_page: 250
            })
        );

        let last = u32::MAX / 250;
        let query = CoinsQuery::new(last, 250, "usd").expect("last full page fits");
        assert_eq!(query.offset(), (last - 1) * 250);
        assert!(CoinsQuery::new(last + 1, 250, "usd").is_err());
    }

    #[test]
    fn offset_saturates_for_hand_built_queries() {
        let query = CoinsQuery {
            page: u32::MAX,
            per_page: MAX_PER_PAGE,
            currency: String::from(DEFAULT_CURRENCY),
        };
        assert_eq!(query.offset(), u32::MAX);
    }

    #[test]
    fn panic_payloads_become_typed_errors() {
        let error = ProviderError::panicked(ProviderId::Binance, &"index out of bounds");
        assert_eq!(error.kind(), ProviderErrorKind::Panicked);
        assert!(error.cause().contains("index out of bounds"));

        let owned: Box<dyn Any + Send> = Box::new(String::from("boom"));
        let error = ProviderError::panicked(ProviderId::Binance, owned.as_ref());
        assert_eq!(error.cause(), "adapter panicked: boom");
    }

    #[test]
    fn http_429_is_classified_as_rate_limited() {
        let error = ProviderError::http_status(ProviderId::Coingecko, 429);
        assert_eq!(error.kind(), ProviderErrorKind::RateLimited);
        assert_eq!(error.status(), Some(429));
        assert!(error.to_string().contains("provider.rate_limited"));
    }
}
