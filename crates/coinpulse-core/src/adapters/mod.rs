//! Provider adapters.
//!
//! | Adapter | coins | global | trending |
//! |---------|-------|--------|----------|
//! | [`CoinGeckoAdapter`] | yes | yes | yes |
//! | [`CoinMarketCapAdapter`] | yes | yes | no |
//! | [`CoinCapAdapter`] | yes (USD only) | no | no |
//! | [`CoinPaprikaAdapter`] | yes | yes | no |
//! | [`CryptoCompareAdapter`] | yes | no | no |
//! | [`BinanceAdapter`] | yes | no | no |

mod binance;
mod coincap;
mod coingecko;
mod coinmarketcap;
mod coinpaprika;
mod cryptocompare;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::data_source::{MarketDataSource, ProviderError};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::registry::{ProviderConfig, SourceRegistry};
use crate::ProviderId;

pub use binance::BinanceAdapter;
pub use coincap::CoinCapAdapter;
pub use coingecko::CoinGeckoAdapter;
pub use coinmarketcap::CoinMarketCapAdapter;
pub use coinpaprika::CoinPaprikaAdapter;
pub use cryptocompare::CryptoCompareAdapter;

/// Builds one adapter per registered provider, all sharing `http_client`.
pub fn build_sources(
    registry: &SourceRegistry,
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
) -> Vec<Arc<dyn MarketDataSource>> {
    registry
        .configs()
        .iter()
        .map(|config| build_source(config, http_client.clone(), timeout_ms))
        .collect()
}

pub fn build_source(
    config: &ProviderConfig,
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
) -> Arc<dyn MarketDataSource> {
    match config.id {
        ProviderId::Coingecko => {
            Arc::new(CoinGeckoAdapter::new(config, http_client).with_timeout_ms(timeout_ms))
        }
        ProviderId::Coinmarketcap => {
            Arc::new(CoinMarketCapAdapter::new(config, http_client).with_timeout_ms(timeout_ms))
        }
        ProviderId::Coincap => {
            Arc::new(CoinCapAdapter::new(config, http_client).with_timeout_ms(timeout_ms))
        }
        ProviderId::Coinpaprika => {
            Arc::new(CoinPaprikaAdapter::new(config, http_client).with_timeout_ms(timeout_ms))
        }
        ProviderId::Cryptocompare => {
            Arc::new(CryptoCompareAdapter::new(config, http_client).with_timeout_ms(timeout_ms))
        }
        ProviderId::Binance => {
            Arc::new(BinanceAdapter::new(config, http_client).with_timeout_ms(timeout_ms))
        }
    }
}

/// Connection details shared by every adapter: one GET, status check, JSON decode.
#[derive(Clone)]
pub(crate) struct Upstream {
    provider: ProviderId,
    base_url: String,
    auth: HttpAuth,
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl Upstream {
    pub(crate) fn new(config: &ProviderConfig, auth: HttpAuth, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            provider: config.id,
            base_url: config.base_url.clone(),
            auth,
            http_client,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub(crate) fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    pub(crate) const fn provider(&self) -> ProviderId {
        self.provider
    }

    /// `path` starts with `/` and may carry a query string.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let request = HttpRequest::get(format!("{}{path}", self.base_url))
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout_ms);
        debug!(provider = %self.provider, path, "calling upstream");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| ProviderError::transport(self.provider, &error))?;

        if !response.is_success() {
            return Err(ProviderError::http_status(self.provider, response.status));
        }

        serde_json::from_str(&response.body)
            .map_err(|error| ProviderError::decode(self.provider, error))
    }
}

/// Number that some providers send as a JSON string, a number or `null`.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Number(f64),
    Text(String),
}

/// Decodes `12.5`, `"12.5"` or `null`. Unparsable text becomes `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LooseNumber>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        LooseNumber::Number(number) => Some(number),
        LooseNumber::Text(text) => text.trim().parse::<f64>().ok(),
    }))
}

pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_f64(deserializer)?;
    Ok(value
        .filter(|value| value.is_finite() && *value >= 0.0 && *value <= f64::from(u32::MAX))
        .map(|value| value as u32))
}

/// Position in a list that was paged locally, 1-based.
pub(crate) fn local_rank(offset: u32, index: usize) -> u32 {
    u32::try_from(index)
        .map(|index| offset.saturating_add(index).saturating_add(1))
        .unwrap_or(u32::MAX)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::future::Future;
    use std::sync::Mutex;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    use crate::http_client::{HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse};
    use crate::registry::{Credential, ProviderConfig, SourceRegistry};
    use crate::{ProviderCredentials, ProviderId};

    /// Answers every request with one canned response and records what was sent.
    #[derive(Debug)]
    pub(crate) struct FixtureHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl FixtureHttpClient {
        pub(crate) fn json(body: &str) -> Self {
            Self::respond(Ok(HttpResponse::ok_json(body)))
        }

        pub(crate) fn status(status: u16) -> Self {
            Self::respond(Ok(HttpResponse::with_status(status, "{}")))
        }

        pub(crate) fn respond(response: Result<HttpResponse, HttpError>) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for FixtureHttpClient {
        fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    /// Default catalog entry for `id`, optionally carrying a key.
    pub(crate) fn catalog_config(id: ProviderId, key: Option<&str>) -> ProviderConfig {
        let credential = key.and_then(Credential::new);
        let credentials = ProviderCredentials {
            coingecko: credential.clone(),
            coinmarketcap: credential.clone(),
            coincap: credential.clone(),
            cryptocompare: credential,
        };
        SourceRegistry::default_catalog(credentials)
            .get(id)
            .cloned()
            .expect("provider is part of the default catalog")
    }

    pub(crate) fn block_on<F>(future: F) -> F::Output
    where
        F: Future,
    {
        let waker = noop_waker();
        let mut context = Context::from_waker(&waker);
        let mut future = std::pin::pin!(future);

        loop {
            match future.as_mut().poll(&mut context) {
                Poll::Ready(output) => return output,
                Poll::Pending => std::thread::yield_now(),
            }
        }
    }

    fn noop_waker() -> Waker {
        // SAFETY: The vtable functions never dereference the data pointer and are no-op operations.
        unsafe { Waker::from_raw(noop_raw_waker()) }
    }

    fn noop_raw_waker() -> RawWaker {
        RawWaker::new(std::ptr::null(), &NOOP_RAW_WAKER_VTABLE)
    }

    unsafe fn noop_raw_waker_clone(_: *const ()) -> RawWaker {
        noop_raw_waker()
    }

    unsafe fn noop_raw_waker_wake(_: *const ()) {}

    unsafe fn noop_raw_waker_wake_by_ref(_: *const ()) {}

    unsafe fn noop_raw_waker_drop(_: *const ()) {}

    static NOOP_RAW_WAKER_VTABLE: RawWakerVTable = RawWakerVTable::new(
        noop_raw_waker_clone,
        noop_raw_waker_wake,
        noop_raw_waker_wake_by_ref,
        noop_raw_waker_drop,
    );
}
