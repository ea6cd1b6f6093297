use std::future::Future;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use coinpulse_core::{
    build_sources, CoinsQuery, Credential, Endpoint, HttpClient, HttpError, HttpRequest,
    HttpResponse, MarketDataSource, ProviderCredentials, ProviderErrorKind, ProviderId,
    SourceRegistry,
};
use coinpulse_core::http_client::HttpFuture;

/// Replies to every request with the same response and counts requests.
struct CannedHttpClient {
    response: Result<HttpResponse, HttpError>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CannedHttpClient {
    fn new(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("not poisoned").len()
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("not poisoned").clone()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
        self.requests.lock().expect("not poisoned").push(request);
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

fn keyed_catalog() -> SourceRegistry {
    let key = Credential::new("contract-key");
    SourceRegistry::default_catalog(ProviderCredentials {
        coingecko: key.clone(),
        coinmarketcap: key.clone(),
        coincap: key.clone(),
        cryptocompare: key,
    })
}

fn sources_over(client: &Arc<CannedHttpClient>) -> Vec<Arc<dyn MarketDataSource>> {
    build_sources(&keyed_catalog(), client.clone(), 1_000)
}

fn expected_capabilities(id: ProviderId) -> (bool, bool, bool) {
    match id {
        ProviderId::Coingecko => (true, true, true),
        ProviderId::Coinmarketcap | ProviderId::Coinpaprika => (true, true, false),
        ProviderId::Coincap | ProviderId::Cryptocompare | ProviderId::Binance => {
            (true, false, false)
        }
    }
}

async fn call(source: &dyn MarketDataSource, endpoint: Endpoint) -> Option<ProviderErrorKind> {
    let query = CoinsQuery::default();
    match endpoint {
        Endpoint::Coins => source.coins(&query).await.err().map(|error| error.kind()),
        Endpoint::Global => source.global().await.err().map(|error| error.kind()),
        Endpoint::Trending => source.trending().await.err().map(|error| error.kind()),
    }
}

const ENDPOINTS: [Endpoint; 3] = [Endpoint::Coins, Endpoint::Global, Endpoint::Trending];

#[test]
fn every_provider_has_an_adapter_in_catalog_order() {
    let client = CannedHttpClient::new(Ok(HttpResponse::ok_json("{}")));
    let ids = sources_over(&client)
        .iter()
        .map(|source| source.id())
        .collect::<Vec<_>>();

    assert_eq!(ids, ProviderId::ALL.to_vec());
}

#[test]
fn capabilities_match_provider_coverage() {
    let client = CannedHttpClient::new(Ok(HttpResponse::ok_json("{}")));
    for source in sources_over(&client) {
        let capabilities = source.capabilities();
        let actual = (
            capabilities.supports(Endpoint::Coins),
            capabilities.supports(Endpoint::Global),
            capabilities.supports(Endpoint::Trending),
        );
        assert_eq!(actual, expected_capabilities(source.id()), "{}", source.id());
    }
}

#[test]
fn unsupported_endpoints_fail_without_network() {
    let client = CannedHttpClient::new(Ok(HttpResponse::ok_json("{}")));
    for source in sources_over(&client) {
        for endpoint in ENDPOINTS {
            if source.capabilities().supports(endpoint) {
                continue;
            }
            let kind = block_on(call(source.as_ref(), endpoint));
            assert_eq!(kind, Some(ProviderErrorKind::Unsupported), "{} {endpoint}", source.id());
        }
    }
    assert_eq!(client.request_count(), 0);
}

#[test]
fn server_errors_map_to_http_status() {
    let client = CannedHttpClient::new(Ok(HttpResponse::with_status(500, "oops")));
    for source in sources_over(&client) {
        for endpoint in ENDPOINTS {
            if !source.capabilities().supports(endpoint) {
                continue;
            }
            let kind = block_on(call(source.as_ref(), endpoint));
            assert_eq!(kind, Some(ProviderErrorKind::HttpStatus), "{} {endpoint}", source.id());
        }
    }
}

#[test]
fn too_many_requests_maps_to_rate_limited() {
    let client = CannedHttpClient::new(Ok(HttpResponse::with_status(429, "slow down")));
    for source in sources_over(&client) {
        let kind = block_on(call(source.as_ref(), Endpoint::Coins));
        assert_eq!(kind, Some(ProviderErrorKind::RateLimited), "{}", source.id());
    }
}

#[test]
fn unparseable_bodies_map_to_decode() {
    let client = CannedHttpClient::new(Ok(HttpResponse::ok_json("<html>maintenance</html>")));
    for source in sources_over(&client) {
        let kind = block_on(call(source.as_ref(), Endpoint::Coins));
        assert_eq!(kind, Some(ProviderErrorKind::Decode), "{}", source.id());
    }
}

#[test]
fn transport_failures_keep_timeout_distinct() {
    let client = CannedHttpClient::new(Err(HttpError::timeout("deadline elapsed")));
    for source in sources_over(&client) {
        let kind = block_on(call(source.as_ref(), Endpoint::Coins));
        assert_eq!(kind, Some(ProviderErrorKind::Timeout), "{}", source.id());
    }

    let client = CannedHttpClient::new(Err(HttpError::new("connection refused")));
    for source in sources_over(&client) {
        let kind = block_on(call(source.as_ref(), Endpoint::Coins));
        assert_eq!(kind, Some(ProviderErrorKind::Transport), "{}", source.id());
    }
}

#[test]
fn every_request_carries_the_configured_timeout() {
    let client = CannedHttpClient::new(Ok(HttpResponse::with_status(503, "")));
    for source in sources_over(&client) {
        let _ = block_on(call(source.as_ref(), Endpoint::Coins));
    }

    let requests = client.requests();
    assert_eq!(requests.len(), ProviderId::ALL.len());
    assert!(requests.iter().all(|request| request.timeout_ms == 1_000));
    assert!(requests.iter().all(|request| request.url.starts_with("https://")));
}

#[test]
fn api_keys_are_redacted_from_debug_output() {
    let rendered = format!("{:?}", keyed_catalog());
    assert!(!rendered.contains("contract-key"));
}

fn block_on<F>(future: F) -> F::Output
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

unsafe fn noop_clone(_data: *const ()) -> RawWaker {
    noop_raw_waker()
}

unsafe fn noop(_data: *const ()) {}

static NOOP_RAW_WAKER_VTABLE: RawWakerVTable =
    RawWakerVTable::new(noop_clone, noop, noop, noop);
