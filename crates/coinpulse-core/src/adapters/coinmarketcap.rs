use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use super::{lenient_f64, lenient_u32, Upstream};
use crate::data_source::{
    CapabilitySet, CoinsQuery, Endpoint, MarketDataSource, ProviderError, SourceFuture,
};
use crate::http_client::{HttpAuth, HttpClient};
use crate::registry::ProviderConfig;
use crate::{
    finite_or_zero, CanonicalCoin, GlobalMarketSnapshot, ProviderId, TrendingList, UtcDateTime,
};

const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";
const LOGO_BASE_URL: &str = "https://s2.coinmarketcap.com/static/img/coins/64x64";

/// CoinMarketCap Pro adapter. Requires an API key; without one the registry
/// leaves the provider disabled.
#[derive(Clone)]
pub struct CoinMarketCapAdapter {
    upstream: Upstream,
}

impl CoinMarketCapAdapter {
    pub fn new(config: &ProviderConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let auth = config
            .credential
            .as_ref()
            .map_or(HttpAuth::None, |key| HttpAuth::header(API_KEY_HEADER, key.expose()));
        Self {
            upstream: Upstream::new(config, auth, http_client),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.upstream.set_timeout_ms(timeout_ms);
        self
    }

    async fn fetch_coins(&self, query: &CoinsQuery) -> Result<Vec<CanonicalCoin>, ProviderError> {
        let convert = query.currency.to_ascii_uppercase();
        let path = format!(
            "/cryptocurrency/listings/latest?start={}&limit={}&convert={}",
            query.offset().saturating_add(1),
            query.per_page,
            urlencoding::encode(&convert)
        );
        let response: CmcListingResponse = self.upstream.get_json(&path).await?;
        Ok(response
            .data
            .into_iter()
            .map(|listing| listing.into_canonical(&convert))
            .collect())
    }

    async fn fetch_global(&self) -> Result<GlobalMarketSnapshot, ProviderError> {
        let response: CmcGlobalResponse = self
            .upstream
            .get_json("/global-metrics/quotes/latest?convert=USD")
            .await?;
        Ok(response.data.into_canonical())
    }
}

impl MarketDataSource for CoinMarketCapAdapter {
    fn id(&self) -> ProviderId {
        self.upstream.provider()
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, true, false)
    }

    fn coins<'a>(&'a self, query: &'a CoinsQuery) -> SourceFuture<'a, Vec<CanonicalCoin>> {
        Box::pin(self.fetch_coins(query))
    }

    fn global(&self) -> SourceFuture<'_, GlobalMarketSnapshot> {
        Box::pin(self.fetch_global())
    }

    fn trending(&self) -> SourceFuture<'_, TrendingList> {
        let error = ProviderError::unsupported(self.id(), Endpoint::Trending);
        Box::pin(async move { Err(error) })
    }
}

#[derive(Debug, Deserialize)]
struct CmcListingResponse {
    #[serde(default)]
    data: Vec<CmcListing>,
}

#[derive(Debug, Deserialize)]
struct CmcListing {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    cmc_rank: Option<u32>,
    #[serde(default)]
    quote: HashMap<String, CmcQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct CmcQuote {
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    percent_change_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
}

impl CmcListing {
    fn into_canonical(mut self, convert: &str) -> CanonicalCoin {
        let quote = self.quote.remove(convert).unwrap_or_default();
        let id = self
            .slug
            .filter(|slug| !slug.is_empty())
            .unwrap_or_else(|| self.id.to_string());
        CanonicalCoin::new(id, self.symbol, self.name, quote.price.unwrap_or(0.0))
            .with_market_cap(quote.market_cap)
            .with_rank(self.cmc_rank)
            .with_change_pct_24h(quote.percent_change_24h)
            .with_volume_24h(quote.volume_24h)
            .with_image_url(Some(format!("{LOGO_BASE_URL}/{}.png", self.id)))
    }
}

#[derive(Debug, Deserialize)]
struct CmcGlobalResponse {
    data: CmcGlobalData,
}

#[derive(Debug, Deserialize)]
struct CmcGlobalData {
    #[serde(default)]
    active_cryptocurrencies: u64,
    #[serde(default)]
    active_market_pairs: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    btc_dominance: Option<f64>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    quote: HashMap<String, CmcGlobalQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct CmcGlobalQuote {
    #[serde(default, deserialize_with = "lenient_f64")]
    total_market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_market_cap_yesterday_percentage_change: Option<f64>,
}

impl CmcGlobalData {
    fn into_canonical(mut self) -> GlobalMarketSnapshot {
        let usd = self.quote.remove("USD").unwrap_or_default();
        let mut snapshot = GlobalMarketSnapshot::new(
            usd.total_market_cap.unwrap_or(0.0),
            usd.total_volume_24h.unwrap_or(0.0),
        );
        snapshot.btc_dominance_pct = finite_or_zero(self.btc_dominance.unwrap_or(0.0));
        snapshot.market_cap_change_pct_24h =
            finite_or_zero(usd.total_market_cap_yesterday_percentage_change.unwrap_or(0.0));
        snapshot.active_cryptocurrencies = self.active_cryptocurrencies;
        snapshot.markets = self.active_market_pairs;
        if let Some(updated_at) = self
            .last_updated
            .as_deref()
            .and_then(|value| UtcDateTime::parse(value).ok())
        {
            snapshot.updated_at = updated_at;
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{block_on, catalog_config, FixtureHttpClient};
    use crate::ProviderErrorKind;

    const LISTINGS: &str = r#"{"status":{"error_code":0},"data":[
        {"id":1,"name":"Bitcoin","symbol":"BTC","slug":"bitcoin","cmc_rank":1,
         "quote":{"EUR":{"price":59000.1,"volume_24h":2.1e10,"percent_change_24h":0.8,"market_cap":1.16e12}}},
        {"id":1027,"name":"Ethereum","symbol":"ETH","slug":"ethereum","cmc_rank":2,"quote":{}}
    ]}"#;

    #[test]
    fn maps_listing_in_requested_currency() {
        let client = Arc::new(FixtureHttpClient::json(LISTINGS));
        let adapter = CoinMarketCapAdapter::new(
            &catalog_config(ProviderId::Coinmarketcap, Some("cmc-key")),
            client.clone(),
        );
        let query = CoinsQuery::new(3, 20, "eur").expect("valid query");

        let coins = block_on(adapter.coins(&query)).expect("listing should decode");

        assert_eq!(coins[0].id, "bitcoin");
        assert_eq!(coins[0].current_price, 59_000.1);
        assert_eq!(coins[0].market_cap, 1.16e12);
        assert_eq!(
            coins[0].image_url.as_deref(),
            Some("https://s2.coinmarketcap.com/static/img/coins/64x64/1.png")
        );
        assert_eq!(coins[1].current_price, 0.0);
        assert_eq!(coins[1].market_cap_rank, 2);

        let requests = client.recorded_requests();
        assert!(requests[0].url.contains("start=41&limit=20&convert=EUR"));
        assert_eq!(
            requests[0].headers.get("x-cmc_pro_api_key").map(String::as_str),
            Some("cmc-key")
        );
    }

    #[test]
    fn maps_global_metrics() {
        let body = r#"{"data":{"active_cryptocurrencies":9800,"active_market_pairs":80000,
            "btc_dominance":51.9,"last_updated":"2024-05-01T12:00:00.000Z",
            "quote":{"USD":{"total_market_cap":2.3e12,"total_volume_24h":8.0e10,
            "total_market_cap_yesterday_percentage_change":-0.4}}}}"#;
        let adapter = CoinMarketCapAdapter::new(
            &catalog_config(ProviderId::Coinmarketcap, Some("cmc-key")),
            Arc::new(FixtureHttpClient::json(body)),
        );

        let snapshot = block_on(adapter.global()).expect("global should decode");
        assert_eq!(snapshot.total_market_cap_usd, 2.3e12);
        assert_eq!(snapshot.market_cap_change_pct_24h, -0.4);
        assert_eq!(snapshot.markets, 80_000);
        assert_eq!(snapshot.updated_at.format_rfc3339(), "2024-05-01T12:00:00Z");
    }

    #[test]
    fn trending_is_unsupported_without_network_call() {
        let client = Arc::new(FixtureHttpClient::json("{}"));
        let adapter = CoinMarketCapAdapter::new(
            &catalog_config(ProviderId::Coinmarketcap, Some("cmc-key")),
            client.clone(),
        );

        let error = block_on(adapter.trending()).expect_err("trending must be unsupported");
        assert_eq!(error.kind(), ProviderErrorKind::Unsupported);
        assert!(client.recorded_requests().is_empty());
        assert!(!adapter.capabilities().supports(Endpoint::Trending));
    }

    #[test]
    fn unauthorized_key_surfaces_status() {
        let adapter = CoinMarketCapAdapter::new(
            &catalog_config(ProviderId::Coinmarketcap, Some("bad-key")),
            Arc::new(FixtureHttpClient::status(401)),
        );

        let error = block_on(adapter.coins(&CoinsQuery::default())).expect_err("401 must fail");
        assert_eq!(error.status(), Some(401));
        assert_eq!(error.kind(), ProviderErrorKind::HttpStatus);
    }
}
