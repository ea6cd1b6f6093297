use std::sync::Arc;

use serde::Deserialize;

use super::{lenient_f64, lenient_u32, Upstream};
use crate::data_source::{
    CapabilitySet, CoinsQuery, Endpoint, MarketDataSource, ProviderError, ProviderErrorKind,
    SourceFuture, DEFAULT_CURRENCY,
};
use crate::http_client::{HttpAuth, HttpClient};
use crate::registry::ProviderConfig;
use crate::{CanonicalCoin, GlobalMarketSnapshot, ProviderId, TrendingList};

const ICON_BASE_URL: &str = "https://assets.coincap.io/assets/icons";

/// CoinCap adapter. Prices are USD only; other currencies are reported as unsupported.
#[derive(Clone)]
pub struct CoinCapAdapter {
    upstream: Upstream,
}

impl CoinCapAdapter {
    pub fn new(config: &ProviderConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let auth = config
            .credential
            .as_ref()
            .map_or(HttpAuth::None, |key| HttpAuth::BearerToken(key.expose().to_owned()));
        Self {
            upstream: Upstream::new(config, auth, http_client),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.upstream.set_timeout_ms(timeout_ms);
        self
    }

    async fn fetch_coins(&self, query: &CoinsQuery) -> Result<Vec<CanonicalCoin>, ProviderError> {
        if query.currency != DEFAULT_CURRENCY {
            return Err(ProviderError::new(
                self.id(),
                ProviderErrorKind::Unsupported,
                format!("prices are only available in usd, not {}", query.currency),
            ));
        }

        let path = format!("/assets?limit={}&offset={}", query.per_page, query.offset());
        let response: CoinCapAssets = self.upstream.get_json(&path).await?;
        Ok(response
            .data
            .into_iter()
            .map(CoinCapAsset::into_canonical)
            .collect())
    }
}

impl MarketDataSource for CoinCapAdapter {
    fn id(&self) -> ProviderId {
        self.upstream.provider()
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::coins_only()
    }

    fn coins<'a>(&'a self, query: &'a CoinsQuery) -> SourceFuture<'a, Vec<CanonicalCoin>> {
        Box::pin(self.fetch_coins(query))
    }

    fn global(&self) -> SourceFuture<'_, GlobalMarketSnapshot> {
        let error = ProviderError::unsupported(self.id(), Endpoint::Global);
        Box::pin(async move { Err(error) })
    }

    fn trending(&self) -> SourceFuture<'_, TrendingList> {
        let error = ProviderError::unsupported(self.id(), Endpoint::Trending);
        Box::pin(async move { Err(error) })
    }
}

#[derive(Debug, Deserialize)]
struct CoinCapAssets {
    #[serde(default)]
    data: Vec<CoinCapAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinCapAsset {
    id: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    rank: Option<u32>,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume_usd24_hr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    change_percent24_hr: Option<f64>,
}

impl CoinCapAsset {
    fn into_canonical(self) -> CanonicalCoin {
        let image_url = (!self.symbol.is_empty())
            .then(|| format!("{ICON_BASE_URL}/{}@2x.png", self.symbol.to_ascii_lowercase()));
        CanonicalCoin::new(self.id, self.symbol, self.name, self.price_usd.unwrap_or(0.0))
            .with_market_cap(self.market_cap_usd)
            .with_rank(self.rank)
            .with_change_pct_24h(self.change_percent24_hr)
            .with_volume_24h(self.volume_usd24_hr)
            .with_image_url(image_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{block_on, catalog_config, FixtureHttpClient};
    use crate::http_client::HttpError;

    const ASSETS: &str = r#"{"data":[
        {"id":"bitcoin","rank":"1","symbol":"BTC","name":"Bitcoin",
         "priceUsd":"64123.4500","marketCapUsd":"1262000000000.00",
         "volumeUsd24Hr":"9100000000.5","changePercent24Hr":"-0.5321"},
        {"id":"obscure","rank":"812","symbol":"OBS","name":"Obscure",
         "priceUsd":"0.0031","marketCapUsd":null,"volumeUsd24Hr":null,"changePercent24Hr":null}
    ],"timestamp":1714560000000}"#;

    #[test]
    fn parses_string_encoded_numbers() {
        let client = Arc::new(FixtureHttpClient::json(ASSETS));
        let adapter = CoinCapAdapter::new(&catalog_config(ProviderId::Coincap, None), client.clone());
        let query = CoinsQuery::new(2, 50, "usd").expect("valid query");

        let coins = block_on(adapter.coins(&query)).expect("assets should decode");

        assert_eq!(coins[0].current_price, 64_123.45);
        assert_eq!(coins[0].market_cap_rank, 1);
        assert_eq!(coins[0].price_change_pct_24h, -0.5321);
        assert_eq!(
            coins[0].image_url.as_deref(),
            Some("https://assets.coincap.io/assets/icons/btc@2x.png")
        );
        assert_eq!(coins[1].market_cap, 0.0);
        assert_eq!(coins[1].total_volume_24h, 0.0);

        let requests = client.recorded_requests();
        assert!(requests[0].url.ends_with("/assets?limit=50&offset=50"));
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[test]
    fn optional_key_is_sent_as_bearer_token() {
        let client = Arc::new(FixtureHttpClient::json(r#"{"data":[]}"#));
        let adapter =
            CoinCapAdapter::new(&catalog_config(ProviderId::Coincap, Some("cap-token")), client.clone());

        block_on(adapter.coins(&CoinsQuery::default())).expect("empty data decodes");
        assert_eq!(
            client.recorded_requests()[0]
                .headers
                .get("authorization")
                .map(String::as_str),
            Some("Bearer cap-token")
        );
    }

    #[test]
    fn non_usd_currency_is_unsupported() {
        let client = Arc::new(FixtureHttpClient::json(ASSETS));
        let adapter = CoinCapAdapter::new(&catalog_config(ProviderId::Coincap, None), client.clone());
        let query = CoinsQuery::new(1, 10, "gbp").expect("valid query");

        let error = block_on(adapter.coins(&query)).expect_err("gbp is unsupported");
        assert_eq!(error.kind(), ProviderErrorKind::Unsupported);
        assert!(client.recorded_requests().is_empty());
    }

    #[test]
    fn transport_timeout_is_classified_as_timeout() {
        let adapter = CoinCapAdapter::new(
            &catalog_config(ProviderId::Coincap, None),
            Arc::new(FixtureHttpClient::respond(Err(HttpError::timeout("request timeout")))),
        );

        let error = block_on(adapter.coins(&CoinsQuery::default())).expect_err("must time out");
        assert_eq!(error.kind(), ProviderErrorKind::Timeout);
    }
}
