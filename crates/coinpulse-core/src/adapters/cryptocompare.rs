use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use super::{lenient_f64, local_rank, Upstream};
use crate::data_source::{
    CapabilitySet, CoinsQuery, Endpoint, MarketDataSource, ProviderError, ProviderErrorKind,
    SourceFuture,
};
use crate::http_client::{HttpAuth, HttpClient};
use crate::registry::ProviderConfig;
use crate::{CanonicalCoin, GlobalMarketSnapshot, ProviderId, TrendingList};

const IMAGE_BASE_URL: &str = "https://www.cryptocompare.com";

/// CryptoCompare adapter over the top-by-market-cap endpoint.
#[derive(Clone)]
pub struct CryptoCompareAdapter {
    upstream: Upstream,
}

impl CryptoCompareAdapter {
    pub fn new(config: &ProviderConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let auth = config
            .credential
            .as_ref()
            .map_or(HttpAuth::None, |key| HttpAuth::query_param("api_key", key.expose()));
        Self {
            upstream: Upstream::new(config, auth, http_client),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.upstream.set_timeout_ms(timeout_ms);
        self
    }

    async fn fetch_coins(&self, query: &CoinsQuery) -> Result<Vec<CanonicalCoin>, ProviderError> {
        let tsym = query.currency.to_ascii_uppercase();
        let path = format!(
            "/top/mktcapfull?limit={}&page={}&tsym={}",
            query.per_page,
            query.page - 1,
            urlencoding::encode(&tsym)
        );
        let response: CompareTopResponse = self.upstream.get_json(&path).await?;

        // Errors arrive as 200 with an error envelope.
        if response.response.as_deref() == Some("Error") {
            let message = response.message.unwrap_or_default();
            let kind = if message.to_ascii_lowercase().contains("rate limit") {
                ProviderErrorKind::RateLimited
            } else {
                ProviderErrorKind::Decode
            };
            return Err(ProviderError::new(
                self.id(),
                kind,
                format!("upstream error: {message}"),
            ));
        }

        let offset = query.offset();
        Ok(response
            .data
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_canonical(&tsym, local_rank(offset, index)))
            .collect())
    }
}

impl MarketDataSource for CryptoCompareAdapter {
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
struct CompareTopResponse {
    #[serde(rename = "Response", default)]
    response: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Data", default)]
    data: Vec<CompareEntry>,
}

#[derive(Debug, Deserialize)]
struct CompareEntry {
    #[serde(rename = "CoinInfo")]
    coin_info: CompareCoinInfo,
    #[serde(rename = "RAW", default)]
    raw: HashMap<String, CompareRawQuote>,
}

#[derive(Debug, Deserialize)]
struct CompareCoinInfo {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "FullName", default)]
    full_name: Option<String>,
    #[serde(rename = "ImageUrl", default)]
    image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CompareRawQuote {
    #[serde(rename = "PRICE", default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(rename = "MKTCAP", default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(rename = "CHANGEPCT24HOUR", default, deserialize_with = "lenient_f64")]
    change_pct_24h: Option<f64>,
    #[serde(rename = "TOTALVOLUME24HTO", default, deserialize_with = "lenient_f64")]
    total_volume_24h: Option<f64>,
}

impl CompareEntry {
    fn into_canonical(mut self, tsym: &str, rank: u32) -> CanonicalCoin {
        let quote = self.raw.remove(tsym).unwrap_or_default();
        let info = self.coin_info;
        let image_url = info
            .image_url
            .filter(|path| !path.is_empty())
            .map(|path| format!("{IMAGE_BASE_URL}{path}"));
        let name = info.full_name.unwrap_or_else(|| info.name.clone());
        CanonicalCoin::new(info.name.to_ascii_lowercase(), &info.name, name, quote.price.unwrap_or(0.0))
            .with_market_cap(quote.market_cap)
            .with_rank(Some(rank))
            .with_change_pct_24h(quote.change_pct_24h)
            .with_volume_24h(quote.total_volume_24h)
            .with_image_url(image_url)
    }
}
