use std::sync::Arc;

use serde::Deserialize;

use super::{lenient_f64, lenient_u32, Upstream};
use crate::data_source::{CapabilitySet, CoinsQuery, MarketDataSource, ProviderError, SourceFuture};
use crate::http_client::{HttpAuth, HttpClient};
use crate::registry::ProviderConfig;
use crate::{
    finite_or_zero, CanonicalCoin, GlobalMarketSnapshot, ProviderId, TrendingCoin, TrendingList,
    UtcDateTime,
};

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// CoinGecko adapter. Serves every endpoint; a demo key is optional.
#[derive(Clone)]
pub struct CoinGeckoAdapter {
    upstream: Upstream,
}

impl CoinGeckoAdapter {
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
        let path = format!(
            "/coins/markets?vs_currency={}&order=market_cap_desc&per_page={}&page={}&sparkline=false&price_change_percentage=24h",
            urlencoding::encode(&query.currency),
            query.per_page,
            query.page
        );
        let markets: Vec<GeckoMarket> = self.upstream.get_json(&path).await?;
        Ok(markets.into_iter().map(GeckoMarket::into_canonical).collect())
    }

    async fn fetch_global(&self) -> Result<GlobalMarketSnapshot, ProviderError> {
        let response: GeckoGlobalResponse = self.upstream.get_json("/global").await?;
        Ok(response.data.into_canonical())
    }

    async fn fetch_trending(&self) -> Result<TrendingList, ProviderError> {
        let response: GeckoTrendingResponse = self.upstream.get_json("/search/trending").await?;
        let coins = response
            .coins
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.item.into_canonical(index))
            .collect();
        Ok(TrendingList { coins })
    }
}

impl MarketDataSource for CoinGeckoAdapter {
    fn id(&self) -> ProviderId {
        self.upstream.provider()
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn coins<'a>(&'a self, query: &'a CoinsQuery) -> SourceFuture<'a, Vec<CanonicalCoin>> {
        Box::pin(self.fetch_coins(query))
    }

    fn global(&self) -> SourceFuture<'_, GlobalMarketSnapshot> {
        Box::pin(self.fetch_global())
    }

    fn trending(&self) -> SourceFuture<'_, TrendingList> {
        Box::pin(self.fetch_trending())
    }
}

#[derive(Debug, Deserialize)]
struct GeckoMarket {
    id: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    market_cap_rank: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percentage_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_volume: Option<f64>,
}

impl GeckoMarket {
    fn into_canonical(self) -> CanonicalCoin {
        CanonicalCoin::new(self.id, self.symbol, self.name, self.current_price.unwrap_or(0.0))
            .with_market_cap(self.market_cap)
            .with_rank(self.market_cap_rank)
            .with_change_pct_24h(self.price_change_percentage_24h)
            .with_volume_24h(self.total_volume)
            .with_image_url(self.image)
    }
}

#[derive(Debug, Deserialize)]
struct GeckoGlobalResponse {
    data: GeckoGlobalData,
}

#[derive(Debug, Deserialize)]
struct GeckoGlobalData {
    #[serde(default)]
    active_cryptocurrencies: u64,
    #[serde(default)]
    markets: u64,
    #[serde(default)]
    total_market_cap: GeckoCurrencyMap,
    #[serde(default)]
    total_volume: GeckoCurrencyMap,
    #[serde(default)]
    market_cap_percentage: GeckoDominance,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap_change_percentage_24h_usd: Option<f64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct GeckoCurrencyMap {
    #[serde(default, deserialize_with = "lenient_f64")]
    usd: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct GeckoDominance {
    #[serde(default, deserialize_with = "lenient_f64")]
    btc: Option<f64>,
}

impl GeckoGlobalData {
    fn into_canonical(self) -> GlobalMarketSnapshot {
        let mut snapshot = GlobalMarketSnapshot::new(
            self.total_market_cap.usd.unwrap_or(0.0),
            self.total_volume.usd.unwrap_or(0.0),
        );
        snapshot.btc_dominance_pct = finite_or_zero(self.market_cap_percentage.btc.unwrap_or(0.0));
        snapshot.market_cap_change_pct_24h =
            finite_or_zero(self.market_cap_change_percentage_24h_usd.unwrap_or(0.0));
        snapshot.active_cryptocurrencies = self.active_cryptocurrencies;
        snapshot.markets = self.markets;
        if let Some(updated_at) = self.updated_at.and_then(UtcDateTime::from_unix_seconds) {
            snapshot.updated_at = updated_at;
        }
        snapshot
    }
}

#[derive(Debug, Deserialize)]
struct GeckoTrendingResponse {
    #[serde(default)]
    coins: Vec<GeckoTrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct GeckoTrendingEntry {
    item: GeckoTrendingItem,
}

#[derive(Debug, Deserialize)]
struct GeckoTrendingItem {
    id: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    small: Option<String>,
    #[serde(default)]
    thumb: Option<String>,
}

impl GeckoTrendingItem {
    fn into_canonical(self, index: usize) -> TrendingCoin {
        TrendingCoin {
            id: self.id,
            symbol: self.symbol.trim().to_ascii_uppercase(),
            name: self.name,
            market_cap_rank: self.market_cap_rank.unwrap_or(0),
            score: u32::try_from(index).unwrap_or(u32::MAX),
            image_url: self.small.or(self.thumb).filter(|url| !url.is_empty()),
        }
    }
}
