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

const LOGO_BASE_URL: &str = "https://static.coinpaprika.com/coin";

/// CoinPaprika adapter. The free API returns the whole ticker list, so paging
/// happens locally after sorting by rank.
#[derive(Clone)]
pub struct CoinPaprikaAdapter {
    upstream: Upstream,
}

impl CoinPaprikaAdapter {
    pub fn new(config: &ProviderConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            upstream: Upstream::new(config, HttpAuth::None, http_client),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.upstream.set_timeout_ms(timeout_ms);
        self
    }

    async fn fetch_coins(&self, query: &CoinsQuery) -> Result<Vec<CanonicalCoin>, ProviderError> {
        let quote = query.currency.to_ascii_uppercase();
        let path = format!("/tickers?quotes={}", urlencoding::encode(&quote));
        let mut tickers: Vec<PaprikaTicker> = self.upstream.get_json(&path).await?;

        // Unranked entries (rank 0 or missing) go last.
        tickers.sort_by_key(|ticker| ticker.rank.filter(|rank| *rank > 0).unwrap_or(u32::MAX));

        Ok(tickers
            .into_iter()
            .filter(|ticker| ticker.quotes.contains_key(&quote))
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .map(|ticker| ticker.into_canonical(&quote))
            .collect())
    }

    async fn fetch_global(&self) -> Result<GlobalMarketSnapshot, ProviderError> {
        let global: PaprikaGlobal = self.upstream.get_json("/global").await?;
        Ok(global.into_canonical())
    }
}

impl MarketDataSource for CoinPaprikaAdapter {
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
struct PaprikaTicker {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbol: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    rank: Option<u32>,
    #[serde(default)]
    quotes: HashMap<String, PaprikaQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct PaprikaQuote {
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    percent_change_24h: Option<f64>,
}

impl PaprikaTicker {
    fn into_canonical(mut self, quote: &str) -> CanonicalCoin {
        let quote = self.quotes.remove(quote).unwrap_or_default();
        let image_url = Some(format!("{LOGO_BASE_URL}/{}/logo.png", self.id));
        CanonicalCoin::new(self.id, self.symbol, self.name, quote.price.unwrap_or(0.0))
            .with_market_cap(quote.market_cap)
            .with_rank(self.rank)
            .with_change_pct_24h(quote.percent_change_24h)
            .with_volume_24h(quote.volume_24h)
            .with_image_url(image_url)
    }
}

#[derive(Debug, Deserialize)]
struct PaprikaGlobal {
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume_24h_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    bitcoin_dominance_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap_change_24h: Option<f64>,
    #[serde(default)]
    cryptocurrencies_number: u64,
    #[serde(default)]
    last_updated: Option<i64>,
}

impl PaprikaGlobal {
    fn into_canonical(self) -> GlobalMarketSnapshot {
        let mut snapshot = GlobalMarketSnapshot::new(
            self.market_cap_usd.unwrap_or(0.0),
            self.volume_24h_usd.unwrap_or(0.0),
        );
        snapshot.btc_dominance_pct = finite_or_zero(self.bitcoin_dominance_percentage.unwrap_or(0.0));
        snapshot.market_cap_change_pct_24h = finite_or_zero(self.market_cap_change_24h.unwrap_or(0.0));
        snapshot.active_cryptocurrencies = self.cryptocurrencies_number;
        if let Some(updated_at) = self.last_updated.and_then(UtcDateTime::from_unix_seconds) {
            snapshot.updated_at = updated_at;
        }
        snapshot
    }
}
