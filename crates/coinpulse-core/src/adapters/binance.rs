use std::cmp::Ordering;
use std::sync::Arc;

use serde::Deserialize;

use super::{lenient_f64, local_rank, Upstream};
use crate::data_source::{
    CapabilitySet, CoinsQuery, Endpoint, MarketDataSource, ProviderError, SourceFuture,
    DEFAULT_CURRENCY,
};
use crate::http_client::{HttpAuth, HttpClient};
use crate::registry::ProviderConfig;
use crate::{CanonicalCoin, GlobalMarketSnapshot, ProviderId, TrendingList};

/// Binance spot ticker adapter.
///
/// Binance lists trading pairs, not coins: pairs are filtered to the quote
/// asset matching the requested currency (`usd` maps to `USDT`), ordered by
/// 24h quote volume and paged locally. Market cap is not available.
#[derive(Clone)]
pub struct BinanceAdapter {
    upstream: Upstream,
}

impl BinanceAdapter {
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
        let quote_asset = quote_asset(&query.currency);
        let tickers: Vec<BinanceTicker> = self.upstream.get_json("/ticker/24hr").await?;

        let mut pairs = tickers
            .into_iter()
            .filter_map(|ticker| {
                let base = ticker.symbol.strip_suffix(quote_asset.as_str())?.to_owned();
                (!base.is_empty()).then(|| (base, ticker))
            })
            .collect::<Vec<_>>();
        pairs.sort_by(|(_, left), (_, right)| {
            let left = left.quote_volume.unwrap_or(0.0);
            let right = right.quote_volume.unwrap_or(0.0);
            right.partial_cmp(&left).unwrap_or(Ordering::Equal)
        });

        let offset = query.offset();
        Ok(pairs
            .into_iter()
            .skip(offset as usize)
            .take(query.per_page as usize)
            .enumerate()
            .map(|(index, (base, ticker))| {
                CanonicalCoin::new(base.to_ascii_lowercase(), &base, base.clone(), ticker.last_price.unwrap_or(0.0))
                    .with_rank(Some(local_rank(offset, index)))
                    .with_change_pct_24h(ticker.price_change_percent)
                    .with_volume_24h(ticker.quote_volume)
            })
            .collect())
    }
}

impl MarketDataSource for BinanceAdapter {
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

/// Pair suffix for a canonical currency code.
fn quote_asset(currency: &str) -> String {
    if currency == DEFAULT_CURRENCY {
        String::from("USDT")
    } else {
        currency.to_ascii_uppercase()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    symbol: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    quote_volume: Option<f64>,
}
