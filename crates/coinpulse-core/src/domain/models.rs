use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// Normalized market entry returned by every provider's coin listing.
///
/// The shape is always complete: a provider that lacks a field fills in the
/// documented default (`0` or `None`) instead of dropping the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub market_cap_rank: u32,
    pub price_change_pct_24h: f64,
    pub total_volume_24h: f64,
    pub image_url: Option<String>,
}

impl CanonicalCoin {
    /// Builds an entry with every optional metric at its default.
    pub fn new(
        id: impl Into<String>,
        symbol: impl AsRef<str>,
        name: impl Into<String>,
        current_price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.as_ref().trim().to_ascii_uppercase(),
            name: name.into(),
            current_price: finite_or_zero(current_price),
            market_cap: 0.0,
            market_cap_rank: 0,
            price_change_pct_24h: 0.0,
            total_volume_24h: 0.0,
            image_url: None,
        }
    }

    pub fn with_market_cap(mut self, market_cap: Option<f64>) -> Self {
        self.market_cap = market_cap.map_or(0.0, finite_or_zero);
        self
    }

    pub fn with_rank(mut self, rank: Option<u32>) -> Self {
        self.market_cap_rank = rank.unwrap_or(0);
        self
    }

    pub fn with_change_pct_24h(mut self, change: Option<f64>) -> Self {
        self.price_change_pct_24h = change.map_or(0.0, finite_or_zero);
        self
    }

    pub fn with_volume_24h(mut self, volume: Option<f64>) -> Self {
        self.total_volume_24h = volume.map_or(0.0, finite_or_zero);
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|url| !url.trim().is_empty());
        self
    }
}

/// Whole-market aggregate figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMarketSnapshot {
    pub total_market_cap_usd: f64,
    pub total_volume_24h_usd: f64,
    pub btc_dominance_pct: f64,
    pub market_cap_change_pct_24h: f64,
    pub active_cryptocurrencies: u64,
    pub markets: u64,
    pub updated_at: UtcDateTime,
}

impl GlobalMarketSnapshot {
    pub fn new(total_market_cap_usd: f64, total_volume_24h_usd: f64) -> Self {
        Self {
            total_market_cap_usd: finite_or_zero(total_market_cap_usd),
            total_volume_24h_usd: finite_or_zero(total_volume_24h_usd),
            btc_dominance_pct: 0.0,
            market_cap_change_pct_24h: 0.0,
            active_cryptocurrencies: 0,
            markets: 0,
            updated_at: UtcDateTime::now(),
        }
    }

    /// A snapshot with no market cap carries no information worth caching.
    pub fn is_empty(&self) -> bool {
        self.total_market_cap_usd <= 0.0
    }
}

/// One entry of a provider's trending list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub market_cap_rank: u32,
    /// Zero-based position in the provider's list.
    pub score: u32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingList {
    pub coins: Vec<TrendingCoin>,
}

/// Canonical result of any aggregator query, as held by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CanonicalPayload {
    Coins(Vec<CanonicalCoin>),
    Global(GlobalMarketSnapshot),
    Trending(TrendingList),
}

impl CanonicalPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Coins(coins) => coins.is_empty(),
            Self::Global(snapshot) => snapshot.is_empty(),
            Self::Trending(list) => list.coins.is_empty(),
        }
    }
}

impl From<Vec<CanonicalCoin>> for CanonicalPayload {
    fn from(value: Vec<CanonicalCoin>) -> Self {
        Self::Coins(value)
    }
}

impl From<GlobalMarketSnapshot> for CanonicalPayload {
    fn from(value: GlobalMarketSnapshot) -> Self {
        Self::Global(value)
    }
}

impl From<TrendingList> for CanonicalPayload {
    fn from(value: TrendingList) -> Self {
        Self::Trending(value)
    }
}

impl TryFrom<CanonicalPayload> for Vec<CanonicalCoin> {
    type Error = CanonicalPayload;

    fn try_from(value: CanonicalPayload) -> Result<Self, Self::Error> {
        match value {
            CanonicalPayload::Coins(coins) => Ok(coins),
            other => Err(other),
        }
    }
}

impl TryFrom<CanonicalPayload> for GlobalMarketSnapshot {
    type Error = CanonicalPayload;

    fn try_from(value: CanonicalPayload) -> Result<Self, Self::Error> {
        match value {
            CanonicalPayload::Global(snapshot) => Ok(snapshot),
            other => Err(other),
        }
    }
}

impl TryFrom<CanonicalPayload> for TrendingList {
    type Error = CanonicalPayload;

    fn try_from(value: CanonicalPayload) -> Result<Self, Self::Error> {
        match value {
            CanonicalPayload::Trending(list) => Ok(list),
            other => Err(other),
        }
    }
}

/// Replaces NaN and infinities from loosely-typed provider payloads with `0`.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
