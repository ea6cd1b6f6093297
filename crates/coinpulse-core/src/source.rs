use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in configuration, health records and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Coingecko,
    Coinmarketcap,
    Coincap,
    Coinpaprika,
    Cryptocompare,
    Binance,
}

impl ProviderId {
    pub const ALL: [Self; 6] = [
        Self::Coingecko,
        Self::Coinmarketcap,
        Self::Coincap,
        Self::Coinpaprika,
        Self::Cryptocompare,
        Self::Binance,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coingecko => "coingecko",
            Self::Coinmarketcap => "coinmarketcap",
            Self::Coincap => "coincap",
            Self::Coinpaprika => "coinpaprika",
            Self::Cryptocompare => "cryptocompare",
            Self::Binance => "binance",
        }
    }

    /// Human-readable name used in operator-facing recommendations.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Coingecko => "CoinGecko",
            Self::Coinmarketcap => "CoinMarketCap",
            Self::Coincap => "CoinCap",
            Self::Coinpaprika => "CoinPaprika",
            Self::Cryptocompare => "CryptoCompare",
            Self::Binance => "Binance",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "coingecko" => Ok(Self::Coingecko),
            "coinmarketcap" | "cmc" => Ok(Self::Coinmarketcap),
            "coincap" => Ok(Self::Coincap),
            "coinpaprika" => Ok(Self::Coinpaprika),
            "cryptocompare" => Ok(Self::Cryptocompare),
            "binance" => Ok(Self::Binance),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}
