//! Environment-driven service configuration.
//!
//! | Setting | Primary Env Var | Fallback Env Var | Default |
//! |---------|-----------------|------------------|---------|
//! | CoinGecko key | `COINPULSE_COINGECKO_API_KEY` | `COINGECKO_API_KEY` | none |
//! | CoinMarketCap key | `COINPULSE_CMC_API_KEY` | `CMC_API_KEY` | none (provider disabled) |
//! | CoinCap key | `COINPULSE_COINCAP_API_KEY` | `COINCAP_API_KEY` | none |
//! | CryptoCompare key | `COINPULSE_CRYPTOCOMPARE_API_KEY` | `CRYPTOCOMPARE_API_KEY` | none |
//! | Cache TTL (s) | `COINPULSE_CACHE_TTL_SECS` | - | 60 |
//! | Provider timeout (ms) | `COINPULSE_PROVIDER_TIMEOUT_MS` | - | 8000 |
//! | Re-probe interval (s) | `COINPULSE_REPROBE_SECS` | - | unset |
//! | Disabled providers | `COINPULSE_DISABLED_SOURCES` | - | none |
//! | Web bind address | `COINPULSE_BIND` | - | `127.0.0.1:8080` |

use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::http_client::DEFAULT_TIMEOUT_MS;
use crate::registry::{Credential, ProviderCredentials};
use crate::{ConfigError, ProviderId};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub credentials: ProviderCredentials,
    pub cache_ttl: Duration,
    pub provider_timeout: Duration,
    pub reprobe_interval: Option<Duration>,
    pub disabled_sources: Vec<ProviderId>,
    pub bind: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            credentials: ProviderCredentials::default(),
            cache_ttl: DEFAULT_TTL,
            provider_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            reprobe_interval: None,
            disabled_sources: Vec::new(),
            bind: String::from(DEFAULT_BIND),
        }
    }
}

impl ServiceConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |primary: &str, fallback: &str| {
            lookup(primary)
                .or_else(|| lookup(fallback))
                .and_then(Credential::new)
        };

        let credentials = ProviderCredentials {
            coingecko: key("COINPULSE_COINGECKO_API_KEY", "COINGECKO_API_KEY"),
            coinmarketcap: key("COINPULSE_CMC_API_KEY", "CMC_API_KEY"),
            coincap: key("COINPULSE_COINCAP_API_KEY", "COINCAP_API_KEY"),
            cryptocompare: key("COINPULSE_CRYPTOCOMPARE_API_KEY", "CRYPTOCOMPARE_API_KEY"),
        };

        let defaults = Self::default();
        let cache_ttl = parse_number(&lookup, "COINPULSE_CACHE_TTL_SECS")?
            .map_or(defaults.cache_ttl, Duration::from_secs);
        let provider_timeout = parse_number(&lookup, "COINPULSE_PROVIDER_TIMEOUT_MS")?
            .map_or(defaults.provider_timeout, Duration::from_millis);
        let reprobe_interval =
            parse_number(&lookup, "COINPULSE_REPROBE_SECS")?.map(Duration::from_secs);

        let disabled_sources = lookup("COINPULSE_DISABLED_SOURCES")
            .map(|value| parse_sources(&value))
            .transpose()?
            .unwrap_or_default();

        let bind = lookup("COINPULSE_BIND")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.bind);

        Ok(Self {
            credentials,
            cache_ttl,
            provider_timeout,
            reprobe_interval,
            disabled_sources,
            bind,
        })
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_reprobe_interval(mut self, interval: Option<Duration>) -> Self {
        self.reprobe_interval = interval;
        self
    }
}

fn parse_number<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { name, value: raw })
}

/// Parses a comma-separated provider list such as `binance, cmc`.
pub fn parse_sources(value: &str) -> Result<Vec<ProviderId>, ConfigError> {
    let mut sources = Vec::new();
    for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let provider = item.parse::<ProviderId>()?;
        if !sources.contains(&provider) {
            sources.push(provider);
        }
    }
    Ok(sources)
}
