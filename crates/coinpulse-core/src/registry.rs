//! Static catalog of provider configurations.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Debug, Formatter};

use tracing::warn;

use crate::health::HealthTracker;
use crate::{ProviderId, ValidationError};

/// API key or token. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value.trim().to_owned()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Immutable per-provider configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub base_url: String,
    pub credential: Option<Credential>,
    pub rate_limit_per_minute: u32,
    /// Lower is tried first. Always >= 1.
    pub priority: u32,
    pub enabled: bool,
}

impl ProviderConfig {
    pub fn new(
        id: ProviderId,
        base_url: impl Into<String>,
        priority: u32,
    ) -> Result<Self, ValidationError> {
        if priority == 0 {
            return Err(ValidationError::InvalidPriority {
                provider: id.as_str().to_owned(),
            });
        }

        Ok(Self {
            id,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            credential: None,
            rate_limit_per_minute: 60,
            priority,
            enabled: true,
        })
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Keys for providers that accept or require one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub coingecko: Option<Credential>,
    pub coinmarketcap: Option<Credential>,
    pub coincap: Option<Credential>,
    pub cryptocompare: Option<Credential>,
}

/// Ordered provider catalog.
///
/// Registration order is preserved; equal priorities keep it because the
/// priority sort is stable.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    configs: Vec<ProviderConfig>,
}

impl SourceRegistry {
    pub fn new(configs: Vec<ProviderConfig>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(configs.len());
        for config in configs {
            if seen.insert(config.id) {
                unique.push(config);
            } else {
                warn!(provider = %config.id, "duplicate provider registration ignored");
            }
        }

        let registry = Self { configs: unique };
        for (priority, providers) in registry.shared_priorities() {
            warn!(
                priority,
                providers = ?providers,
                "providers share a priority; registration order decides"
            );
        }
        registry
    }

    /// The built-in six-provider table.
    ///
    /// CoinMarketCap has no keyless tier and is disabled without a credential.
    pub fn default_catalog(credentials: ProviderCredentials) -> Self {
        let has_cmc_key = credentials.coinmarketcap.is_some();
        let entries = [
            (ProviderId::Coingecko, "https://api.coingecko.com/api/v3", 1, 30, credentials.coingecko, true),
            (ProviderId::Coinmarketcap, "https://pro-api.coinmarketcap.com/v1", 2, 30, credentials.coinmarketcap, has_cmc_key),
            (ProviderId::Coincap, "https://api.coincap.io/v2", 3, 200, credentials.coincap, true),
            (ProviderId::Coinpaprika, "https://api.coinpaprika.com/v1", 4, 25, None, true),
            (ProviderId::Cryptocompare, "https://min-api.cryptocompare.com/data", 5, 50, credentials.cryptocompare, true),
            (ProviderId::Binance, "https://api.binance.com/api/v3", 6, 1_200, None, true),
        ];

        let configs = entries
            .into_iter()
            .filter_map(|(id, base_url, priority, rate, credential, enabled)| {
                ProviderConfig::new(id, base_url, priority).ok().map(|config| {
                    config
                        .with_credential(credential)
                        .with_rate_limit(rate)
                        .with_enabled(enabled)
                })
            })
            .collect();
        Self::new(configs)
    }

    /// Returns a copy of this registry with the listed providers disabled.
    pub fn with_disabled(mut self, disabled: &[ProviderId]) -> Self {
        for config in &mut self.configs {
            if disabled.contains(&config.id) {
                config.enabled = false;
            }
        }
        self
    }

    pub fn configs(&self) -> &[ProviderConfig] {
        &self.configs
    }

    pub fn get(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.configs.iter().find(|config| config.id == id)
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        self.configs.iter().map(|config| config.id).collect()
    }

    /// Enabled providers in ascending priority, regardless of health.
    pub fn sorted_enabled(&self) -> Vec<ProviderConfig> {
        let mut enabled = self
            .configs
            .iter()
            .filter(|config| config.enabled)
            .cloned()
            .collect::<Vec<_>>();
        enabled.sort_by_key(|config| config.priority);
        enabled
    }

    /// Enabled providers the health tracker currently admits, in ascending
    /// priority. Empty when nothing qualifies.
    pub fn sorted_enabled_healthy(&self, health: &HealthTracker) -> Vec<ProviderConfig> {
        self.sorted_enabled()
            .into_iter()
            .filter(|config| health.is_available(config.id))
            .collect()
    }

    /// Priorities configured for more than one provider.
    pub fn shared_priorities(&self) -> Vec<(u32, Vec<ProviderId>)> {
        let mut by_priority: BTreeMap<u32, Vec<ProviderId>> = BTreeMap::new();
        for config in &self.configs {
            by_priority.entry(config.priority).or_default().push(config.id);
        }
        by_priority
            .into_iter()
            .filter(|(_, providers)| providers.len() > 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: ProviderId, priority: u32) -> ProviderConfig {
        ProviderConfig::new(id, "https://example.test/", priority).expect("valid config")
    }

    #[test]
    fn sorts_by_priority_and_keeps_registration_order_on_ties() {
        let registry = SourceRegistry::new(vec![
            config(ProviderId::Binance, 3),
            config(ProviderId::Coincap, 1),
            config(ProviderId::Coinpaprika, 3),
            config(ProviderId::Coingecko, 2),
        ]);

        let order = registry
            .sorted_enabled()
            .into_iter()
            .map(|config| config.id)
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                ProviderId::Coincap,
                ProviderId::Coingecko,
                ProviderId::Binance,
                ProviderId::Coinpaprika
            ]
        );
        assert_eq!(
            registry.shared_priorities(),
            vec![(3, vec![ProviderId::Binance, ProviderId::Coinpaprika])]
        );
    }

    #[test]
    fn filters_disabled_and_unhealthy_providers() {
        let registry = SourceRegistry::new(vec![
            config(ProviderId::Coingecko, 1),
            config(ProviderId::Coincap, 2).with_enabled(false),
            config(ProviderId::Binance, 3),
        ]);
        let health = HealthTracker::new(registry.ids(), None);
        health.record_failure(ProviderId::Coingecko, "boom");

        let chain = registry.sorted_enabled_healthy(&health);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].id, ProviderId::Binance);
    }

    #[test]
    fn empty_when_no_provider_qualifies() {
        let registry = SourceRegistry::new(vec![config(ProviderId::Coingecko, 1).with_enabled(false)]);
        let health = HealthTracker::new(registry.ids(), None);
        assert!(registry.sorted_enabled_healthy(&health).is_empty());
    }

    #[test]
    fn default_catalog_disables_coinmarketcap_without_key() {
        let registry = SourceRegistry::default_catalog(ProviderCredentials::default());

        assert_eq!(registry.configs().len(), 6);
        let cmc = registry.get(ProviderId::Coinmarketcap).expect("registered");
        assert!(!cmc.enabled);
        assert!(registry.shared_priorities().is_empty());
        assert_eq!(registry.sorted_enabled()[0].id, ProviderId::Coingecko);
    }

    #[test]
    fn rejects_zero_priority_and_duplicate_ids() {
        assert!(ProviderConfig::new(ProviderId::Binance, "https://x.test", 0).is_err());

        let registry = SourceRegistry::new(vec![
            config(ProviderId::Binance, 1),
            config(ProviderId::Binance, 2),
        ]);
        assert_eq!(registry.configs().len(), 1);
        assert_eq!(registry.configs()[0].priority, 1);
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new(" key-123 ").expect("non-empty");
        assert_eq!(credential.expose(), "key-123");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert!(Credential::new("   ").is_none());
    }
}
