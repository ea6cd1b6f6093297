use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::registry::SourceRegistry;
use crate::ProviderId;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Local per-provider request budgets derived from `rate_limit_per_minute`.
///
/// A denied acquisition means the aggregator skips the provider for this
/// query. Skipping is not a failure and leaves the provider's health alone.
#[derive(Clone, Default)]
pub struct ProviderThrottle {
    limiters: HashMap<ProviderId, Arc<DirectRateLimiter>>,
}

impl ProviderThrottle {
    /// Budgets for every registered provider. A rate of `0` leaves the provider unthrottled.
    pub fn from_registry(registry: &SourceRegistry) -> Self {
        Self::from_limits(
            registry
                .configs()
                .iter()
                .map(|config| (config.id, config.rate_limit_per_minute)),
        )
    }

    pub fn from_limits(limits: impl IntoIterator<Item = (ProviderId, u32)>) -> Self {
        let limiters = limits
            .into_iter()
            .filter_map(|(provider, per_minute)| {
                let per_minute = NonZeroU32::new(per_minute)?;
                Some((
                    provider,
                    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
                ))
            })
            .collect();
        Self { limiters }
    }

    /// No budgets at all; every acquisition succeeds.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Takes one request from the provider's budget.
    pub fn try_acquire(&self, provider: ProviderId) -> bool {
        self.limiters
            .get(&provider)
            .map_or(true, |limiter| limiter.check().is_ok())
    }
}

impl std::fmt::Debug for ProviderThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderThrottle")
            .field("providers", &self.limiters.keys().collect::<Vec<_>>())
            .finish()
    }
}
