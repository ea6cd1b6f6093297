//! Priority fail-over across providers with a TTL cache and stale fallback.
//!
//! Every query follows the same path:
//!
//! 1. a fresh cache hit is returned without any network call;
//! 2. otherwise enabled providers the health tracker admits are tried in
//!    ascending priority, each call bounded by the provider timeout;
//! 3. the first non-empty result is cached and returned;
//! 4. if every provider failed, the last cached result is served as stale,
//!    or the query fails with [`AggregatorError::AllSourcesExhausted`].
//!
//! Skipped providers (endpoint unsupported, local rate budget spent) are
//! recorded as attempts but never change provider health. An adapter that
//! panics is recorded as a failed attempt and the chain moves on.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::build_source;
use crate::cache::{CacheStore, DEFAULT_TTL};
use crate::config::ServiceConfig;
use crate::data_source::{
    CoinsQuery, Endpoint, MarketDataSource, ProviderError, ProviderErrorKind, SourceFuture,
};
use crate::health::{HealthTracker, ProviderHealth};
use crate::http_client::{HttpClient, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::registry::{ProviderCredentials, SourceRegistry};
use crate::report::HealthReport;
use crate::throttling::ProviderThrottle;
use crate::{
    CanonicalCoin, CanonicalPayload, GlobalMarketSnapshot, ProviderId, TrendingList,
    ValidationError,
};

pub const GLOBAL_MARKET_CACHE_KEY: &str = "global_market";
pub const TRENDING_CACHE_KEY: &str = "trending";

/// Where the returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched from a provider during this query.
    Fresh,
    /// Served from a cache entry younger than the TTL.
    Cached,
    /// Every provider failed; served from an expired cache entry.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    Empty,
    Throttled,
    Unsupported,
}

impl AttemptOutcome {
    /// Whether this outcome changed the provider's health.
    pub const fn affects_health(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Empty)
    }
}

/// One provider considered while answering a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttempt {
    pub provider: ProviderId,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub latency_ms: u64,
}

impl SourceAttempt {
    fn new(provider: ProviderId, outcome: AttemptOutcome, message: Option<String>, started: Instant) -> Self {
        Self {
            provider,
            outcome,
            message,
            latency_ms: elapsed_ms(started),
        }
    }
}

/// Result of a successful query, fresh or degraded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome<T> {
    pub data: T,
    pub freshness: Freshness,
    /// Provider that produced `data` during this query. `None` for cache hits
    /// and stale fallbacks.
    pub source: Option<ProviderId>,
    pub attempts: Vec<SourceAttempt>,
    pub latency_ms: u64,
    /// Age of the cache entry when `freshness` is [`Freshness::Stale`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_age_ms: Option<u64>,
}

impl<T> QueryOutcome<T> {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    pub fn is_cached(&self) -> bool {
        self.freshness == Freshness::Cached
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    #[error("all sources failed for {endpoint} and no cached result exists")]
    AllSourcesExhausted {
        endpoint: Endpoint,
        attempts: Vec<SourceAttempt>,
    },
    #[error("{endpoint} query was cancelled")]
    Cancelled { endpoint: Endpoint },
    #[error(transparent)]
    InvalidRequest(#[from] ValidationError),
}

impl AggregatorError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AllSourcesExhausted { .. } => "aggregator.all_sources_exhausted",
            Self::Cancelled { .. } => "aggregator.cancelled",
            Self::InvalidRequest(_) => "aggregator.invalid_request",
        }
    }

    pub fn attempts(&self) -> &[SourceAttempt] {
        match self {
            Self::AllSourcesExhausted { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

/// Service facade shared by the CLI and web front ends.
///
/// One instance owns the registry, the adapters, and the health, cache and
/// throttle state; wrap it in an `Arc` to share it between concurrent queries.
pub struct AggregatorService {
    registry: SourceRegistry,
    sources: HashMap<ProviderId, Arc<dyn MarketDataSource>>,
    health: HealthTracker,
    cache: CacheStore,
    throttle: ProviderThrottle,
    provider_timeout: Duration,
}

impl AggregatorService {
    pub fn builder() -> AggregatorServiceBuilder {
        AggregatorServiceBuilder::default()
    }

    /// Production service for `config`, using the reqwest transport.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::builder().config(config).build()
    }

    #[instrument(
        name = "list_coins",
        skip(self, query, cancel),
        fields(cache_key = %query.cache_key())
    )]
    pub async fn list_coins(
        &self,
        query: &CoinsQuery,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<Vec<CanonicalCoin>>, AggregatorError> {
        self.route(Endpoint::Coins, &query.cache_key(), cancel, |source| {
            source.coins(query)
        })
        .await
    }

    #[instrument(name = "global_market", skip(self, cancel), fields(cache_key = GLOBAL_MARKET_CACHE_KEY))]
    pub async fn global_market(
        &self,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<GlobalMarketSnapshot>, AggregatorError> {
        self.route(Endpoint::Global, GLOBAL_MARKET_CACHE_KEY, cancel, |source| {
            source.global()
        })
        .await
    }

    #[instrument(name = "trending", skip(self, cancel), fields(cache_key = TRENDING_CACHE_KEY))]
    pub async fn trending(
        &self,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<TrendingList>, AggregatorError> {
        self.route(Endpoint::Trending, TRENDING_CACHE_KEY, cancel, |source| {
            source.trending()
        })
        .await
    }

    pub fn health_report(&self) -> HealthReport {
        HealthReport::build(&self.registry, &self.health)
    }

    pub fn health_snapshot(&self) -> Vec<ProviderHealth> {
        self.health.snapshot()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub const fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    async fn route<'s, T, F>(
        &'s self,
        endpoint: Endpoint,
        cache_key: &str,
        cancel: &CancellationToken,
        invoke: F,
    ) -> Result<QueryOutcome<T>, AggregatorError>
    where
        T: Clone + Into<CanonicalPayload> + TryFrom<CanonicalPayload>,
        F: Fn(&'s dyn MarketDataSource) -> SourceFuture<'s, T>,
    {
        let started = Instant::now();

        if let Some(data) = self.cached::<T>(cache_key, false) {
            debug!(cache_key, "fresh cache hit");
            return Ok(QueryOutcome {
                data,
                freshness: Freshness::Cached,
                source: None,
                attempts: Vec::new(),
                latency_ms: elapsed_ms(started),
                stale_age_ms: None,
            });
        }

        let chain = self.registry.sorted_enabled_healthy(&self.health);
        let mut attempts = Vec::with_capacity(chain.len());

        for config in chain {
            if cancel.is_cancelled() {
                return Err(AggregatorError::Cancelled { endpoint });
            }

            let provider = config.id;
            let attempt_started = Instant::now();
            let Some(source) = self.sources.get(&provider) else {
                debug!(%provider, "no adapter registered; skipping");
                continue;
            };

            if !source.capabilities().supports(endpoint) {
                debug!(%provider, %endpoint, "endpoint not supported; skipping");
                attempts.push(SourceAttempt::new(provider, AttemptOutcome::Unsupported, None, attempt_started));
                continue;
            }

            if !self.throttle.try_acquire(provider) {
                warn!(%provider, %endpoint, "local rate budget exhausted; skipping");
                attempts.push(SourceAttempt::new(
                    provider,
                    AttemptOutcome::Throttled,
                    Some(format!("{} request budget per minute spent", config.rate_limit_per_minute)),
                    attempt_started,
                ));
                continue;
            }

            debug!(%provider, %endpoint, "attempting provider");
            let source = source.as_ref();
            let invoke = &invoke;
            // Panics raised while building or polling the adapter future surface here.
            let guarded = AssertUnwindSafe(async move { invoke(source).await }).catch_unwind();
            let call = tokio::time::timeout(self.provider_timeout, guarded);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(%provider, %endpoint, "query cancelled during provider call");
                    return Err(AggregatorError::Cancelled { endpoint });
                }
                result = call => match result {
                    Ok(Ok(result)) => result,
                    Ok(Err(payload)) => {
                        error!(%provider, %endpoint, "adapter panicked");
                        Err(ProviderError::panicked(provider, payload.as_ref()))
                    }
                    Err(_) => Err(ProviderError::timeout(provider, self.provider_timeout.as_millis())),
                },
            };

            match result {
                Ok(data) => {
                    let payload: CanonicalPayload = data.clone().into();
                    if payload.is_empty() {
                        let reason = ProviderError::empty(provider, endpoint).to_string();
                        warn!(%provider, %endpoint, "provider returned an empty result");
                        self.health.record_failure(provider, &reason);
                        attempts.push(SourceAttempt::new(provider, AttemptOutcome::Empty, Some(reason), attempt_started));
                        continue;
                    }

                    self.health.record_success(provider);
                    self.cache.set(cache_key, payload);
                    attempts.push(SourceAttempt::new(provider, AttemptOutcome::Succeeded, None, attempt_started));

                    let failed_before = attempts
                        .iter()
                        .filter(|attempt| attempt.outcome != AttemptOutcome::Succeeded)
                        .count();
                    if failed_before > 0 {
                        info!(%provider, %endpoint, skipped_or_failed = failed_before, "served after fail-over");
                    } else {
                        debug!(%provider, %endpoint, "served by primary source");
                    }

                    return Ok(QueryOutcome {
                        data,
                        freshness: Freshness::Fresh,
                        source: Some(provider),
                        attempts,
                        latency_ms: elapsed_ms(started),
                        stale_age_ms: None,
                    });
                }
                Err(error) if error.kind() == ProviderErrorKind::Unsupported => {
                    debug!(%provider, %endpoint, cause = error.cause(), "provider declined the request");
                    attempts.push(SourceAttempt::new(
                        provider,
                        AttemptOutcome::Unsupported,
                        Some(error.to_string()),
                        attempt_started,
                    ));
                }
                Err(error) => {
                    let reason = error.to_string();
                    warn!(%provider, %endpoint, error = %reason, "provider call failed");
                    self.health.record_failure(provider, &reason);
                    attempts.push(SourceAttempt::new(provider, AttemptOutcome::Failed, Some(reason), attempt_started));
                }
            }
        }

        if let Some(data) = self.cached::<T>(cache_key, true) {
            let stale_age_ms = self
                .cache
                .age(cache_key)
                .map(|age| u64::try_from(age.as_millis()).unwrap_or(u64::MAX));
            warn!(cache_key, stale_age_ms, attempts = attempts.len(), "all sources failed; serving stale data");
            return Ok(QueryOutcome {
                data,
                freshness: Freshness::Stale,
                source: None,
                attempts,
                latency_ms: elapsed_ms(started),
                stale_age_ms,
            });
        }

        error!(cache_key, %endpoint, attempts = attempts.len(), "all sources exhausted and no cached data");
        Err(AggregatorError::AllSourcesExhausted { endpoint, attempts })
    }

    fn cached<T: TryFrom<CanonicalPayload>>(&self, cache_key: &str, allow_stale: bool) -> Option<T> {
        let payload = if allow_stale {
            self.cache.get_stale(cache_key)
        } else {
            self.cache.get_fresh(cache_key)
        }?;
        T::try_from(payload).ok()
    }
}

impl std::fmt::Debug for AggregatorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorService")
            .field("registry", &self.registry)
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("cache_entries", &self.cache.len())
            .field("provider_timeout", &self.provider_timeout)
            .finish()
    }
}

/// Builder for [`AggregatorService`].
///
/// Injected sources take precedence; any registered provider without one gets
/// a real adapter over the configured (or default reqwest) HTTP client.
pub struct AggregatorServiceBuilder {
    registry: Option<SourceRegistry>,
    sources: Vec<Arc<dyn MarketDataSource>>,
    http_client: Option<Arc<dyn HttpClient>>,
    cache_ttl: Duration,
    provider_timeout: Duration,
    reprobe_interval: Option<Duration>,
    rate_limits: bool,
}

impl Default for AggregatorServiceBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            sources: Vec::new(),
            http_client: None,
            cache_ttl: DEFAULT_TTL,
            provider_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            reprobe_interval: None,
            rate_limits: true,
        }
    }
}

impl AggregatorServiceBuilder {
    /// Applies registry, TTL, timeout and re-probe settings from `config`.
    pub fn config(self, config: &ServiceConfig) -> Self {
        let registry = SourceRegistry::default_catalog(config.credentials.clone())
            .with_disabled(&config.disabled_sources);
        self.registry(registry)
            .cache_ttl(config.cache_ttl)
            .provider_timeout(config.provider_timeout)
            .reprobe_interval(config.reprobe_interval)
    }

    pub fn registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn source(mut self, source: Arc<dyn MarketDataSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = Arc<dyn MarketDataSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn reprobe_interval(mut self, interval: Option<Duration>) -> Self {
        self.reprobe_interval = interval;
        self
    }

    /// Disables local per-provider rate budgets.
    pub fn without_rate_limits(mut self) -> Self {
        self.rate_limits = false;
        self
    }

    pub fn build(self) -> AggregatorService {
        let registry = self
            .registry
            .unwrap_or_else(|| SourceRegistry::default_catalog(ProviderCredentials::default()));

        let mut sources = HashMap::new();
        for source in self.sources {
            sources.insert(source.id(), source);
        }

        let timeout_ms = u64::try_from(self.provider_timeout.as_millis()).unwrap_or(u64::MAX);
        let mut http_client = self.http_client;
        for config in registry.configs() {
            if sources.contains_key(&config.id) {
                continue;
            }
            let client = http_client
                .get_or_insert_with(|| Arc::new(ReqwestHttpClient::new()) as Arc<dyn HttpClient>)
                .clone();
            sources.insert(config.id, build_source(config, client, timeout_ms));
        }

        let throttle = if self.rate_limits {
            ProviderThrottle::from_registry(&registry)
        } else {
            ProviderThrottle::unlimited()
        };

        AggregatorService {
            health: HealthTracker::new(registry.ids(), self.reprobe_interval),
            cache: CacheStore::new(self.cache_ttl),
            registry,
            sources,
            throttle,
            provider_timeout: self.provider_timeout,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
