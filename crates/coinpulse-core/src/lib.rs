//! # CoinPulse Core
//!
//! Multi-source cryptocurrency market data aggregation.
//!
//! ## Overview
//!
//! Market data is fetched from several public providers behind one interface.
//! Providers are tried in priority order, failures mark a provider unhealthy
//! so later queries skip it, successful results are cached for a short TTL,
//! and an expired cache entry is served (flagged stale) when every provider
//! fails.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (CoinGecko, CoinMarketCap, CoinCap, CoinPaprika, CryptoCompare, Binance) |
//! | [`aggregator`] | Fail-over query engine and [`AggregatorService`] facade |
//! | [`cache`] | TTL cache with stale reads |
//! | [`config`] | Environment-driven [`ServiceConfig`] |
//! | [`data_source`] | Adapter trait, queries and provider errors |
//! | [`domain`] | Canonical schema (coins, global snapshot, trending) |
//! | [`error`] | Validation and configuration errors |
//! | [`health`] | Per-provider health tracking |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`registry`] | Provider catalog and priorities |
//! | [`report`] | Operator health report |
//! | [`source`] | Provider identifiers |
//! | [`telemetry`] | `tracing` subscriber setup |
//! | [`throttling`] | Local per-provider rate budgets |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coinpulse_core::{AggregatorService, CoinsQuery, ServiceConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = AggregatorService::from_config(&ServiceConfig::from_env()?);
//!     let query = CoinsQuery::new(1, 10, "usd")?;
//!
//!     let outcome = service.list_coins(&query, &CancellationToken::new()).await?;
//!     for coin in &outcome.data {
//!         println!("{} {:.2}", coin.symbol, coin.current_price);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ CLI / Web API   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Aggregator      │────▶│ Cache / Health / │
//! │                 │     │ Throttle         │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest)        │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Security
//!
//! - API keys are read from environment variables only and never logged
//! - `Debug` output of credentials is redacted

pub mod adapters;
pub mod aggregator;
pub mod cache;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod health;
pub mod http_client;
pub mod registry;
pub mod report;
pub mod source;
pub mod telemetry;
pub mod throttling;

// Adapter implementations
pub use adapters::{
    build_sources, BinanceAdapter, CoinCapAdapter, CoinGeckoAdapter, CoinMarketCapAdapter,
    CoinPaprikaAdapter, CryptoCompareAdapter,
};

// Aggregation
pub use aggregator::{
    AggregatorError, AggregatorService, AggregatorServiceBuilder, AttemptOutcome, Freshness,
    QueryOutcome, SourceAttempt,
};

// Caching
pub use cache::CacheStore;

// Configuration
pub use config::ServiceConfig;

// Data source trait and types
pub use data_source::{
    CapabilitySet, CoinsQuery, Endpoint, MarketDataSource, ProviderError, ProviderErrorKind,
    SourceFuture,
};

// Domain models
pub use domain::{
    finite_or_zero, CanonicalCoin, CanonicalPayload, GlobalMarketSnapshot, TrendingCoin,
    TrendingList, UtcDateTime,
};

// Error types
pub use error::{ConfigError, ValidationError};

// Health
pub use health::{HealthTracker, ProviderHealth};

// HTTP client types
pub use http_client::{HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Registry
pub use registry::{Credential, ProviderConfig, ProviderCredentials, SourceRegistry};

// Reporting
pub use report::{HealthReport, OverallHealth, SourceDetail};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::ProviderThrottle;
