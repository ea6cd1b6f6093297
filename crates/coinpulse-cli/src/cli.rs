//! CLI argument definitions for CoinPulse.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `coins` | Paginated coin list ranked by market cap |
//! | `global` | Global market snapshot |
//! | `trending` | Trending coins |
//! | `health` | Provider health report |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--cache-ttl-secs` | env or `60` | Cache freshness window |
//! | `--timeout-ms` | env or `8000` | Per-provider request timeout |
//! | `--reprobe-secs` | env or unset | Retry unhealthy providers after this long |
//!
//! # Examples
//!
//! ```bash
//! coinpulse coins --page 2 --per-page 25 --pretty
//! coinpulse coins --currency eur
//! COINPULSE_DISABLED_SOURCES=coingecko coinpulse global
//! coinpulse health
//! ```

use clap::{Args, Parser, Subcommand};

/// Multi-source crypto market data with automatic fail-over.
///
/// Queries CoinGecko, CoinMarketCap, CoinCap, CoinPaprika, CryptoCompare and
/// Binance in priority order and prints one JSON envelope per invocation.
#[derive(Debug, Parser)]
#[command(
    name = "coinpulse",
    author,
    version,
    about = "Multi-source crypto market data CLI",
    long_about = "CoinPulse fetches cryptocurrency market data from several public providers.\n\
\n\
  • Priority fail-over across six providers\n\
  • Short-lived cache with stale fallback when every provider fails\n\
  • Per-provider health tracking and reporting\n\
\n\
API keys are read from COINPULSE_<PROVIDER>_API_KEY (or the provider's conventional name).\n\
Use 'coinpulse <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Cache freshness window in seconds (overrides COINPULSE_CACHE_TTL_SECS).
    #[arg(long, global = true)]
    pub cache_ttl_secs: Option<u64>,

    /// Per-provider timeout in milliseconds (overrides COINPULSE_PROVIDER_TIMEOUT_MS).
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Re-probe unhealthy providers after this many seconds (overrides COINPULSE_REPROBE_SECS).
    #[arg(long, global = true)]
    pub reprobe_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List coins ranked by market cap.
    ///
    /// # Examples
    ///
    /// ```bash
    /// coinpulse coins
    /// coinpulse coins --page 3 --per-page 100 --currency gbp
    /// ```
    Coins(CoinsArgs),

    /// Show the global market snapshot (total cap, volume, BTC dominance).
    Global,

    /// Show trending coins.
    Trending,

    /// Show the provider health report.
    ///
    /// Health is tracked per process, so a fresh invocation reports every
    /// provider as healthy until it has been queried.
    Health,
}

#[derive(Debug, Clone, Args)]
pub struct CoinsArgs {
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Coins per page (1-250).
    #[arg(long, default_value_t = 50)]
    pub per_page: u32,

    /// Quote currency code.
    #[arg(long, default_value = "usd")]
    pub currency: String,
}
