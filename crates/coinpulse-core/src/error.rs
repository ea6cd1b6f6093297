use thiserror::Error;

/// Validation and contract errors exposed by `coinpulse-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("page must be >= 1, got {value}")]
    InvalidPage { value: u32 },
    #[error("per_page must be between 1 and {max}, got {value}")]
    InvalidPerPage { value: u32, max: u32 },
    #[error("page {page} with per_page {per_page} is past the last addressable rank")]
    PageOutOfRange { page: u32, per_page: u32 },
    #[error("currency must be a 3-5 letter code: '{value}'")]
    InvalidCurrency { value: String },

    #[error(
        "invalid source '{value}', expected one of coingecko, coinmarketcap, coincap, coinpaprika, cryptocompare, binance"
    )]
    InvalidSource { value: String },
    #[error("provider '{provider}' priority must be a positive integer")]
    InvalidPriority { provider: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
}

/// Errors raised while reading service configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
