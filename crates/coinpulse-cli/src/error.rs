use coinpulse_core::{AggregatorError, ConfigError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("interrupted: {0}")]
    Cancelled(AggregatorError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AggregatorError> for CliError {
    fn from(error: AggregatorError) -> Self {
        match error {
            AggregatorError::InvalidRequest(validation) => Self::Validation(validation),
            other => Self::Cancelled(other),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Cancelled(_) => 130,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use coinpulse_core::Endpoint;

    use super::*;

    #[test]
    fn exit_codes_by_category() {
        let invalid = CliError::from(ValidationError::InvalidCurrency {
            value: String::from("$"),
        });
        assert_eq!(invalid.exit_code(), 2);

        let config = CliError::from(ConfigError::InvalidNumber {
            name: "COINPULSE_CACHE_TTL_SECS",
            value: String::from("x"),
        });
        assert_eq!(config.exit_code(), 2);

        let cancelled = CliError::from(AggregatorError::Cancelled {
            endpoint: Endpoint::Coins,
        });
        assert_eq!(cancelled.exit_code(), 130);

        let io = CliError::from(std::io::Error::other("closed pipe"));
        assert_eq!(io.exit_code(), 10);
    }
}
