mod coins;
mod global;
mod health;
mod trending;

use coinpulse_core::{AggregatorError, AggregatorService, Freshness, ProviderId, QueryOutcome, SourceAttempt};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cli::Command;
use crate::envelope::{Envelope, EnvelopeError, EnvelopeMeta};
use crate::error::CliError;

#[derive(Debug)]
pub struct CommandResult {
    pub data: Value,
    pub source: Option<ProviderId>,
    pub freshness: Option<Freshness>,
    pub stale_age_ms: Option<u64>,
    pub attempts: Vec<SourceAttempt>,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            source: None,
            freshness: None,
            stale_age_ms: None,
            attempts: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
        }
    }

    /// Converts an aggregator result.
    ///
    /// Exhaustion becomes an envelope error so the attempt list is still
    /// printed; cancellation and invalid input abort the command.
    pub fn from_query<T: Serialize>(
        result: Result<QueryOutcome<T>, AggregatorError>,
    ) -> Result<Self, CliError> {
        match result {
            Ok(outcome) => {
                let mut command_result = Self::ok(serde_json::to_value(&outcome.data)?);
                if outcome.is_stale() {
                    command_result.warnings.push(String::from(
                        "all providers failed; serving the last cached result",
                    ));
                }
                command_result.source = outcome.source;
                command_result.freshness = Some(outcome.freshness);
                command_result.stale_age_ms = outcome.stale_age_ms;
                command_result.attempts = outcome.attempts;
                command_result.latency_ms = outcome.latency_ms;
                Ok(command_result)
            }
            Err(error @ AggregatorError::AllSourcesExhausted { .. }) => {
                let mut command_result = Self::ok(Value::Null);
                command_result.errors.push(EnvelopeError::from(&error));
                command_result.attempts = error.attempts().to_vec();
                Ok(command_result)
            }
            Err(error) => Err(CliError::from(error)),
        }
    }
}

pub async fn run(
    command: &Command,
    service: &AggregatorService,
    cancel: &CancellationToken,
) -> Result<Envelope<Value>, CliError> {
    let command_result = match command {
        Command::Coins(args) => coins::run(args, service, cancel).await?,
        Command::Global => global::run(service, cancel).await?,
        Command::Trending => trending::run(service, cancel).await?,
        Command::Health => health::run(service)?,
    };

    let CommandResult {
        data,
        source,
        freshness,
        stale_age_ms,
        attempts,
        warnings,
        errors,
        latency_ms,
    } = command_result;

    let mut meta = EnvelopeMeta::new(latency_ms);
    meta.source = source;
    meta.freshness = freshness;
    meta.stale = freshness == Some(Freshness::Stale);
    meta.cache_hit = freshness == Some(Freshness::Cached);
    meta.stale_age_ms = stale_age_ms;
    meta.attempts = attempts;
    meta.warnings = warnings;

    Ok(Envelope { meta, data, errors })
}

#[cfg(test)]
mod tests {
    use coinpulse_core::{AttemptOutcome, CanonicalCoin, Endpoint, ValidationError};

    use super::*;

    #[test]
    fn stale_outcome_carries_warning() {
        let outcome = QueryOutcome {
            data: vec![CanonicalCoin::new("bitcoin", "btc", "Bitcoin", 1.0)],
            freshness: Freshness::Stale,
            source: None,
            attempts: Vec::new(),
            latency_ms: 4,
            stale_age_ms: Some(90_000),
        };

        let result = CommandResult::from_query(Ok(outcome)).expect("stale data is a success");

        assert_eq!(result.freshness, Some(Freshness::Stale));
        assert_eq!(result.stale_age_ms, Some(90_000));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.data[0]["id"], "bitcoin");
    }

    #[test]
    fn exhaustion_becomes_envelope_error() {
        let error = AggregatorError::AllSourcesExhausted {
            endpoint: Endpoint::Trending,
            attempts: vec![SourceAttempt {
                provider: ProviderId::Coingecko,
                outcome: AttemptOutcome::Failed,
                message: Some(String::from("status 503")),
                latency_ms: 10,
            }],
        };

        let result =
            CommandResult::from_query::<Value>(Err(error)).expect("rendered as envelope error");

        assert_eq!(result.data, Value::Null);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.attempts.len(), 1);
    }

    #[test]
    fn invalid_request_aborts() {
        let error = AggregatorError::from(ValidationError::InvalidPage { value: 0 });
        let result = CommandResult::from_query::<Value>(Err(error)).expect_err("aborts");
        assert_eq!(result.exit_code(), 2);
    }
}
