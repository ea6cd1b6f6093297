use coinpulse_core::AggregatorService;
use tokio_util::sync::CancellationToken;

use crate::commands::CommandResult;
use crate::error::CliError;

pub async fn run(
    service: &AggregatorService,
    cancel: &CancellationToken,
) -> Result<CommandResult, CliError> {
    CommandResult::from_query(service.trending(cancel).await)
}
