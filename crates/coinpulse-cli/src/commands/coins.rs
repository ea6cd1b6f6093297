use coinpulse_core::{AggregatorService, CoinsQuery};
use tokio_util::sync::CancellationToken;

use crate::cli::CoinsArgs;
use crate::commands::CommandResult;
use crate::error::CliError;

pub async fn run(
    args: &CoinsArgs,
    service: &AggregatorService,
    cancel: &CancellationToken,
) -> Result<CommandResult, CliError> {
    let query = CoinsQuery::new(args.page, args.per_page, &args.currency)?;
    CommandResult::from_query(service.list_coins(&query, cancel).await)
}
