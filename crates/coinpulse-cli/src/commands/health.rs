use coinpulse_core::AggregatorService;

use crate::commands::CommandResult;
use crate::error::CliError;

pub fn run(service: &AggregatorService) -> Result<CommandResult, CliError> {
    let report = service.health_report();
    let mut result = CommandResult::ok(serde_json::to_value(&report)?);
    result.warnings = report
        .recommendations
        .iter()
        .filter(|recommendation| !recommendation.starts_with("OK:"))
        .cloned()
        .collect();
    Ok(result)
}
