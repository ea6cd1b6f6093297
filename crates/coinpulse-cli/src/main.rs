mod cli;
mod commands;
mod envelope;
mod error;

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use coinpulse_core::telemetry::{init_tracing, LogFormat};
use coinpulse_core::{AggregatorService, ServiceConfig};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::Cli;
use crate::error::CliError;

/// Exit status when every provider failed and nothing was cached.
const EXIT_SOURCES_EXHAUSTED: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("info", LogFormat::from_env());

    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    let config = service_config(&cli)?;
    debug!(
        cache_ttl = ?config.cache_ttl,
        provider_timeout = ?config.provider_timeout,
        "configuration loaded"
    );
    let service = AggregatorService::from_config(&config);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let envelope = commands::run(&cli.command, &service, &cancel).await?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;

    if !envelope.errors.is_empty() {
        return Ok(ExitCode::from(EXIT_SOURCES_EXHAUSTED));
    }

    Ok(ExitCode::SUCCESS)
}

fn service_config(cli: &Cli) -> Result<ServiceConfig, CliError> {
    let mut config = ServiceConfig::from_env()?;
    if let Some(secs) = cli.cache_ttl_secs {
        config = config.with_cache_ttl(Duration::from_secs(secs));
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_provider_timeout(Duration::from_millis(ms));
    }
    if let Some(secs) = cli.reprobe_secs {
        config = config.with_reprobe_interval(Some(Duration::from_secs(secs)));
    }
    Ok(config)
}
