use std::sync::Arc;

use coinpulse_core::telemetry::{init_tracing, LogFormat};
use coinpulse_core::{AggregatorService, ServiceConfig};
use coinpulse_web::{router, AppState};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing("info,tower_http=debug", LogFormat::from_env());

    match serve().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server stopped");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env()?;
    let service = Arc::new(AggregatorService::from_config(&config));
    info!(
        sources = ?service.registry().ids(),
        cache_ttl = ?config.cache_ttl,
        "aggregator ready"
    );

    let shutdown = CancellationToken::new();
    let app = router(AppState::new(service, shutdown.clone()));

    let listener = TcpListener::bind(&config.bind).await?;
    info!(address = %config.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
