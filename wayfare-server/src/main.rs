use anyhow::Context;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayfare_server::{start_pricing_worker, start_status_worker, AppState};
use wayfare_store::app_config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfare_server=debug,wayfare_catalog=info,wayfare_order=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        "Starting Wayfare booking core (timezone {}, pricing every {}s)",
        config.business_rules.timezone,
        config.pricing.interval_seconds
    );

    let state = AppState::in_memory(config.clone())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = vec![start_pricing_worker(
        state.pricing.clone(),
        Duration::from_secs(config.pricing.interval_seconds.max(1)),
        shutdown_rx.clone(),
    )];

    if config.flight_status.enabled {
        workers.push(start_status_worker(
            state.status_board.clone(),
            Duration::from_secs(config.flight_status.interval_seconds.max(1)),
            shutdown_rx,
        ));
    }

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested, waiting for workers");

    let _ = shutdown_tx.send(true);
    for worker in workers {
        worker.await?;
    }
    Ok(())
}
