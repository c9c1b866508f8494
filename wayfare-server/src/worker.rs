use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};
use wayfare_catalog::{DynamicPricingEngine, FlightStatusBoard};

/// Reprice all flights every `period` until `shutdown` flips.
///
/// A cycle in progress always runs to completion; shutdown is only observed
/// between cycles. The first cycle runs immediately.
pub fn start_pricing_worker(
    engine: Arc<DynamicPricingEngine>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Pricing worker started, running every {:?}", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.run_cycle().await {
                        Ok(report) => info!(
                            "Pricing cycle: {} evaluated, {} updated, {} frozen, {} unpriced, {} unchanged, {} failed",
                            report.evaluated,
                            report.updated,
                            report.skipped_frozen,
                            report.skipped_unpriced,
                            report.unchanged,
                            report.failed
                        ),
                        Err(e) => error!("Pricing cycle failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Pricing worker stopped");
    })
}

/// Roll flight delays on every tracked flight every `period`
pub fn start_status_worker(
    board: Arc<FlightStatusBoard>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Flight status worker started, ticking every {:?}", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let delayed = board.tick();
                    if delayed > 0 {
                        debug!("{} flights delayed this tick", delayed);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Flight status worker stopped");
    })
}
