use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::orchestrator::CycleOrchestrator;

/// Drives the orchestrator on a fixed interval: one cycle immediately, then
/// one per tick.
///
/// Shutdown is observed only between cycles. A running cycle is never raced
/// against the shutdown signal, so brackets are not cut in half.
pub struct CycleScheduler {
    orchestrator: Arc<CycleOrchestrator>,
    interval: Duration,
}

impl CycleScheduler {
    pub fn new(orchestrator: Arc<CycleOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped.
    /// Returns the number of completed cycles.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        info!(interval_secs = self.interval.as_secs(), "Scheduler running");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed, stopping scheduler");
                        break;
                    }
                    continue;
                }
            }

            let report = self.orchestrator.run_cycle().await;
            cycles += 1;
            info!(cycle = cycles, instruments = report.decisions.len(), "Cycle finished");
        }

        info!(cycles, "Scheduler stopped");
        cycles
    }
}
