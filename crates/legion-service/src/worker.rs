//! Background drain worker.
//!
//! One scheduled task flushes the optimistic interaction queue to the
//! relational store. The destructive pop makes concurrent drains safe,
//! but a single worker per deployment is the intended shape.

use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

/// Spawn the interaction-queue drain loop.
pub fn spawn_drain_worker(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let interval_seconds = state.config.drain_interval_seconds;
    let batch_size = state.config.drain_batch_size;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
        // A slow drain pass should not cause a burst of catch-up ticks.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match state
                .likes
                .drain_batch(state.store.as_ref(), batch_size)
                .await
            {
                Ok(report) if report.failed > 0 => {
                    tracing::warn!(
                        processed = %report.processed,
                        failed = %report.failed,
                        "Drain pass completed with failures"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Drain pass failed");
                }
            }
        }
    })
}
