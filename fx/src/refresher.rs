//! Background live-rate refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::RateEngine;

/// Check the live rate every `period` and refresh it when stale.
///
/// Errors are logged and the loop keeps going. Aborting the returned handle
/// stops it; an interrupted refresh writes nothing.
pub fn spawn_periodic_refresh(engine: Arc<RateEngine>, period: Duration) -> JoinHandle<()> {
    info!(period_secs = period.as_secs_f64(), "Starting periodic live rate refresh");

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match engine.prepare().await {
                Ok(Some(rate)) => debug!(rate, "Live rate checked"),
                Ok(None) => debug!("Live rate disabled"),
                Err(e) => warn!(error = %e, "Periodic refresh failed"),
            }
        }
    })
}
