//! The fixed-cadence simulation driver.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::gateway::SharedGateway;

/// Milliseconds per simulation tick (20 Hz).
pub const TICK_INTERVAL_MS: u64 = 50;

/// Drive the simulation forever at the fixed tick rate.
pub async fn run_tick_loop(gateway: SharedGateway) {
    let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_ms = TICK_INTERVAL_MS, "tick loop started");
    loop {
        interval.tick().await;
        gateway.run_tick();
    }
}
