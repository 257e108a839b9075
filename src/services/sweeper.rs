//! Idle session sweeper.
//!
//! DESIGN
//! ======
//! Browsers that never sign out leave their `SessionStore` in the registry.
//! A background task periodically evicts stores whose cookie has not been
//! seen for the configured idle TTL. Dropping the last `Arc` also ends the
//! store's identity-event listener.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::state::SessionRegistry;

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Sweep cadence for a given idle TTL: never slower than once a minute.
#[must_use]
pub fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 2).clamp(Duration::from_secs(1), DEFAULT_SWEEP_INTERVAL)
}

/// Spawn the background sweeper. Returns a handle for shutdown.
pub fn spawn_session_sweeper(registry: SessionRegistry, ttl: Duration, every: Duration) -> JoinHandle<()> {
    info!(ttl_secs = ttl.as_secs(), every_ms = every.as_millis(), "session sweeper configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let evicted = registry.sweep_idle(ttl).await;
            if evicted > 0 {
                let remaining = registry.len().await;
                info!(evicted, remaining, "evicted idle sessions");
            } else {
                debug!("no idle sessions");
            }
        }
    })
}

#[cfg(test)]
#[path = "sweeper_test.rs"]
mod tests;
