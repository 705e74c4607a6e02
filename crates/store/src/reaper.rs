//! Periodic sweep removing boards past the reaping horizon.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use spring83_protocol::MAX_BOARD_AGE_DAYS;

use crate::BoardStore;

/// Deletes boards whose claimed modification time has fallen more than the
/// reaping horizon behind the clock. Runs forever; sweep errors are logged
/// and the next tick proceeds regardless.
pub struct Reaper {
    store: Arc<dyn BoardStore>,
    tick: Duration,
}

impl Reaper {
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self {
            store,
            tick: Duration::from_secs(60),
        }
    }

    /// Override the sweep cadence.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// One sweep pass.
    pub fn sweep(&self) {
        let cutoff = Utc::now() - chrono::Duration::days(MAX_BOARD_AGE_DAYS);
        match self.store.delete_before(cutoff) {
            Ok(0) => tracing::debug!("reaper: nothing to delete"),
            Ok(removed) => tracing::info!("reaper: deleted {removed} expired boards"),
            Err(err) => tracing::error!("reaper sweep failed: {err}"),
        }
    }

    /// Run the sweep loop until the task is dropped.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!("reaper started ({:?} ticks)", self.tick);
        loop {
            interval.tick().await;
            self.sweep();
        }
    }
}
