//! Periodic purge of expired claims

use crate::ledger::ActionLedger;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to the background purge task; aborts the task on drop
#[derive(Debug)]
pub struct CleanupHandle {
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Stop the purge task
    pub fn stop(self) {
        self.task.abort();
    }

    /// Whether the task has exited
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CleanupHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ActionLedger {
    /// Start purging expired claims every `cleanup_interval_secs`
    ///
    /// The task holds only a weak reference and exits once the ledger is
    /// dropped. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn_cleanup(self: &Arc<Self>) -> CleanupHandle {
        let ledger = Arc::downgrade(self);
        let period = Duration::from_secs(self.config().cleanup_interval_secs);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(ledger) = ledger.upgrade() else {
                    tracing::debug!("Ledger dropped, stopping cleanup");
                    break;
                };
                match ledger.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Purged {} expired action claims", removed),
                    Err(e) => tracing::warn!("Ledger cleanup failed: {}", e),
                }
            }
        });

        CleanupHandle { task }
    }
}
