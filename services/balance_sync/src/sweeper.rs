//! Periodic purge of expired balance snapshots

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Result, SyncError};
use crate::store::WatchlistStore;

pub struct RetentionSweeper {
    store: Arc<dyn WatchlistStore>,
    retention: Duration,
    period: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn WatchlistStore>, retention: Duration, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(SyncError::Configuration(
                "cleanup interval must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            store,
            retention,
            period,
        })
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Delete every snapshot older than the retention window
    pub async fn sweep_once(&self) -> Result<usize> {
        let removed = self.store.delete_snapshots_older_than(self.retention).await?;
        if removed > 0 {
            info!("Removed {} expired balance snapshots", removed);
        } else {
            debug!("No expired balance snapshots");
        }
        Ok(removed)
    }

    /// Sweep every period until `shutdown` fires; the first sweep happens
    /// one period after start
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = self.sweep_once().await {
                    error!("Snapshot cleanup failed: {}", e);
                }
            }
            debug!("Retention sweeper stopped");
        })
    }
}
