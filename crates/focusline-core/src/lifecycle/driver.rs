//! Background task that runs the sweep on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::manager::LifecycleManager;

/// Drives [`LifecycleManager::run_sweep`] until shut down.
pub struct SweepDriver {
    manager: Arc<LifecycleManager>,
    every: Duration,
}

impl SweepDriver {
    /// Driver using the manager's configured sweep interval.
    pub fn new(manager: Arc<LifecycleManager>) -> Self {
        let every = manager.config().sweep_interval();
        Self { manager, every }
    }

    pub fn with_interval(mut self, every: Duration) -> Self {
        self.every = every.max(Duration::from_millis(1));
        self
    }

    /// Spawn the loop. Send `true` on the paired sender (or drop it) to stop.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = interval(self.every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("sweep driver started, every {:?}", self.every);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let now = self.manager.now();
                    match self.manager.run_sweep(now).await {
                        Ok(report) if report.failures.is_empty() => {
                            tracing::debug!("sweep tick: {} parked, {} logjammed", report.parked, report.logjammed);
                        }
                        Ok(report) => {
                            tracing::warn!("sweep tick finished with {} failure(s)", report.failures.len());
                        }
                        Err(e) => tracing::warn!("sweep tick error: {e}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("sweep driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::storage::{ItemStore, MemoryItemStore};
    use crate::timeline::{AttentionType, NewItem};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_driver_parks_and_stops() {
        let store = Arc::new(MemoryItemStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()));
        let manager = Arc::new(LifecycleManager::new(store.clone()).with_clock(clock.clone()));
        let item = manager
            .create_item(NewItem::new(
                "ana",
                "notes",
                clock.now(),
                30,
                AttentionType::Consume,
                "main",
            ))
            .await
            .unwrap();
        clock.set(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap());

        let (tx, rx) = watch::channel(false);
        let handle = SweepDriver::new(manager)
            .with_interval(Duration::from_millis(5))
            .spawn(rx);

        for _ in 0..100 {
            if store.get_parked(&item.id).await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(store.get_parked(&item.id).await.unwrap().is_some());

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
