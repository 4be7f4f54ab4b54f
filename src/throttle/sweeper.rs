//! Background removal of expired throttle entries.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::clock::Clock;
use super::store::ThrottleStore;
use crate::error::{Result, ThrottleError};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically drops expired entries so one-off keys do not pile up.
pub struct Sweeper;

impl Sweeper {
    /// Start sweeping `store` every `interval` on the current runtime.
    ///
    /// The first pass runs one full interval after the call. A zero
    /// interval is rejected.
    pub fn spawn(
        store: Arc<ThrottleStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Result<SweeperHandle> {
        if interval.is_zero() {
            return Err(ThrottleError::Config(
                "sweep interval must be greater than zero".to_string(),
            ));
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        info!(interval_ms = interval.as_millis() as u64, "Starting throttle sweeper");

        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.sweep(clock.now_millis());
                        debug!(removed, remaining = store.len(), "Swept expired throttle entries");
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            info!("Throttle sweeper stopped");
        });

        Ok(SweeperHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Owner of a running sweeper task.
///
/// Dropping the handle aborts the task.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Throttle sweeper task failed");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::clock::ManualClock;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let store = Arc::new(ThrottleStore::new());
        let clock = Arc::new(ManualClock::new(0));

        store.hit("expired", 0, Duration::from_secs(1));
        store.hit("active", 0, Duration::from_secs(600));

        let handle =
            Sweeper::spawn(store.clone(), clock.clone(), Duration::from_secs(60)).unwrap();

        clock.set(60_000);
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(store.get("expired").is_none());
        assert!(store.get("active").is_some());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_shutdown() {
        let store = Arc::new(ThrottleStore::new());
        let clock = Arc::new(ManualClock::new(0));

        let handle =
            Sweeper::spawn(store.clone(), clock.clone(), Duration::from_secs(1)).unwrap();
        handle.shutdown().await;

        store.hit("k", 0, Duration::from_millis(1));
        clock.set(10);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_rejected() {
        let store = Arc::new(ThrottleStore::new());
        let clock = Arc::new(ManualClock::new(0));

        let result = Sweeper::spawn(store.clone(), clock.clone(), Duration::ZERO);
        assert!(matches!(result, Err(ThrottleError::Config(_))));

        store.hit("k", 0, Duration::from_millis(1));
        clock.set(10);
        let handle = Sweeper::spawn(store.clone(), clock, DEFAULT_SWEEP_INTERVAL).unwrap();
        tokio::time::sleep(DEFAULT_SWEEP_INTERVAL + Duration::from_secs(1)).await;

        assert!(store.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_after_task_aborted() {
        let store = Arc::new(ThrottleStore::new());
        let clock = Arc::new(ManualClock::new(0));

        let handle = Sweeper::spawn(store, clock, Duration::from_secs(1)).unwrap();
        if let Some(task) = handle.task.as_ref() {
            task.abort();
        }

        // A failed task is reported, not propagated.
        handle.shutdown().await;
    }
}
