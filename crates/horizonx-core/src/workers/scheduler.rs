// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker scheduling: fixed-interval and daily-at-clock-time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// A scheduled unit of control-loop work. Errors are logged and swallowed;
/// the schedule keeps running.
#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> anyhow::Result<()>;
}

/// Wall-clock time of day for daily workers.
#[derive(Debug, Clone, Copy)]
pub struct DailySchedule {
    pub hour: u32,
    pub minute: u32,
}

/// Spawns worker loops; all loops stop when the shutdown handle fires.
pub struct Scheduler {
    time_zone: Tz,
    shutdown: Arc<Notify>,
}

impl Scheduler {
    pub fn new(time_zone: Tz) -> Self {
        Self {
            time_zone,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run a worker every `interval`.
    pub fn run_by_duration(&self, interval: Duration, worker: Arc<dyn Worker>) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            info!(worker = worker.name(), interval_secs = interval.as_secs(), "worker scheduled");
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.notified() => {
                        debug!(worker = worker.name(), "worker canceled");
                        return;
                    }

                    _ = tokio::time::sleep(interval) => {
                        run_once(worker.as_ref()).await;
                    }
                }
            }
        });
    }

    /// Run a worker once per day at the given local wall-clock time,
    /// recomputing the next occurrence after each run.
    pub fn run_daily(&self, schedule: DailySchedule, worker: Arc<dyn Worker>) {
        let shutdown = self.shutdown.clone();
        let time_zone = self.time_zone;
        tokio::spawn(async move {
            info!(
                worker = worker.name(),
                hour = schedule.hour,
                minute = schedule.minute,
                zone = %time_zone,
                "daily worker scheduled"
            );
            loop {
                let wait = match next_daily_wait(time_zone, schedule) {
                    Some(wait) => wait,
                    None => {
                        error!(worker = worker.name(), "could not compute next daily run");
                        return;
                    }
                };

                tokio::select! {
                    biased;

                    _ = shutdown.notified() => {
                        debug!(worker = worker.name(), "daily worker canceled");
                        return;
                    }

                    _ = tokio::time::sleep(wait) => {
                        run_once(worker.as_ref()).await;
                    }
                }
            }
        });
    }
}

async fn run_once(worker: &dyn Worker) {
    let start = std::time::Instant::now();
    if let Err(e) = worker.run().await {
        error!(worker = worker.name(), error = %e, "worker failed");
    }
    debug!(worker = worker.name(), elapsed_ms = start.elapsed().as_millis() as u64, "worker finished");
}

/// Time until the next occurrence of `(hour, minute)` in `zone`. The result
/// is always strictly positive: a wall-clock match that is not in the
/// future advances by one day.
pub fn next_daily_wait(zone: Tz, schedule: DailySchedule) -> Option<Duration> {
    let now = Utc::now().with_timezone(&zone);

    let mut next = zone
        .with_ymd_and_hms(
            now.year(),
            now.month(),
            now.day(),
            schedule.hour,
            schedule.minute,
            0,
        )
        .single()?;

    if next <= now {
        next += chrono::Duration::days(1);
    }

    (next - now).to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingWorker {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Worker for CountingWorker {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingWorker;

    #[async_trait]
    impl Worker for FailingWorker {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self) -> anyhow::Result<()> {
            anyhow::bail!("always fails")
        }
    }

    #[test]
    fn test_next_daily_wait_is_strictly_future() {
        for zone in [chrono_tz::UTC, chrono_tz::Europe::Warsaw, chrono_tz::Asia::Tokyo] {
            for hour in 0..24 {
                let wait = next_daily_wait(
                    zone,
                    DailySchedule { hour, minute: 0 },
                )
                .unwrap();
                assert!(wait > Duration::ZERO, "zone {} hour {}", zone, hour);
                assert!(wait <= Duration::from_secs(24 * 3600 + 60));
            }
        }
    }

    #[tokio::test]
    async fn test_interval_worker_runs_and_stops() {
        let scheduler = Scheduler::new(chrono_tz::UTC);
        let worker = Arc::new(CountingWorker {
            runs: AtomicUsize::new(0),
        });

        scheduler.run_by_duration(Duration::from_millis(10), worker.clone());
        tokio::time::sleep(Duration::from_millis(55)).await;
        scheduler.shutdown_handle().notify_waiters();

        let runs = worker.runs.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected at least two runs, got {}", runs);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let after = worker.runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(after, worker.runs.load(Ordering::SeqCst), "stopped after shutdown");
    }

    #[tokio::test]
    async fn test_worker_errors_do_not_stop_schedule() {
        let scheduler = Scheduler::new(chrono_tz::UTC);
        scheduler.run_by_duration(Duration::from_millis(5), Arc::new(FailingWorker));
        // Nothing to assert beyond "no panic"; the loop must survive errors.
        tokio::time::sleep(Duration::from_millis(25)).await;
        scheduler.shutdown_handle().notify_waiters();
    }
}
