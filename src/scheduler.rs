//! Interval scheduler with a single-flight guard.
//!
//! A cycle runs as soon as [`Scheduler::run`] starts, then again every
//! interval. Ticks that fire while a cycle is still running are skipped, so
//! at most one cycle is ever active.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::delivery::CycleReport;

/// Default poll interval (25 hours).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(25 * 60 * 60);

/// Something the scheduler can run once per tick.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Runs one complete cycle. Must not fail; errors belong in the report.
    async fn run_cycle(&self) -> CycleReport;
}

/// Counters describing a scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Cycles started.
    pub started: usize,
    /// Ticks skipped because a cycle was still running.
    pub skipped: usize,
}

/// Marks a cycle as running; clears the mark on drop, including when the
/// cycle task is aborted.
struct CycleGuard {
    busy: Arc<AtomicBool>,
}

impl CycleGuard {
    fn try_acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                busy: Arc::clone(busy),
            })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Fires cycles at a fixed interval.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Scheduler {
    /// Creates a scheduler. A zero interval is raised to one second.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Poll interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs until `shutdown` turns true (or its sender is dropped).
    ///
    /// The first cycle starts immediately. On shutdown an in-flight cycle is
    /// aborted; its temp payload is removed by drop and the dedup file is
    /// only ever replaced atomically, so aborting is safe.
    pub async fn run(
        &self,
        runner: Arc<dyn CycleRunner>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        if *shutdown.borrow() {
            return stats;
        }

        let busy = Arc::new(AtomicBool::new(false));
        let mut in_flight: Option<JoinHandle<CycleReport>> = None;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(guard) = CycleGuard::try_acquire(&busy) else {
                        warn!("previous cycle still running, skipping tick");
                        stats.skipped += 1;
                        continue;
                    };
                    stats.started += 1;
                    debug!(cycle = stats.started, "starting cycle");
                    let runner = Arc::clone(&runner);
                    in_flight = Some(tokio::spawn(async move {
                        let _guard = guard;
                        runner.run_cycle().await
                    }));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = in_flight {
            if !handle.is_finished() {
                warn!("shutdown requested while a cycle was running, aborting it");
                handle.abort();
            }
            let _ = handle.await;
        }
        info!(started = stats.started, skipped = stats.skipped, "scheduler stopped");
        stats
    }
}
