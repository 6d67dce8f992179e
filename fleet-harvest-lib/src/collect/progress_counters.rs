//! Shared progress counters for a collection batch.

use super::progress::Progress;
use chrono::{DateTime, Utc};
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use owo_colors::OwoColorize;
use std::sync::Arc;
use std::time::Instant;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub in_flight: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    #[must_use]
    pub const fn settled(&self) -> u64 {
        self.completed + self.failed
    }

    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.settled())
    }
}

/// Keeps a task counted as active while alive.
#[derive(Debug)]
pub struct InFlight<'a> {
    counters: &'a ProgressCounters,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _ = self
            .counters
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
    }
}

/// Progress of a collection batch, updated by many concurrent tasks.
///
/// Writers only ever increment, so every observer sees monotonically non-decreasing values.
/// Each project must be settled through [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure) exactly once, which keeps `completed + failed`
/// within `total`. Observers get copies through [`snapshot`](Self::snapshot) and never a
/// writable reference.
#[derive(Debug)]
pub struct ProgressCounters {
    total: u64,
    completed: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicU64,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl ProgressCounters {
    #[must_use]
    pub fn new(total: u64) -> Arc<Self> {
        Arc::new(Self {
            total,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            started: Instant::now(),
            started_at: Utc::now(),
        })
    }

    /// Register these counters as the determinate progress source of `progress`.
    pub fn attach(self: &Arc<Self>, progress: &dyn Progress) {
        let counters = Arc::clone(self);
        let use_colors = progress.use_colors();
        progress.set_determinate(Box::new(move || {
            let snapshot = counters.snapshot();
            (snapshot.total, snapshot.settled(), Self::render(&snapshot, use_colors))
        }));
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Mark that a task acquired a worker slot and started its remote calls.
    ///
    /// The task counts as active until the returned guard is dropped, even if it panics.
    #[must_use]
    pub fn start_task(&self) -> InFlight<'_> {
        let _ = self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlight { counters: self }
    }

    pub fn record_success(&self) {
        let _ = self.completed.fetch_add(1, Ordering::AcqRel);
        debug_assert!(self.snapshot().settled() <= self.total, "project settled more than once");
    }

    pub fn record_failure(&self) {
        let _ = self.failed.fetch_add(1, Ordering::AcqRel);
        debug_assert!(self.snapshot().settled() <= self.total, "project settled more than once");
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }

    fn render(snapshot: &ProgressSnapshot, use_colors: bool) -> String {
        let collected = format!("{}/{} collected", snapshot.completed, snapshot.total);
        let failed = format!("{} failed", snapshot.failed);

        let (collected, failed) = if use_colors {
            let collected = if snapshot.remaining() == 0 {
                collected.green().to_string()
            } else {
                collected
            };
            let failed = if snapshot.failed > 0 { failed.red().to_string() } else { failed };
            (collected, failed)
        } else {
            (collected, failed)
        };

        format!("{collected}, {failed}, {} active", snapshot.in_flight)
    }
}
