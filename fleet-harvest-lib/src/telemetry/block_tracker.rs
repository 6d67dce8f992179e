use super::report::{PerformanceReport, build_report_at};
use chrono::{DateTime, Utc};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

const LOG_TARGET: &str = " telemetry";

/// A closed timing span for one category of remote operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationBlock {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Remote calls recorded while the block was open.
    pub call_count: u64,
    pub failed_count: u64,

    /// Number of items the block produced, as reported when it was closed.
    pub total_items: u64,

    /// The first failure messages, up to the tracker's sampling cap.
    pub sampled_errors: Vec<String>,

    /// Failure messages not retained because the sample was full.
    pub dropped_errors: u64,
}

#[derive(Debug)]
struct OpenBlock {
    started: Instant,
    started_at: DateTime<Utc>,
    call_count: u64,
    failed_count: u64,
    sampled_errors: Vec<String>,
    dropped_errors: u64,
}

impl OpenBlock {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            call_count: 0,
            failed_count: 0,
            sampled_errors: Vec::new(),
            dropped_errors: 0,
        }
    }

    fn close(self, name: String, item_count: u64) -> OperationBlock {
        OperationBlock {
            name,
            started_at: self.started_at,
            ended_at: Utc::now(),
            duration: self.started.elapsed(),
            call_count: self.call_count,
            failed_count: self.failed_count,
            total_items: item_count,
            sampled_errors: self.sampled_errors,
            dropped_errors: self.dropped_errors,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    open: HashMap<String, OpenBlock>,
    completed: Vec<OperationBlock>,
    run_start: Option<DateTime<Utc>>,
    project_count: u64,
    total_calls: u64,
    total_failed: u64,
}

/// Registry of named operation timers shared by every collection task.
///
/// At most one block per name is open at a time. Calls recorded against a name that is not
/// currently open still count toward the run totals but not toward any block.
#[derive(Debug)]
pub struct BlockTracker {
    state: Mutex<TrackerState>,
    max_sampled_errors: usize,
}

impl BlockTracker {
    #[must_use]
    pub fn new(max_sampled_errors: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            max_sampled_errors,
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the start of the overall run. The report's total duration is measured from here.
    pub fn start_collection(&self) {
        self.state().run_start = Some(Utc::now());
    }

    pub fn set_project_count(&self, count: u64) {
        self.state().project_count = count;
    }

    /// Start timing `name`. Ignored if a block with that name is already open.
    pub fn start_block(&self, name: &str) {
        let mut state = self.state();
        if state.open.contains_key(name) {
            log::trace!(target: LOG_TARGET, "Block '{name}' already running");
            return;
        }

        let _ = state.open.insert(name.to_string(), OpenBlock::new());
        log::debug!(target: LOG_TARGET, "Started block '{name}'");
    }

    /// Record one remote call made on behalf of block `name`.
    pub fn record_call(&self, name: &str, success: bool, error: Option<&str>) {
        let cap = self.max_sampled_errors;
        let mut state = self.state();

        state.total_calls += 1;
        if !success {
            state.total_failed += 1;
        }

        let Some(block) = state.open.get_mut(name) else {
            return;
        };

        block.call_count += 1;
        if success {
            return;
        }

        block.failed_count += 1;
        if let Some(message) = error.filter(|m| !m.is_empty()) {
            if block.sampled_errors.len() < cap {
                block.sampled_errors.push(message.to_string());
            } else {
                block.dropped_errors += 1;
            }
        }
    }

    /// Close block `name`, recording how many items it produced. Ignored if it isn't open.
    pub fn end_block(&self, name: &str, item_count: u64) {
        let mut state = self.state();
        let Some(open) = state.open.remove(name) else {
            return;
        };

        let block = open.close(name.to_string(), item_count);
        log::debug!(
            target: LOG_TARGET,
            "Block '{name}' finished in {:.1}s ({} calls, {} failed)",
            block.duration.as_secs_f64(),
            block.call_count,
            block.failed_count
        );
        state.completed.push(block);
    }

    /// Blocks closed so far, in completion order.
    #[must_use]
    pub fn completed_blocks(&self) -> Vec<OperationBlock> {
        self.state().completed.clone()
    }

    /// Names and elapsed time of blocks still running, longest first.
    #[must_use]
    pub fn open_blocks(&self) -> Vec<(String, Duration)> {
        let mut open: Vec<_> = self
            .state()
            .open
            .iter()
            .map(|(name, block)| (name.clone(), block.started.elapsed()))
            .collect();
        open.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        open
    }

    /// Run-wide `(calls, failed)` totals.
    #[must_use]
    pub fn totals(&self) -> (u64, u64) {
        let state = self.state();
        (state.total_calls, state.total_failed)
    }

    /// Build a performance report from everything recorded so far.
    ///
    /// Blocks still open are not included.
    #[must_use]
    pub fn report(&self) -> PerformanceReport {
        let state = self.state();
        let now = Utc::now();
        build_report_at(
            &state.completed,
            state.total_calls,
            state.total_failed,
            state.project_count,
            state.run_start.unwrap_or(now),
            now,
        )
    }
}

impl Default for BlockTracker {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn double_start_keeps_original_timer() {
        let tracker = BlockTracker::new(10);
        tracker.start_block("pipelines");
        tracker.record_call("pipelines", true, None);
        std::thread::sleep(Duration::from_millis(20));
        tracker.start_block("pipelines");
        tracker.record_call("pipelines", true, None);
        tracker.end_block("pipelines", 7);

        let blocks = tracker.completed_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].call_count, 2);
        assert_eq!(blocks[0].total_items, 7);
        assert!(blocks[0].duration >= Duration::from_millis(20));
        assert!(blocks[0].ended_at >= blocks[0].started_at);
    }

    #[test]
    fn end_without_start_is_ignored() {
        let tracker = BlockTracker::new(10);
        tracker.end_block("never", 3);
        assert!(tracker.completed_blocks().is_empty());
    }

    #[test]
    fn calls_outside_blocks_count_toward_totals_only() {
        let tracker = BlockTracker::new(10);
        tracker.record_call("closed", false, Some("404 Not Found"));
        tracker.start_block("open");
        tracker.record_call("open", true, None);
        tracker.end_block("open", 0);

        assert_eq!(tracker.totals(), (2, 1));
        let blocks = tracker.completed_blocks();
        assert_eq!(blocks[0].call_count, 1);
        assert_eq!(blocks[0].failed_count, 0);
        assert!(blocks[0].sampled_errors.is_empty());
    }

    #[test]
    fn error_samples_are_capped() {
        let tracker = BlockTracker::new(2);
        tracker.start_block("jobs");
        for i in 0..5 {
            tracker.record_call("jobs", false, Some(&format!("500 error {i}")));
        }
        tracker.record_call("jobs", false, None);
        tracker.end_block("jobs", 0);

        let block = &tracker.completed_blocks()[0];
        assert_eq!(block.failed_count, 6);
        assert_eq!(block.sampled_errors, ["500 error 0", "500 error 1"]);
        assert_eq!(block.dropped_errors, 3);
    }

    #[test]
    fn reopened_name_creates_new_block() {
        let tracker = BlockTracker::new(10);
        tracker.start_block("issues");
        tracker.end_block("issues", 1);
        tracker.start_block("issues");
        tracker.end_block("issues", 2);

        let items: Vec<u64> = tracker.completed_blocks().iter().map(|b| b.total_items).collect();
        assert_eq!(items, [1, 2]);
    }

    #[test]
    fn open_blocks_are_listed() {
        let tracker = BlockTracker::new(10);
        tracker.start_block("a");
        std::thread::sleep(Duration::from_millis(5));
        tracker.start_block("b");

        let open = tracker.open_blocks();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].0, "a");

        tracker.end_block("a", 0);
        assert_eq!(tracker.open_blocks().len(), 1);
    }

    #[test]
    fn concurrent_recording_is_consistent() {
        let tracker = Arc::new(BlockTracker::new(1000));
        tracker.start_block("shared");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        tracker.record_call("shared", i % 10 != 0, Some("timeout"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        tracker.end_block("shared", 800);

        let block = &tracker.completed_blocks()[0];
        assert_eq!(block.call_count, 800);
        assert_eq!(block.failed_count, 80);
        assert_eq!(tracker.totals(), (800, 80));
    }

    #[test]
    fn report_uses_run_totals() {
        let tracker = BlockTracker::default();
        tracker.start_collection();
        tracker.set_project_count(3);
        tracker.start_block("projects");
        tracker.record_call("projects", false, Some("403 Forbidden"));
        tracker.record_call("projects", true, None);
        tracker.end_block("projects", 1);
        tracker.start_block("still running");

        let report = tracker.report();
        assert_eq!(report.project_count, 3);
        assert_eq!(report.total_calls, 2);
        assert_eq!(report.total_failed, 1);
        assert_eq!(report.blocks.len(), 1);
    }
}
