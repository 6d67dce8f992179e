//! Timing and classification of remote operations
//!
//! A *block* is a named category of remote operations (listing projects, fetching pipelines,
//! collecting a whole batch, ...) timed as a single span. [`BlockTracker`] keeps the open and
//! completed blocks along with run-wide call totals, and [`build_report`] turns them into a
//! [`PerformanceReport`] with the slowest blocks, an error histogram, and recommendations.
//!
//! Tracking never fails: unknown block names and double starts are ignored, so telemetry cannot
//! interfere with the collection it observes.

mod block_tracker;
mod report;

pub use block_tracker::{BlockTracker, OperationBlock};
pub use report::{PerformanceReport, SLOWEST_BLOCK_COUNT, build_report, build_report_at};
