//! Concurrent collection of per-project metrics
//!
//! This module fans one collection task out per project onto a bounded pool of concurrent
//! workers, funnels every outcome through a single-consumer pipeline, and keeps a set of
//! atomic progress counters that any number of observers can read.
//!
//! # Implementation Model
//!
//! [`collect_projects`] is the orchestrator. For each [`ProjectDescriptor`] it spawns a task
//! that waits for a slot from the [`Throttler`], invokes the caller's collector with a
//! [`TaskContext`], and enqueues the resulting [`CollectionOutcome`] on the
//! [`ResultPipeline`]. The pipeline's consumer is the only code that appends to the result
//! lists, so producers never contend on them.
//!
//! A single global deadline bounds the whole batch. When it fires, queued tasks are released
//! without running, in-flight tasks are asked to stop through their cancellation token, and
//! every unresolved project is recorded as a [`Failure`] with [`ErrorCategory::Timeout`].
//! Each project is settled exactly once, by whichever of its task or the deadline handler gets
//! there first.

use core::time::Duration;

/// Longest wait ever scheduled on a clock; larger configured durations are clamped to it.
const MAX_WAIT: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

mod collector;
mod outcome;
mod pipeline;
mod progress;
mod progress_counters;
mod progress_reporter;
mod project;
mod throttler;

pub use collector::{COLLECTION_BLOCK, CollectOptions, Collection, CollectionSummary, TaskContext, Throughput, collect_projects};
pub use outcome::{CollectionOutcome, ErrorCategory, Failure};
pub use pipeline::{Collected, Producer, ResultPipeline};
pub use progress::{DeterminateCallback, IndeterminateCallback, Progress, SilentProgress};
pub use progress_counters::{InFlight, ProgressCounters, ProgressSnapshot};
pub use progress_reporter::ProgressReporter;
pub use project::{ProjectDescriptor, ProjectId, ProjectRecord};
pub use throttler::Throttler;
