#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Concurrent, incremental metrics collection across a fleet of projects
//!
//! This library gathers per-project metrics from a slow, paginated, occasionally failing remote
//! source under a fixed wall-clock budget. It does not know what a metrics record contains; callers
//! supply a collector function per project and get back a deduplicated dataset, an explicit list of
//! failures, and a performance report explaining where the time went.
//!
//! # Module Organization
//!
//! - [`collect`]: The bounded worker pool, result pipeline, and shared progress counters
//! - [`telemetry`]: Named operation-block timers and the performance report derived from them
//! - [`incremental`]: Fingerprint-based change selection and merging with cached data
//! - [`snapshot`]: Persistence of collected datasets between runs
//! - [`config`]: TOML configuration and logging setup
//!
//! The [`Harvester`] ties these together into a single entry point.

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod collect;
pub mod config;
mod harvester;
pub mod incremental;
pub mod snapshot;
pub mod telemetry;

pub use collect::{
    CollectOptions, CollectionOutcome, CollectionSummary, ErrorCategory, Failure, Progress, ProgressReporter, ProjectDescriptor,
    ProjectId, ProjectRecord, SilentProgress, TaskContext,
};
pub use config::Config;
pub use harvester::{Harvest, HarvestMode, Harvester, LISTING_BLOCK, ProjectLister};
pub use incremental::{CachedDataset, FinalDataset, merge, select_changed};
pub use snapshot::{JsonSnapshotStore, Snapshot, SnapshotStore};
pub use telemetry::{BlockTracker, OperationBlock, PerformanceReport, build_report};
