//! Persistence of collected datasets between runs
//!
//! A [`Snapshot`] is what one run leaves behind for the next: every record it produced, when it
//! was taken, and the run's performance report. Incremental runs load the previous snapshot to
//! decide which projects can be skipped.
//!
//! [`SnapshotStore`] abstracts over where snapshots live. [`JsonSnapshotStore`] keeps them in a
//! single JSON file guarded by an advisory lock.

mod json_store;
mod lock;

pub use json_store::JsonSnapshotStore;

use crate::Result;
use crate::collect::ProjectRecord;
use crate::telemetry::PerformanceReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// A dataset as saved at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<R> {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub records: Vec<ProjectRecord<R>>,
    pub performance: Option<PerformanceReport>,
}

impl<R> Snapshot<R> {
    /// A snapshot of `records` taken now, in the current format version.
    #[must_use]
    pub fn new(records: Vec<ProjectRecord<R>>, performance: Option<PerformanceReport>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: Utc::now(),
            records,
            performance,
        }
    }

    /// Human-readable age relative to `now`, such as "3 days old".
    #[must_use]
    pub fn age_description(&self, now: DateTime<Utc>) -> String {
        let age = now.signed_duration_since(self.timestamp);
        if age.num_days() > 0 {
            format!("{} days old", age.num_days())
        } else if age.num_hours() > 0 {
            format!("{} hours old", age.num_hours())
        } else {
            format!("{} minutes old", age.num_minutes().max(0))
        }
    }
}

/// Somewhere a snapshot can be loaded from and saved to.
pub trait SnapshotStore<R> {
    /// Load the most recent snapshot, or `None` if there isn't one.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot exists but cannot be read at all.
    fn load(&self) -> Result<Option<Snapshot<R>>>;

    /// Replace the stored snapshot with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save(&self, snapshot: &Snapshot<R>) -> Result<()>;
}
