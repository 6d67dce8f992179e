use super::lock::{SnapshotLock, acquire_snapshot_lock};
use super::{SNAPSHOT_VERSION, Snapshot, SnapshotStore};
use crate::Result;
use crate::collect::ProjectRecord;
use crate::telemetry::PerformanceReport;
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "  snapshot";

/// The on-disk shape, with records and report left undecoded so one bad entry can't sink the load.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    version: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    records: Vec<Value>,
    #[serde(default)]
    performance: Option<Value>,
}

/// Stores a snapshot as a single JSON file.
///
/// The store holds an exclusive lock on `<file>.lock` for as long as it lives, so two runs
/// sharing a snapshot file take turns rather than interleaving their writes.
#[derive(Debug)]
pub struct JsonSnapshotStore {
    path: PathBuf,
    _lock: SnapshotLock,
}

impl JsonSnapshotStore {
    /// Open the store at `path`, waiting for any other holder to release it.
    ///
    /// The parent directory is created if needed; the snapshot file itself need not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock cannot be taken.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{}'", parent.display()))?;
        }

        let lock = acquire_snapshot_lock(&path).await?;
        Ok(Self { path, _lock: lock })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<Option<RawSnapshot>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!(target: LOG_TARGET, "No snapshot at '{}'", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e).into_app_err_with(|| format!("opening snapshot '{}'", self.path.display())),
        };

        let raw = serde_json::from_reader(BufReader::new(file))
            .into_app_err_with(|| format!("parsing snapshot '{}'", self.path.display()))?;
        Ok(Some(raw))
    }
}

/// Decode each record on its own, skipping the ones that no longer fit `R`.
fn decode_records<R: DeserializeOwned>(raw: Vec<Value>) -> Vec<ProjectRecord<R>> {
    let total = raw.len();
    let records: Vec<ProjectRecord<R>> = raw
        .into_iter()
        .filter_map(|value| {
            let name = value
                .pointer("/project/name")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Skipping unreadable snapshot record for '{name}': {e}");
                    None
                }
            }
        })
        .collect();

    if records.len() < total {
        log::warn!(target: LOG_TARGET, "Loaded {} of {total} snapshot record(s)", records.len());
    }
    records
}

impl<R> SnapshotStore<R> for JsonSnapshotStore
where
    R: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<Snapshot<R>>> {
        let Some(raw) = self.read_raw()? else {
            return Ok(None);
        };

        if raw.version != SNAPSHOT_VERSION {
            log::warn!(
                target: LOG_TARGET,
                "Ignoring snapshot '{}' with unsupported version {} (expected {SNAPSHOT_VERSION})",
                self.path.display(),
                raw.version
            );
            return Ok(None);
        }

        let performance = raw.performance.and_then(|value| match serde_json::from_value::<PerformanceReport>(value) {
            Ok(report) => Some(report),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Ignoring unreadable performance report: {e}");
                None
            }
        });

        let snapshot = Snapshot {
            version: raw.version,
            timestamp: raw.timestamp,
            records: decode_records(raw.records),
            performance,
        };

        log::info!(
            target: LOG_TARGET,
            "Loaded {} record(s) from '{}' ({})",
            snapshot.records.len(),
            self.path.display(),
            snapshot.age_description(Utc::now())
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot<R>) -> Result<()> {
        let mut tmp_name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let file = File::create(&tmp_path).into_app_err_with(|| format!("creating snapshot file '{}'", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);

        #[cfg(debug_assertions)]
        let result = serde_json::to_writer_pretty(&mut writer, snapshot);
        #[cfg(not(debug_assertions))]
        let result = serde_json::to_writer(&mut writer, snapshot);

        result.into_app_err_with(|| format!("writing snapshot file '{}'", tmp_path.display()))?;
        writer
            .flush()
            .into_app_err_with(|| format!("flushing snapshot file '{}'", tmp_path.display()))?;
        drop(writer);

        fs::rename(&tmp_path, &self.path)
            .into_app_err_with(|| format!("replacing snapshot '{}'", self.path.display()))?;

        log::info!(target: LOG_TARGET, "Saved {} record(s) to '{}'", snapshot.records.len(), self.path.display());
        Ok(())
    }
}
