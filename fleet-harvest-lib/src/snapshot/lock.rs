use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "  snapshot";

/// Holds an exclusive advisory lock on a snapshot until dropped.
#[derive(Debug)]
pub struct SnapshotLock {
    file: File,
    path: PathBuf,
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!(target: LOG_TARGET, "Could not unlock '{}': {e:#}", self.path.display());
        }
    }
}

/// Path of the lock file guarding the snapshot at `snapshot_path`.
pub fn lock_path_for(snapshot_path: &Path) -> PathBuf {
    let mut name = snapshot_path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".lock");
    snapshot_path.with_file_name(name)
}

/// Wait for an exclusive lock on the snapshot at `snapshot_path`.
pub async fn acquire_snapshot_lock(snapshot_path: &Path) -> Result<SnapshotLock> {
    let lock_path = lock_path_for(snapshot_path);

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("opening snapshot lock file at '{}'", lock_path.display()))?;

    // may block for as long as another run holds the snapshot
    let (file, path) = tokio::task::spawn_blocking(move || {
        file.lock_exclusive()
            .into_app_err_with(|| format!("acquiring exclusive lock at '{}'", lock_path.display()))?;
        log::debug!(target: LOG_TARGET, "Acquired snapshot lock at '{}'", lock_path.display());
        Ok::<_, ohno::AppError>((file, lock_path))
    })
    .await
    .into_app_err("lock task panicked")??;

    Ok(SnapshotLock { file, path })
}
