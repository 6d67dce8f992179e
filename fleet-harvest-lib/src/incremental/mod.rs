//! Fingerprint-based incremental collection
//!
//! Between runs, a project only needs to be collected again when its fingerprint has changed or
//! it is new. [`select_changed`] picks those projects out of the current listing, and [`merge`]
//! combines their fresh records with the cached records of everything else.
//!
//! Deletions propagate only if the cached dataset is first restricted to the projects that still
//! exist, using [`CachedDataset::retain_current`]. Otherwise a project removed upstream would be
//! carried forward from the cache forever.

mod cached;
mod final_dataset;

pub use cached::CachedDataset;
pub use final_dataset::FinalDataset;

use crate::collect::{ProjectDescriptor, ProjectRecord};

const LOG_TARGET: &str = "     merge";

/// Descriptors from `current` that are new or whose fingerprint differs from the cached one.
///
/// Pure and idempotent. With an empty cache, returns all of `current`.
#[must_use]
pub fn select_changed<R>(current: &[ProjectDescriptor], cached: &CachedDataset<R>) -> Vec<ProjectDescriptor> {
    current
        .iter()
        .filter(|project| cached.fingerprint(project.id) != Some(project.fingerprint.as_str()))
        .cloned()
        .collect()
}

/// Combine freshly collected records with cached ones.
///
/// Every fresh record is kept; a cached record is kept only if no fresh record has its id. If
/// `fresh` itself lists an id more than once, the first record wins. The result never holds two
/// records for the same project.
#[must_use]
pub fn merge<R>(fresh: Vec<ProjectRecord<R>>, cached: CachedDataset<R>) -> FinalDataset<R> {
    let mut dataset = FinalDataset::new();
    for record in fresh {
        let _ = dataset.insert_if_absent(record);
    }

    let mut carried = 0usize;
    for record in cached.into_records() {
        if dataset.insert_if_absent(record) {
            carried += 1;
        }
    }

    log::debug!(target: LOG_TARGET, "Merged {} record(s), {carried} carried over from cache", dataset.len());
    dataset
}
