use crate::collect::{ProjectDescriptor, ProjectId, ProjectRecord};
use crate::snapshot::Snapshot;
use std::collections::{BTreeMap, HashSet};

/// Records from a previous run, keyed by project id. Read-only during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDataset<R> {
    records: BTreeMap<ProjectId, ProjectRecord<R>>,
}

impl<R> Default for CachedDataset<R> {
    fn default() -> Self {
        Self { records: BTreeMap::new() }
    }
}

impl<R> CachedDataset<R> {
    /// Index `records` by id. If an id repeats, the first record wins.
    pub fn from_records(records: impl IntoIterator<Item = ProjectRecord<R>>) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            let _ = map.entry(record.id()).or_insert(record);
        }
        Self { records: map }
    }

    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot<R>) -> Self {
        Self::from_records(snapshot.records)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: ProjectId) -> bool {
        self.records.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: ProjectId) -> Option<&ProjectRecord<R>> {
        self.records.get(&id)
    }

    /// Fingerprint the cached record for `id` was collected at.
    #[must_use]
    pub fn fingerprint(&self, id: ProjectId) -> Option<&str> {
        self.records.get(&id).map(ProjectRecord::fingerprint)
    }

    /// Drop every record whose project is not in `current`.
    #[must_use]
    pub fn retain_current(mut self, current: &[ProjectDescriptor]) -> Self {
        let ids: HashSet<ProjectId> = current.iter().map(|p| p.id).collect();
        let before = self.records.len();
        self.records.retain(|id, _| ids.contains(id));

        let removed = before - self.records.len();
        if removed > 0 {
            log::debug!(target: super::LOG_TARGET, "Dropped {removed} cached record(s) for projects no longer listed");
        }
        self
    }

    /// Records in ascending id order.
    #[must_use]
    pub fn into_records(self) -> Vec<ProjectRecord<R>> {
        self.records.into_values().collect()
    }
}
