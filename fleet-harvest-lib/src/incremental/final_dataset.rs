use crate::collect::{ProjectId, ProjectRecord};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// The outcome of a run: at most one record per project, iterated in ascending id order.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalDataset<R> {
    records: BTreeMap<ProjectId, ProjectRecord<R>>,
}

impl<R> Default for FinalDataset<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> FinalDataset<R> {
    #[must_use]
    pub const fn new() -> Self {
        Self { records: BTreeMap::new() }
    }

    /// Add `record` unless a record with the same id is already present.
    pub(crate) fn insert_if_absent(&mut self, record: ProjectRecord<R>) -> bool {
        match self.records.entry(record.id()) {
            Entry::Vacant(slot) => {
                let _ = slot.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
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
    pub fn get(&self, id: ProjectId) -> Option<&ProjectRecord<R>> {
        self.records.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectRecord<R>> {
        self.records.values()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<ProjectRecord<R>> {
        self.records.into_values().collect()
    }
}

impl<R> IntoIterator for FinalDataset<R> {
    type Item = ProjectRecord<R>;
    type IntoIter = std::collections::btree_map::IntoValues<ProjectId, ProjectRecord<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl<'a, R> IntoIterator for &'a FinalDataset<R> {
    type Item = &'a ProjectRecord<R>;
    type IntoIter = std::collections::btree_map::Values<'a, ProjectId, ProjectRecord<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}

impl<R> FromIterator<ProjectRecord<R>> for FinalDataset<R> {
    /// Collect records, keeping the first one seen for each id.
    fn from_iter<I: IntoIterator<Item = ProjectRecord<R>>>(iter: I) -> Self {
        let mut dataset = Self::new();
        for record in iter {
            let _ = dataset.insert_if_absent(record);
        }
        dataset
    }
}

impl<R: Serialize> Serialize for FinalDataset<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.values())
    }
}
