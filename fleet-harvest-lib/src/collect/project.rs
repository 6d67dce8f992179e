use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// Identifier of a project as assigned by the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl Display for ProjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProjectId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Lightweight description of a project, as returned by the project lister.
///
/// The fingerprint is opaque: it is only ever compared for equality to decide whether a
/// previously collected record is still valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub id: ProjectId,
    pub fingerprint: String,
    pub name: String,
}

impl ProjectDescriptor {
    #[must_use]
    pub fn new(id: impl Into<ProjectId>, fingerprint: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fingerprint: fingerprint.into(),
            name: name.into(),
        }
    }
}

impl Display for ProjectDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (#{})", self.name, self.id)
    }
}

/// A collected metrics payload together with the descriptor it was collected for.
///
/// This is the one record shape used everywhere, whether the data was just fetched or carried
/// over from a snapshot, so the fingerprint that validated it always travels with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord<R> {
    pub project: ProjectDescriptor,
    pub data: R,
}

impl<R> ProjectRecord<R> {
    #[must_use]
    pub const fn new(project: ProjectDescriptor, data: R) -> Self {
        Self { project, data }
    }

    #[must_use]
    pub const fn id(&self) -> ProjectId {
        self.project.id
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.project.fingerprint
    }
}
