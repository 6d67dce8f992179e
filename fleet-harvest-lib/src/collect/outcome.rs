use super::project::{ProjectDescriptor, ProjectId, ProjectRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Markers that identify server-side failures in an error message.
const SERVER_ERROR_MARKERS: [&str; 5] = ["500", "502", "503", "504", "internal server error"];

/// Coarse classification of a failed remote operation.
///
/// The remote source is treated as an opaque fallible function, so categories are derived from
/// the text of its error messages rather than from typed errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    PermissionDenied,
    NotFound,
    ServerError,
    Timeout,
    Other,
}

impl ErrorCategory {
    /// Classify an error message by the markers it contains.
    ///
    /// Markers are checked in a fixed order, so a message mentioning both `403` and a timeout is
    /// a permission problem.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();

        if lower.contains("403") || lower.contains("forbidden") || lower.contains("permission denied") {
            Self::PermissionDenied
        } else if lower.contains("404") || lower.contains("not found") {
            Self::NotFound
        } else if SERVER_ERROR_MARKERS.iter().any(|marker| lower.contains(marker)) {
            Self::ServerError
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else {
            Self::Other
        }
    }

    /// A short text that [`classify`](Self::classify) maps back to this category.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::PermissionDenied => "403 forbidden",
            Self::NotFound => "404 not found",
            Self::ServerError => "500 internal server error",
            Self::Timeout => "timeout",
            Self::Other => "other error",
        }
    }
}

/// A project that could not be collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub project_id: ProjectId,
    pub project_name: String,
    pub category: ErrorCategory,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Failure {
    #[must_use]
    pub fn new(project: &ProjectDescriptor, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            project_id: project.id,
            project_name: project.name.clone(),
            category,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a failure whose category is derived from its message.
    #[must_use]
    pub fn classified(project: &ProjectDescriptor, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(project, ErrorCategory::classify(&message), message)
    }

    #[must_use]
    pub fn timeout(project: &ProjectDescriptor, message: impl Into<String>) -> Self {
        Self::new(project, ErrorCategory::Timeout, message)
    }

    /// The error text to sample into telemetry.
    ///
    /// Telemetry re-classifies sampled text, so when the message would land in a different
    /// category (say, a timeout message mentioning "500.0s") the category's marker is used instead.
    #[must_use]
    pub fn telemetry_message(&self) -> &str {
        if ErrorCategory::classify(&self.message) == self.category {
            &self.message
        } else {
            self.category.marker()
        }
    }
}

/// The result of collecting a single project.
///
/// Exactly one outcome is produced per project. Ownership of the payload moves from the task
/// that produced it to the pipeline consumer when it is enqueued.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome<R> {
    Success(ProjectRecord<R>),
    Failure(Failure),
}
