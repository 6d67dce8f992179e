use super::block_tracker::OperationBlock;
use crate::collect::ErrorCategory;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many of the slowest blocks a report lists.
pub const SLOWEST_BLOCK_COUNT: usize = 5;

const SLOW_BLOCK_THRESHOLD: Duration = Duration::from_secs(60);
const HIGH_ERROR_RATE: f64 = 0.10;
const PERMISSION_DENIED_THRESHOLD: u64 = 10;
const SERVER_ERROR_THRESHOLD: u64 = 5;
const HEAVY_CALL_VOLUME: u64 = 1000;

/// Summary of where a collection run spent its time and how its remote calls fared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,

    pub project_count: u64,
    pub total_calls: u64,
    pub total_failed: u64,

    /// Every completed block, in completion order.
    pub blocks: Vec<OperationBlock>,

    /// The slowest completed blocks, slowest first.
    pub slowest_blocks: Vec<OperationBlock>,

    /// Sampled error messages tallied by category. Categories with no samples are absent.
    pub error_histogram: BTreeMap<ErrorCategory, u64>,

    pub recommendations: Vec<String>,
}

impl PerformanceReport {
    /// Fraction of remote calls that failed, or 0 when no calls were made.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        ratio(self.total_failed, self.total_calls)
    }

    #[must_use]
    pub fn errors_in(&self, category: ErrorCategory) -> u64 {
        self.error_histogram.get(&category).copied().unwrap_or(0)
    }
}

/// Build a report as of now. See [`build_report_at`].
#[must_use]
pub fn build_report(
    completed_blocks: &[OperationBlock],
    total_calls: u64,
    total_failed: u64,
    project_count: u64,
    run_start: DateTime<Utc>,
) -> PerformanceReport {
    build_report_at(completed_blocks, total_calls, total_failed, project_count, run_start, Utc::now())
}

/// Build a report for a run spanning `run_start..now`.
///
/// Pure: the result depends only on the arguments.
#[must_use]
pub fn build_report_at(
    completed_blocks: &[OperationBlock],
    total_calls: u64,
    total_failed: u64,
    project_count: u64,
    run_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> PerformanceReport {
    let mut slowest_blocks = completed_blocks.to_vec();
    slowest_blocks.sort_by(|a, b| b.duration.cmp(&a.duration));
    slowest_blocks.truncate(SLOWEST_BLOCK_COUNT);

    let mut error_histogram = BTreeMap::new();
    for message in completed_blocks.iter().flat_map(|b| &b.sampled_errors) {
        *error_histogram.entry(ErrorCategory::classify(message)).or_insert(0) += 1;
    }

    let mut report = PerformanceReport {
        started_at: run_start,
        ended_at: now,
        total_duration: (now - run_start).to_std().unwrap_or_default(),
        project_count,
        total_calls,
        total_failed,
        blocks: completed_blocks.to_vec(),
        slowest_blocks,
        error_histogram,
        recommendations: Vec::new(),
    };
    report.recommendations = recommend(&report);
    report
}

fn recommend(report: &PerformanceReport) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(slowest) = report.slowest_blocks.first()
        && slowest.duration > SLOW_BLOCK_THRESHOLD
    {
        recommendations.push(format!(
            "'{}' took {:.1}s; consider isolating or optimizing this operation",
            slowest.name,
            slowest.duration.as_secs_f64()
        ));
    }

    let error_rate = report.error_rate();
    if error_rate > HIGH_ERROR_RATE {
        recommendations.push(format!(
            "High error rate: {:.1}% of remote calls failed; check the source's health and access permissions",
            error_rate * 100.0
        ));
    }

    if report.errors_in(ErrorCategory::PermissionDenied) > PERMISSION_DENIED_THRESHOLD {
        recommendations.push(
            "Many permission errors; some data may be unavailable with the current credentials".to_string(),
        );
    }

    if report.errors_in(ErrorCategory::ServerError) > SERVER_ERROR_THRESHOLD {
        recommendations.push("Server errors detected; the source may be under load, consider collecting off-peak".to_string());
    }

    if report.total_calls > HEAVY_CALL_VOLUME {
        recommendations.push(format!(
            "Made {} remote calls; use incremental mode to reuse cached data on subsequent runs",
            report.total_calls
        ));
    }

    recommendations
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }

    #[expect(clippy::cast_precision_loss, reason = "call counts are far below 2^52")]
    let r = part as f64 / whole as f64;
    r
}

impl Display for PerformanceReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Collection performance")?;
        writeln!(f, "  Duration:  {:.1}s", self.total_duration.as_secs_f64())?;
        writeln!(f, "  Projects:  {}", self.project_count)?;
        writeln!(
            f,
            "  Calls:     {} ({} failed, {:.1}%)",
            self.total_calls,
            self.total_failed,
            self.error_rate() * 100.0
        )?;

        if !self.slowest_blocks.is_empty() {
            writeln!(f, "Slowest operations:")?;
            for block in &self.slowest_blocks {
                writeln!(
                    f,
                    "  {}: {:.1}s ({} calls, {} items)",
                    block.name,
                    block.duration.as_secs_f64(),
                    block.call_count,
                    block.total_items
                )?;
            }
        }

        if !self.error_histogram.is_empty() {
            writeln!(f, "Errors:")?;
            for (category, count) in &self.error_histogram {
                writeln!(f, "  {category}: {count}")?;
            }
        }

        if !self.recommendations.is_empty() {
            writeln!(f, "Recommendations:")?;
            for recommendation in &self.recommendations {
                writeln!(f, "  - {recommendation}")?;
            }
        }

        Ok(())
    }
}
