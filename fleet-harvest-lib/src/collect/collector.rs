use super::outcome::{CollectionOutcome, ErrorCategory, Failure};
use super::pipeline::{Collected, Producer, ResultPipeline};
use super::progress::Progress;
use super::progress_counters::ProgressCounters;
use super::project::{ProjectDescriptor, ProjectId, ProjectRecord};
use super::throttler::Throttler;
use crate::telemetry::BlockTracker;
use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = " collector";

/// Name of the operation block that spans a whole collection batch.
pub const COLLECTION_BLOCK: &str = "Project Collection";

/// Error markers that mean the remote source is rate limiting us.
const RATE_LIMIT_MARKERS: [&str; 3] = ["429", "rate limit", "too many requests"];

/// How many unfinished project names to include in the deadline warning.
const MAX_LOGGED_UNFINISHED: usize = 5;

/// Tuning knobs for one collection batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectOptions {
    /// Number of collection tasks allowed to run at once.
    pub worker_count: usize,

    /// Upper bound on the wall-clock time of the whole batch.
    pub global_timeout: Duration,

    /// Upper bound on a single project's collection, if any.
    pub project_timeout: Option<Duration>,

    /// How long to wait for the result consumer to drain once the batch is over.
    pub consumer_join_timeout: Duration,

    /// How long the result consumer blocks on an empty queue before polling again.
    pub queue_poll_interval: Duration,

    /// How long to stop dispatching new projects after the source reports rate limiting.
    pub rate_limit_pause: Duration,

    /// Maximum number of error messages sampled per operation block.
    pub max_sampled_errors: usize,
}

impl CollectOptions {
    /// Worker count used when none is configured: twice the available hardware parallelism,
    /// since tasks spend most of their time waiting on the network.
    #[must_use]
    pub fn default_worker_count() -> usize {
        std::thread::available_parallelism().map_or(4, NonZeroUsize::get) * 2
    }
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            worker_count: Self::default_worker_count(),
            global_timeout: Duration::from_secs(30 * 60),
            project_timeout: Some(Duration::from_secs(5 * 60)),
            consumer_join_timeout: Duration::from_secs(30),
            queue_poll_interval: Duration::from_secs(1),
            rate_limit_pause: Duration::from_secs(30),
            max_sampled_errors: 50,
        }
    }
}

/// What a collector function gets to work with for one project.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub project: ProjectDescriptor,

    /// Cancelled when the batch deadline expires. Long-running collectors should check it
    /// between remote calls and bail out early.
    pub cancel: CancellationToken,

    /// Shared telemetry for timing the collector's own remote operations.
    pub tracker: Arc<BlockTracker>,
}

impl TaskContext {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// How fast a batch went, judged by projects collected per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Throughput {
    Slow,
    Moderate,
    Fast,
}

/// Headline statistics of a collection batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub total_projects: u64,
    pub collected: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub deadline_expired: bool,
    pub workers: usize,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl CollectionSummary {
    #[must_use]
    pub fn projects_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            #[expect(clippy::cast_precision_loss, reason = "project counts are far below 2^52")]
            let collected = self.collected as f64;
            collected / secs
        } else {
            0.0
        }
    }

    /// Fraction of projects collected successfully, in `0.0..=1.0`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_projects == 0 {
            return 0.0;
        }

        #[expect(clippy::cast_precision_loss, reason = "project counts are far below 2^52")]
        let rate = self.collected as f64 / self.total_projects as f64;
        rate
    }

    #[must_use]
    pub fn throughput(&self) -> Throughput {
        let rate = self.projects_per_second();
        if rate < 0.5 {
            Throughput::Slow
        } else if rate < 2.0 {
            Throughput::Moderate
        } else {
            Throughput::Fast
        }
    }
}

/// Raw result of [`collect_projects`], in arrival order.
#[derive(Debug)]
pub struct Collection<R> {
    pub records: Vec<ProjectRecord<R>>,
    pub failures: Vec<Failure>,
    pub summary: CollectionSummary,
}

/// Per-project bookkeeping shared between a task and the orchestrator.
#[derive(Debug)]
struct ProjectSlot {
    project: ProjectDescriptor,
    settled: AtomicBool,
}

impl ProjectSlot {
    const fn new(project: ProjectDescriptor) -> Self {
        Self {
            project,
            settled: AtomicBool::new(false),
        }
    }
}

/// Records each project's outcome exactly once.
#[derive(Debug)]
struct Settler<R> {
    counters: Arc<ProgressCounters>,
    tracker: Arc<BlockTracker>,
    producer: Producer<R>,
}

impl<R> Settler<R> {
    /// Count and enqueue `outcome` unless the project was already settled.
    fn settle(&self, slot: &ProjectSlot, outcome: CollectionOutcome<R>) -> bool {
        if slot.settled.swap(true, Ordering::AcqRel) {
            log::debug!(target: LOG_TARGET, "Dropping late outcome for {}", slot.project);
            return false;
        }

        match &outcome {
            CollectionOutcome::Success(_) => {
                self.counters.record_success();
                self.tracker.record_call(COLLECTION_BLOCK, true, None);
            }
            CollectionOutcome::Failure(failure) => {
                self.counters.record_failure();
                self.tracker.record_call(COLLECTION_BLOCK, false, Some(failure.telemetry_message()));
                log::warn!(target: LOG_TARGET, "Could not collect {}: [{}] {}", slot.project, failure.category, failure.message);
            }
        }

        if !self.producer.enqueue(outcome) {
            log::error!(target: LOG_TARGET, "Result consumer stopped early, outcome for {} lost", slot.project);
        }

        true
    }
}

/// Collect every project concurrently on a bounded pool of workers.
///
/// One task is spawned per project, but at most `options.worker_count` of them talk to the
/// remote source at a time. Each task's failure is recorded as a [`Failure`] and never affects
/// its siblings. Duplicate project ids are collected once.
///
/// The whole batch is bounded by `options.global_timeout`. When it expires, projects still
/// waiting for a worker are never started, running collectors see their cancellation token
/// fire, and every unresolved project is returned as an [`ErrorCategory::Timeout`] failure.
/// Running collectors are not interrupted; their results are simply discarded.
pub async fn collect_projects<R, F, Fut>(
    projects: Vec<ProjectDescriptor>,
    options: &CollectOptions,
    tracker: &Arc<BlockTracker>,
    progress: &dyn Progress,
    collector: F,
) -> Collection<R>
where
    R: Send + 'static,
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = crate::Result<R>> + Send + 'static,
{
    let started = Instant::now();
    let workers = options.worker_count.max(1);

    if projects.is_empty() {
        log::info!(target: LOG_TARGET, "No projects to collect");
        return Collection {
            records: Vec::new(),
            failures: Vec::new(),
            summary: summarize(&Collected::<R>::default(), 0, workers, false, started.elapsed()),
        };
    }

    let slots: Arc<[Arc<ProjectSlot>]> = dedup_by_id(projects).into_iter().map(|p| Arc::new(ProjectSlot::new(p))).collect();
    let total = slots.len() as u64;

    log::info!(target: LOG_TARGET, "Collecting {total} project(s) with {workers} worker(s)");
    progress.set_phase("Collecting");

    let counters = ProgressCounters::new(total);
    counters.attach(progress);

    tracker.start_block(COLLECTION_BLOCK);

    let pipeline = ResultPipeline::start(options.queue_poll_interval);
    let settler = Arc::new(Settler {
        counters: Arc::clone(&counters),
        tracker: Arc::clone(tracker),
        producer: pipeline.producer(),
    });

    let throttler = Throttler::new(workers);
    let cancel = CancellationToken::new();
    let collector = Arc::new(collector);

    let mut join_set = JoinSet::new();
    let mut task_slots = HashMap::with_capacity(slots.len());

    for slot in slots.iter() {
        let task = run_task(
            Arc::clone(slot),
            Arc::clone(&settler),
            Arc::clone(&throttler),
            cancel.clone(),
            Arc::clone(&collector),
            options.project_timeout,
            options.rate_limit_pause,
        );
        let handle = join_set.spawn(task);
        let _ = task_slots.insert(handle.id(), Arc::clone(slot));
    }

    let deadline = started + options.global_timeout.min(super::MAX_WAIT);
    let mut deadline_expired = false;

    loop {
        match tokio::time::timeout_at(deadline, join_set.join_next()).await {
            Ok(None) => break,
            Ok(Some(Ok(()))) => {}
            Ok(Some(Err(e))) => {
                if let Some(slot) = task_slots.get(&e.id()) {
                    let failure = Failure::new(&slot.project, ErrorCategory::Other, format!("collection task failed: {e}"));
                    let _ = settler.settle(slot, CollectionOutcome::Failure(failure));
                }
            }
            Err(_) => {
                deadline_expired = true;
                break;
            }
        }
    }

    if deadline_expired {
        throttler.close();
        cancel.cancel();

        let message = format!("timeout: global deadline of {:.1}s exceeded", options.global_timeout.as_secs_f64());
        let unfinished: Vec<&str> = slots
            .iter()
            .filter(|slot| settler.settle(slot, CollectionOutcome::Failure(Failure::timeout(&slot.project, message.as_str()))))
            .map(|slot| slot.project.name.as_str())
            .collect();

        log::warn!(
            target: LOG_TARGET,
            "Timeout reached with {} unfinished project(s): {}",
            unfinished.len(),
            unfinished.iter().take(MAX_LOGGED_UNFINISHED).copied().collect::<Vec<_>>().join(", ")
        );

        // in-flight tasks keep running in the background; their outcomes lose the settle race
        join_set.detach_all();
    }

    drop(settler);
    let collected = pipeline.finish(options.consumer_join_timeout).await;

    tracker.end_block(COLLECTION_BLOCK, collected.records.len() as u64);

    let summary = summarize(&collected, total, workers, deadline_expired, started.elapsed());
    log::info!(
        target: LOG_TARGET,
        "Collected {} of {} project(s) in {:.1}s ({} failed)",
        summary.collected,
        summary.total_projects,
        summary.elapsed.as_secs_f64(),
        summary.failed
    );

    Collection {
        records: collected.records,
        failures: collected.failures,
        summary,
    }
}

/// The body of one collection task.
async fn run_task<R, F, Fut>(
    slot: Arc<ProjectSlot>,
    settler: Arc<Settler<R>>,
    throttler: Arc<Throttler>,
    cancel: CancellationToken,
    collector: Arc<F>,
    project_timeout: Option<Duration>,
    rate_limit_pause: Duration,
) where
    F: Fn(TaskContext) -> Fut,
    Fut: Future<Output = crate::Result<R>>,
{
    let Some(permit) = throttler.acquire().await else {
        log::debug!(target: LOG_TARGET, "Dispatch closed before {} started", slot.project);
        return;
    };

    if cancel.is_cancelled() {
        return;
    }

    let result = {
        let _active = settler.counters.start_task();
        let context = TaskContext {
            project: slot.project.clone(),
            cancel,
            tracker: Arc::clone(&settler.tracker),
        };
        invoke(collector.as_ref(), context, project_timeout).await
    };
    drop(permit);

    let outcome = match result {
        Ok(data) => CollectionOutcome::Success(ProjectRecord::new(slot.project.clone(), data)),
        Err(failure) => {
            if is_rate_limited(&failure.message) && throttler.pause_for(rate_limit_pause) {
                log::warn!(
                    target: LOG_TARGET,
                    "Rate limited while collecting {}, pausing dispatch for {:.0}s",
                    slot.project,
                    rate_limit_pause.as_secs_f64()
                );
            }
            CollectionOutcome::Failure(failure)
        }
    };

    let _ = settler.settle(&slot, outcome);
}

/// Run the collector for one project, applying the per-project timeout.
async fn invoke<R, F, Fut>(collector: &F, context: TaskContext, timeout: Option<Duration>) -> Result<R, Failure>
where
    F: Fn(TaskContext) -> Fut,
    Fut: Future<Output = crate::Result<R>>,
{
    let project = context.project.clone();
    let future = collector(context);

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(result) => result,
            Err(_) => {
                return Err(Failure::timeout(
                    &project,
                    format!("collection timed out after {:.1}s", limit.as_secs_f64()),
                ));
            }
        },
        None => future.await,
    };

    result.map_err(|e| Failure::classified(&project, e.to_string()))
}

fn is_rate_limited(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Keep the first descriptor for every project id.
fn dedup_by_id(projects: Vec<ProjectDescriptor>) -> Vec<ProjectDescriptor> {
    let mut seen: HashSet<ProjectId> = HashSet::with_capacity(projects.len());
    projects
        .into_iter()
        .filter(|project| {
            let fresh = seen.insert(project.id);
            if !fresh {
                log::warn!(target: LOG_TARGET, "Ignoring duplicate listing of {project}");
            }
            fresh
        })
        .collect()
}

fn summarize<R>(collected: &Collected<R>, total: u64, workers: usize, deadline_expired: bool, elapsed: Duration) -> CollectionSummary {
    CollectionSummary {
        total_projects: total,
        collected: collected.records.len() as u64,
        failed: collected.failures.len() as u64,
        timed_out: collected
            .failures
            .iter()
            .filter(|f| f.category == ErrorCategory::Timeout)
            .count() as u64,
        deadline_expired,
        workers,
        elapsed,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::collect::SilentProgress;
    use core::sync::atomic::AtomicUsize;
    use ohno::app_err;

    fn projects(count: u64) -> Vec<ProjectDescriptor> {
        (1..=count)
            .map(|id| ProjectDescriptor::new(id, format!("fp-{id}"), format!("group/project-{id}")))
            .collect()
    }

    fn options(workers: usize, global_timeout: Duration) -> CollectOptions {
        CollectOptions {
            worker_count: workers,
            global_timeout,
            project_timeout: None,
            consumer_join_timeout: Duration::from_secs(5),
            queue_poll_interval: Duration::from_millis(10),
            rate_limit_pause: Duration::from_millis(50),
            max_sampled_errors: 10,
        }
    }

    fn tracker() -> Arc<BlockTracker> {
        Arc::new(BlockTracker::new(10))
    }

    #[tokio::test]
    async fn empty_input_returns_immediately() {
        let collection = collect_projects(
            Vec::new(),
            &options(4, Duration::from_secs(1)),
            &tracker(),
            &SilentProgress,
            |_ctx: TaskContext| async { Ok(0u8) },
        )
        .await;

        assert!(collection.records.is_empty());
        assert!(collection.failures.is_empty());
        assert_eq!(collection.summary.total_projects, 0);
        assert!(!collection.summary.deadline_expired);
    }

    #[tokio::test]
    async fn every_project_settles_exactly_once() {
        let collection = collect_projects(
            projects(40),
            &options(3, Duration::from_secs(30)),
            &tracker(),
            &SilentProgress,
            |ctx: TaskContext| async move {
                tokio::time::sleep(Duration::from_millis(ctx.project.id.0 % 5)).await;
                if ctx.project.id.0 % 7 == 0 {
                    Err(app_err!("500 Internal Server Error"))
                } else {
                    Ok(ctx.project.id.0)
                }
            },
        )
        .await;

        assert_eq!(collection.records.len() + collection.failures.len(), 40);
        assert_eq!(collection.failures.len(), 5);
        assert!(collection.failures.iter().all(|f| f.category == ErrorCategory::ServerError));

        let mut ids: Vec<u64> = collection
            .records
            .iter()
            .map(|r| r.id().0)
            .chain(collection.failures.iter().map(|f| f.project_id.0))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=40).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn pool_size_bounds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let collection = {
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            collect_projects(
                projects(20),
                &options(4, Duration::from_secs(30)),
                &tracker(),
                &SilentProgress,
                move |_ctx: TaskContext| {
                    let active = Arc::clone(&active);
                    let max_seen = Arc::clone(&max_seen);
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        let _ = max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        let _ = active.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await
        };

        assert_eq!(collection.records.len(), 20);
        assert!(max_seen.load(Ordering::SeqCst) <= 4);
        assert_eq!(collection.summary.workers, 4);
    }

    #[tokio::test]
    async fn duplicate_ids_are_collected_once() {
        let mut input = projects(3);
        input.push(ProjectDescriptor::new(2, "other", "dupe"));

        let collection = collect_projects(
            input,
            &options(2, Duration::from_secs(5)),
            &tracker(),
            &SilentProgress,
            |ctx: TaskContext| async move { Ok(ctx.project.name) },
        )
        .await;

        assert_eq!(collection.records.len(), 3);
        assert_eq!(collection.summary.total_projects, 3);
        assert!(collection.records.iter().all(|r| r.data != "dupe"));
    }

    #[tokio::test]
    async fn per_project_timeout_is_classified_as_timeout() {
        let mut opts = options(2, Duration::from_secs(10));
        opts.project_timeout = Some(Duration::from_millis(50));

        let collection = collect_projects(projects(2), &opts, &tracker(), &SilentProgress, |ctx: TaskContext| async move {
            if ctx.project.id.0 == 1 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(())
        })
        .await;

        assert_eq!(collection.records.len(), 1);
        assert_eq!(collection.failures.len(), 1);
        assert_eq!(collection.failures[0].project_id, ProjectId(1));
        assert_eq!(collection.failures[0].category, ErrorCategory::Timeout);
        assert!(!collection.summary.deadline_expired);
    }

    #[tokio::test]
    async fn global_deadline_returns_partial_results() {
        let started = std::time::Instant::now();

        let collection = collect_projects(
            projects(4),
            &options(2, Duration::from_millis(300)),
            &tracker(),
            &SilentProgress,
            |ctx: TaskContext| async move {
                if ctx.project.id.0 <= 2 {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                Ok(ctx.project.id.0)
            },
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(collection.summary.deadline_expired);
        assert_eq!(collection.records.len() + collection.failures.len(), 4);
        assert!(collection.records.len() <= 2);
        assert!(collection.failures.len() >= 2);
        assert!(collection.failures.iter().all(|f| f.category == ErrorCategory::Timeout));
        assert_eq!(collection.summary.timed_out, collection.failures.len() as u64);
    }

    #[tokio::test]
    async fn deadline_cancels_running_collectors() {
        let observed_cancel = Arc::new(AtomicBool::new(false));

        let collection = {
            let observed_cancel = Arc::clone(&observed_cancel);
            collect_projects(
                projects(1),
                &options(1, Duration::from_millis(100)),
                &tracker(),
                &SilentProgress,
                move |ctx: TaskContext| {
                    let observed_cancel = Arc::clone(&observed_cancel);
                    async move {
                        ctx.cancel.cancelled().await;
                        observed_cancel.store(true, Ordering::SeqCst);
                        Err::<(), _>(app_err!("cancelled"))
                    }
                },
            )
            .await
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(observed_cancel.load(Ordering::SeqCst));
        assert_eq!(collection.failures.len(), 1);
        assert_eq!(collection.failures[0].category, ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn panicking_collector_is_isolated() {
        let collection = collect_projects(projects(3), &options(3, Duration::from_secs(5)), &tracker(), &SilentProgress, |ctx: TaskContext| async move {
            assert_ne!(ctx.project.id.0, 2, "boom");
            Ok(())
        })
        .await;

        assert_eq!(collection.records.len(), 2);
        assert_eq!(collection.failures.len(), 1);
        assert_eq!(collection.failures[0].project_id, ProjectId(2));
        assert_eq!(collection.failures[0].category, ErrorCategory::Other);
    }

    #[tokio::test]
    async fn collection_block_is_recorded() {
        let tracker = tracker();
        let _ = collect_projects(projects(3), &options(2, Duration::from_secs(5)), &tracker, &SilentProgress, |ctx: TaskContext| async move {
            if ctx.project.id.0 == 3 {
                Err(app_err!("403 Forbidden"))
            } else {
                Ok(())
            }
        })
        .await;

        let blocks = tracker.completed_blocks();
        let block = blocks.iter().find(|b| b.name == COLLECTION_BLOCK).unwrap();
        assert_eq!(block.call_count, 3);
        assert_eq!(block.failed_count, 1);
        assert_eq!(block.total_items, 2);
        assert_eq!(block.sampled_errors, ["403 Forbidden"]);
    }

    #[tokio::test]
    async fn rate_limit_pauses_dispatch() {
        let mut opts = options(1, Duration::from_secs(10));
        opts.rate_limit_pause = Duration::from_millis(200);
        let started = std::time::Instant::now();

        let collection = collect_projects(projects(2), &opts, &tracker(), &SilentProgress, |ctx: TaskContext| async move {
            if ctx.project.id.0 == 1 {
                Err(app_err!("429 Too Many Requests"))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(collection.records.len() + collection.failures.len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn deadline_failures_are_reported_as_timeouts() {
        let tracker = tracker();
        let collection = collect_projects(projects(1), &options(1, Duration::from_millis(300)), &tracker, &SilentProgress, |_ctx: TaskContext| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(collection.failures.len(), 1);
        assert_eq!(collection.failures[0].category, ErrorCategory::Timeout);

        let report = tracker.report();
        assert_eq!(report.errors_in(ErrorCategory::Timeout), 1);
        assert_eq!(report.errors_in(ErrorCategory::Other), 0);
    }

    #[tokio::test]
    async fn huge_timeouts_do_not_overflow() {
        let mut opts = options(1, Duration::MAX);
        opts.project_timeout = Some(Duration::MAX);
        opts.rate_limit_pause = Duration::MAX;

        let collection = collect_projects(projects(1), &opts, &tracker(), &SilentProgress, |_ctx: TaskContext| async {
            Err::<(), _>(app_err!("429 Too Many Requests"))
        })
        .await;

        assert_eq!(collection.failures.len(), 1);
        assert!(!collection.summary.deadline_expired);
    }

    #[test]
    fn rate_limit_markers() {
        assert!(is_rate_limited("HTTP 429"));
        assert!(is_rate_limited("Secondary Rate Limit exceeded"));
        assert!(!is_rate_limited("404 Not Found"));
    }

    #[test]
    fn summary_throughput_rating() {
        let mut summary = CollectionSummary {
            total_projects: 10,
            collected: 10,
            failed: 0,
            timed_out: 0,
            deadline_expired: false,
            workers: 2,
            elapsed: Duration::from_secs(100),
        };
        assert_eq!(summary.throughput(), Throughput::Slow);
        assert!((summary.success_rate() - 1.0).abs() < f64::EPSILON);

        summary.elapsed = Duration::from_secs(10);
        assert_eq!(summary.throughput(), Throughput::Moderate);

        summary.elapsed = Duration::from_secs(1);
        assert_eq!(summary.throughput(), Throughput::Fast);

        summary.elapsed = Duration::ZERO;
        assert!(summary.projects_per_second().abs() < f64::EPSILON);
    }
}
