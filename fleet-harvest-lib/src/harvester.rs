//! The single entry point tying listing, incremental selection, collection, and persistence together.

use crate::Result;
use crate::collect::{
    CollectOptions, CollectionSummary, Failure, Progress, ProjectDescriptor, ProjectRecord, TaskContext, collect_projects,
};
use crate::incremental::{CachedDataset, FinalDataset, merge, select_changed};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::telemetry::{BlockTracker, PerformanceReport};
use ohno::EnrichableExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;

const LOG_TARGET: &str = "   harvest";

/// Name of the operation block that times project listing.
pub const LISTING_BLOCK: &str = "Project Listing";

/// Whether a run may reuse records from the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HarvestMode {
    /// Collect only new and changed projects; carry the rest over from the snapshot.
    #[default]
    Incremental,

    /// Collect every project.
    Full,
}

/// Source of the current set of projects.
pub trait ProjectLister {
    /// List every project that currently exists.
    fn list_projects(&self) -> impl Future<Output = Result<Vec<ProjectDescriptor>>> + Send;
}

/// Everything a harvest produces.
#[derive(Debug)]
pub struct Harvest<R> {
    /// One record per project: fresh for collected projects, cached for the rest.
    pub dataset: FinalDataset<R>,
    pub report: PerformanceReport,

    /// Projects that could not be collected this time. A failed project may still have a
    /// (stale) record in `dataset` carried over from the cache.
    pub failures: Vec<Failure>,

    pub summary: CollectionSummary,

    /// Number of records taken from the cache without re-collection.
    pub carried_over: usize,
}

/// Runs harvests with a fixed set of options, reporting to one progress sink.
#[derive(Debug)]
pub struct Harvester<P> {
    options: CollectOptions,
    progress: P,
}

impl<P: Progress> Harvester<P> {
    #[must_use]
    pub const fn new(options: CollectOptions, progress: P) -> Self {
        Self { options, progress }
    }

    #[must_use]
    pub const fn options(&self) -> &CollectOptions {
        &self.options
    }

    fn new_tracker(&self) -> Arc<BlockTracker> {
        let tracker = Arc::new(BlockTracker::new(self.options.max_sampled_errors));
        tracker.start_collection();
        tracker
    }

    /// Collect every project in `projects`.
    pub async fn collect<R, F, Fut>(&self, projects: Vec<ProjectDescriptor>, collector: F) -> Harvest<R>
    where
        R: Send + 'static,
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let tracker = self.new_tracker();
        let harvest = self.harvest(&tracker, projects, CachedDataset::default(), collector).await;
        self.progress.done();
        harvest
    }

    /// Collect only the projects in `current` that are new or changed relative to `cached`,
    /// and carry the rest over.
    ///
    /// Cached records for projects absent from `current` are dropped. If a changed project fails
    /// to collect, its cached record is kept and the failure is still reported.
    pub async fn collect_incremental<R, F, Fut>(&self, current: Vec<ProjectDescriptor>, cached: CachedDataset<R>, collector: F) -> Harvest<R>
    where
        R: Send + 'static,
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let tracker = self.new_tracker();
        let harvest = self.harvest(&tracker, current, cached, collector).await;
        self.progress.done();
        harvest
    }

    /// List projects, collect them, and save the result as the new snapshot.
    ///
    /// In [`HarvestMode::Incremental`] the previous snapshot seeds the cache; an unreadable
    /// snapshot is treated as absent. If the lister returns no projects the existing snapshot is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if listing projects fails or the new snapshot cannot be saved.
    pub async fn run<R, F, Fut, L, S>(&self, lister: &L, store: &S, mode: HarvestMode, collector: F) -> Result<Harvest<R>>
    where
        R: Send + 'static,
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        L: ProjectLister + Sync,
        S: SnapshotStore<R>,
    {
        let tracker = self.new_tracker();

        let projects = match self.list(&tracker, lister).await {
            Ok(projects) => projects,
            Err(e) => {
                self.progress.done();
                return Err(e);
            }
        };

        let cached = match mode {
            HarvestMode::Full => CachedDataset::default(),
            HarvestMode::Incremental => match store.load() {
                Ok(Some(snapshot)) => CachedDataset::from_snapshot(snapshot),
                Ok(None) => CachedDataset::default(),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not load snapshot, collecting everything: {e:#}");
                    CachedDataset::default()
                }
            },
        };

        let listed = projects.len();
        let mut harvest = self.harvest(&tracker, projects, cached, collector).await;
        self.progress.done();

        if listed == 0 {
            log::warn!(target: LOG_TARGET, "No projects listed, keeping the existing snapshot");
            return Ok(harvest);
        }

        let snapshot = Snapshot::new(harvest.dataset.into_records(), Some(harvest.report.clone()));
        store.save(&snapshot)?;
        harvest.dataset = snapshot.records.into_iter().collect();

        Ok(harvest)
    }

    async fn list<L>(&self, tracker: &BlockTracker, lister: &L) -> Result<Vec<ProjectDescriptor>>
    where
        L: ProjectLister + Sync,
    {
        self.progress.set_phase("Listing");
        self.progress.set_indeterminate(Box::new(|| "listing projects".to_string()));

        tracker.start_block(LISTING_BLOCK);
        let result = lister.list_projects().await;

        match result {
            Ok(projects) => {
                tracker.record_call(LISTING_BLOCK, true, None);
                tracker.end_block(LISTING_BLOCK, projects.len() as u64);
                log::info!(target: LOG_TARGET, "Listed {} project(s)", projects.len());
                Ok(projects)
            }
            Err(e) => {
                tracker.record_call(LISTING_BLOCK, false, Some(&e.to_string()));
                tracker.end_block(LISTING_BLOCK, 0);
                Err(e.enrich("listing projects"))
            }
        }
    }

    async fn harvest<R, F, Fut>(
        &self,
        tracker: &Arc<BlockTracker>,
        current: Vec<ProjectDescriptor>,
        cached: CachedDataset<R>,
        collector: F,
    ) -> Harvest<R>
    where
        R: Send + 'static,
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        tracker.set_project_count(current.len() as u64);

        let cached = cached.retain_current(&current);
        let changed = select_changed(&current, &cached);
        let reusable = current.len() - changed.len();

        if !cached.is_empty() {
            log::info!(
                target: LOG_TARGET,
                "{} of {} project(s) changed, reusing {reusable} cached record(s)",
                changed.len(),
                current.len()
            );
        }

        let collection = collect_projects(changed, &self.options, tracker, &self.progress, collector).await;

        let stale = collection.failures.iter().filter(|f| cached.contains(f.project_id)).count();
        if stale > 0 {
            log::warn!(target: LOG_TARGET, "Keeping stale cached record(s) for {stale} project(s) that failed to refresh");
        }

        let fresh: Vec<ProjectRecord<R>> = collection.records;
        let fresh_count = fresh.len();
        let dataset = merge(fresh, cached);
        let carried_over = dataset.len() - fresh_count.min(dataset.len());

        Harvest {
            dataset,
            report: tracker.report(),
            failures: collection.failures,
            summary: collection.summary,
            carried_over,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::collect::{ErrorCategory, ProjectId, SilentProgress};
    use core::sync::atomic::{AtomicUsize, Ordering};
    use core::time::Duration;
    use ohno::app_err;
    use std::sync::Mutex;

    struct FixedLister(Vec<ProjectDescriptor>);

    impl ProjectLister for FixedLister {
        async fn list_projects(&self) -> Result<Vec<ProjectDescriptor>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenLister;

    impl ProjectLister for BrokenLister {
        async fn list_projects(&self) -> Result<Vec<ProjectDescriptor>> {
            Err(app_err!("503 Service Unavailable"))
        }
    }

    #[derive(Default)]
    struct MemoryStore(Mutex<Option<Snapshot<String>>>);

    impl SnapshotStore<String> for MemoryStore {
        fn load(&self) -> Result<Option<Snapshot<String>>> {
            Ok(self.0.lock().unwrap().clone())
        }

        fn save(&self, snapshot: &Snapshot<String>) -> Result<()> {
            *self.0.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    fn options() -> CollectOptions {
        CollectOptions {
            worker_count: 2,
            global_timeout: Duration::from_secs(10),
            queue_poll_interval: Duration::from_millis(10),
            ..CollectOptions::default()
        }
    }

    fn projects(fingerprint: &str, ids: impl IntoIterator<Item = u64>) -> Vec<ProjectDescriptor> {
        ids.into_iter()
            .map(|id| ProjectDescriptor::new(id, fingerprint, format!("p{id}")))
            .collect()
    }

    #[tokio::test]
    async fn incremental_skips_unchanged_projects() {
        let harvester = Harvester::new(options(), SilentProgress);
        let cached = CachedDataset::from_records(
            projects("v1", 1..=3)
                .into_iter()
                .map(|p| ProjectRecord::new(p, "cached".to_string())),
        );

        let mut current = projects("v1", 1..=2);
        current.push(ProjectDescriptor::new(3, "v2", "p3"));
        current.push(ProjectDescriptor::new(4, "v1", "p4"));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let harvest = harvester
            .collect_incremental(current, cached, move |ctx: TaskContext| {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(format!("fresh {}", ctx.project.id)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(harvest.dataset.len(), 4);
        assert_eq!(harvest.carried_over, 2);
        assert_eq!(harvest.dataset.get(ProjectId(1)).map(|r| r.data.as_str()), Some("cached"));
        assert_eq!(harvest.dataset.get(ProjectId(3)).map(|r| r.data.as_str()), Some("fresh 3"));
        assert_eq!(harvest.report.project_count, 4);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_record() {
        let harvester = Harvester::new(options(), SilentProgress);
        let cached = CachedDataset::from_records([ProjectRecord::new(ProjectDescriptor::new(1, "v1", "p1"), "old".to_string())]);

        let harvest = harvester
            .collect_incremental(projects("v2", [1]), cached, |_ctx: TaskContext| async {
                Err::<String, _>(app_err!("502 Bad Gateway"))
            })
            .await;

        assert_eq!(harvest.failures.len(), 1);
        assert_eq!(harvest.failures[0].category, ErrorCategory::ServerError);
        let kept = harvest.dataset.get(ProjectId(1)).unwrap();
        assert_eq!(kept.data, "old");
        assert_eq!(kept.fingerprint(), "v1");
    }

    #[tokio::test]
    async fn run_saves_and_reuses_snapshot() {
        let harvester = Harvester::new(options(), SilentProgress);
        let store = MemoryStore::default();
        let lister = FixedLister(projects("v1", 1..=3));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = Arc::clone(&calls);
            let harvest = harvester
                .run(&lister, &store, HarvestMode::Incremental, move |ctx: TaskContext| {
                    let _ = counter.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(ctx.project.name) }
                })
                .await
                .unwrap();
            assert_eq!(harvest.dataset.len(), 3);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.records.len(), 3);
        let performance = saved.performance.unwrap();
        assert!(performance.blocks.iter().any(|b| b.name == LISTING_BLOCK));
    }

    #[tokio::test]
    async fn full_mode_ignores_snapshot() {
        let harvester = Harvester::new(options(), SilentProgress);
        let store = MemoryStore::default();
        store
            .save(&Snapshot::new(
                vec![ProjectRecord::new(ProjectDescriptor::new(1, "v1", "p1"), "old".to_string())],
                None,
            ))
            .unwrap();

        let harvest = harvester
            .run(&FixedLister(projects("v1", [1])), &store, HarvestMode::Full, |_ctx: TaskContext| async {
                Ok("new".to_string())
            })
            .await
            .unwrap();

        assert_eq!(harvest.dataset.get(ProjectId(1)).map(|r| r.data.as_str()), Some("new"));
        assert_eq!(harvest.carried_over, 0);
    }

    #[tokio::test]
    async fn listing_failure_is_an_error() {
        let harvester = Harvester::new(options(), SilentProgress);
        let result = harvester
            .run(&BrokenLister, &MemoryStore::default(), HarvestMode::Incremental, |_ctx: TaskContext| async {
                Ok(String::new())
            })
            .await;

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("503"));
    }

    #[tokio::test]
    async fn empty_listing_keeps_snapshot() {
        let harvester = Harvester::new(options(), SilentProgress);
        let store = MemoryStore::default();
        let previous = Snapshot::new(
            vec![ProjectRecord::new(ProjectDescriptor::new(1, "v1", "p1"), "old".to_string())],
            None,
        );
        store.save(&previous).unwrap();

        let harvest = harvester
            .run(&FixedLister(Vec::new()), &store, HarvestMode::Incremental, |_ctx: TaskContext| async {
                Ok(String::new())
            })
            .await
            .unwrap();

        assert!(harvest.dataset.is_empty());
        assert_eq!(store.load().unwrap(), Some(previous));
    }
}
