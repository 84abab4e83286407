// src/crawler.rs
//! Incremental run controller: load, fetch, merge, save.
//!
//! One run per source at a time; a second run for a source that is already
//! running fails immediately instead of waiting. Runs for different sources
//! share nothing and may proceed concurrently.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{RunError, StoreError};
use crate::merge::{merge, MergeStats};
use crate::progress::Progress;
use crate::record::SourceId;
use crate::snapshot::Snapshot;
use crate::source::SourceAdapter;
use crate::store::SnapshotStore;

/// How long runtime shutdown waits on blocking work, such as a render the
/// adapter already gave up on.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Drive `fut` to completion on a fresh multi-thread runtime, for callers
/// outside any runtime (the CLI, the GUI worker thread). Blocking tasks still
/// running afterwards are abandoned after `SHUTDOWN_GRACE`.
pub fn block_on<F: Future>(fut: F) -> std::io::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let out = rt.block_on(fut);
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(out)
}

/// Outcome of one successful run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    pub source: SourceId,
    pub pages_requested: i64,
    pub stats: MergeStats,
    /// Records in the current snapshot after the run.
    pub total: usize,
    /// False when nothing was fetched and the store was left alone.
    pub saved: bool,
    pub path: Option<PathBuf>,
}

/// One source to crawl in `Crawler::run_all`.
#[derive(Clone)]
pub struct CrawlJob {
    pub adapter: Arc<dyn SourceAdapter>,
    pub pages: i64,
}

type Running = Arc<Mutex<HashSet<SourceId>>>;

#[derive(Clone)]
pub struct Crawler {
    store: SnapshotStore,
    running: Running,
}

impl Crawler {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store, running: Arc::default() }
    }

    pub fn store(&self) -> &SnapshotStore { &self.store }

    /// Is a run for `source` in flight right now?
    pub fn is_running(&self, source: SourceId) -> bool {
        lock(&self.running).contains(&source)
    }

    /// One incremental run of `adapter` over its first `pages` pages.
    ///
    /// A fetch error aborts the run before anything is written. A fetch
    /// that returns no records leaves the store untouched as well.
    pub async fn run(
        &self,
        adapter: &dyn SourceAdapter,
        pages: i64,
        progress: &dyn Progress,
    ) -> Result<RunReport, RunError> {
        let source = adapter.source();
        let _guard = RunGuard::acquire(&self.running, source)?;
        info!(%source, pages, "run started");

        let current = self
            .blocking(source, move |store| store.load(source))
            .await?
            .unwrap_or_else(|| Snapshot::empty(source));

        let fetched = match adapter.fetch(pages, progress).await {
            Ok(records) => records,
            Err(e) => {
                error!(%source, error = %e, "fetch aborted, snapshot left as it was");
                progress.log(&format!("{source}: {e}"));
                return Err(e.into());
            }
        };

        if fetched.is_empty() {
            info!(%source, "nothing fetched, snapshot left as it was");
            return Ok(RunReport {
                source,
                pages_requested: pages,
                stats: MergeStats::default(),
                total: current.len(),
                saved: false,
                path: None,
            });
        }

        let (next, stats) = merge(&current, fetched)?;
        let total = next.len();
        let path = self.blocking(source, move |store| store.save(&next)).await?;

        info!(
            %source,
            fetched = stats.fetched,
            added = stats.added,
            updated = stats.updated,
            unchanged = stats.unchanged,
            retained = stats.retained,
            total,
            "run finished"
        );
        progress.log(&format!(
            "{source}: +{} added, {} updated, {} unchanged, {} kept ({total} total)",
            stats.added, stats.updated, stats.unchanged, stats.retained
        ));

        Ok(RunReport { source, pages_requested: pages, stats, total, saved: true, path: Some(path) })
    }

    /// Run every job as its own task. One job failing, or panicking, has no
    /// effect on the others. Results come back ordered by source.
    pub async fn run_all(
        &self,
        jobs: Vec<CrawlJob>,
        progress: Arc<dyn Progress>,
    ) -> Vec<(SourceId, Result<RunReport, RunError>)> {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let crawler = self.clone();
                let progress = Arc::clone(&progress);
                let source = job.adapter.source();
                let handle = tokio::spawn(async move {
                    crawler.run(job.adapter.as_ref(), job.pages, progress.as_ref()).await
                });
                (source, handle)
            })
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (source, handle) in handles {
            let result = match handle.await {
                Ok(r) => r,
                Err(e) => {
                    error!(%source, error = %e, "run task died");
                    Err(RunError::Task { source_id: source, reason: e.to_string() })
                }
            };
            out.push((source, result));
        }
        out.sort_by_key(|(source, _)| *source);
        out
    }

    /// Store I/O off the async workers.
    async fn blocking<T, F>(&self, source: SourceId, f: F) -> Result<T, RunError>
    where
        F: FnOnce(&SnapshotStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let joined = tokio::task::spawn_blocking(move || f(&store)).await;
        match joined {
            Ok(result) => Ok(result?),
            Err(e) => Err(RunError::Task { source_id: source, reason: e.to_string() }),
        }
    }
}

fn lock(running: &Running) -> MutexGuard<'_, HashSet<SourceId>> {
    // The set stays consistent even if a holder panicked.
    running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a source as running for as long as it lives.
struct RunGuard {
    running: Running,
    source: SourceId,
}

impl RunGuard {
    fn acquire(running: &Running, source: SourceId) -> Result<Self, RunError> {
        if !lock(running).insert(source) {
            warn!(%source, "run refused, another one is in progress");
            return Err(RunError::InProgress(source));
        }
        Ok(Self { running: Arc::clone(running), source })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::progress::NullProgress;
    use crate::record::Record;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Fixed(SourceId, Vec<&'static str>);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn source(&self) -> SourceId { self.0 }
        async fn fetch(&self, pages: i64, _: &dyn Progress) -> Result<Vec<Record>, FetchError> {
            if pages <= 0 {
                return Ok(Vec::new());
            }
            Ok(self.1.iter().map(|k| Record::new(self.0, *k, Utc::now()).with("title", *k)).collect())
        }
    }

    /// Blocks inside `fetch` until released.
    struct Gate(Arc<Notify>, Arc<Notify>);

    #[async_trait]
    impl SourceAdapter for Gate {
        fn source(&self) -> SourceId { SourceId::Static }
        async fn fetch(&self, _: i64, _: &dyn Progress) -> Result<Vec<Record>, FetchError> {
            self.0.notify_one();
            self.1.notified().await;
            Ok(Vec::new())
        }
    }

    fn crawler() -> (tempfile::TempDir, Crawler) {
        let dir = tempfile::tempdir().unwrap();
        let c = Crawler::new(SnapshotStore::new(dir.path()));
        (dir, c)
    }

    #[tokio::test]
    async fn first_run_saves_what_was_fetched() {
        let (_dir, c) = crawler();
        let report = c.run(&Fixed(SourceId::Static, vec!["a", "b"]), 1, &NullProgress).await.unwrap();
        assert!(report.saved);
        assert_eq!(report.total, 2);
        assert_eq!(report.stats.added, 2);
        assert_eq!(c.store().load(SourceId::Static).unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_bound_touches_nothing() {
        let (_dir, c) = crawler();
        let report = c.run(&Fixed(SourceId::Dynamic, vec!["q"]), 0, &NullProgress).await.unwrap();
        assert!(!report.saved);
        assert_eq!(report.path, None);
        assert!(c.store().load(SourceId::Dynamic).unwrap().is_none());
    }

    #[tokio::test]
    async fn second_run_for_same_source_fails_fast() {
        let (_dir, c) = crawler();
        let (entered, release) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
        let gate = Gate(entered.clone(), release.clone());

        let bg = {
            let c = c.clone();
            tokio::spawn(async move { c.run(&gate, 1, &NullProgress).await })
        };
        entered.notified().await;
        assert!(c.is_running(SourceId::Static));

        let err = c.run(&Fixed(SourceId::Static, vec!["a"]), 1, &NullProgress).await.unwrap_err();
        assert!(matches!(err, RunError::InProgress(SourceId::Static)));

        // other sources are not blocked
        c.run(&Fixed(SourceId::Dynamic, vec!["q"]), 1, &NullProgress).await.unwrap();

        release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), bg).await.unwrap().unwrap().unwrap();
        assert!(!c.is_running(SourceId::Static));
    }

    #[test]
    fn abandoned_blocking_work_does_not_hold_shutdown() {
        let started = std::time::Instant::now();
        let out = block_on(async {
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(30)));
            7
        })
        .unwrap();
        assert_eq!(out, 7);
        assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
    }
}
