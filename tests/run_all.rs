// tests/run_all.rs
mod common;

use std::sync::Arc;

use async_trait::async_trait;
use toscrape::crawler::{CrawlJob, Crawler};
use toscrape::error::{FetchError, RunError};
use toscrape::progress::{NullProgress, Progress};
use toscrape::record::{Record, SourceId};
use toscrape::snapshot::Snapshot;
use toscrape::source::{QuotesSource, SourceAdapter};
use toscrape::store::SnapshotStore;

use common::{book, fast_options, quote_block, quote_page, ScriptedRenderer, Step};

/// Static source whose site is down.
struct Down;

#[async_trait]
impl SourceAdapter for Down {
    fn source(&self) -> SourceId { SourceId::Static }

    async fn fetch(&self, _pages: i64, _progress: &dyn Progress) -> Result<Vec<Record>, FetchError> {
        Err(FetchError::TooManyFailures { source_id: SourceId::Static, page: 4, failures: 4 })
    }
}

/// Static source whose parser blows up.
struct Panics;

#[async_trait]
impl SourceAdapter for Panics {
    fn source(&self) -> SourceId { SourceId::Static }

    async fn fetch(&self, _pages: i64, _progress: &dyn Progress) -> Result<Vec<Record>, FetchError> {
        panic!("parser bug");
    }
}

fn quotes_job() -> CrawlJob {
    let page = quote_page(&[quote_block("Be yourself.", "Oscar Wilde", &["life"])], false);
    let renderer = ScriptedRenderer::new(vec![("/js/", vec![Step::Html(page)])]);
    let adapter = QuotesSource::new(&fast_options("http://quotes.test"), renderer).unwrap();
    CrawlJob { adapter: Arc::new(adapter), pages: 1 }
}

fn seeded_store(dir: &std::path::Path) -> SnapshotStore {
    let store = SnapshotStore::new(dir);
    store.save(&Snapshot::from_records(SourceId::Static, vec![book("kept_1", "Kept", 3.0)]).unwrap()).unwrap();
    store
}

#[tokio::test]
async fn failing_source_does_not_affect_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(seeded_store(dir.path()));
    let jobs = vec![quotes_job(), CrawlJob { adapter: Arc::new(Down), pages: 8 }];

    let results = crawler.run_all(jobs, Arc::new(NullProgress)).await;
    let sources: Vec<_> = results.iter().map(|(s, _)| *s).collect();
    assert_eq!(sources, [SourceId::Static, SourceId::Dynamic]);

    assert!(matches!(results[0].1, Err(RunError::Fetch(FetchError::TooManyFailures { .. }))));
    let quotes = results[1].1.as_ref().unwrap();
    assert!(quotes.saved);
    assert_eq!(quotes.total, 1);

    let books = crawler.store().load(SourceId::Static).unwrap().unwrap();
    assert_eq!(books.keys().collect::<Vec<_>>(), ["kept_1"]);
    assert!(!crawler.is_running(SourceId::Static));
    assert!(!crawler.is_running(SourceId::Dynamic));
}

#[tokio::test]
async fn panicking_run_is_reported_and_released() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(seeded_store(dir.path()));
    let jobs = vec![CrawlJob { adapter: Arc::new(Panics), pages: 1 }, quotes_job()];

    let results = crawler.run_all(jobs, Arc::new(NullProgress)).await;
    assert!(matches!(results[0].1, Err(RunError::Task { source_id: SourceId::Static, .. })));
    assert!(results[1].1.is_ok());

    // the guard was dropped during unwinding
    assert!(!crawler.is_running(SourceId::Static));
    assert_eq!(crawler.store().load(SourceId::Static).unwrap().unwrap().len(), 1);
}
