// src/source/pager.rs
//! Ordered, bounded-concurrency walk over listing pages 1..=N.
//!
//! Up to `workers` pages are in flight at once, but results are consumed
//! in page order, so records come out in listing order no matter which
//! request finished first. A failed page increments the consecutive-failure
//! counter and is skipped; a good page resets it. The walk stops early when
//! a page reports it is the last one, or when the record limit is reached.
//!
//! A missing page only ends the listing once some earlier page loaded. Before
//! that it is a failed page like any other, and a walk where no page loaded
//! at all is an error rather than an empty result.

use std::future::Future;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::error::{FetchError, PageError};
use crate::progress::Progress;
use crate::record::{Record, SourceId};

/// What one listing page produced.
#[derive(Debug, Default)]
pub struct PageOutcome {
    pub records: Vec<Record>,
    /// No further pages exist (no "next" link, or the page was not found).
    pub last_page: bool,
    /// The page itself does not exist.
    pub missing: bool,
}

impl PageOutcome {
    pub fn not_found() -> Self {
        Self { records: Vec::new(), last_page: true, missing: true }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PagerPolicy {
    pub workers: usize,
    pub max_consecutive_failures: u32,
    pub record_limit: Option<usize>,
}

/// Walk pages `1..=pages` with `fetch_page`. A bound of zero or less
/// fetches nothing.
pub async fn crawl_pages<F, Fut>(
    source: SourceId,
    pages: i64,
    policy: PagerPolicy,
    progress: &dyn Progress,
    fetch_page: F,
) -> Result<Vec<Record>, FetchError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<PageOutcome, PageError>>,
{
    if pages <= 0 {
        debug!(%source, pages, "nothing to fetch");
        return Ok(Vec::new());
    }
    if policy.record_limit == Some(0) {
        return Ok(Vec::new());
    }
    let total = u32::try_from(pages).unwrap_or(u32::MAX);
    progress.begin(source, total);

    let mut pending = stream::iter(1..=total)
        .map(|page| {
            let fut = fetch_page(page);
            async move { (page, fut.await) }
        })
        .buffered(policy.workers.max(1));

    let mut out = Vec::new();
    let mut consecutive = 0u32;
    let mut failed = 0u32;
    let mut loaded = 0u32;

    while let Some((page, result)) = pending.next().await {
        let result = match result {
            Ok(outcome) if outcome.missing && loaded == 0 => Err(PageError::NotFound { page }),
            other => other,
        };
        match result {
            Ok(outcome) => {
                consecutive = 0;
                if !outcome.missing {
                    loaded += 1;
                }
                let n = outcome.records.len();
                out.extend(outcome.records);
                progress.page_done(source, page, n);
                debug!(%source, page, records = n, "page done");

                if let Some(limit) = policy.record_limit {
                    if out.len() >= limit {
                        out.truncate(limit);
                        info!(%source, page, limit, "record limit reached");
                        break;
                    }
                }
                if outcome.last_page {
                    info!(%source, page, "end of listing");
                    break;
                }
            }
            Err(e) => {
                consecutive += 1;
                failed += 1;
                let reason = e.to_string();
                warn!(%source, page, consecutive, %reason, "page skipped");
                progress.page_failed(source, page, &reason);
                if consecutive > policy.max_consecutive_failures {
                    error!(%source, page, consecutive, "too many consecutive failures, aborting");
                    progress.finish(source);
                    return Err(FetchError::TooManyFailures { source_id: source, page, failures: consecutive });
                }
            }
        }
    }

    progress.finish(source);
    if loaded == 0 && failed > 0 {
        error!(%source, failed, "no listing page could be loaded");
        return Err(FetchError::NoPagesLoaded { source_id: source, failures: failed });
    }
    Ok(out)
}
