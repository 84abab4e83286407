// src/progress.rs
use crate::record::SourceId;

/// Progress reporting for crawls. Frontends (GUI/CLI) implement this to
/// surface status; pages of one source may finish concurrently, so every
/// hook takes `&self`.
pub trait Progress: Send + Sync {
    /// Called once per fetch with the number of pages requested.
    fn begin(&self, _source: SourceId, _pages: u32) {}

    /// A listing page produced `records` records.
    fn page_done(&self, _source: SourceId, _page: u32, _records: usize) {}

    /// A listing page was skipped after its retries ran out.
    fn page_failed(&self, _source: SourceId, _page: u32, _reason: &str) {}

    /// Free-form status line for human eyes.
    fn log(&self, _msg: &str) {}

    /// Called at the end, successful or not.
    fn finish(&self, _source: SourceId) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}
