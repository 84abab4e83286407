// src/gui/progress.rs
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::progress::Progress;
use crate::record::SourceId;

/// Writes a one-line status the UI thread polls every frame.
pub struct GuiProgress {
    status: Arc<Mutex<String>>,
    pages_done: AtomicU32,
    pages_total: AtomicU32,
    records: AtomicUsize,
}

impl GuiProgress {
    pub fn new(status: Arc<Mutex<String>>) -> Self {
        Self {
            status,
            pages_done: AtomicU32::new(0),
            pages_total: AtomicU32::new(0),
            records: AtomicUsize::new(0),
        }
    }

    fn set_status(&self, msg: impl Into<String>) {
        if let Ok(mut s) = self.status.lock() {
            *s = msg.into();
        }
    }
}

impl Progress for GuiProgress {
    fn begin(&self, source: SourceId, pages: u32) {
        self.pages_total.store(pages, Ordering::Relaxed);
        self.set_status(format!("{}: fetching up to {pages} page(s)…", source.label()));
    }

    fn page_done(&self, source: SourceId, page: u32, records: usize) {
        let done = self.pages_done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.records.fetch_add(records, Ordering::Relaxed) + records;
        let of = self.pages_total.load(Ordering::Relaxed);
        self.set_status(format!("{}: page {page} ({done}/{of}), {total} records", source.label()));
    }

    fn page_failed(&self, source: SourceId, page: u32, reason: &str) {
        self.set_status(format!("{}: page {page} skipped: {reason}", source.label()));
    }

    fn log(&self, msg: &str) {
        self.set_status(s!(msg));
    }
}
