// src/gui/actions.rs
// Button handlers. Crawls run on a worker thread with their own runtime;
// the UI thread polls `App::pending` for the outcome.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use super::app::{App, CrawlDone};
use super::progress::GuiProgress;
use crate::config::consts::{CURRENT_LABEL, PREVIOUS_LABEL};
use crate::crawler::block_on;
use crate::record::SourceId;
use crate::report;
use crate::source::adapter_for;

pub fn crawl(app: &mut App) {
    if app.pending.is_some() {
        return;
    }
    let source = app.state.gui.source;
    let pages = app.state.gui.pages;

    let adapter = match adapter_for(source, &app.state.options) {
        Ok(a) => a,
        Err(e) => {
            error!(%source, error = %e, "cannot build adapter");
            app.status(format!("Error: {e}"));
            return;
        }
    };

    info!(%source, pages, "UI: crawl requested");
    app.status(format!("{}: starting…", source.label()));

    let (tx, rx) = mpsc::channel::<CrawlDone>();
    let crawler = app.crawler.clone();
    let progress = GuiProgress::new(Arc::clone(&app.status));

    thread::spawn(move || {
        let outcome = match block_on(crawler.run(adapter.as_ref(), pages, &progress)) {
            Ok(run) => run.map_err(|e| e.to_string()),
            Err(e) => Err(format!("runtime: {e}")),
        };
        let _ = tx.send((source, outcome));
    });
    app.pending = Some(rx);
}

/// Re-read the current snapshot of `source` from disk.
pub fn reload(app: &mut App, source: SourceId) {
    match app.crawler.store().load(source) {
        Ok(Some(snap)) => {
            app.snapshots.insert(source, snap);
        }
        Ok(None) => {
            app.snapshots.remove(&source);
        }
        Err(e) => {
            error!(%source, error = %e, "snapshot load failed");
            app.status(format!("Error: {e}"));
        }
    }
    app.diffs.remove(&source);
}

/// Diff `previous` against `current` for the active source.
pub fn diff_previous(app: &mut App) {
    let source = app.state.gui.source;
    match report::compare(app.crawler.store(), source, PREVIOUS_LABEL, CURRENT_LABEL) {
        Ok(d) => {
            let c = d.counts();
            app.status(format!(
                "{}: {} added, {} removed, {} changed, {} unchanged",
                source.label(), c.added, c.removed, c.changed, c.unchanged
            ));
            app.diffs.insert(source, d);
        }
        Err(e) => {
            app.status(format!("Diff: {e}"));
            app.diffs.remove(&source);
        }
    }
}
