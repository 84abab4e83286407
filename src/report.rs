// src/report.rs
//! Diff reports: compare two stored snapshots and write the result as a
//! JSON summary plus a flat CSV of every difference.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::consts::STORE_SEP;
use crate::csv::write_row;
use crate::diff::{diff, DiffCounts, DiffResult};
use crate::error::ReportError;
use crate::record::{Record, SourceId};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// Diff label `baseline` against label `latest` for one source. A missing
/// baseline counts as empty, so a first comparison reports everything as
/// added; a missing latest snapshot is an error.
pub fn compare(
    store: &SnapshotStore,
    source: SourceId,
    baseline: &str,
    latest: &str,
) -> Result<DiffResult, ReportError> {
    let old = store.load_label(source, baseline)?.unwrap_or_else(|| Snapshot::empty(source));
    let new = store.load_label(source, latest)?.ok_or_else(|| ReportError::MissingSnapshot {
        source_id: source,
        label: latest.to_string(),
    })?;
    Ok(diff(&old, &new)?)
}

/// Diff two snapshot files given by path.
pub fn compare_files(old: &Path, new: &Path) -> Result<DiffResult, ReportError> {
    let old = SnapshotStore::load_file(old)?;
    let new = SnapshotStore::load_file(new)?;
    Ok(diff(&old, &new)?)
}

#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub source: SourceId,
    pub generated_at: DateTime<Utc>,
    pub baseline: &'a str,
    pub latest: &'a str,
    pub counts: DiffCounts,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportPaths {
    pub summary: PathBuf,
    pub diff: PathBuf,
}

/// Write `summary_<slug>.json` and `diff_<slug>_<YYYYMMDD>.csv` into `dir`.
pub fn write_report(
    dir: &Path,
    result: &DiffResult,
    baseline: &str,
    latest: &str,
) -> Result<ReportPaths, ReportError> {
    write_report_at(dir, result, baseline, latest, Utc::now())
}

pub fn write_report_at(
    dir: &Path,
    result: &DiffResult,
    baseline: &str,
    latest: &str,
    now: DateTime<Utc>,
) -> Result<ReportPaths, ReportError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let slug = result.source.slug();
    let summary_path = dir.join(format!("summary_{slug}.json"));
    let summary = Summary { source: result.source, generated_at: now, baseline, latest, counts: result.counts() };
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(&summary_path, json + "\n").map_err(io_err(&summary_path))?;

    let diff_path = dir.join(format!("diff_{slug}_{}.csv", now.format("%Y%m%d")));
    let file = fs::File::create(&diff_path).map_err(io_err(&diff_path))?;
    let mut out = BufWriter::new(file);
    write_diff_rows(&mut out, result)
        .and_then(|()| out.flush())
        .map_err(io_err(&diff_path))?;

    let c = result.counts();
    info!(
        source = %result.source,
        added = c.added,
        removed = c.removed,
        changed = c.changed,
        unchanged = c.unchanged,
        dir = %dir.display(),
        "diff report written"
    );
    Ok(ReportPaths { summary: summary_path, diff: diff_path })
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + use<> {
    let path = path.to_path_buf();
    move |source| ReportError::Io { path, source }
}

/// `status,identity_key,field,before,after`: one row per added or removed
/// record and one per changed field.
pub fn write_diff_rows<W: Write>(mut w: W, result: &DiffResult) -> std::io::Result<()> {
    write_row(&mut w, &["status", "identity_key", "field", "before", "after"], STORE_SEP)?;
    for rec in &result.added {
        let label = summarize(rec);
        write_row(&mut w, &["added", rec.key.as_str(), "", "", label.as_str()], STORE_SEP)?;
    }
    for rec in &result.removed {
        let label = summarize(rec);
        write_row(&mut w, &["removed", rec.key.as_str(), "", label.as_str(), ""], STORE_SEP)?;
    }
    for ch in &result.changed {
        for d in &ch.deltas {
            let before = d.before.as_ref().map(|v| v.to_string()).unwrap_or_default();
            let after = d.after.as_ref().map(|v| v.to_string()).unwrap_or_default();
            write_row(&mut w, &["changed", ch.key.as_str(), d.field.as_str(), before.as_str(), after.as_str()], STORE_SEP)?;
        }
    }
    Ok(())
}

/// Short human label for a whole record: its title, text or key.
fn summarize(rec: &Record) -> String {
    ["title", "text"]
        .iter()
        .find_map(|f| rec.get(f).map(|v| v.to_string()))
        .unwrap_or_else(|| rec.key.clone())
}
