// src/store.rs
//! Snapshot store: one CSV file per source and label.
//!
//! Layout: `<root>/<slug>/<label>.csv`, where `current` is the snapshot the
//! crawler merges into, `previous` is the one it replaced (when retention is
//! on), and any other label is an explicit archive (`baseline`, a date, ...).
//!
//! File shape: header `identity_key,<schema columns…>,fetched_at`, one row per
//! record. The source is never stored in a column; it comes from the path.
//!
//! Writes go to a temp file in the destination directory and are renamed
//! over the target, so a reader sees either the old file or the new one.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::consts::{CURRENT_LABEL, KEY_COLUMN, PREVIOUS_LABEL, STORE_SEP, TIME_COLUMN};
use crate::csv::{parse_rows, write_row};
use crate::error::StoreError;
use crate::record::{FieldKind, FieldSpec, FieldValue, Fields, Record, SourceId};
use crate::snapshot::Snapshot;

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root: PathBuf,
    retain_previous: bool,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), retain_previous: true }
    }

    pub fn with_retain_previous(mut self, on: bool) -> Self {
        self.retain_previous = on;
        self
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn source_dir(&self, source: SourceId) -> PathBuf {
        self.root.join(source.slug())
    }

    pub fn path_for(&self, source: SourceId, label: &str) -> Result<PathBuf, StoreError> {
        validate_label(label)?;
        Ok(self.source_dir(source).join(format!("{label}.csv")))
    }

    /// Current snapshot of `source`, or `None` on first run.
    pub fn load(&self, source: SourceId) -> Result<Option<Snapshot>, StoreError> {
        self.load_label(source, CURRENT_LABEL)
    }

    pub fn load_label(&self, source: SourceId, label: &str) -> Result<Option<Snapshot>, StoreError> {
        let path = self.path_for(source, label)?;
        if !path.exists() {
            debug!(%source, label, "no snapshot on disk");
            return Ok(None);
        }
        read_snapshot(&path, source).map(Some)
    }

    /// Load an arbitrary snapshot file; the source comes from the path.
    pub fn load_file(path: &Path) -> Result<Snapshot, StoreError> {
        let source = SourceId::from_path(path)
            .ok_or_else(|| StoreError::UnknownSource(path.to_path_buf()))?;
        read_snapshot(path, source)
    }

    /// Make `snap` the current snapshot of its source.
    pub fn save(&self, snap: &Snapshot) -> Result<PathBuf, StoreError> {
        let source = snap.source();
        let target = self.path_for(source, CURRENT_LABEL)?;
        let dir = self.source_dir(source);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        if self.retain_previous && target.exists() {
            let previous = self.path_for(source, PREVIOUS_LABEL)?;
            copy_atomic(&target, &previous)?;
        }

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            write_snapshot(&mut out, snap).map_err(|e| StoreError::io(&target, e))?;
            out.flush().map_err(|e| StoreError::io(&target, e))?;
        }
        tmp.as_file().sync_all().map_err(|e| StoreError::io(&target, e))?;
        tmp.persist(&target).map_err(|e| StoreError::io(&target, e.error))?;

        info!(%source, rows = snap.len(), path = %target.display(), "snapshot saved");
        Ok(target)
    }

    /// Copy the current snapshot to a named label (e.g. `baseline`).
    pub fn archive(&self, source: SourceId, label: &str) -> Result<PathBuf, StoreError> {
        let current = self.path_for(source, CURRENT_LABEL)?;
        let target = self.path_for(source, label)?;
        if !current.exists() {
            return Err(StoreError::NothingToArchive(source));
        }
        copy_atomic(&current, &target)?;
        info!(%source, label, "snapshot archived");
        Ok(target)
    }

    /// Labels stored for `source`, sorted.
    pub fn labels(&self, source: SourceId) -> Result<Vec<String>, StoreError> {
        let dir = self.source_dir(source);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))? {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if !path.is_file() { continue; }
            if path.extension().and_then(|s| s.to_str()) != Some("csv") { continue; }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_label(stem).is_ok() {
                    out.push(stem.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

fn validate_label(label: &str) -> Result<(), StoreError> {
    let ok = !label.is_empty()
        && !label.starts_with('.')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok { Ok(()) } else { Err(StoreError::InvalidLabel(label.to_string())) }
}

fn copy_atomic(from: &Path, to: &Path) -> Result<(), StoreError> {
    let dir = to.parent().unwrap_or_else(|| Path::new("."));
    let bytes = fs::read(from).map_err(|e| StoreError::io(from, e))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(&bytes).map_err(|e| StoreError::io(to, e))?;
    tmp.persist(to).map_err(|e| StoreError::io(to, e.error))?;
    Ok(())
}

fn header_for(source: SourceId) -> Vec<&'static str> {
    let schema = source.schema();
    let mut h = Vec::with_capacity(schema.len() + 2);
    h.push(KEY_COLUMN);
    h.extend(schema.iter().map(|f| f.name));
    h.push(TIME_COLUMN);
    h
}

/// Resolve a stored header against the schema. Files written before a
/// column was added simply lack it; unknown or repeated columns are errors.
/// The returned list has placeholders for the key and time columns.
fn column_map(header: &[String], source: SourceId) -> Result<Vec<FieldSpec>, String> {
    let shape_ok = header.len() >= 2
        && header.first().map(String::as_str) == Some(KEY_COLUMN)
        && header.last().map(String::as_str) == Some(TIME_COLUMN);
    if !shape_ok {
        return Err(format!("header {header:?}, expected {:?}", header_for(source)));
    }
    let schema = source.schema();
    let mut out = Vec::with_capacity(header.len());
    out.push(FieldSpec { name: KEY_COLUMN, kind: FieldKind::Text });
    for name in &header[1..header.len() - 1] {
        let spec = schema
            .iter()
            .find(|f| f.name == name.as_str())
            .ok_or_else(|| format!("unknown {source} column {name:?}"))?;
        if out.iter().any(|f| f.name == spec.name) {
            return Err(format!("column {name:?} repeated"));
        }
        out.push(*spec);
    }
    out.push(FieldSpec { name: TIME_COLUMN, kind: FieldKind::Text });
    Ok(out)
}

/// Serialize a snapshot in schema column order.
pub fn write_snapshot<W: Write>(mut w: W, snap: &Snapshot) -> std::io::Result<()> {
    let schema = snap.source().schema();
    write_row(&mut w, &header_for(snap.source()), STORE_SEP)?;
    for rec in snap.records() {
        let mut row = Vec::with_capacity(schema.len() + 2);
        row.push(rec.key.clone());
        for spec in schema {
            row.push(rec.get(spec.name).map(|v| v.to_string()).unwrap_or_default());
        }
        row.push(rec.fetched_at.to_rfc3339_opts(SecondsFormat::Micros, true));
        write_row(&mut w, &row, STORE_SEP)?;
    }
    Ok(())
}

fn read_snapshot(path: &Path, source: SourceId) -> Result<Snapshot, StoreError> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    parse_snapshot(&text, source).map_err(|(line, reason)| StoreError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    })
}

/// Parse snapshot text. Errors carry the offending line.
pub fn parse_snapshot(text: &str, source: SourceId) -> Result<Snapshot, (usize, String)> {
    let mut rows = parse_rows(text, STORE_SEP).into_iter();

    let Some(header) = rows.next() else {
        return Err((1, s!("missing header row")));
    };
    let columns = column_map(&header.cells, source).map_err(|reason| (header.line, reason))?;

    let mut records = Vec::new();
    for row in rows {
        if row.cells.len() != columns.len() {
            return Err((
                row.line,
                format!("{} columns, expected {}", row.cells.len(), columns.len()),
            ));
        }
        let mut cells = row.cells.into_iter();
        let key = cells.next().unwrap_or_default();
        if key.is_empty() {
            return Err((row.line, s!("empty identity_key")));
        }

        let mut fields = Fields::new();
        for spec in &columns[1..columns.len() - 1] {
            let raw = cells.next().unwrap_or_default();
            // An empty cell is an absent field, whatever its kind.
            if raw.is_empty() {
                continue;
            }
            let value = FieldValue::parse(spec.kind, &raw)
                .map_err(|e| (row.line, format!("{}: {e}", spec.name)))?;
            fields.insert(spec.name.to_string(), value);
        }

        let raw_time = cells.next().unwrap_or_default();
        let fetched_at = DateTime::parse_from_rfc3339(&raw_time)
            .map_err(|e| (row.line, format!("{TIME_COLUMN} {raw_time:?}: {e}")))?
            .with_timezone(&Utc);

        records.push((row.line, Record { source, key, fields, fetched_at }));
    }

    let mut snap = Snapshot::empty(source);
    for (line, rec) in records {
        if snap.contains(&rec.key) {
            return Err((line, format!("duplicate identity_key {:?}", rec.key)));
        }
        snap.upsert(rec).map_err(|e| (line, e.to_string()))?;
    }
    Ok(snap)
}
