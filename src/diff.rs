// src/diff.rs
//! Two-snapshot diff.
//!
//! Keys only in `new` are added, keys only in `old` are removed, keys in
//! both are changed when any field differs (value-exact) and unchanged
//! otherwise. `fetched_at` is never compared.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::DiffError;
use crate::record::{FieldValue, Record, SourceId};
use crate::snapshot::Snapshot;

/// One differing field. `None` means the field is absent on that side.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldDelta {
    pub field: String,
    pub before: Option<FieldValue>,
    pub after: Option<FieldValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangedRecord {
    pub key: String,
    pub old: Record,
    pub new: Record,
    /// Only the fields that differ, by field name.
    pub deltas: Vec<FieldDelta>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
    pub unchanged: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiffResult {
    pub source: SourceId,
    /// In `new` order.
    pub added: Vec<Record>,
    /// In `old` order.
    pub removed: Vec<Record>,
    /// In `new` order.
    pub changed: Vec<ChangedRecord>,
    pub unchanged_count: usize,
}

impl DiffResult {
    /// No record was added, removed or changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn counts(&self) -> DiffCounts {
        DiffCounts {
            added: self.added.len(),
            removed: self.removed.len(),
            changed: self.changed.len(),
            unchanged: self.unchanged_count,
        }
    }
}

pub fn diff(old: &Snapshot, new: &Snapshot) -> Result<DiffResult, DiffError> {
    if old.source() != new.source() {
        return Err(DiffError::SourceMismatch { old: old.source(), new: new.source() });
    }

    let mut added = Vec::new();
    let mut changed = Vec::new();
    let mut unchanged_count = 0;

    for rec in new.records() {
        match old.get(&rec.key) {
            None => added.push(rec.clone()),
            Some(prev) => {
                let deltas = field_deltas(prev, rec);
                if deltas.is_empty() {
                    unchanged_count += 1;
                } else {
                    changed.push(ChangedRecord {
                        key: rec.key.clone(),
                        old: prev.clone(),
                        new: rec.clone(),
                        deltas,
                    });
                }
            }
        }
    }

    let removed = old.records().iter().filter(|r| !new.contains(&r.key)).cloned().collect();

    Ok(DiffResult { source: new.source(), added, removed, changed, unchanged_count })
}

/// Differing fields of two versions of one record, by field name.
pub fn field_deltas(old: &Record, new: &Record) -> Vec<FieldDelta> {
    let names: BTreeSet<&String> = old.fields.keys().chain(new.fields.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| {
            let (before, after) = (old.fields.get(name), new.fields.get(name));
            (before != after).then(|| FieldDelta {
                field: name.clone(),
                before: before.cloned(),
                after: after.cloned(),
            })
        })
        .collect()
}
