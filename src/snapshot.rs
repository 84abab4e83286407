// src/snapshot.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::SnapshotError;
use crate::record::{Record, SourceId};

/// Every record of one source at the end of one run.
///
/// Construction enforces the identity invariant (unique key, single source).
/// A snapshot is never edited in place once persisted; the merge step builds
/// a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    source: SourceId,
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn empty(source: SourceId) -> Self {
        Self { source, records: Vec::new(), index: HashMap::new() }
    }

    pub fn from_records(source: SourceId, records: Vec<Record>) -> Result<Self, SnapshotError> {
        let mut snap = Self::empty(source);
        snap.records.reserve(records.len());
        for rec in records {
            snap.check_source(&rec)?;
            if snap.index.contains_key(&rec.key) {
                return Err(SnapshotError::DuplicateKey { source_id: source, key: rec.key });
            }
            snap.index.insert(rec.key.clone(), snap.records.len());
            snap.records.push(rec);
        }
        Ok(snap)
    }

    pub fn source(&self) -> SourceId { self.source }
    pub fn records(&self) -> &[Record] { &self.records }
    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    pub fn contains(&self, key: &str) -> bool { self.index.contains_key(key) }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }

    /// Newest capture time in the snapshot.
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.fetched_at).max()
    }

    /// Replace the record with the same key in place, or append it.
    /// Returns the record it replaced.
    pub(crate) fn upsert(&mut self, rec: Record) -> Result<Option<Record>, SnapshotError> {
        self.check_source(&rec)?;
        match self.index.get(&rec.key) {
            Some(&i) => Ok(Some(std::mem::replace(&mut self.records[i], rec))),
            None => {
                self.index.insert(rec.key.clone(), self.records.len());
                self.records.push(rec);
                Ok(None)
            }
        }
    }

    fn check_source(&self, rec: &Record) -> Result<(), SnapshotError> {
        if rec.source != self.source {
            return Err(SnapshotError::ForeignRecord {
                key: rec.key.clone(),
                expected: self.source,
                found: rec.source,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(key: &str) -> Record {
        Record::new(SourceId::Static, key, Utc::now()).with("title", key)
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = Snapshot::from_records(SourceId::Static, vec![rec("a"), rec("b"), rec("a")])
            .unwrap_err();
        assert_eq!(err, SnapshotError::DuplicateKey { source_id: SourceId::Static, key: s!("a") });
    }

    #[test]
    fn foreign_records_are_rejected() {
        let q = Record::new(SourceId::Dynamic, "q1", Utc::now());
        assert!(matches!(
            Snapshot::from_records(SourceId::Static, vec![q]),
            Err(SnapshotError::ForeignRecord { .. })
        ));
    }

    #[test]
    fn taken_at_is_the_newest_capture() {
        use chrono::TimeZone;
        assert_eq!(Snapshot::empty(SourceId::Static).taken_at(), None);
        let at = |d| Utc.with_ymd_and_hms(2025, 10, d, 12, 0, 0).unwrap();
        let snap = Snapshot::from_records(
            SourceId::Static,
            vec![Record::new(SourceId::Static, "a", at(3)), Record::new(SourceId::Static, "b", at(9)), Record::new(SourceId::Static, "c", at(5))],
        )
        .unwrap();
        assert_eq!(snap.taken_at(), Some(at(9)));
    }

    #[test]
    fn upsert_keeps_position_of_existing_key() {
        let mut snap = Snapshot::from_records(SourceId::Static, vec![rec("a"), rec("b")]).unwrap();
        let replaced = snap.upsert(rec("a").with("title", "A2")).unwrap();
        assert!(replaced.is_some());
        assert!(snap.upsert(rec("c")).unwrap().is_none());
        let keys: Vec<_> = snap.keys().collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(snap.get("a").unwrap().get("title").unwrap().as_text(), Some("A2"));
    }
}
