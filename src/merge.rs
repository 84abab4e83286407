// src/merge.rs
//! Incremental merge: fold one fetch into the current snapshot.
//!
//! Records whose key was not fetched this run stay exactly as they were;
//! a bounded crawl never observes most of the catalogue, so "not seen" is
//! not "deleted". Deletions only show up in an explicit two-snapshot diff.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::SnapshotError;
use crate::record::Record;
use crate::snapshot::Snapshot;

/// What one merge did, counted per distinct fetched key against the
/// snapshot before the merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Records handed in, duplicates included.
    pub fetched: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Prior records not seen this run, kept as-is.
    pub retained: usize,
}

/// Apply `fetched` to `current` in order. A key already present is replaced
/// wholesale (fields and `fetched_at`), otherwise the record is appended.
/// Within one fetch, the last occurrence of a key wins.
pub fn merge(current: &Snapshot, fetched: Vec<Record>) -> Result<(Snapshot, MergeStats), SnapshotError> {
    let mut next = current.clone();
    let mut stats = MergeStats { fetched: fetched.len(), ..MergeStats::default() };
    let mut seen: HashSet<String> = HashSet::with_capacity(fetched.len());

    for rec in fetched {
        seen.insert(rec.key.clone());
        next.upsert(rec)?;
    }

    for key in &seen {
        match (current.get(key), next.get(key)) {
            (None, _) => stats.added += 1,
            (Some(old), Some(new)) if old.same_content(new) => stats.unchanged += 1,
            (Some(_), _) => stats.updated += 1,
        }
    }
    stats.retained = current.keys().filter(|k| !seen.contains(*k)).count();

    Ok((next, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceId;
    use chrono::{TimeZone, Utc};

    fn book(key: &str, price: f64, day: u32) -> Record {
        Record::new(SourceId::Static, key, Utc.with_ymd_and_hms(2025, 10, day, 8, 0, 0).unwrap())
            .with("title", key.to_uppercase())
            .with("price", price)
    }

    #[test]
    fn first_run_takes_everything() {
        let fetched: Vec<_> = (0..5).map(|i| book(&format!("b{i}"), 1.0 + i as f64, 1)).collect();
        let (snap, stats) = merge(&Snapshot::empty(SourceId::Static), fetched.clone()).unwrap();
        assert_eq!(snap.records(), &fetched[..]);
        assert_eq!(stats, MergeStats { fetched: 5, added: 5, ..MergeStats::default() });
    }

    #[test]
    fn unseen_records_are_retained() {
        let current = Snapshot::from_records(SourceId::Static, vec![book("a", 1.0, 1), book("b", 2.0, 1)]).unwrap();
        let (snap, stats) = merge(&current, vec![book("b", 2.5, 2), book("c", 3.0, 2)]).unwrap();

        assert_eq!(snap.get("a"), current.get("a"));
        assert_eq!(snap.get("b").unwrap().get("price").unwrap().to_string(), "2.5");
        let keys: Vec<_> = snap.keys().collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(stats, MergeStats { fetched: 2, added: 1, updated: 1, unchanged: 0, retained: 1 });
    }

    #[test]
    fn refetch_refreshes_timestamp_but_counts_unchanged() {
        let current = Snapshot::from_records(SourceId::Static, vec![book("a", 1.0, 1)]).unwrap();
        let (snap, stats) = merge(&current, vec![book("a", 1.0, 9)]).unwrap();
        assert_eq!(stats.unchanged, 1);
        assert_eq!(snap.get("a").unwrap().fetched_at.format("%d").to_string(), "09");
    }

    #[test]
    fn last_duplicate_in_a_fetch_wins() {
        let (snap, stats) = merge(
            &Snapshot::empty(SourceId::Static),
            vec![book("a", 1.0, 1), book("b", 2.0, 1), book("a", 7.0, 1)],
        )
        .unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("a").unwrap().get("price").unwrap().to_string(), "7");
        assert_eq!(stats.fetched, 3);
        assert_eq!(stats.added, 2);
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let current = Snapshot::from_records(SourceId::Static, vec![book("a", 1.0, 1)]).unwrap();
        let fetched = vec![book("a", 4.0, 2), book("z", 9.0, 2)];
        let (once, _) = merge(&current, fetched.clone()).unwrap();
        let (twice, stats) = merge(&once, fetched).unwrap();
        assert_eq!(once, twice);
        assert_eq!(stats.unchanged, 2);
        assert_eq!(stats.added + stats.updated, 0);
    }

    #[test]
    fn foreign_records_are_refused() {
        let q = Record::new(SourceId::Dynamic, "q", Utc::now());
        assert!(merge(&Snapshot::empty(SourceId::Static), vec![q]).is_err());
    }
}
