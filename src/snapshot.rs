// src/snapshot.rs
use std::collections::BTreeSet;

use crate::model::SourceId;

/// The set of item URLs a source listed on one successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub source_id: SourceId,
    pub item_urls: BTreeSet<String>,
}

impl Snapshot {
    pub fn new(source_id: SourceId, item_urls: BTreeSet<String>) -> Self {
        Self {
            source_id,
            item_urls,
        }
    }

    /// URLs present in `self` but not in `older`.
    pub fn newer_than(&self, older: &Snapshot) -> Vec<String> {
        debug_assert_eq!(self.source_id, older.source_id);
        self.item_urls
            .difference(&older.item_urls)
            .cloned()
            .collect()
    }
}

/// Holds the last known-good snapshot of a single source.
///
/// Snapshots are replaced wholesale; a failed poll never touches the store.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Option<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn has_baseline(&self) -> bool {
        self.current.is_some()
    }

    /// Install `next` and return the URLs that are new relative to the
    /// previous snapshot. The first snapshot is a baseline and yields nothing.
    pub fn advance(&mut self, next: Snapshot) -> Vec<String> {
        let fresh = match &self.current {
            Some(prev) => next.newer_than(prev),
            None => Vec::new(),
        };
        self.current = Some(next);
        fresh
    }
}
