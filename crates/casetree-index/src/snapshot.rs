//! Immutable grouping snapshots
//!
//! A [`Snapshot`] is published once and never mutated. Updates build a fresh
//! snapshot with [`SnapshotBuilder`] and swap it in whole.

use casetree_model::{GroupKey, RecordId};
use indexmap::IndexSet;
use std::collections::BTreeMap;

/// Immutable mapping of group key to member record IDs
///
/// Keys iterate in lexicographic order. Each ID set keeps first-seen store
/// order and holds every ID at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    generation: u64,
    groups: BTreeMap<GroupKey, IndexSet<RecordId>>,
}

impl Snapshot {
    /// Empty snapshot at generation 0 (never loaded)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reload generation that published this snapshot
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sorted group keys
    #[must_use]
    pub fn group_keys(&self) -> Vec<GroupKey> {
        self.groups.keys().cloned().collect()
    }

    /// Member IDs of a group; empty for unknown keys
    #[must_use]
    pub fn record_ids(&self, key: &str) -> IndexSet<RecordId> {
        self.groups.get(key).cloned().unwrap_or_default()
    }

    /// Member count of a group; zero for unknown keys
    #[inline]
    #[must_use]
    pub fn member_count(&self, key: &str) -> usize {
        self.groups.get(key).map_or(0, IndexSet::len)
    }

    /// Check if group exists
    #[inline]
    #[must_use]
    pub fn contains_group(&self, key: &str) -> bool {
        self.groups.contains_key(key)
    }

    /// Number of groups
    #[inline]
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Check if snapshot has no groups
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Compare keys and ID sets, ignoring generation
    #[must_use]
    pub fn same_groups(&self, other: &Snapshot) -> bool {
        self.groups == other.groups
    }

    /// Iterate over groups in key order
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &IndexSet<RecordId>)> {
        self.groups.iter()
    }
}

/// Accumulates store rows into a new [`Snapshot`]
///
/// Rows for the same key are unioned across categories.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    groups: BTreeMap<GroupKey, IndexSet<RecordId>>,
}

impl SnapshotBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one `(key, id)` row
    pub fn push(&mut self, key: GroupKey, id: RecordId) {
        self.groups.entry(key).or_default().insert(id);
    }

    /// Add rows in store order
    pub fn extend(&mut self, rows: impl IntoIterator<Item = (GroupKey, RecordId)>) {
        for (key, id) in rows {
            self.push(key, id);
        }
    }

    /// Number of distinct rows collected so far
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.groups.values().map(IndexSet::len).sum()
    }

    /// Finish snapshot tagged with `generation`
    #[must_use]
    pub fn build(self, generation: u64) -> Snapshot {
        Snapshot {
            generation,
            groups: self.groups,
        }
    }
}
