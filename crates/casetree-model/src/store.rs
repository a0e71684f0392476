//! Backing-store capability
//!
//! [`CaseStore`] is the only way the index and tree layers reach the case
//! database. Calls may block; callers must not hold in-memory locks across them.

use crate::category::Category;
use crate::record::{AttributeName, GroupKey, Record, RecordId};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::io::Read;

/// Errors reported by a backing store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Query could not be executed
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Record does not exist
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// Case data could not be decoded
    #[error("invalid case data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Create unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

/// Query capability over the case database
pub trait CaseStore: Send + Sync {
    /// Return `(group key, record ID)` rows for every record of `category`
    /// carrying a text value for `grouping`, in store order
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the query cannot run
    fn query_grouped_ids(
        &self,
        category: &Category,
        grouping: &AttributeName,
    ) -> Result<Vec<(GroupKey, RecordId)>, StoreError>;

    /// Fetch the full record body
    ///
    /// # Errors
    /// Returns [`StoreError::RecordNotFound`] for unknown IDs
    fn fetch_record(&self, id: RecordId) -> Result<Record, StoreError>;
}

/// Thread-safe in-memory case store
///
/// Insertion order is the store's return order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<IndexMap<RecordId, Record>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store holding `records`
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        store.extend(records);
        store
    }

    /// Decode a JSON array of records
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidData`] if the input is not a record array
    pub fn from_json_reader(reader: impl Read) -> Result<Self, StoreError> {
        let records: Vec<Record> = serde_json::from_reader(reader)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        tracing::debug!(count = records.len(), "loaded case records");
        Ok(Self::with_records(records))
    }

    /// Insert or replace a record
    ///
    /// A replaced record keeps its original position.
    pub fn insert(&self, record: Record) {
        self.records.write().insert(record.id, record);
    }

    /// Insert many records
    pub fn extend(&self, records: impl IntoIterator<Item = Record>) {
        let mut guard = self.records.write();
        for record in records {
            guard.insert(record.id, record);
        }
    }

    /// Remove a record, returning it if present
    pub fn remove(&self, id: RecordId) -> Option<Record> {
        self.records.write().shift_remove(&id)
    }

    /// Get record count
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CaseStore for MemoryStore {
    fn query_grouped_ids(
        &self,
        category: &Category,
        grouping: &AttributeName,
    ) -> Result<Vec<(GroupKey, RecordId)>, StoreError> {
        let guard = self.records.read();
        Ok(guard
            .values()
            .filter(|record| &record.category == category)
            .filter_map(|record| record.group_key(grouping).map(|key| (key, record.id)))
            .collect())
    }

    fn fetch_record(&self, id: RecordId) -> Result<Record, StoreError> {
        self.records
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::RecordNotFound(id))
    }
}
