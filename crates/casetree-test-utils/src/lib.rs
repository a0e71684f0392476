//! Testing utilities for casetree workspace
//!
//! Shared test helpers, fixtures, and fault-injecting stores.

#![allow(missing_docs)]

use casetree_model::{
    AttributeName, CaseStore, Category, GroupKey, MemoryStore, Record, RecordId, StoreError,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn hit(id: u64, category: Category, set_name: &str) -> Record {
    Record::new(RecordId::new(id), category).with_text(AttributeName::set_name(), set_name)
}

pub fn interesting_file_hit(id: u64, set_name: &str) -> Record {
    hit(id, Category::InterestingFileHit, set_name)
}

pub fn named(id: u64, category: Category, name: &str) -> Record {
    Record::new(RecordId::new(id), category).with_text(AttributeName::name(), name)
}

/// `[("alerts", 1), ("alerts", 2), ("suspicious", 3)]` as interesting file hits
pub fn alerts_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_records([
        interesting_file_hit(1, "alerts"),
        interesting_file_hit(2, "alerts"),
        interesting_file_hit(3, "suspicious"),
    ]))
}

pub fn ids(values: &[u64]) -> Vec<RecordId> {
    values.iter().copied().map(RecordId::new).collect()
}

pub fn key_strings(keys: &[GroupKey]) -> Vec<String> {
    keys.iter().map(|k| k.as_str().to_string()).collect()
}

/// [`MemoryStore`] wrapper with switchable failures and query counting
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<Category>>,
    fail_all: Mutex<bool>,
    missing: Mutex<HashSet<RecordId>>,
    queries: AtomicUsize,
    fetches: AtomicUsize,
}

impl FlakyStore {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::with_records(records),
            ..Self::default()
        })
    }

    pub fn records(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail_category(&self, category: Category) {
        self.failing.lock().insert(category);
    }

    pub fn heal_category(&self, category: &Category) {
        self.failing.lock().remove(category);
    }

    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock() = fail;
    }

    /// Make `fetch_record` report the record as missing
    pub fn hide_record(&self, id: RecordId) {
        self.missing.lock().insert(id);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CaseStore for FlakyStore {
    fn query_grouped_ids(
        &self,
        category: &Category,
        grouping: &AttributeName,
    ) -> Result<Vec<(GroupKey, RecordId)>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if *self.fail_all.lock() || self.failing.lock().contains(category) {
            return Err(StoreError::unavailable(format!("{category} query failed")));
        }
        self.inner.query_grouped_ids(category, grouping)
    }

    fn fetch_record(&self, id: RecordId) -> Result<Record, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.missing.lock().contains(&id) {
            return Err(StoreError::RecordNotFound(id));
        }
        self.inner.fetch_record(id)
    }
}

/// Collects events delivered to a listener
#[derive(Debug)]
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Listener closure appending every event it sees
    pub fn sink(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &T| events.lock().push(event.clone())
    }

    pub fn events(&self) -> Vec<T> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + 'static> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}
