//! Grouped result index
//!
//! Provides [`GroupedIndex`], the cache core: a published [`Snapshot`]
//! rebuilt in full from the case store on every reload.
//!
//! # Concurrency
//!
//! - Reloads are serialized by a single writer lock held across
//!   query → build → publish. The last reload to complete wins.
//! - Readers clone the current `Arc<Snapshot>` and never observe a partially
//!   built snapshot.
//! - Listeners are notified after the swap, with no index lock held.

use crate::bus::{Subscription, SubscriptionBus};
use crate::snapshot::{Snapshot, SnapshotBuilder};
use casetree_model::{AttributeName, CaseStore, Category, GroupKey, RecordId, StoreError};
use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What an index groups and by which attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Stable name, used in logs and change events
    pub name: String,

    /// Label for the aggregate root node
    pub display_name: String,

    /// Record categories merged into this index
    pub categories: Vec<Category>,

    /// Attribute whose text value is the group key
    pub grouping: AttributeName,
}

impl IndexSpec {
    /// Create definition for a single category
    #[must_use]
    pub fn new(name: impl Into<String>, category: Category, grouping: AttributeName) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            categories: vec![category],
            grouping,
        }
    }

    /// Interesting file and artifact hits, grouped by rule set
    #[must_use]
    pub fn interesting_items() -> Self {
        Self::new(
            "interesting_items",
            Category::InterestingFileHit,
            AttributeName::set_name(),
        )
        .with_category(Category::InterestingArtifactHit)
        .with_display_name("Interesting Items")
    }

    /// Known hash-set hits, grouped by hash set
    #[must_use]
    pub fn hashset_hits() -> Self {
        Self::new("hashset_hits", Category::HashsetHit, AttributeName::set_name())
            .with_display_name("Hashset Hits")
    }

    /// Keyword hits, grouped by search term
    #[must_use]
    pub fn keyword_hits() -> Self {
        Self::new("keyword_hits", Category::KeywordHit, AttributeName::keyword())
            .with_display_name("Keyword Hits")
    }

    /// With additional category
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    /// With display name
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

/// Published after every successful reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Name of the index that reloaded
    pub index: Arc<str>,

    /// Generation now visible to readers
    pub generation: u64,
}

/// A category whose query failed during reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFailure {
    /// Category that failed
    pub category: Category,

    /// Store error
    pub error: StoreError,
}

/// Outcome of one reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    /// Generation visible after the reload
    pub generation: u64,

    /// Whether a new snapshot was published and listeners notified
    pub published: bool,

    /// Categories that contributed nothing because their query failed
    pub failures: Vec<CategoryFailure>,
}

impl ReloadReport {
    /// Check if every category loaded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.published && self.failures.is_empty()
    }
}

/// Observer-notified grouped cache over a [`CaseStore`]
pub struct GroupedIndex {
    spec: IndexSpec,
    label: Arc<str>,
    store: Arc<dyn CaseStore>,
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    bus: SubscriptionBus<ChangeEvent>,
}

impl GroupedIndex {
    /// Create index with an empty, never-loaded snapshot
    #[must_use]
    pub fn new(spec: IndexSpec, store: Arc<dyn CaseStore>) -> Self {
        Self {
            label: Arc::from(spec.name.as_str()),
            spec,
            store,
            current: RwLock::new(Arc::new(Snapshot::empty())),
            writer: Mutex::new(()),
            bus: SubscriptionBus::new(),
        }
    }

    /// Create index and run the initial reload
    #[must_use]
    pub fn loaded(spec: IndexSpec, store: Arc<dyn CaseStore>) -> Arc<Self> {
        let index = Arc::new(Self::new(spec, store));
        index.reload();
        index
    }

    /// Index definition
    #[inline]
    #[must_use]
    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    /// Index name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Backing store this index reads from
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CaseStore> {
        &self.store
    }

    /// Check if reloads query `category`
    #[inline]
    #[must_use]
    pub fn tracks(&self, category: &Category) -> bool {
        self.spec.categories.contains(category)
    }

    /// Rebuild the snapshot from the store and notify listeners
    ///
    /// Every tracked category is queried. A failing category is logged and
    /// contributes nothing; if all of them fail the previous snapshot stays
    /// published and no listener is notified.
    pub fn reload(&self) -> ReloadReport {
        let (report, event) = {
            let _writer = self.writer.lock();

            let mut builder = SnapshotBuilder::new();
            let mut failures = Vec::new();
            for category in &self.spec.categories {
                match self.store.query_grouped_ids(category, &self.spec.grouping) {
                    Ok(rows) => {
                        tracing::debug!(index = %self.label, %category, rows = rows.len(), "category loaded");
                        builder.extend(rows);
                    }
                    Err(error) => {
                        tracing::warn!(index = %self.label, %category, %error, "category query failed");
                        failures.push(CategoryFailure {
                            category: category.clone(),
                            error,
                        });
                    }
                }
            }

            let previous = self.snapshot();
            if !self.spec.categories.is_empty() && failures.len() == self.spec.categories.len() {
                tracing::warn!(
                    index = %self.label,
                    generation = previous.generation(),
                    "all categories failed, keeping previous snapshot"
                );
                return ReloadReport {
                    generation: previous.generation(),
                    published: false,
                    failures,
                };
            }

            let generation = previous.generation() + 1;
            let snapshot = Arc::new(builder.build(generation));
            tracing::debug!(
                index = %self.label,
                generation,
                groups = snapshot.group_count(),
                "snapshot published"
            );
            *self.current.write() = snapshot;

            let report = ReloadReport {
                generation,
                published: true,
                failures,
            };
            let event = ChangeEvent {
                index: Arc::clone(&self.label),
                generation,
            };
            (report, event)
        };

        self.bus.publish(&event);
        report
    }

    /// Current snapshot
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Generation of the current snapshot (0 before the first reload)
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.read().generation()
    }

    /// Sorted group keys
    #[must_use]
    pub fn group_keys(&self) -> Vec<GroupKey> {
        self.snapshot().group_keys()
    }

    /// Member IDs of a group in store order; empty for unknown keys
    #[must_use]
    pub fn record_ids(&self, key: &str) -> IndexSet<RecordId> {
        self.snapshot().record_ids(key)
    }

    /// Member count of a group
    #[must_use]
    pub fn member_count(&self, key: &str) -> usize {
        self.snapshot().member_count(key)
    }

    /// Number of groups
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.snapshot().group_count()
    }

    /// Register change listener
    ///
    /// Listeners are called once per published reload, after the new
    /// snapshot is readable. They must be cheap and must not block.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(listener)
    }

    /// Remove change listener
    pub fn unsubscribe(&self, subscription: Subscription) {
        subscription.cancel();
    }

    /// Number of registered listeners
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.bus.listener_count()
    }
}

impl fmt::Debug for GroupedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupedIndex")
            .field("spec", &self.spec)
            .field("generation", &self.generation())
            .field("listeners", &self.bus.listener_count())
            .finish_non_exhaustive()
    }
}
