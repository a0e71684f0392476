//! Two-level lazy tree projection
//!
//! A [`TreeProjection`] presents a grouped index as
//!
//! ```text
//! Root (aggregate)
//! ├── Group("alerts")      label "alerts (2)"
//! │   ├── Record("alerts", 1)
//! │   └── Record("alerts", 2)
//! └── Group("suspicious")  label "suspicious (1)"
//! ```
//!
//! The group level is served by a [`GroupProvider`]; each expanded group by
//! its own [`RecordProvider`]. Both subscribe to the index independently
//! and push [`StructureChange`]s to the rendering layer only when their
//! child lists or labels actually change. Node identities are plain values,
//! so nodes with unchanged identity survive every refresh.

mod groups;
mod records;

pub use groups::GroupProvider;
pub use records::RecordProvider;

use crate::dispatcher::{AggregateCategory, AggregateItem, Materializable, TypeDispatcher};
use crate::error::ProjectionError;
use crate::node::{group_label, DisplayNode};
use casetree_index::{GroupedIndex, Subscription, SubscriptionBus};
use casetree_model::{GroupKey, RecordId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stable identity of a projection node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeIdentity {
    /// Aggregate root
    Root,
    /// Group of records sharing a key
    Group(GroupKey),
    /// Record inside a group
    Record(GroupKey, RecordId),
}

impl NodeIdentity {
    /// Group identity
    #[must_use]
    pub fn group(key: impl Into<GroupKey>) -> Self {
        Self::Group(key.into())
    }

    /// Record identity
    #[must_use]
    pub fn record(key: impl Into<GroupKey>, id: u64) -> Self {
        Self::Record(key.into(), RecordId::new(id))
    }
}

/// Provider lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Not listening; queries are rejected
    Inactive,
    /// Listening to index changes
    Active,
}

/// What changed on a node
///
/// A node receives at most one change per reload. An expanded group whose
/// membership changed gets a single `Children` change carrying
/// `label_changed`; a collapsed group gets `Label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Child list changed
    Children {
        /// Children that appeared, in display order
        added: Vec<NodeIdentity>,
        /// Children that disappeared
        removed: Vec<NodeIdentity>,
        /// Whether the node's label changed too
        label_changed: bool,
    },
    /// Display label changed
    Label,
}

/// Push notification telling the rendering layer to re-pull a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureChange {
    /// Node to re-pull
    pub node: NodeIdentity,
    /// What changed
    pub kind: ChangeKind,
}

impl StructureChange {
    /// Check if this is a child-list change
    #[inline]
    #[must_use]
    pub fn is_children(&self) -> bool {
        matches!(self.kind, ChangeKind::Children { .. })
    }

    /// Check if the node's label must be re-pulled
    #[inline]
    #[must_use]
    pub fn relabels(&self) -> bool {
        matches!(
            self.kind,
            ChangeKind::Label | ChangeKind::Children { label_changed: true, .. }
        )
    }
}

/// Record-level providers of expanded groups
pub(crate) type Expanded = DashMap<GroupKey, RecordProvider>;

/// Child-list source the rendering layer can enumerate
pub trait ChildProvider: Send + Sync {
    /// Start listening and load the initial child list
    fn attach(&self);

    /// Stop listening; pending notifications are discarded
    fn detach(&self);

    /// Current lifecycle state
    fn state(&self) -> ProviderState;

    /// Current children in display order
    fn children(&self) -> Vec<NodeIdentity>;
}

/// Active flag plus the index subscription that keeps a provider live
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    active: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl Lifecycle {
    /// Returns `false` if already active
    pub(crate) fn activate(&self, subscribe: impl FnOnce() -> Subscription) -> bool {
        let mut slot = self.subscription.lock();
        if self.active.load(Ordering::Acquire) {
            return false;
        }
        *slot = Some(subscribe());
        self.active.store(true, Ordering::Release);
        true
    }

    /// Returns `false` if already inactive
    pub(crate) fn deactivate(&self) -> bool {
        let subscription = {
            let mut slot = self.subscription.lock();
            if !self.active.swap(false, Ordering::AcqRel) {
                return false;
            }
            slot.take()
        };
        drop(subscription);
        true
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> ProviderState {
        if self.is_active() {
            ProviderState::Active
        } else {
            ProviderState::Inactive
        }
    }
}

/// Lazy two-level view over one grouped index
pub struct TreeProjection {
    index: Arc<GroupedIndex>,
    dispatcher: Arc<TypeDispatcher>,
    root: AggregateCategory,
    changes: Arc<SubscriptionBus<StructureChange>>,
    groups: GroupProvider,
    records: Arc<Expanded>,
    pruning: Mutex<Option<Subscription>>,
}

impl TreeProjection {
    /// Create detached projection
    #[must_use]
    pub fn new(
        index: Arc<GroupedIndex>,
        dispatcher: Arc<TypeDispatcher>,
        root: AggregateCategory,
    ) -> Self {
        let changes = Arc::new(SubscriptionBus::new());
        let records = Arc::new(Expanded::new());
        let groups = GroupProvider::tracking(Arc::clone(&index), Arc::clone(&changes), &records);
        Self {
            index,
            dispatcher,
            root,
            changes,
            groups,
            records,
            pruning: Mutex::new(None),
        }
    }

    /// Create and attach projection
    #[must_use]
    pub fn attached(
        index: Arc<GroupedIndex>,
        dispatcher: Arc<TypeDispatcher>,
        root: AggregateCategory,
    ) -> Self {
        let projection = Self::new(index, dispatcher, root);
        projection.attach();
        projection
    }

    /// Start listening to the index
    ///
    /// Loads the index if it has never been loaded. Idempotent.
    pub fn attach(&self) {
        {
            let mut pruning = self.pruning.lock();
            if pruning.is_none() {
                let records = Arc::downgrade(&self.records);
                *pruning = Some(self.changes.subscribe(move |change: &StructureChange| {
                    let (NodeIdentity::Root, ChangeKind::Children { removed, .. }) =
                        (&change.node, &change.kind)
                    else {
                        return;
                    };
                    let Some(records) = records.upgrade() else {
                        return;
                    };
                    for node in removed {
                        if let NodeIdentity::Group(key) = node {
                            if let Some((_, provider)) = records.remove(key) {
                                provider.detach();
                            }
                        }
                    }
                }));
            }
        }
        self.groups.attach();
    }

    /// Stop listening and drop every record-level provider
    pub fn detach(&self) {
        self.groups.detach();
        let pruning = self.pruning.lock().take();
        drop(pruning);

        let keys: Vec<GroupKey> = self.records.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, provider)) = self.records.remove(&key) {
                provider.detach();
            }
        }
    }

    /// Lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ProviderState {
        self.groups.state()
    }

    /// Backing index
    #[inline]
    #[must_use]
    pub fn index(&self) -> &Arc<GroupedIndex> {
        &self.index
    }

    /// Register a structure-change callback
    pub fn on_structure_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StructureChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(callback)
    }

    /// Expand a group, creating its record-level provider on first use
    ///
    /// # Errors
    /// - [`ProjectionError::Detached`] if the projection is inactive
    /// - [`ProjectionError::UnknownNode`] if the key is not a current group
    pub fn expand(&self, key: &GroupKey) -> Result<RecordProvider, ProjectionError> {
        self.ensure_active()?;
        if let Some(provider) = self.records.get(key).map(|p| p.value().clone()) {
            provider.attach();
            return Ok(provider);
        }
        if !self.groups.contains(key) {
            return Err(ProjectionError::UnknownNode(NodeIdentity::Group(key.clone())));
        }

        // Registered before attaching, so the group level already defers
        // this key's label when the first reload lands.
        let provider = RecordProvider::new(
            Arc::clone(&self.index),
            key.clone(),
            Arc::clone(&self.changes),
        );
        let stored = self.records.entry(key.clone()).or_insert(provider).value().clone();
        stored.attach();
        tracing::debug!(index = self.index.name(), group = %key, "group expanded");
        Ok(stored)
    }

    /// Collapse a group, detaching its record-level provider
    pub fn collapse(&self, key: &GroupKey) -> bool {
        match self.records.remove(key) {
            Some((_, provider)) => {
                provider.detach();
                true
            }
            None => false,
        }
    }

    /// Keys of expanded groups
    #[must_use]
    pub fn expanded(&self) -> Vec<GroupKey> {
        let mut keys: Vec<GroupKey> = self.records.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Children of a node
    ///
    /// Root lists groups in key order; a group lists its records in store
    /// order; unknown groups and records have no children.
    ///
    /// # Errors
    /// Returns [`ProjectionError::Detached`] if the projection is inactive
    pub fn list_children(&self, node: &NodeIdentity) -> Result<Vec<NodeIdentity>, ProjectionError> {
        self.ensure_active()?;
        match node {
            NodeIdentity::Root => Ok(self.groups.children()),
            NodeIdentity::Group(key) => match self.expand(key) {
                Ok(provider) => Ok(provider.children()),
                Err(ProjectionError::UnknownNode(_)) => Ok(Vec::new()),
                Err(error) => Err(error),
            },
            NodeIdentity::Record(..) => Ok(Vec::new()),
        }
    }

    /// Display label of a node
    ///
    /// Group labels embed the live member count. Record labels fetch the
    /// record body.
    ///
    /// # Errors
    /// - [`ProjectionError::Detached`] if the projection is inactive
    /// - [`ProjectionError::UnknownNode`] for groups that no longer exist and
    ///   records that are not members of their group
    pub fn display_label(&self, node: &NodeIdentity) -> Result<String, ProjectionError> {
        self.ensure_active()?;
        match node {
            NodeIdentity::Root => Ok(self.index.spec().display_name.clone()),
            NodeIdentity::Group(key) => {
                if let Some(provider) = self.records.get(key) {
                    return Ok(provider.value().label());
                }
                self.groups
                    .count(key)
                    .map(|count| group_label(key, count))
                    .ok_or_else(|| ProjectionError::UnknownNode(node.clone()))
            }
            NodeIdentity::Record(..) => Ok(self.materialize(node)?.display_name),
        }
    }

    /// Build the display node for `node`
    ///
    /// Record bodies are fetched here and nowhere else. Store and dispatch
    /// failures yield an error placeholder.
    ///
    /// # Errors
    /// - [`ProjectionError::Detached`] if the projection is inactive
    /// - [`ProjectionError::UnknownNode`] for groups that no longer exist and
    ///   records that are not members of their group
    pub fn materialize(&self, node: &NodeIdentity) -> Result<DisplayNode, ProjectionError> {
        self.ensure_active()?;
        match node {
            NodeIdentity::Root => {
                let item = AggregateItem::grouped(self.root.clone(), Arc::clone(&self.index));
                Ok(self
                    .dispatcher
                    .materialize_or_placeholder(&Materializable::Aggregate(item)))
            }
            NodeIdentity::Group(key) => self
                .groups
                .count(key)
                .map(|count| DisplayNode::group(key, count))
                .ok_or_else(|| ProjectionError::UnknownNode(node.clone())),
            NodeIdentity::Record(key, id) => {
                let provider = self.expand(key).map_err(|error| match error {
                    ProjectionError::UnknownNode(_) => ProjectionError::UnknownNode(node.clone()),
                    other => other,
                })?;
                if !provider.contains(*id) {
                    return Err(ProjectionError::UnknownNode(node.clone()));
                }
                Ok(provider.materialize(*id, &self.dispatcher))
            }
        }
    }

    fn ensure_active(&self) -> Result<(), ProjectionError> {
        match self.groups.state() {
            ProviderState::Active => Ok(()),
            ProviderState::Inactive => Err(ProjectionError::Detached),
        }
    }
}

impl Drop for TreeProjection {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for TreeProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeProjection")
            .field("index", &self.index.name())
            .field("root", &self.root)
            .field("state", &self.state())
            .field("expanded", &self.records.len())
            .finish_non_exhaustive()
    }
}
