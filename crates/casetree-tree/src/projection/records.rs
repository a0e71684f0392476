//! Record-level provider: the members of one group

use super::{ChangeKind, ChildProvider, Lifecycle, NodeIdentity, ProviderState, StructureChange};
use crate::dispatcher::{log_failure, Materializable, TypeDispatcher};
use crate::error::DispatchError;
use crate::node::{group_label, DisplayNode};
use casetree_index::{ChangeEvent, GroupedIndex, SubscriptionBus};
use casetree_model::{GroupKey, RecordId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Lists the record IDs of one group and fetches bodies on demand
#[derive(Clone)]
pub struct RecordProvider {
    inner: Arc<RecordInner>,
}

struct RecordInner {
    index: Arc<GroupedIndex>,
    key: GroupKey,
    changes: Arc<SubscriptionBus<StructureChange>>,
    lifecycle: Lifecycle,
    view: Mutex<RecordView>,
}

#[derive(Default)]
struct RecordView {
    generation: u64,
    ids: Vec<RecordId>,
}

impl RecordProvider {
    /// Create detached provider for the group `key`
    #[must_use]
    pub fn new(
        index: Arc<GroupedIndex>,
        key: GroupKey,
        changes: Arc<SubscriptionBus<StructureChange>>,
    ) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                index,
                key,
                changes,
                lifecycle: Lifecycle::default(),
                view: Mutex::new(RecordView::default()),
            }),
        }
    }

    /// Group key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &GroupKey {
        &self.inner.key
    }

    /// Member IDs in store order
    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        self.inner.view.lock().ids.clone()
    }

    /// Whether `id` is currently a member of this group
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.inner.view.lock().ids.contains(&id)
    }

    /// Group label with the current member count
    #[must_use]
    pub fn label(&self) -> String {
        group_label(&self.inner.key, self.inner.view.lock().ids.len())
    }

    /// Fetch the body of `id` and build its display node
    ///
    /// Never fails: a missing record or store error becomes a placeholder.
    #[must_use]
    pub fn materialize(&self, id: RecordId, dispatcher: &TypeDispatcher) -> DisplayNode {
        match self.inner.index.store().fetch_record(id) {
            Ok(record) => dispatcher.materialize_or_placeholder(&Materializable::Stored(record)),
            Err(error) => {
                let error = DispatchError::from(error);
                let name = id.to_string();
                log_failure(&name, self.inner.key.as_str(), &error);
                DisplayNode::placeholder(name, &error)
            }
        }
    }
}

impl ChildProvider for RecordProvider {
    fn attach(&self) {
        let inner = &self.inner;
        if inner.lifecycle.is_active() {
            return;
        }
        let _ = inner.sync();
        RecordInner::go_live(inner);
    }

    fn detach(&self) {
        if self.inner.lifecycle.deactivate() {
            *self.inner.view.lock() = RecordView::default();
            tracing::debug!(
                index = self.inner.index.name(),
                group = %self.inner.key,
                "record provider detached"
            );
        }
    }

    fn state(&self) -> ProviderState {
        self.inner.lifecycle.state()
    }

    fn children(&self) -> Vec<NodeIdentity> {
        let key = &self.inner.key;
        self.inner
            .view
            .lock()
            .ids
            .iter()
            .map(|id| NodeIdentity::Record(key.clone(), *id))
            .collect()
    }
}

struct RecordDiff {
    added: Vec<RecordId>,
    removed: Vec<RecordId>,
    label_changed: bool,
}

impl RecordInner {
    /// Subscribe, then report any reload that landed since the silent fill
    fn go_live(inner: &Arc<Self>) -> bool {
        let weak = Arc::downgrade(inner);
        let activated = inner.lifecycle.activate(|| {
            inner.index.subscribe(move |_: &ChangeEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh();
                }
            })
        });
        if activated {
            inner.refresh();
        }
        activated
    }

    fn refresh(&self) {
        if !self.lifecycle.is_active() {
            return;
        }
        let Some(diff) = self.sync() else {
            return;
        };
        if (diff.added.is_empty() && diff.removed.is_empty()) || !self.lifecycle.is_active() {
            return;
        }
        let identity = |id: RecordId| NodeIdentity::Record(self.key.clone(), id);
        self.changes.publish(&StructureChange {
            node: NodeIdentity::Group(self.key.clone()),
            kind: ChangeKind::Children {
                added: diff.added.into_iter().map(identity).collect(),
                removed: diff.removed.into_iter().map(identity).collect(),
                label_changed: diff.label_changed,
            },
        });
    }

    /// Bring the view up to the current snapshot
    ///
    /// `None` if the view is current or the group vanished; a vanished group
    /// is reported once, at the root.
    fn sync(&self) -> Option<RecordDiff> {
        let snapshot = self.index.snapshot();
        let mut view = self.view.lock();
        if snapshot.generation() <= view.generation {
            return None;
        }
        let ids: Vec<RecordId> = snapshot.record_ids(self.key.as_str()).into_iter().collect();
        let before: HashSet<RecordId> = view.ids.iter().copied().collect();
        let after: HashSet<RecordId> = ids.iter().copied().collect();

        let added = ids.iter().copied().filter(|id| !before.contains(id)).collect();
        let removed = view.ids.iter().copied().filter(|id| !after.contains(id)).collect();
        let label_changed = view.ids.len() != ids.len();
        let vanished = ids.is_empty();

        view.generation = snapshot.generation();
        view.ids = ids;
        (!vanished).then_some(RecordDiff {
            added,
            removed,
            label_changed,
        })
    }
}

impl std::fmt::Debug for RecordProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let view = self.inner.view.lock();
        f.debug_struct("RecordProvider")
            .field("index", &self.inner.index.name())
            .field("key", &self.inner.key)
            .field("state", &self.inner.lifecycle.state())
            .field("generation", &view.generation)
            .field("records", &view.ids.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casetree_index::IndexSpec;
    use casetree_model::Category;
    use casetree_test_utils::{ids, interesting_file_hit, named, FlakyStore, Recorder};
    use pretty_assertions::assert_eq;

    fn setup() -> (Arc<FlakyStore>, Arc<GroupedIndex>, Arc<SubscriptionBus<StructureChange>>) {
        let store = FlakyStore::new([
            interesting_file_hit(1, "alerts"),
            interesting_file_hit(2, "alerts"),
            interesting_file_hit(3, "suspicious"),
        ]);
        let index = GroupedIndex::loaded(IndexSpec::interesting_items(), store.clone());
        (store, index, Arc::new(SubscriptionBus::new()))
    }

    #[test]
    fn lists_members_in_store_order() {
        let (_store, index, changes) = setup();
        let provider = RecordProvider::new(index, GroupKey::new("alerts"), changes);
        provider.attach();

        assert_eq!(provider.ids(), ids(&[1, 2]));
        assert_eq!(provider.label(), "alerts (2)");
        assert_eq!(
            provider.children(),
            vec![NodeIdentity::record("alerts", 1), NodeIdentity::record("alerts", 2)]
        );
    }

    #[test]
    fn listing_does_not_fetch_bodies() {
        let (store, index, changes) = setup();
        let provider = RecordProvider::new(index, GroupKey::new("alerts"), changes);
        provider.attach();
        let _ = provider.children();

        assert_eq!(store.fetch_count(), 0);
    }

    #[test]
    fn new_member_emits_children_diff() {
        let (store, index, changes) = setup();
        let recorder = Recorder::new();
        let _sub = changes.subscribe(recorder.sink());
        let provider = RecordProvider::new(Arc::clone(&index), GroupKey::new("alerts"), changes);
        provider.attach();

        store.records().insert(interesting_file_hit(4, "alerts"));
        index.reload();

        assert_eq!(
            recorder.events(),
            vec![StructureChange {
                node: NodeIdentity::group("alerts"),
                kind: ChangeKind::Children {
                    added: vec![NodeIdentity::record("alerts", 4)],
                    removed: vec![],
                    label_changed: true,
                },
            }]
        );
        assert_eq!(provider.label(), "alerts (3)");
    }

    #[test]
    fn swapped_member_keeps_label() {
        let (store, index, changes) = setup();
        let recorder = Recorder::new();
        let _sub = changes.subscribe(recorder.sink());
        let provider = RecordProvider::new(Arc::clone(&index), GroupKey::new("alerts"), changes);
        provider.attach();

        store.records().remove(RecordId::new(2));
        store.records().insert(interesting_file_hit(4, "alerts"));
        index.reload();

        assert_eq!(
            recorder.events(),
            vec![StructureChange {
                node: NodeIdentity::group("alerts"),
                kind: ChangeKind::Children {
                    added: vec![NodeIdentity::record("alerts", 4)],
                    removed: vec![NodeIdentity::record("alerts", 2)],
                    label_changed: false,
                },
            }]
        );
    }

    #[test]
    fn reload_before_subscription_is_caught_up() {
        let (store, index, changes) = setup();
        let recorder = Recorder::new();
        let _sub = changes.subscribe(recorder.sink());
        let provider = RecordProvider::new(Arc::clone(&index), GroupKey::new("alerts"), changes);
        let _ = provider.inner.sync();

        store.records().insert(interesting_file_hit(4, "alerts"));
        index.reload();
        assert!(RecordInner::go_live(&provider.inner));

        assert_eq!(recorder.len(), 1);
        assert_eq!(provider.ids(), ids(&[1, 2, 4]));
        assert!(provider.contains(RecordId::new(4)));
        assert!(!provider.contains(RecordId::new(3)));
    }

    #[test]
    fn vanished_group_is_silent() {
        let (store, index, changes) = setup();
        let recorder = Recorder::new();
        let _sub = changes.subscribe(recorder.sink());
        let provider = RecordProvider::new(Arc::clone(&index), GroupKey::new("suspicious"), changes);
        provider.attach();

        store.records().remove(RecordId::new(3));
        index.reload();

        assert!(recorder.is_empty());
        assert!(provider.ids().is_empty());
    }

    #[test]
    fn missing_record_materializes_as_placeholder() {
        let (store, index, changes) = setup();
        let provider = RecordProvider::new(index, GroupKey::new("alerts"), changes);
        provider.attach();
        store.hide_record(RecordId::new(2));

        let dispatcher = TypeDispatcher::with_defaults();
        let ok = provider.materialize(RecordId::new(1), &dispatcher);
        let missing = provider.materialize(RecordId::new(2), &dispatcher);

        assert!(!ok.is_placeholder());
        assert!(missing.is_placeholder());
        assert_eq!(missing.error.as_deref(), Some("record not found: 2"));
    }

    #[test]
    fn unsupported_record_category_materializes_as_placeholder() {
        let (store, index, changes) = setup();
        store.records().insert(named(1, Category::Other("tsk_gps_track".into()), "track"));
        let provider = RecordProvider::new(index, GroupKey::new("alerts"), changes);

        let node = provider.materialize(RecordId::new(1), &TypeDispatcher::with_defaults());
        assert!(node.is_placeholder());
    }

    #[test]
    fn detached_provider_ignores_reloads() {
        let (store, index, changes) = setup();
        let recorder = Recorder::new();
        let _sub = changes.subscribe(recorder.sink());
        let provider = RecordProvider::new(Arc::clone(&index), GroupKey::new("alerts"), changes);
        provider.attach();
        provider.detach();

        store.records().insert(interesting_file_hit(4, "alerts"));
        index.reload();

        assert!(recorder.is_empty());
        assert_eq!(index.listener_count(), 0);
        assert_eq!(provider.state(), ProviderState::Inactive);
    }
}
