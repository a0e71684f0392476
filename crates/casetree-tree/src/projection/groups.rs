//! Group-level provider: one child per group key

use super::{
    ChangeKind, ChildProvider, Expanded, Lifecycle, NodeIdentity, ProviderState, StructureChange,
};
use casetree_index::{ChangeEvent, GroupedIndex, SubscriptionBus};
use casetree_model::GroupKey;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Lists the group keys of an index and keeps their labels current
///
/// Label changes of expanded groups are left to their record-level
/// provider, which reports them with its child-list change.
#[derive(Clone)]
pub struct GroupProvider {
    inner: Arc<GroupInner>,
}

struct GroupInner {
    index: Arc<GroupedIndex>,
    changes: Arc<SubscriptionBus<StructureChange>>,
    expanded: Weak<Expanded>,
    lifecycle: Lifecycle,
    view: Mutex<GroupView>,
}

#[derive(Default)]
struct GroupView {
    generation: u64,
    counts: BTreeMap<GroupKey, usize>,
}

struct GroupDiff {
    added: Vec<NodeIdentity>,
    removed: Vec<NodeIdentity>,
    relabeled: Vec<GroupKey>,
}

impl GroupProvider {
    /// Create detached provider
    #[must_use]
    pub fn new(index: Arc<GroupedIndex>, changes: Arc<SubscriptionBus<StructureChange>>) -> Self {
        Self::with_expanded(index, changes, Weak::new())
    }

    /// Create detached provider that defers labels of `expanded` groups
    pub(crate) fn tracking(
        index: Arc<GroupedIndex>,
        changes: Arc<SubscriptionBus<StructureChange>>,
        expanded: &Arc<Expanded>,
    ) -> Self {
        Self::with_expanded(index, changes, Arc::downgrade(expanded))
    }

    fn with_expanded(
        index: Arc<GroupedIndex>,
        changes: Arc<SubscriptionBus<StructureChange>>,
        expanded: Weak<Expanded>,
    ) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                index,
                changes,
                expanded,
                lifecycle: Lifecycle::default(),
                view: Mutex::new(GroupView::default()),
            }),
        }
    }

    /// Check if `key` is a current group
    #[must_use]
    pub fn contains(&self, key: &GroupKey) -> bool {
        self.inner.view.lock().counts.contains_key(key)
    }

    /// Member count of `key`, if it is a current group
    #[must_use]
    pub fn count(&self, key: &GroupKey) -> Option<usize> {
        self.inner.view.lock().counts.get(key).copied()
    }

    /// Current group keys in ascending order
    #[must_use]
    pub fn keys(&self) -> Vec<GroupKey> {
        self.inner.view.lock().counts.keys().cloned().collect()
    }

    /// Index generation the view was last synced to
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.view.lock().generation
    }
}

impl ChildProvider for GroupProvider {
    fn attach(&self) {
        let inner = &self.inner;
        if inner.lifecycle.is_active() {
            return;
        }
        inner.prime();
        if GroupInner::go_live(inner) {
            tracing::debug!(index = inner.index.name(), "group provider attached");
        }
    }

    fn detach(&self) {
        if self.inner.lifecycle.deactivate() {
            *self.inner.view.lock() = GroupView::default();
            tracing::debug!(index = self.inner.index.name(), "group provider detached");
        }
    }

    fn state(&self) -> ProviderState {
        self.inner.lifecycle.state()
    }

    fn children(&self) -> Vec<NodeIdentity> {
        self.keys().into_iter().map(NodeIdentity::Group).collect()
    }
}

impl GroupInner {
    /// Fill the view without reporting it, loading the index if needed
    fn prime(&self) {
        if self.index.generation() == 0 {
            self.index.reload();
        }
        let _ = self.sync();
    }

    /// Subscribe, then report any reload that landed since [`Self::prime`]
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
        if !self.lifecycle.is_active() {
            return;
        }

        if !diff.added.is_empty() || !diff.removed.is_empty() {
            self.changes.publish(&StructureChange {
                node: NodeIdentity::Root,
                kind: ChangeKind::Children {
                    added: diff.added,
                    removed: diff.removed,
                    label_changed: false,
                },
            });
        }
        let expanded = self.expanded.upgrade();
        for key in diff.relabeled {
            if expanded.as_ref().is_some_and(|e| e.contains_key(&key)) {
                continue;
            }
            self.changes.publish(&StructureChange {
                node: NodeIdentity::Group(key),
                kind: ChangeKind::Label,
            });
        }
    }

    /// Bring the view up to the current snapshot; `None` if it already is
    fn sync(&self) -> Option<GroupDiff> {
        let snapshot = self.index.snapshot();
        let mut view = self.view.lock();
        if snapshot.generation() <= view.generation {
            return None;
        }
        let counts: BTreeMap<GroupKey, usize> = snapshot
            .iter()
            .map(|(key, members)| (key.clone(), members.len()))
            .collect();

        let added = counts
            .keys()
            .filter(|key| !view.counts.contains_key(*key))
            .cloned()
            .map(NodeIdentity::Group)
            .collect();
        let removed = view
            .counts
            .keys()
            .filter(|key| !counts.contains_key(*key))
            .cloned()
            .map(NodeIdentity::Group)
            .collect();
        let relabeled = counts
            .iter()
            .filter(|(key, count)| view.counts.get(*key).is_some_and(|old| old != *count))
            .map(|(key, _)| key.clone())
            .collect();

        view.generation = snapshot.generation();
        view.counts = counts;
        Some(GroupDiff {
            added,
            removed,
            relabeled,
        })
    }
}

impl std::fmt::Debug for GroupProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let view = self.inner.view.lock();
        f.debug_struct("GroupProvider")
            .field("index", &self.inner.index.name())
            .field("state", &self.inner.lifecycle.state())
            .field("generation", &view.generation)
            .field("groups", &view.counts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::RecordProvider;
    use casetree_index::IndexSpec;
    use casetree_test_utils::{alerts_store, interesting_file_hit, Recorder};
    use pretty_assertions::assert_eq;

    type Fixture = (
        Arc<casetree_model::MemoryStore>,
        Arc<GroupedIndex>,
        GroupProvider,
        Recorder<StructureChange>,
        casetree_index::Subscription,
    );

    fn provider() -> Fixture {
        let store = alerts_store();
        let index = Arc::new(GroupedIndex::new(IndexSpec::interesting_items(), store.clone()));
        let changes = Arc::new(SubscriptionBus::new());
        let recorder = Recorder::new();
        let sub = changes.subscribe(recorder.sink());
        (store, Arc::clone(&index), GroupProvider::new(index, changes), recorder, sub)
    }

    #[test]
    fn attach_loads_unloaded_index_silently() {
        let (_store, index, groups, recorder, _sub) = provider();
        groups.attach();

        assert_eq!(index.generation(), 1);
        assert_eq!(
            groups.children(),
            vec![NodeIdentity::group("alerts"), NodeIdentity::group("suspicious")]
        );
        assert!(recorder.is_empty());
    }

    #[test]
    fn reload_before_subscription_reports_only_the_diff() {
        let (store, index, groups, recorder, _sub) = provider();
        groups.inner.prime();

        store.insert(interesting_file_hit(4, "alerts"));
        index.reload();
        assert!(GroupInner::go_live(&groups.inner));

        assert_eq!(
            recorder.events(),
            vec![StructureChange {
                node: NodeIdentity::group("alerts"),
                kind: ChangeKind::Label,
            }]
        );
        assert_eq!(index.listener_count(), 1);
    }

    #[test]
    fn expanded_group_label_is_left_to_record_provider() {
        let store = alerts_store();
        let index = Arc::new(GroupedIndex::new(IndexSpec::interesting_items(), store.clone()));
        let changes = Arc::new(SubscriptionBus::new());
        let recorder = Recorder::new();
        let _sub = changes.subscribe(recorder.sink());
        let expanded = Arc::new(Expanded::new());
        let groups = GroupProvider::tracking(Arc::clone(&index), Arc::clone(&changes), &expanded);
        groups.attach();
        let alerts = GroupKey::new("alerts");
        let records = RecordProvider::new(Arc::clone(&index), alerts.clone(), changes);
        expanded.insert(alerts, records);

        store.insert(interesting_file_hit(4, "alerts"));
        store.insert(interesting_file_hit(5, "suspicious"));
        index.reload();

        assert_eq!(
            recorder.events(),
            vec![StructureChange {
                node: NodeIdentity::group("suspicious"),
                kind: ChangeKind::Label,
            }]
        );
    }

    #[test]
    fn attach_is_idempotent() {
        let (_store, index, groups, _recorder, _sub) = provider();
        groups.attach();
        groups.attach();
        assert_eq!(index.listener_count(), 1);
        assert_eq!(index.generation(), 1);
    }

    #[test]
    fn count_change_emits_label_only() {
        let (store, index, groups, recorder, _sub) = provider();
        groups.attach();

        store.insert(interesting_file_hit(4, "alerts"));
        index.reload();

        assert_eq!(
            recorder.events(),
            vec![StructureChange {
                node: NodeIdentity::group("alerts"),
                kind: ChangeKind::Label,
            }]
        );
        assert_eq!(groups.count(&GroupKey::new("alerts")), Some(3));
    }

    #[test]
    fn new_key_emits_children_change() {
        let (store, index, groups, recorder, _sub) = provider();
        groups.attach();

        store.insert(interesting_file_hit(9, "exfil"));
        index.reload();

        assert_eq!(
            recorder.events(),
            vec![StructureChange {
                node: NodeIdentity::Root,
                kind: ChangeKind::Children {
                    added: vec![NodeIdentity::group("exfil")],
                    removed: vec![],
                    label_changed: false,
                },
            }]
        );
    }

    #[test]
    fn unchanged_reload_emits_nothing() {
        let (_store, index, groups, recorder, _sub) = provider();
        groups.attach();
        index.reload();
        assert!(recorder.is_empty());
        assert_eq!(groups.generation(), 2);
    }

    #[test]
    fn detach_unsubscribes_and_clears() {
        let (store, index, groups, recorder, _sub) = provider();
        groups.attach();
        groups.detach();

        store.insert(interesting_file_hit(9, "exfil"));
        index.reload();

        assert_eq!(index.listener_count(), 0);
        assert_eq!(groups.state(), ProviderState::Inactive);
        assert!(groups.children().is_empty());
        assert!(recorder.is_empty());
    }
}
