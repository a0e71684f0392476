//! Tree Projection Tests
//!
//! Listing, labels, change propagation and lifecycle of `TreeProjection`
//! over a live grouped index.

use casetree_index::prelude::*;
use casetree_index::PumpConfig;
use casetree_model::{CaseStore, Category, GroupKey, RecordId};
use casetree_test_utils::{alerts_store, interesting_file_hit, FlakyStore, Recorder};
use casetree_tree::prelude::*;
use casetree_tree::ProjectionError;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn projection(store: Arc<dyn CaseStore>) -> (Arc<GroupedIndex>, TreeProjection) {
    let index = Arc::new(GroupedIndex::new(IndexSpec::interesting_items(), store));
    let tree = TreeProjection::attached(
        Arc::clone(&index),
        Arc::new(TypeDispatcher::with_defaults()),
        AggregateCategory::InterestingHits,
    );
    (index, tree)
}

fn alerts() -> GroupKey {
    GroupKey::new("alerts")
}

#[test]
fn test_root_lists_groups_with_counts() {
    let (index, tree) = projection(alerts_store());

    assert_eq!(index.generation(), 1);
    let groups = tree.list_children(&NodeIdentity::Root).unwrap();
    assert_eq!(groups, vec![NodeIdentity::group("alerts"), NodeIdentity::group("suspicious")]);

    let labels: Vec<String> = groups.iter().map(|g| tree.display_label(g).unwrap()).collect();
    assert_eq!(labels, vec!["alerts (2)", "suspicious (1)"]);
}

#[test]
fn test_group_lists_records_in_store_order() {
    let (_index, tree) = projection(alerts_store());

    let records = tree.list_children(&NodeIdentity::group("alerts")).unwrap();
    assert_eq!(
        records,
        vec![NodeIdentity::record("alerts", 1), NodeIdentity::record("alerts", 2)]
    );
    assert!(tree.list_children(&records[0]).unwrap().is_empty());
    assert_eq!(tree.expanded(), vec![alerts()]);
}

#[test]
fn test_root_materializes_as_grouped_aggregate() {
    let (_index, tree) = projection(alerts_store());

    let root = tree.materialize(&NodeIdentity::Root).unwrap();
    assert_eq!(root.kind, NodeKind::Aggregate);
    assert_eq!(root.display_name, "Interesting Items");
    assert_eq!(tree.display_label(&NodeIdentity::Root).unwrap(), "Interesting Items");
}

#[test]
fn test_data_added_pushes_one_change_per_expanded_group() {
    let store = alerts_store();
    let (index, tree) = projection(store.clone());
    tree.expand(&alerts()).unwrap();

    let router = PipelineRouter::new();
    let _registration = router.register(Arc::clone(&index));
    let recorder = Recorder::<StructureChange>::new();
    let _sub = tree.on_structure_changed(recorder.sink());

    store.insert(interesting_file_hit(4, "alerts"));
    router.route(&PipelineEvent::DataAdded(Category::InterestingFileHit));

    let events = recorder.events();
    assert_eq!(
        events,
        vec![StructureChange {
            node: NodeIdentity::group("alerts"),
            kind: ChangeKind::Children {
                added: vec![NodeIdentity::record("alerts", 4)],
                removed: vec![],
                label_changed: true,
            },
        }]
    );
    assert!(events[0].relabels());
    assert_eq!(tree.display_label(&NodeIdentity::group("alerts")).unwrap(), "alerts (3)");
}

#[test]
fn test_data_added_to_collapsed_group_pushes_label_only() {
    let store = alerts_store();
    let (index, tree) = projection(store.clone());
    let recorder = Recorder::<StructureChange>::new();
    let _sub = tree.on_structure_changed(recorder.sink());

    store.insert(interesting_file_hit(4, "alerts"));
    index.reload();

    assert_eq!(
        recorder.events(),
        vec![StructureChange {
            node: NodeIdentity::group("alerts"),
            kind: ChangeKind::Label,
        }]
    );
    assert!(tree.expanded().is_empty());
}

#[test]
fn test_record_outside_its_group_is_unknown() {
    let (_index, tree) = projection(alerts_store());
    let stray = NodeIdentity::record("alerts", 3);

    assert!(matches!(
        tree.materialize(&stray),
        Err(ProjectionError::UnknownNode(node)) if node == stray
    ));
    assert_eq!(tree.display_label(&stray), Err(ProjectionError::UnknownNode(stray.clone())));

    let gone = NodeIdentity::record("exfil", 1);
    assert!(matches!(
        tree.materialize(&gone),
        Err(ProjectionError::UnknownNode(node)) if node == gone
    ));
    assert_eq!(tree.display_label(&NodeIdentity::record("suspicious", 3)).unwrap(), "record 3");
}

#[test]
fn test_unchanged_reload_pushes_nothing() {
    let (index, tree) = projection(alerts_store());
    tree.expand(&alerts()).unwrap();
    let recorder = Recorder::<StructureChange>::new();
    let _sub = tree.on_structure_changed(recorder.sink());

    let before = tree.list_children(&NodeIdentity::group("alerts")).unwrap();
    index.reload();
    let after = tree.list_children(&NodeIdentity::group("alerts")).unwrap();

    assert!(recorder.is_empty());
    assert_eq!(before, after);
    assert_eq!(tree.expanded(), vec![alerts()]);
}

#[test]
fn test_vanished_group_drops_its_provider() {
    let store = alerts_store();
    let (index, tree) = projection(store.clone());
    tree.expand(&alerts()).unwrap();
    tree.expand(&GroupKey::new("suspicious")).unwrap();
    assert_eq!(index.listener_count(), 3);

    let recorder = Recorder::<StructureChange>::new();
    let _sub = tree.on_structure_changed(recorder.sink());
    store.remove(RecordId::new(3));
    index.reload();

    assert_eq!(
        recorder.events(),
        vec![StructureChange {
            node: NodeIdentity::Root,
            kind: ChangeKind::Children {
                added: vec![],
                removed: vec![NodeIdentity::group("suspicious")],
                label_changed: false,
            },
        }]
    );
    assert_eq!(tree.expanded(), vec![alerts()]);
    assert_eq!(index.listener_count(), 2);
    assert!(matches!(
        tree.display_label(&NodeIdentity::group("suspicious")),
        Err(ProjectionError::UnknownNode(_))
    ));
}

#[test]
fn test_unknown_group_has_no_children() {
    let (_index, tree) = projection(alerts_store());
    assert!(tree.list_children(&NodeIdentity::group("nope")).unwrap().is_empty());
    assert!(tree.expanded().is_empty());
}

#[test]
fn test_missing_record_becomes_placeholder() {
    let store = FlakyStore::new([
        interesting_file_hit(1, "alerts"),
        interesting_file_hit(2, "alerts"),
    ]);
    let (_index, tree) = projection(store.clone());
    store.hide_record(RecordId::new(2));

    let nodes: Vec<DisplayNode> = tree
        .list_children(&NodeIdentity::group("alerts"))
        .unwrap()
        .iter()
        .map(|node| tree.materialize(node).unwrap())
        .collect();

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].kind, NodeKind::Artifact);
    assert_eq!(nodes[0].record_id, Some(RecordId::new(1)));
    assert!(nodes[1].is_placeholder());
    assert_eq!(store.fetch_count(), 2);
}

#[test]
fn test_listing_never_fetches_bodies() {
    let store = FlakyStore::new([
        interesting_file_hit(1, "alerts"),
        interesting_file_hit(2, "alerts"),
    ]);
    let (_index, tree) = projection(store.clone());

    tree.list_children(&NodeIdentity::Root).unwrap();
    tree.list_children(&NodeIdentity::group("alerts")).unwrap();
    tree.display_label(&NodeIdentity::group("alerts")).unwrap();

    assert_eq!(store.fetch_count(), 0);
}

#[test]
fn test_failed_reload_leaves_tree_untouched() {
    let store = FlakyStore::new([interesting_file_hit(1, "alerts")]);
    let (index, tree) = projection(store.clone());
    let recorder = Recorder::<StructureChange>::new();
    let _sub = tree.on_structure_changed(recorder.sink());

    store.set_fail_all(true);
    store.records().insert(interesting_file_hit(2, "alerts"));
    let report = index.reload();

    assert!(!report.published);
    assert!(recorder.is_empty());
    assert_eq!(tree.display_label(&NodeIdentity::group("alerts")).unwrap(), "alerts (1)");
}

#[test]
fn test_detached_projection_rejects_queries_and_drops_events() {
    let store = alerts_store();
    let (index, tree) = projection(store.clone());
    tree.expand(&alerts()).unwrap();
    let recorder = Recorder::<StructureChange>::new();
    let _sub = tree.on_structure_changed(recorder.sink());

    tree.detach();
    store.insert(interesting_file_hit(4, "alerts"));
    index.reload();

    assert_eq!(tree.state(), ProviderState::Inactive);
    assert_eq!(index.listener_count(), 0);
    assert!(recorder.is_empty());
    assert_eq!(tree.list_children(&NodeIdentity::Root), Err(ProjectionError::Detached));
    assert!(tree.expanded().is_empty());
}

#[test]
fn test_reattach_resyncs_without_reload() {
    let store = alerts_store();
    let (index, tree) = projection(store.clone());
    tree.detach();
    store.insert(interesting_file_hit(4, "exfil"));
    index.reload();

    tree.attach();

    assert_eq!(index.generation(), 2);
    assert_eq!(
        tree.list_children(&NodeIdentity::Root).unwrap(),
        vec![
            NodeIdentity::group("alerts"),
            NodeIdentity::group("exfil"),
            NodeIdentity::group("suspicious"),
        ]
    );
}

#[test]
fn test_dropping_projection_releases_index_listeners() {
    let (index, tree) = projection(alerts_store());
    tree.expand(&alerts()).unwrap();
    assert_eq!(index.listener_count(), 2);

    drop(tree);
    assert_eq!(index.listener_count(), 0);
}

#[tokio::test]
async fn test_pump_driven_projection_sees_new_group() {
    let store = alerts_store();
    let (index, tree) = projection(store.clone());
    let router = PipelineRouter::new();
    let _registration = router.register(Arc::clone(&index));
    let recorder = Recorder::<StructureChange>::new();
    let _sub = tree.on_structure_changed(recorder.sink());

    let pump = EventPump::spawn(router, PumpConfig::default());
    store.insert(interesting_file_hit(9, "exfil"));
    pump.publish(PipelineEvent::DataAdded(Category::InterestingFileHit))
        .await
        .unwrap();
    let stats = pump.shutdown().await.unwrap();

    assert_eq!(stats.events, 1);
    assert_eq!(stats.reloads, 1);
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
    assert_eq!(tree.display_label(&NodeIdentity::group("exfil")).unwrap(), "exfil (1)");
}
