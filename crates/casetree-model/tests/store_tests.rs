//! Memory Store Tests

use casetree_model::{AttributeName, CaseStore, Category, GroupKey, MemoryStore, Record, RecordId, StoreError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn hit(id: u64, set: &str) -> Record {
    Record::new(RecordId::new(id), Category::HashsetHit).with_text(AttributeName::set_name(), set)
}

#[test]
fn test_query_skips_records_without_grouping_attribute() {
    let store = MemoryStore::with_records([
        hit(1, "nsrl"),
        Record::new(RecordId::new(2), Category::HashsetHit),
        hit(3, "known-bad"),
    ]);

    let rows = store
        .query_grouped_ids(&Category::HashsetHit, &AttributeName::set_name())
        .unwrap();

    assert_eq!(
        rows,
        vec![
            (GroupKey::new("nsrl"), RecordId::new(1)),
            (GroupKey::new("known-bad"), RecordId::new(3)),
        ]
    );
}

#[test]
fn test_replaced_record_keeps_position_and_new_group() {
    let store = MemoryStore::with_records([hit(1, "a"), hit(2, "b")]);
    store.insert(hit(1, "c"));

    let rows = store
        .query_grouped_ids(&Category::HashsetHit, &AttributeName::set_name())
        .unwrap();

    assert_eq!(rows[0], (GroupKey::new("c"), RecordId::new(1)));
    assert_eq!(store.len(), 2);
}

#[test]
fn test_fetch_after_remove_is_not_found() {
    let store = MemoryStore::with_records([hit(1, "a")]);
    store.remove(RecordId::new(1));
    assert_eq!(
        store.fetch_record(RecordId::new(1)),
        Err(StoreError::RecordNotFound(RecordId::new(1)))
    );
    assert!(store.is_empty());
}

proptest! {
    #[test]
    fn prop_query_preserves_first_insertion_order(ids in prop::collection::vec(0u64..50, 0..40)) {
        let store = MemoryStore::new();
        for id in &ids {
            store.insert(hit(*id, "set"));
        }

        let mut expected = Vec::new();
        for id in &ids {
            if !expected.contains(id) {
                expected.push(*id);
            }
        }

        let actual: Vec<u64> = store
            .query_grouped_ids(&Category::HashsetHit, &AttributeName::set_name())
            .unwrap()
            .into_iter()
            .map(|(_, id)| id.get())
            .collect();
        prop_assert_eq!(actual, expected);
    }
}
