use super::*;
use buffer::BufferPoolManager;
use common::{IndexId, Lsn, PageId, RecordId};
use disk::DiskManager;
use tempfile::tempdir;
use types::Value;

fn make_pool(dir: &std::path::Path) -> Arc<BufferPoolManager> {
    let disk = Arc::new(DiskManager::new(dir.join("wal.log")));
    Arc::new(BufferPoolManager::new(dir.join("data"), 512, 64, disk, None).unwrap())
}

#[test]
fn create_empty_index() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();
    let results = index.search(&[Value::Int(1)]).unwrap();
    assert!(results.is_empty());
}

#[test]
fn insert_and_search_single_key() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    let rid = RecordId {
        page_id: PageId(0),
        slot: 0,
    };
    index.insert(vec![Value::Int(42)], rid, Lsn::INVALID).unwrap();

    let results = index.search(&[Value::Int(42)]).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0], rid);

    let results = index.search(&[Value::Int(99)]).unwrap();
    assert!(results.is_empty());
}

#[test]
fn insert_multiple_keys_in_order() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    for i in 0..10 {
        let rid = RecordId {
            page_id: PageId(0),
            slot: i,
        };
        index
            .insert(vec![Value::Int(i as i32)], rid, Lsn::INVALID)
            .unwrap();
    }

    for i in 0..10 {
        let results = index.search(&[Value::Int(i as i32)]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].slot, i);
    }
}

#[test]
fn insert_multiple_keys_reverse_order() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    for i in (0..10).rev() {
        let rid = RecordId {
            page_id: PageId(0),
            slot: i,
        };
        index
            .insert(vec![Value::Int(i as i32)], rid, Lsn::INVALID)
            .unwrap();
    }

    for i in 0..10 {
        let results = index.search(&[Value::Int(i as i32)]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].slot, i);
    }
}

#[test]
fn duplicate_keys_allowed() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    for slot in 0..3 {
        let rid = RecordId {
            page_id: PageId(0),
            slot,
        };
        index.insert(vec![Value::Int(42)], rid, Lsn::INVALID).unwrap();
    }

    let results = index.search(&[Value::Int(42)]).unwrap();
    assert_eq!(results.len(), 3);
}

#[test]
fn delete_existing_key() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    let rid = RecordId {
        page_id: PageId(0),
        slot: 0,
    };
    index.insert(vec![Value::Int(42)], rid, Lsn::INVALID).unwrap();
    assert_eq!(index.search(&[Value::Int(42)]).unwrap().len(), 1);

    let deleted = index.delete(&[Value::Int(42)], rid, Lsn::INVALID).unwrap();
    assert!(deleted);
    assert!(index.search(&[Value::Int(42)]).unwrap().is_empty());
}

#[test]
fn delete_non_existent_key() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    let rid = RecordId {
        page_id: PageId(0),
        slot: 0,
    };
    let deleted = index.delete(&[Value::Int(42)], rid, Lsn::INVALID).unwrap();
    assert!(!deleted);
}

/// Deletes most of a tree that's already grown several levels via splits,
/// forcing redistribution and coalescing at both leaf and internal levels,
/// then checks every structural invariant: nodes don't fall below their
/// minimum occupancy (except a root leaf, or the root after it collapses),
/// the leaf chain still visits every surviving key in order, and every
/// surviving key is still findable by direct search.
#[test]
fn delete_enough_keys_to_force_rebalancing() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    let count = 600;
    for i in 0..count {
        let rid = RecordId {
            page_id: PageId(0),
            slot: (i % 100) as u16,
        };
        index
            .insert(vec![Value::Int(i as i32)], rid, Lsn::INVALID)
            .unwrap();
    }

    // Delete every key except a scattered handful, which forces the
    // remaining leaves (and their parents) well below half full.
    let kept: std::collections::HashSet<i32> = [10, 150, 300, 450, 599].into_iter().collect();
    for i in 0..count {
        let k = i as i32;
        if kept.contains(&k) {
            continue;
        }
        let rid = RecordId {
            page_id: PageId(0),
            slot: (i % 100) as u16,
        };
        let deleted = index.delete(&[Value::Int(k)], rid, Lsn::INVALID).unwrap();
        assert!(deleted, "key {k} should have been deleted");
    }

    let mut expected: Vec<i32> = kept.into_iter().collect();
    expected.sort();

    let scanned = index.scan_all().unwrap();
    let got: Vec<i32> = scanned
        .iter()
        .map(|(k, _)| match k[0] {
            Value::Int(n) => n,
            _ => panic!("expected int key"),
        })
        .collect();
    assert_eq!(got, expected, "leaf chain must still yield surviving keys in order");

    for k in &expected {
        let results = index.search(&[Value::Int(*k)]).unwrap();
        assert_eq!(results.len(), 1, "key {k} should still be findable");
    }

    assert_node_invariants(&index);
}

/// Walks every node reachable from the root and asserts every non-root node
/// is at least half full, and every internal node has exactly one more
/// child than it has keys.
fn assert_node_invariants(index: &BTreeIndex) {
    let root = index.read_header().unwrap();
    check_node(index, root, true);
}

fn check_node(index: &BTreeIndex, page_id: PageId, is_root: bool) {
    match index.read_node(page_id).unwrap() {
        BTreeNode::Internal { keys, children } => {
            assert_eq!(children.len(), keys.len() + 1, "children must outnumber keys by one");
            if !is_root {
                assert!(
                    keys.len() >= BTreeIndex::min_internal_keys(),
                    "internal node {page_id:?} underflowed: {} keys",
                    keys.len()
                );
            } else {
                assert!(children.len() >= 2, "a collapsed root should have become its child");
            }
            for child in children {
                check_node(index, child, false);
            }
        }
        BTreeNode::Leaf { entries, .. } => {
            if !is_root {
                assert!(
                    entries.len() >= BTreeIndex::min_leaf_entries(),
                    "leaf {page_id:?} underflowed: {} entries",
                    entries.len()
                );
            }
        }
    }
}

#[test]
fn range_scan_all() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    for i in 0..10 {
        let rid = RecordId {
            page_id: PageId(0),
            slot: i,
        };
        index
            .insert(vec![Value::Int(i as i32)], rid, Lsn::INVALID)
            .unwrap();
    }

    let results = index.range_scan(None, None).unwrap();
    assert_eq!(results.len(), 10);
}

#[test]
fn range_scan_with_bounds() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    for i in 0..10 {
        let rid = RecordId {
            page_id: PageId(0),
            slot: i,
        };
        index
            .insert(vec![Value::Int(i as i32)], rid, Lsn::INVALID)
            .unwrap();
    }

    let low = vec![Value::Int(3)];
    let high = vec![Value::Int(7)];
    let results = index
        .range_scan(Some(low.as_slice()), Some(high.as_slice()))
        .unwrap();

    assert_eq!(results.len(), 5);
    for (i, rid) in results.iter().enumerate() {
        assert_eq!(rid.slot, (3 + i) as u16);
    }
}

#[test]
fn char_keys() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    let names = ["alice", "bob", "charlie", "dave"];
    for (slot, name) in names.iter().enumerate() {
        let rid = RecordId {
            page_id: PageId(0),
            slot: slot as u16,
        };
        index
            .insert(vec![Value::Char(name.to_string())], rid, Lsn::INVALID)
            .unwrap();
    }

    let results = index
        .search(&[Value::Char("charlie".to_string())])
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].slot, 2);
}

#[test]
fn composite_keys() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    let entries = [
        (vec![Value::Char("eng".into()), Value::Int(1)], 0),
        (vec![Value::Char("eng".into()), Value::Int(2)], 1),
        (vec![Value::Char("sales".into()), Value::Int(1)], 2),
    ];

    for (key, slot) in &entries {
        let rid = RecordId {
            page_id: PageId(0),
            slot: *slot,
        };
        index.insert(key.clone(), rid, Lsn::INVALID).unwrap();
    }

    let results = index
        .search(&[Value::Char("eng".into()), Value::Int(2)])
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].slot, 1);
}

#[test]
fn persistence_across_open() {
    let dir = tempdir().unwrap();
    let pool = make_pool(dir.path());

    {
        let index = BTreeIndex::create(pool.clone(), IndexId(1)).unwrap();
        for i in 0..5 {
            let rid = RecordId {
                page_id: PageId(0),
                slot: i,
            };
            index
                .insert(vec![Value::Int(i as i32)], rid, Lsn::INVALID)
                .unwrap();
        }
        pool.flush_all(FileTag::Index(IndexId(1))).unwrap();
    }

    {
        let index = BTreeIndex::open(pool, IndexId(1)).unwrap();
        for i in 0..5 {
            let results = index.search(&[Value::Int(i as i32)]).unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].slot, i);
        }
    }
}

#[test]
fn many_inserts_trigger_splits() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    let count = 500;
    for i in 0..count {
        let rid = RecordId {
            page_id: PageId(i / 100),
            slot: (i % 100) as u16,
        };
        index
            .insert(vec![Value::Int(i as i32)], rid, Lsn::INVALID)
            .unwrap();
    }

    for i in 0..count {
        let results = index.search(&[Value::Int(i as i32)]).unwrap();
        assert_eq!(results.len(), 1, "key {i} not found");
    }

    let all = index.scan_all().unwrap();
    assert_eq!(all.len(), count as usize);
}

#[test]
fn lower_and_upper_bound() {
    let dir = tempdir().unwrap();
    let index = BTreeIndex::create(make_pool(dir.path()), IndexId(1)).unwrap();

    for i in [1, 3, 5, 7, 9] {
        let rid = RecordId {
            page_id: PageId(0),
            slot: i,
        };
        index
            .insert(vec![Value::Int(i as i32)], rid, Lsn::INVALID)
            .unwrap();
    }

    let (key, _) = index.lower_bound(&[Value::Int(4)]).unwrap().unwrap();
    assert_eq!(key, vec![Value::Int(5)]);

    let (key, _) = index.upper_bound(&[Value::Int(5)]).unwrap().unwrap();
    assert_eq!(key, vec![Value::Int(7)]);
}
