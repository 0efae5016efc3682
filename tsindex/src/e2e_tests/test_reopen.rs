//! Test that a closed index reopens with the same contents.

use tempfile::tempdir;

use crate::btree::Tree;
use crate::config::IndexConfig;
use crate::e2e_tests::helpers::*;

#[test]
fn test_reopen_in_memory() {
    let keys = shuffled(0..500, 11);
    let mut index = TestIndex::new(6);
    index.insert_all(&keys);
    let pages = index.tree.page_count();

    let mut index = index.reopen();
    assert_eq!(index.tree.page_count(), pages);
    assert_eq!(index.tree.len(), 500);
    index.tree.verify().expect("valid tree after reopen");
    index.assert_contains(&keys);

    // Keep inserting into the reopened tree
    let more = shuffled(500..1000, 12);
    index.insert_all(&more);
    let index = index.reopen();
    index.assert_contains(&keys);
    index.assert_contains(&more);
    index.tree.verify().expect("valid tree after second reopen");
}

#[test]
fn test_reopen_file_with_default_layout() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("default.idx");
    let config = IndexConfig::default();
    let keys = shuffled((0..5000).map(|i| 1_700_000_000_000 + i * 250), 21);

    {
        let mut tree = Tree::create_file(&path, &config).expect("create tree");
        for &key in &keys {
            tree.insert(key, value_for(key)).expect("insert");
        }
        assert!(tree.depth() >= 2);
        tree.close().expect("close");
    }

    let tree = Tree::open_file(&path, &config).expect("open tree");
    assert_eq!(tree.len(), keys.len());
    for &key in &keys {
        assert_eq!(tree.find(key), Some(value_for(key)));
    }
    assert_eq!(tree.find(1_700_000_000_001), None);
    tree.verify().expect("valid tree");
}

#[test]
fn test_flush_makes_changes_durable() {
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&[1, 2, 3, 4, 5]);
    index.tree.flush().expect("flush");

    // A second tree over the flushed bytes sees everything
    let copy = crate::storage::MemoryStore::from_bytes(
        index.tree.layout().page_size(),
        index.store.snapshot(),
        0,
        crate::storage::FaultConfig::no_faults(),
    );
    let other = Tree::open(copy, index.tree.layout()).expect("open copy");
    for key in 1..=5 {
        assert_eq!(other.find(key), Some(value_for(key)));
    }
}
