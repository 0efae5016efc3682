//! Test that inserting an existing key overwrites its value in place.

use crate::e2e_tests::helpers::*;

#[test]
fn test_same_pair_twice_changes_nothing() {
    let keys = shuffled(0..200, 3);
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&keys);

    let pages = index.tree.page_count();
    let dump = index.tree.display().to_string();

    index.insert_all(&keys);

    assert_eq!(index.tree.page_count(), pages);
    assert_eq!(index.tree.len(), 200);
    assert_eq!(index.tree.display().to_string(), dump);
}

#[test]
fn test_overwrite_leaf_and_separator_keys() {
    let keys = shuffled(0..200, 4);
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&keys);
    let len = index.file_len();

    for &key in &keys {
        index.tree.insert(key, key ^ 0xFFFF).expect("overwrite");
    }

    assert_eq!(index.file_len(), len);
    for &key in &keys {
        assert_eq!(index.tree.find(key), Some(key ^ 0xFFFF), "key {key}");
    }

    // Overwritten values are what gets persisted
    let index = index.reopen();
    assert_eq!(index.tree.find(keys[0]), Some(keys[0] ^ 0xFFFF));
}
