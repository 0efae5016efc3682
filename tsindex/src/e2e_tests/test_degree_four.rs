//! Five keys into a degree-4 tree: one leaf split that grows a new root.

use crate::btree::ROOT;
use crate::e2e_tests::helpers::*;

const KEYS: [u64; 5] = [100, 200, 300, 400, 500];

#[test]
fn test_five_keys_make_three_pages() {
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&KEYS);

    assert_eq!(index.tree.page_count(), 3);
    assert_eq!(index.tree.depth(), 2);
    assert_eq!(index.tree.len(), 5);
    assert_eq!(index.tree.keys(), KEYS.to_vec());
    index.assert_contains(&KEYS);

    let summary = index.tree.verify().expect("valid tree");
    assert_eq!(summary.nodes, 3);
    assert_eq!(summary.leaves, 2);

    let root = index.tree.node(ROOT);
    assert_eq!(root.keys().collect::<Vec<_>>(), vec![300]);
    let left = index.tree.node(root.child(0).expect("left child"));
    let right = index.tree.node(root.child(1).expect("right child"));
    assert_eq!(left.keys().collect::<Vec<_>>(), vec![100, 200]);
    assert_eq!(right.keys().collect::<Vec<_>>(), vec![400, 500]);
}

#[test]
fn test_median_becomes_root_separator() {
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&KEYS[..4]);

    let dump = index.tree.display().to_string();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines[0], "[node @0 // 1 keys interior]");
    assert!(lines[1].starts_with("  [000]        300 / 000000012c"));
    assert_eq!(index.tree.find(300), Some(value_for(300)));
}

#[test]
fn test_three_pages_survive_reopen() {
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&KEYS);
    let index = index.reopen();

    assert_eq!(index.tree.page_count(), 3);
    assert_eq!(index.file_len(), 3 * index.tree.layout().page_size_u64());
    index.assert_contains(&KEYS);
}
