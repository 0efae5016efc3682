//! Test inserting keys in descending order.

use crate::e2e_tests::helpers::*;

#[test]
fn test_descending_keys_come_back_in_order() {
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&[9, 7, 5, 3, 1]);

    assert_eq!(index.tree.keys(), vec![1, 3, 5, 7, 9]);
    index.assert_contains(&[1, 3, 5, 7, 9]);
    index.tree.verify().expect("valid tree");
}

#[test]
fn test_long_descending_run() {
    let keys: Vec<u64> = (1..=1000).rev().collect();
    let mut index = TestIndex::new(5);
    index.insert_all(&keys);

    let summary = index.tree.verify().expect("valid tree");
    assert_eq!(summary.keys, 1000);
    assert_eq!(index.tree.keys(), (1..=1000u64).collect::<Vec<_>>());
    index.assert_contains(&keys);
    assert_eq!(index.tree.find(0), None);
    assert_eq!(index.tree.find(1001), None);
}

#[test]
fn test_interleaved_from_both_ends() {
    let keys: Vec<u64> = (0..500)
        .flat_map(|i| [i, 10_000 - i])
        .collect();
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&keys);

    index.tree.verify().expect("valid tree");
    index.assert_contains(&keys);
    assert_eq!(index.tree.len(), 1000);
}
