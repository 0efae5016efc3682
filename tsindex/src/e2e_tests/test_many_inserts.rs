//! Test inserting many keys in random order.

use crate::e2e_tests::helpers::*;

#[test]
fn test_many_shuffled_inserts() {
    let keys = shuffled((0..10_000).map(|i| i * 2), 42);
    let mut index = TestIndex::new(8);
    index.insert_all(&keys);

    let summary = index.tree.verify().expect("valid tree");
    assert_eq!(summary.keys, 10_000);
    assert_eq!(index.tree.len(), 10_000);
    assert_eq!(index.tree.keys(), (0..10_000u64).map(|i| i * 2).collect::<Vec<_>>());
    index.assert_contains(&keys);

    for odd in (1..20_000).step_by(2).take(500) {
        assert_eq!(index.tree.find(odd), None);
    }
}

#[test]
fn test_shuffles_across_degrees() {
    for degree in [3, 4, 5, 7, 16] {
        for seed in 0..4 {
            let keys = shuffled(0..400, seed);
            let mut index = TestIndex::new(degree);
            index.insert_all(&keys);

            index
                .tree
                .verify()
                .unwrap_or_else(|v| panic!("degree {degree} seed {seed}: {v}"));
            index.assert_contains(&keys);
        }
    }
}

#[test]
fn test_extreme_keys() {
    let keys = [0, 1, u64::MAX - 1, u64::MAX, 1 << 63];
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&keys);

    index.assert_contains(&keys);
    assert_eq!(index.tree.keys(), vec![0, 1, 1 << 63, u64::MAX - 1, u64::MAX]);
}
