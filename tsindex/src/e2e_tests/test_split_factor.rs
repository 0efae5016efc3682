//! Test uneven split points.

use crate::e2e_tests::helpers::*;
use crate::storage::Layout;

fn run_with_factor(split_factor: f64) {
    let degree = 8;
    let layout =
        Layout::new(Layout::required_size(degree), degree, split_factor).expect("valid layout");
    let mut index = TestIndex::with_layout(layout);

    let ascending: Vec<u64> = (0..300).collect();
    let shuffled_keys = shuffled(1000..1300, 9);
    index.insert_all(&ascending);
    index.insert_all(&shuffled_keys);

    index
        .tree
        .verify()
        .unwrap_or_else(|v| panic!("split factor {split_factor}: {v}"));
    index.assert_contains(&ascending);
    index.assert_contains(&shuffled_keys);
}

#[test]
fn test_split_keeps_most_on_the_left() {
    run_with_factor(0.75);
}

#[test]
fn test_split_keeps_most_on_the_right() {
    run_with_factor(0.25);
}

#[test]
fn test_ascending_inserts_with_high_split_factor_use_fewer_pages() {
    let keys: Vec<u64> = (0..500).collect();

    let mut half = TestIndex::new(8);
    half.insert_all(&keys);

    let mut packed = TestIndex::with_layout(
        Layout::new(Layout::required_size(8), 8, 0.875).expect("valid layout"),
    );
    packed.insert_all(&keys);

    assert!(packed.tree.page_count() < half.tree.page_count());
}
