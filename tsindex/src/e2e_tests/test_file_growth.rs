//! Test that the file only grows, one page per new node, and that the root
//! stays at offset 0.

use crate::e2e_tests::helpers::*;
use crate::storage::{MAGIC, PageStore};

#[test]
fn test_file_grows_monotonically() {
    let mut index = TestIndex::new(SMALL_DEGREE);
    let page_size = index.tree.layout().page_size_u64();
    let mut last_len = index.file_len();
    assert_eq!(last_len, page_size);

    for key in shuffled(0..300, 5) {
        index.tree.insert(key, value_for(key)).expect("insert");

        let len = index.file_len();
        assert!(len >= last_len, "file shrank after inserting {key}");
        assert_eq!(len % page_size, 0);
        assert_eq!(len, index.tree.page_count() as u64 * page_size);
        last_len = len;
    }
}

#[test]
fn test_root_stays_at_offset_zero() {
    let mut index = TestIndex::new(SMALL_DEGREE);
    let mut depth = index.tree.depth();

    for key in 0..300 {
        index.tree.insert(key, value_for(key)).expect("insert");
        index.tree.verify().expect("root at offset 0 and tree valid");
        assert!(index.tree.depth() >= depth);
        depth = index.tree.depth();
    }
    assert!(depth >= 4);

    index.tree.flush().expect("flush");
    let bytes = index.store.snapshot();
    assert_eq!(&bytes[..5], &MAGIC);
    assert_eq!(bytes[5], 0, "root is interior");
}

#[test]
fn test_store_sees_every_page() {
    let mut index = TestIndex::new(SMALL_DEGREE);
    index.insert_all(&shuffled(0..100, 6));

    let pages = index.tree.page_count();
    assert_eq!(index.store.stats().grows, pages as u64);
    assert_eq!(
        index.store.file_len().expect("len"),
        pages as u64 * index.tree.layout().page_size_u64()
    );
}
