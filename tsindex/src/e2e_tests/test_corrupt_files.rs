//! Test that malformed index files are rejected on open.

use std::fs;

use tempfile::tempdir;

use crate::btree::{CorruptionError, Tree, TreeError};
use crate::config::IndexConfig;
use crate::storage::{FaultConfig, Layout, MemoryStore, PAGE_SIZE};

#[test]
fn test_length_not_a_page_multiple() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("odd.idx");
    fs::write(&path, vec![0u8; 2 * PAGE_SIZE + 1]).expect("write file");

    let result = Tree::open_file(&path, &IndexConfig::default());
    assert!(matches!(
        result,
        Err(TreeError::Corruption(CorruptionError::BadLength {
            file_len,
            page_size: PAGE_SIZE,
        })) if file_len == 2 * PAGE_SIZE as u64 + 1
    ));
}

#[test]
fn test_empty_file() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("empty.idx");
    fs::write(&path, b"").expect("write file");

    assert!(matches!(
        Tree::open_file(&path, &IndexConfig::default()),
        Err(TreeError::Corruption(CorruptionError::Empty))
    ));
}

#[test]
fn test_zeroed_page_has_no_magic() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("zero.idx");
    fs::write(&path, vec![0u8; PAGE_SIZE]).expect("write file");

    assert!(matches!(
        Tree::open_file(&path, &IndexConfig::default()),
        Err(TreeError::Corruption(CorruptionError::BadMagic { offset: 0, .. }))
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("missing.idx");

    assert!(matches!(
        Tree::open_file(&path, &IndexConfig::default()),
        Err(TreeError::Store(_))
    ));
}

#[test]
fn test_wrong_page_size() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("small.idx");
    let small = IndexConfig {
        page_size: 4096,
        ..IndexConfig::default()
    };
    Tree::create_file(&path, &small)
        .expect("create tree")
        .close()
        .expect("close");

    // Half an 8KB page is not a whole page
    assert!(matches!(
        Tree::open_file(&path, &IndexConfig::default()),
        Err(TreeError::Corruption(CorruptionError::BadLength { .. }))
    ));
}

#[test]
fn test_bad_length_maps_nothing() {
    let store = MemoryStore::from_bytes(
        PAGE_SIZE,
        vec![0u8; PAGE_SIZE + 10],
        0,
        FaultConfig::no_faults(),
    );
    let handle = store.clone();

    assert!(matches!(
        Tree::open(store, Layout::default()),
        Err(TreeError::Corruption(CorruptionError::BadLength { .. }))
    ));
    assert_eq!(handle.stats().maps, 0);
}
