//! Test inserts against a store that randomly fails to grow.
//!
//! A failed insert must leave the tree exactly as it was, and the same seed
//! must always produce the same outcome.

use std::collections::BTreeMap;

use crate::btree::TreeError;
use crate::e2e_tests::helpers::*;
use crate::storage::FaultConfig;

const FAULTS: FaultConfig = FaultConfig {
    grow_error_rate: 0.2,
    map_error_rate: 0.0,
    sync_error_rate: 0.0,
    map_error_offset: None,
};

/// Insert shuffled keys, returning which inserts succeeded and the durable
/// bytes after close.
fn run_sequence(seed: u64) -> (Vec<bool>, Vec<u8>) {
    let mut index = TestIndex::with_faults(layout(SMALL_DEGREE), seed, FAULTS);
    let mut model = BTreeMap::new();
    let mut outcomes = Vec::new();

    for (i, key) in shuffled(0..400, seed).into_iter().enumerate() {
        let value = value_for(key);
        match index.tree.insert(key, value) {
            Ok(()) => {
                model.insert(key, value);
                outcomes.push(true);
            }
            Err(TreeError::ResourceExhaustion(_)) => outcomes.push(false),
            Err(e) => panic!("unexpected error inserting {key}: {e}"),
        }

        if i % 50 == 0 {
            index.tree.verify().expect("valid tree");
        }
    }

    assert_eq!(index.tree.len(), model.len());
    assert_eq!(index.tree.keys(), model.keys().copied().collect::<Vec<_>>());
    for key in 0..400 {
        assert_eq!(index.tree.find(key), model.get(&key).copied(), "key {key}");
    }

    index.store.set_faults(FaultConfig::no_faults());
    let index = index.reopen();
    assert_eq!(index.tree.len(), model.len());
    index.tree.verify().expect("valid tree after reopen");

    (outcomes, index.store.snapshot())
}

#[test]
fn test_failed_inserts_leave_tree_unchanged() {
    let (outcomes, _) = run_sequence(1);
    assert!(outcomes.iter().any(|&ok| ok));
    assert!(outcomes.iter().any(|&ok| !ok));
}

#[test]
fn test_deterministic_sequence() {
    let run1 = run_sequence(7);
    let run2 = run_sequence(7);
    assert_eq!(run1, run2);
}
