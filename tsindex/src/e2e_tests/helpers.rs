//! Common helpers for end-to-end tests.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::btree::Tree;
use crate::storage::{FaultConfig, Layout, MemoryStore, PageStore, Timestamp};

/// Degree small enough that a handful of keys forces splits.
pub const SMALL_DEGREE: usize = 4;

/// The smallest layout holding `degree` keys, split in half.
pub fn layout(degree: usize) -> Layout {
    Layout::new(Layout::required_size(degree), degree, 0.5).expect("valid layout")
}

/// Value stored for `key` by [`TestIndex::insert_all`].
pub const fn value_for(key: Timestamp) -> u64 {
    key.wrapping_mul(31).wrapping_add(7)
}

/// `keys` in an order determined by `seed`.
pub fn shuffled(keys: impl IntoIterator<Item = Timestamp>, seed: u64) -> Vec<Timestamp> {
    let mut keys: Vec<_> = keys.into_iter().collect();
    keys.shuffle(&mut StdRng::seed_from_u64(seed));
    keys
}

/// A tree over an in-memory store, plus a second handle on the store for
/// inspecting the durable bytes and injecting faults.
pub struct TestIndex {
    pub tree: Tree<MemoryStore>,
    pub store: MemoryStore,
    layout: Layout,
}

impl TestIndex {
    /// Create an empty index with the given degree.
    #[must_use]
    pub fn new(degree: usize) -> Self {
        Self::with_layout(layout(degree))
    }

    #[must_use]
    pub fn with_layout(layout: Layout) -> Self {
        Self::with_faults(layout, 0, FaultConfig::no_faults())
    }

    /// Create an empty index whose store injects faults.
    ///
    /// Faults only start after the tree is created.
    #[must_use]
    pub fn with_faults(layout: Layout, seed: u64, faults: FaultConfig) -> Self {
        let store = MemoryStore::with_faults(layout.page_size(), seed, FaultConfig::no_faults());
        let tree = Tree::create(store.clone(), layout).expect("create tree");
        store.set_faults(faults);
        Self {
            tree,
            store,
            layout,
        }
    }

    /// Insert every key with [`value_for`].
    pub fn insert_all(&mut self, keys: &[Timestamp]) {
        for &key in keys {
            self.tree
                .insert(key, value_for(key))
                .unwrap_or_else(|e| panic!("insert {key}: {e}"));
        }
    }

    /// Check that every key maps to [`value_for`].
    pub fn assert_contains(&self, keys: &[Timestamp]) {
        for &key in keys {
            assert_eq!(self.tree.find(key), Some(value_for(key)), "key {key}");
        }
    }

    /// Close the tree and open it again from the durable bytes.
    #[must_use]
    pub fn reopen(self) -> Self {
        let Self {
            tree,
            store,
            layout,
        } = self;
        tree.close().expect("close tree");
        let tree = Tree::open(store.clone(), layout).expect("reopen tree");
        Self {
            tree,
            store,
            layout,
        }
    }

    /// Current length of the backing file.
    pub fn file_len(&self) -> u64 {
        self.store.file_len().expect("file length")
    }
}
