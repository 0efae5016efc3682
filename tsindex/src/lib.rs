#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
// Layout of the index file:
// 1. Page 0 is the root node
// 2. Every other page is a node, appended when a node splits
// 3. Pages are never moved, freed or reused
//
// Life of an insert:
// 1. Reserve the pages the insert may need
// 2. Descend from the root to a leaf
// 3. Insert, then split full nodes on the way back up
// 4. If the root split, move its contents to a new page and keep the root at 0
//
// System components:
//  - Page store (memory-mapped file, or in memory for tests)
//  - Page codec
//  - B-tree nodes and the tree engine

pub mod btree;
pub mod config;
pub mod storage;

#[cfg(test)]
mod e2e_tests;

pub use btree::{Tree, TreeError};
pub use config::{ConfigError, IndexConfig};
