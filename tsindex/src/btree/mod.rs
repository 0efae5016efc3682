//! Disk-resident B-tree mapping timestamps to values.
//!
//! # Structure
//!
//! The tree consists of:
//! - Leaf nodes: keys with their values, plus a fence slot holding the value
//!   of the separator that follows the leaf
//! - Interior nodes: separator keys and child page offsets
//!
//! Each node is one page of the index file. The root is always the first
//! page; it splits in place by moving its contents to a new page.
//!
//! # Usage
//!
//! ```
//! use tsindex::btree::{ABSENT, Tree};
//! use tsindex::storage::{Layout, MemoryStore};
//!
//! let layout = Layout::default();
//! let mut tree = Tree::create(MemoryStore::new(layout.page_size()), layout)?;
//!
//! tree.insert(1_700_000_000_000, 42)?;
//! assert_eq!(tree.find(1_700_000_000_000), Some(42));
//! assert_eq!(tree.find_or_absent(1), ABSENT);
//!
//! tree.close()?;
//! # Ok::<(), tsindex::btree::TreeError>(())
//! ```

mod dump;
mod invariants;
mod node;
mod tree;

pub use dump::TreeDisplay;
pub use invariants::{InvariantViolation, TreeSummary};
pub use node::{CorruptionError, Node, Position};
pub use tree::{ABSENT, ROOT, Tree, TreeError};
