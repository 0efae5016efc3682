//! Structural invariant checks for a tree.
//!
//! # Invariants Checked
//!
//! 1. **Root position**: the root is the page at offset 0
//! 2. **Page identity**: every node's id is its page offset
//! 3. **Key order**: keys are strictly increasing across the whole tree, so
//!    every key of child `i` lies strictly between separators `i - 1` and `i`
//! 4. **Room to grow**: no node is left full between inserts
//! 5. **Child slots**: an interior slot holds its child's offset, or 0 for a
//!    child that does not exist
//! 6. **Balance**: all leaves are at the same depth
//! 7. **Single parent**: every mapped page is reached exactly once, except
//!    pages reserved for a pending split

use std::collections::HashSet;

use crate::btree::tree::{ROOT, Tree};
use crate::storage::{PageStore, Timestamp};

/// Shape of a tree that passed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeSummary {
    /// Keys stored, in leaves and interior nodes.
    pub keys: usize,
    /// Nodes reachable from the root.
    pub nodes: usize,
    pub leaves: usize,
    /// Levels from the root to the leaves.
    pub depth: usize,
}

/// A violated invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The root is not at offset 0.
    RootMoved { offset: u64 },
    /// A node's id differs from its page offset.
    IdMismatch { page: usize, id: u64 },
    /// Key `index` is not greater than the key before it.
    KeysOutOfOrder { node: u64, index: usize },
    /// A key outside the range its parent's separators allow.
    KeyOutOfBounds { node: u64, key: Timestamp },
    /// A node is full outside of an insert.
    NodeFull { node: u64 },
    /// An interior slot that does not name the mapped child.
    ChildSlotMismatch {
        node: u64,
        index: usize,
        slot: u64,
    },
    /// Leaves at different depths.
    UnevenDepth {
        node: u64,
        depth: usize,
        expected: usize,
    },
    /// A page reached through more than one parent.
    Revisited { node: u64 },
    /// A mapped page that no parent reaches.
    Unreachable { node: u64 },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootMoved { offset } => write!(f, "root is at offset {offset}"),
            Self::IdMismatch { page, id } => write!(f, "page {page} has id {id}"),
            Self::KeysOutOfOrder { node, index } => {
                write!(f, "node @{node}: key {index} is out of order")
            }
            Self::KeyOutOfBounds { node, key } => {
                write!(f, "node @{node}: key {key} is outside its parent's range")
            }
            Self::NodeFull { node } => write!(f, "node @{node} is full"),
            Self::ChildSlotMismatch { node, index, slot } => {
                write!(f, "node @{node}: child slot {index} holds {slot}")
            }
            Self::UnevenDepth {
                node,
                depth,
                expected,
            } => write!(
                f,
                "leaf @{node} is at depth {depth}, other leaves at {expected}"
            ),
            Self::Revisited { node } => write!(f, "node @{node} has more than one parent"),
            Self::Unreachable { node } => write!(f, "node @{node} is not reachable from the root"),
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// One node waiting to be checked, with the open key range it must fall in.
struct Pending {
    page_no: usize,
    depth: usize,
    above: Option<Timestamp>,
    below: Option<Timestamp>,
}

impl<S: PageStore> Tree<S> {
    /// Check every structural invariant.
    pub fn verify(&self) -> Result<TreeSummary, InvariantViolation> {
        let page_size = self.layout().page_size_u64();
        let degree = self.layout().degree();

        let root_id = self.node(ROOT).id();
        if root_id != 0 {
            return Err(InvariantViolation::RootMoved { offset: root_id });
        }

        let mut summary = TreeSummary {
            keys: 0,
            nodes: 0,
            leaves: 0,
            depth: 0,
        };
        let mut visited = HashSet::new();
        let mut pending = vec![Pending {
            page_no: ROOT,
            depth: 1,
            above: None,
            below: None,
        }];

        while let Some(Pending {
            page_no,
            depth,
            above,
            below,
        }) = pending.pop()
        {
            let node = self.node(page_no);
            let id = node.id();

            if !visited.insert(page_no) {
                return Err(InvariantViolation::Revisited { node: id });
            }
            if id != page_no as u64 * page_size {
                return Err(InvariantViolation::IdMismatch { page: page_no, id });
            }
            if node.used() >= degree {
                return Err(InvariantViolation::NodeFull { node: id });
            }

            let keys: Vec<Timestamp> = node.keys().collect();
            if let Some(index) = (1..keys.len()).find(|&i| keys[i - 1] >= keys[i]) {
                return Err(InvariantViolation::KeysOutOfOrder { node: id, index });
            }
            let in_range = |key: Timestamp| {
                above.is_none_or(|lo| key > lo) && below.is_none_or(|hi| key < hi)
            };
            if let Some(&key) = keys.iter().find(|&&key| !in_range(key)) {
                return Err(InvariantViolation::KeyOutOfBounds { node: id, key });
            }

            summary.nodes += 1;
            summary.keys += keys.len();

            if node.is_leaf() {
                summary.leaves += 1;
                if summary.depth == 0 {
                    summary.depth = depth;
                } else if summary.depth != depth {
                    return Err(InvariantViolation::UnevenDepth {
                        node: id,
                        depth,
                        expected: summary.depth,
                    });
                }
                continue;
            }

            // Reversed so the leftmost child is checked first.
            for index in (0..=node.used()).rev() {
                let slot = node.slot(index);
                let expected = node.child(index).map_or(0, |child| self.node(child).id());
                if slot != expected {
                    return Err(InvariantViolation::ChildSlotMismatch {
                        node: id,
                        index,
                        slot,
                    });
                }

                if let Some(child) = node.child(index) {
                    pending.push(Pending {
                        page_no: child,
                        depth: depth + 1,
                        above: if index == 0 { above } else { Some(keys[index - 1]) },
                        below: if index == keys.len() {
                            below
                        } else {
                            Some(keys[index])
                        },
                    });
                }
            }
        }

        if let Some(page_no) = self
            .mapped_pages()
            .find(|page_no| !visited.contains(page_no) && !self.is_spare(*page_no))
        {
            return Err(InvariantViolation::Unreachable {
                node: self.node(page_no).id(),
            });
        }

        if summary.depth == 0 {
            summary.depth = 1;
        }
        Ok(summary)
    }
}
