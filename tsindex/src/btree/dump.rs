//! Human-readable dump of a tree, one line per key.
//!
//! ```text
//! [node @0 // 1 keys interior]
//!   [000]        300 / 000000012c (@16384) -->
//!         [node @16384 // 2 keys LEAF]
//!           [000]        100 / 0000000064 (= 101 / 0000000065)
//!           [001]        200 / 00000000c8 (= 201 / 00000000c9)
//!           [002]          ~ (= 301 / 000000012d)
//!   [001]          ~ (@8192) -->
//!         [node @8192 // 1 keys LEAF]
//!           ...
//! ```
//!
//! The `~` line is the slot past the last key: a leaf's fence value or an
//! interior node's last child.

use std::fmt::{self, Write};

use crate::btree::tree::{ROOT, Tree};
use crate::storage::{PageStore, Timestamp};

impl<S: PageStore> Tree<S> {
    /// Write the whole tree to `out`.
    pub fn dump<W: Write>(&self, out: &mut W) -> fmt::Result {
        self.dump_node(out, ROOT, 0)
    }

    /// Display adapter for [`dump`](Self::dump).
    #[must_use]
    pub const fn display(&self) -> TreeDisplay<'_, S> {
        TreeDisplay { tree: self }
    }

    /// Every stored key in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<Timestamp> {
        let mut keys = Vec::with_capacity(self.len());
        self.collect_keys(ROOT, &mut keys);
        keys
    }

    fn collect_keys(&self, page_no: usize, keys: &mut Vec<Timestamp>) {
        let node = self.node(page_no);
        for (i, key) in node.keys().enumerate() {
            if let Some(child) = node.child(i) {
                self.collect_keys(child, keys);
            }
            keys.push(key);
        }
        if let Some(child) = node.child(node.used()) {
            self.collect_keys(child, keys);
        }
    }

    fn dump_node<W: Write>(&self, out: &mut W, page_no: usize, indent: usize) -> fmt::Result {
        let node = self.node(page_no);
        let kind = if node.is_leaf() { "LEAF" } else { "interior" };
        writeln!(
            out,
            "{:indent$}[node @{} // {} keys {kind}]",
            "",
            node.id(),
            node.used()
        )?;

        let inner = indent + 2;
        for (i, key) in node.keys().enumerate() {
            write!(out, "{:inner$}[{i:03}] {key:>10} / {key:010x} ", "")?;
            if node.is_leaf() {
                let value = node.slot(i);
                writeln!(out, "(= {value} / {value:010x})")?;
            } else {
                self.dump_child(out, page_no, i, indent)?;
            }
        }

        let last = node.used();
        write!(out, "{:inner$}[{last:03}]          ~ ", "")?;
        if node.is_leaf() {
            let fence = node.fence();
            writeln!(out, "(= {fence} / {fence:010x})")
        } else {
            self.dump_child(out, page_no, last, indent)
        }
    }

    fn dump_child<W: Write>(
        &self,
        out: &mut W,
        page_no: usize,
        i: usize,
        indent: usize,
    ) -> fmt::Result {
        match self.node(page_no).child(i) {
            Some(child) => {
                writeln!(out, "(@{}) -->", self.node(child).id())?;
                self.dump_node(out, child, indent + 8)
            }
            None => writeln!(out, "(absent)"),
        }
    }
}

/// Formats a tree with [`Tree::dump`].
pub struct TreeDisplay<'a, S: PageStore> {
    tree: &'a Tree<S>,
}

impl<S: PageStore> fmt::Display for TreeDisplay<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tree.dump(f)
    }
}
