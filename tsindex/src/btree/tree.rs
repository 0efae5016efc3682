//! The timestamp index.
//!
//! A B-tree of `u64` timestamps mapped to `u64` values, stored one node per
//! page in an append-only file. The whole tree is mapped when it is opened
//! and stays mapped until it is closed; lookups never touch the store.
//!
//! Every key has exactly one value slot. Keys that live in a leaf keep their
//! value next to them. A key promoted into an interior node by a split keeps
//! its value in the fence slot of the rightmost leaf of the subtree to its
//! left, which is the leaf that held the key before the split.
//!
//! Inserts reserve every page they might need before changing anything, so
//! an insert that fails for lack of space leaves the tree untouched.

use std::collections::VecDeque;
use std::path::Path;

use crate::btree::node::{CorruptionError, Node, Position};
use crate::config::IndexConfig;
use crate::storage::{Layout, LayoutError, MmapStore, PageStore, StoreError, Timestamp};

/// Page number of the root. The root never moves.
pub const ROOT: usize = 0;

/// Returned by [`Tree::find_or_absent`] for keys that are not stored.
pub const ABSENT: u64 = u64::MAX;

/// Result of splitting a node, handed to its parent.
#[derive(Debug, Clone, Copy)]
struct Split {
    median: Timestamp,
    sibling: usize,
}

/// A B-tree index over a page store.
///
/// Nodes are kept in an arena indexed by page number; a node's children are
/// page numbers into the same arena.
pub struct Tree<S: PageStore> {
    store: S,
    layout: Layout,
    nodes: Vec<Option<Node<S::Region>>>,
    /// Pages grown ahead of an insert and not yet linked into the tree.
    spare: VecDeque<usize>,
}

impl<S: PageStore> Tree<S> {
    /// Create an empty tree, discarding whatever the store held.
    pub fn create(mut store: S, layout: Layout) -> Result<Self, TreeError> {
        check_page_size(&store, &layout)?;
        store.truncate().map_err(TreeError::Store)?;

        let mut tree = Self {
            store,
            layout,
            nodes: Vec::new(),
            spare: VecDeque::new(),
        };
        let root = tree.extend()?;
        debug_assert_eq!(root, ROOT);

        tracing::info!(
            "Created index: page size {}, degree {}",
            layout.page_size(),
            layout.degree()
        );
        Ok(tree)
    }

    /// Open an existing tree and map every node reachable from the root.
    ///
    /// Either the whole tree is mapped or nothing is: on any failure, pages
    /// mapped so far are released before the error is returned.
    pub fn open(mut store: S, layout: Layout) -> Result<Self, TreeError> {
        check_page_size(&store, &layout)?;

        let file_len = store.file_len().map_err(TreeError::Store)?;
        if file_len == 0 {
            return Err(CorruptionError::Empty.into());
        }
        if file_len % layout.page_size_u64() != 0 {
            return Err(CorruptionError::BadLength {
                file_len,
                page_size: layout.page_size(),
            }
            .into());
        }

        let mut nodes = Vec::new();
        nodes.resize_with(layout.page_number(file_len), || None);

        let root = store.map(0).map_err(TreeError::Store)?;
        nodes[ROOT] = Some(Node::from_page(0, root, layout)?);
        Self::map_children(&mut store, layout, &mut nodes)?;

        let tree = Self {
            store,
            layout,
            nodes,
            spare: VecDeque::new(),
        };
        tracing::info!(
            "Opened index: {} pages, {} keys, depth {}",
            tree.page_count(),
            tree.len(),
            tree.depth()
        );
        Ok(tree)
    }

    /// Map every child reachable from the root into `nodes`.
    fn map_children(
        store: &mut S,
        layout: Layout,
        nodes: &mut [Option<Node<S::Region>>],
    ) -> Result<(), TreeError> {
        let mut pending = vec![ROOT];

        while let Some(parent) = pending.pop() {
            let (parent_id, offsets): (u64, Vec<u64>) = match &nodes[parent] {
                Some(node) if !node.is_leaf() => {
                    (node.id(), (0..=node.used()).map(|i| node.slot(i)).collect())
                }
                _ => continue,
            };

            for (i, offset) in offsets.into_iter().enumerate() {
                // Offset 0 is the root, so it marks a child that was never created.
                if offset == 0 {
                    continue;
                }

                if offset % layout.page_size_u64() != 0
                    || offset / layout.page_size_u64() >= nodes.len() as u64
                {
                    return Err(CorruptionError::BadChildOffset {
                        parent: parent_id,
                        child: offset,
                    }
                    .into());
                }

                let child = layout.page_number(offset);
                if nodes[child].is_some() {
                    return Err(CorruptionError::SharedChild {
                        parent: parent_id,
                        child: offset,
                    }
                    .into());
                }

                let page = store
                    .map(offset)
                    .map_err(|source| CorruptionError::UnmappableChild {
                        parent: parent_id,
                        child: offset,
                        source,
                    })?;
                nodes[child] = Some(Node::from_page(offset, page, layout)?);

                if let Some(node) = nodes[parent].as_mut() {
                    node.set_child(i, child, offset);
                }
                pending.push(child);
            }
        }

        Ok(())
    }

    /// Geometry of the tree's pages.
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// The underlying page store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Look up the value stored for `key`.
    #[must_use]
    pub fn find(&self, key: Timestamp) -> Option<u64> {
        let mut page_no = ROOT;
        loop {
            let node = self.node(page_no);
            match (node.is_leaf(), node.locate(key)) {
                (true, Position::Found(i)) => return Some(node.slot(i)),
                (true, Position::Missing(_)) => return None,
                (false, Position::Found(i)) => {
                    let leaf = self.rightmost_leaf(node.child(i)?)?;
                    return Some(self.node(leaf).fence());
                }
                (false, Position::Missing(i)) => page_no = node.child(i)?,
            }
        }
    }

    /// Like [`find`](Self::find), but returns [`ABSENT`] for missing keys.
    ///
    /// A stored value equal to `ABSENT` cannot be told apart from a miss.
    #[must_use]
    pub fn find_or_absent(&self, key: Timestamp) -> u64 {
        self.find(key).unwrap_or(ABSENT)
    }

    /// Insert `key` with `value`, overwriting the value if the key exists.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ResourceExhaustion`] if the file cannot grow to
    /// make room; the tree is unchanged in that case.
    pub fn insert(&mut self, key: Timestamp, value: u64) -> Result<(), TreeError> {
        let needed = self.pages_needed(key);
        self.reserve(needed)?;

        if let Some(split) = self.insert_into(ROOT, key, value)? {
            self.split_root(split)?;
        }
        Ok(())
    }

    /// Number of new pages inserting `key` will link into the tree.
    fn pages_needed(&self, key: Timestamp) -> usize {
        let mut path = Vec::new();
        let mut page_no = ROOT;

        loop {
            let node = self.node(page_no);
            path.push(page_no);
            match (node.is_leaf(), node.locate(key)) {
                (true, Position::Found(_)) => return 0,
                (true, Position::Missing(_)) => break,
                (false, Position::Found(i)) => {
                    return match node.child(i).and_then(|c| self.rightmost_leaf(c)) {
                        Some(_) => 0,
                        None => 1,
                    };
                }
                (false, Position::Missing(i)) => match node.child(i) {
                    Some(child) => page_no = child,
                    None => return 1,
                },
            }
        }

        // Each node on the path splits only if the node below it did and
        // the new key fills it.
        let mut needed = 0;
        for &page_no in path.iter().rev() {
            if self.node(page_no).used() + 1 < self.layout.degree() {
                return needed;
            }
            needed += 1;
        }
        // The old root moves to a new page when the root splits.
        needed + 1
    }

    /// Insert below `page_no`, returning the split to hand to the parent.
    fn insert_into(
        &mut self,
        page_no: usize,
        key: Timestamp,
        value: u64,
    ) -> Result<Option<Split>, TreeError> {
        let node = self.node_mut(page_no);
        let position = node.locate(key);

        if node.is_leaf() {
            match position {
                Position::Found(i) => {
                    node.set_slot(i, value);
                    return Ok(None);
                }
                Position::Missing(i) => node.insert_entry(i, key, value),
            }
        } else {
            match position {
                Position::Found(i) => {
                    let child = self.child_or_allocate(page_no, i)?;
                    let leaf = self.rightmost_leaf_mut(child)?;
                    self.node_mut(leaf).set_fence(value);
                    return Ok(None);
                }
                Position::Missing(i) => {
                    let child = self.child_or_allocate(page_no, i)?;
                    let Some(split) = self.insert_into(child, key, value)? else {
                        return Ok(None);
                    };
                    let offset = self.node(split.sibling).id();
                    self.node_mut(page_no)
                        .insert_separator(i, split.median, split.sibling, offset);
                }
            }
        }

        if self.node(page_no).is_full() {
            self.split(page_no).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Split the full node at `page_no` into itself and a new sibling.
    fn split(&mut self, page_no: usize) -> Result<Split, TreeError> {
        let sibling = self.allocate()?;
        let (node, right) = self.pair_mut(page_no, sibling);
        right.set_leaf(node.is_leaf());
        let median = node.split_into(right);

        tracing::debug!(
            "Split page at {} on key {median}, sibling at {}",
            node.id(),
            right.id()
        );
        Ok(Split { median, sibling })
    }

    /// Grow the tree by one level, keeping the root at page 0.
    ///
    /// The old root's contents move to a new page which becomes the left
    /// child; the split's sibling becomes the right child.
    fn split_root(&mut self, split: Split) -> Result<(), TreeError> {
        let left = self.allocate()?;
        let right_offset = self.node(split.sibling).id();

        let (root, left_node) = self.pair_mut(ROOT, left);
        root.copy_into(left_node);
        let left_offset = left_node.id();
        root.make_root(
            split.median,
            (left, left_offset),
            (split.sibling, right_offset),
        );

        tracing::debug!("Root split on key {}, depth {}", split.median, self.depth());
        Ok(())
    }

    /// Child `i` of `parent`, creating an empty leaf if it does not exist.
    fn child_or_allocate(&mut self, parent: usize, i: usize) -> Result<usize, TreeError> {
        if let Some(child) = self.node(parent).child(i) {
            return Ok(child);
        }

        let child = self.allocate()?;
        let offset = self.node(child).id();
        let node = self.node_mut(parent);
        node.set_child(i, child, offset);

        tracing::debug!("Created missing child {i} of page at {}", node.id());
        Ok(child)
    }

    fn rightmost_leaf(&self, mut page_no: usize) -> Option<usize> {
        loop {
            let node = self.node(page_no);
            if node.is_leaf() {
                return Some(page_no);
            }
            page_no = node.child(node.used())?;
        }
    }

    fn rightmost_leaf_mut(&mut self, mut page_no: usize) -> Result<usize, TreeError> {
        loop {
            let node = self.node(page_no);
            if node.is_leaf() {
                return Ok(page_no);
            }
            let last = node.used();
            page_no = self.child_or_allocate(page_no, last)?;
        }
    }

    /// Make sure at least `count` spare pages exist.
    fn reserve(&mut self, count: usize) -> Result<(), TreeError> {
        while self.spare.len() < count {
            let page_no = self.extend()?;
            self.spare.push_back(page_no);
        }
        Ok(())
    }

    /// Take a spare page, or grow the file if there is none.
    fn allocate(&mut self) -> Result<usize, TreeError> {
        match self.spare.pop_front() {
            Some(page_no) => Ok(page_no),
            None => self.extend(),
        }
    }

    /// Append a page to the file and map it as an empty leaf.
    ///
    /// A page that was grown but could not be mapped stays in the arena as
    /// an unmapped slot, the same as an unreferenced page after reopening.
    fn extend(&mut self) -> Result<usize, TreeError> {
        let offset = self.store.grow().map_err(TreeError::ResourceExhaustion)?;
        let page_no = self.layout.page_number(offset);
        if self.nodes.len() <= page_no {
            self.nodes.resize_with(page_no + 1, || None);
        }

        let page = self.store.map(offset).map_err(|e| {
            tracing::warn!("Failed to map new page at {offset}: {e}");
            TreeError::ResourceExhaustion(e)
        })?;
        self.nodes[page_no] = Some(Node::create(offset, page, self.layout));

        tracing::debug!("Extended index file with page at {offset}");
        Ok(page_no)
    }

    /// Write every node's header and sync its page, parents before children.
    ///
    /// Every node is visited even after a failure; the first error is
    /// returned.
    pub fn flush(&mut self) -> Result<(), TreeError> {
        let mut first_error = None;

        let mut order = self.preorder();
        order.extend(self.spare.iter().copied());
        for page_no in order {
            let node = self.node_mut(page_no);
            record(&mut first_error, node.id(), node.flush());
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Flush and unmap every node, children before parents.
    ///
    /// Every node is released even after a failure; the first error is
    /// returned.
    pub fn close(mut self) -> Result<(), TreeError> {
        let order = self.preorder();
        let mut nodes = std::mem::take(&mut self.nodes);
        let mut first_error = None;

        // Reversed preorder puts every child before its parent.
        for page_no in order.into_iter().rev() {
            if let Some(mut node) = nodes[page_no].take() {
                record(&mut first_error, node.id(), node.flush());
            }
        }
        for mut node in nodes.into_iter().flatten() {
            record(&mut first_error, node.id(), node.flush());
        }

        tracing::info!("Closed index");
        first_error.map_or(Ok(()), Err)
    }

    /// Page numbers of every node reachable from the root, parents first.
    pub(super) fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut pending = vec![ROOT];
        while let Some(page_no) = pending.pop() {
            order.push(page_no);
            pending.extend(self.node(page_no).children().into_iter().rev());
        }
        order
    }

    /// Number of keys stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().map(Node::used).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pages in the file, mapped or not.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of levels, counted along the leftmost path.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut node = self.node(ROOT);
        while !node.is_leaf() {
            let Some(child) = node.child(0) else {
                break;
            };
            node = self.node(child);
            depth += 1;
        }
        depth
    }

    /// Whether `page_no` was grown ahead of an insert and is not linked in.
    pub(super) fn is_spare(&self, page_no: usize) -> bool {
        self.spare.contains(&page_no)
    }

    /// Pages that hold a mapped node.
    pub(super) fn mapped_pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(page_no, node)| node.as_ref().map(|_| page_no))
    }

    pub(crate) fn node(&self, page_no: usize) -> &Node<S::Region> {
        match self.nodes.get(page_no) {
            Some(Some(node)) => node,
            _ => panic!("page {page_no} is not mapped"),
        }
    }

    fn node_mut(&mut self, page_no: usize) -> &mut Node<S::Region> {
        match self.nodes.get_mut(page_no) {
            Some(Some(node)) => node,
            _ => panic!("page {page_no} is not mapped"),
        }
    }

    /// Mutable access to two distinct nodes at once.
    fn pair_mut(
        &mut self,
        a: usize,
        b: usize,
    ) -> (&mut Node<S::Region>, &mut Node<S::Region>) {
        assert_ne!(a, b, "pair of identical pages");
        let (lo, hi) = (a.min(b), a.max(b));
        let (head, tail) = self.nodes.split_at_mut(hi);
        let (Some(lo_node), Some(hi_node)) = (head[lo].as_mut(), tail[0].as_mut()) else {
            panic!("page {lo} or {hi} is not mapped");
        };
        if a < b {
            (lo_node, hi_node)
        } else {
            (hi_node, lo_node)
        }
    }
}

impl Tree<MmapStore> {
    /// Create an empty index file at `path`, truncating any existing file.
    pub fn create_file(path: &Path, config: &IndexConfig) -> Result<Self, TreeError> {
        let layout = config.layout()?;
        let store = MmapStore::create(path, layout.page_size()).map_err(TreeError::Store)?;
        Self::create(store, layout)
    }

    /// Open the index file at `path`.
    pub fn open_file(path: &Path, config: &IndexConfig) -> Result<Self, TreeError> {
        let layout = config.layout()?;
        let store = MmapStore::open(path, layout.page_size()).map_err(TreeError::Store)?;
        Self::open(store, layout)
    }
}

impl<S: PageStore> Drop for Tree<S> {
    /// Headers are written back but not synced; call
    /// [`close`](Tree::close) for durability.
    fn drop(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.write_header();
        }
    }
}

impl<S: PageStore> std::fmt::Debug for Tree<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("layout", &self.layout)
            .field("pages", &self.nodes.len())
            .field("spare", &self.spare.len())
            .finish_non_exhaustive()
    }
}

fn check_page_size<S: PageStore>(store: &S, layout: &Layout) -> Result<(), TreeError> {
    if store.page_size() == layout.page_size() {
        Ok(())
    } else {
        Err(TreeError::PageSizeMismatch {
            store: store.page_size(),
            layout: layout.page_size(),
        })
    }
}

fn record(first_error: &mut Option<TreeError>, offset: u64, result: Result<(), StoreError>) {
    if let Err(e) = result {
        tracing::warn!("Failed to sync page at {offset}: {e}");
        first_error.get_or_insert(TreeError::Store(e));
    }
}

/// Errors that can occur during tree operations.
#[derive(Debug)]
pub enum TreeError {
    /// Invalid page geometry.
    Layout(LayoutError),
    /// The store and the layout disagree on the page size.
    PageSizeMismatch { store: usize, layout: usize },
    /// The file is not a well-formed index.
    Corruption(CorruptionError),
    /// The file could not grow or a new page could not be mapped.
    ResourceExhaustion(StoreError),
    /// Any other store failure.
    Store(StoreError),
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Layout(e) => write!(f, "layout error: {e}"),
            Self::PageSizeMismatch { store, layout } => write!(
                f,
                "store page size {store} does not match layout page size {layout}"
            ),
            Self::Corruption(e) => write!(f, "corrupt index: {e}"),
            Self::ResourceExhaustion(e) => write!(f, "out of space: {e}"),
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Layout(e) => Some(e),
            Self::PageSizeMismatch { .. } => None,
            Self::Corruption(e) => Some(e),
            Self::ResourceExhaustion(e) | Self::Store(e) => Some(e),
        }
    }
}

impl From<LayoutError> for TreeError {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

impl From<CorruptionError> for TreeError {
    fn from(e: CorruptionError) -> Self {
        Self::Corruption(e)
    }
}
