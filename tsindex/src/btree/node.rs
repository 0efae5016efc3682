//! B-tree nodes.
//!
//! A node is the in-memory view of exactly one mapped page. Keys and slots
//! live in the page itself; only the header fields (`leaf`, `used`) are
//! cached and written back when the node is flushed.
//!
//! Leaf slots hold the value of the key at the same index. The slot just
//! past the last key (`slots[used]`) is the leaf's fence: the value of the
//! separator key that follows this leaf in key order. Interior slots hold
//! child page offsets, with 0 meaning "no child yet".

#![allow(clippy::cast_possible_truncation)]

use crate::storage::{Layout, PageError, PageHeader, PageRegion, StoreError, Timestamp};

/// Result of searching a node's keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// The key is stored at this index.
    Found(usize),
    /// The key is absent; this is the index of the first greater key.
    Missing(usize),
}

/// A B-tree node backed by a mapped page.
#[derive(Debug)]
pub struct Node<R> {
    id: u64,
    leaf: bool,
    used: usize,
    layout: Layout,
    page: R,
    /// Page numbers of mapped children, parallel to the slots.
    children: Vec<Option<usize>>,
}

impl<R: PageRegion> Node<R> {
    /// Initialize a freshly grown, zeroed page as an empty leaf.
    pub fn create(id: u64, mut page: R, layout: Layout) -> Self {
        PageHeader::EMPTY_LEAF.write_to(&mut page);
        Self {
            id,
            leaf: true,
            used: 0,
            layout,
            page,
            children: vec![None; layout.degree() + 1],
        }
    }

    /// Decode the header of an existing page.
    ///
    /// Children are not mapped here; the tree attaches them afterwards.
    pub fn from_page(id: u64, page: R, layout: Layout) -> Result<Self, CorruptionError> {
        let header = PageHeader::read_from(&page).map_err(|e| match e {
            PageError::BadMagic(magic) => CorruptionError::BadMagic { offset: id, magic },
        })?;

        // Nodes are split as soon as they fill, so a full page is never written.
        let used = usize::from(header.used);
        if used >= layout.degree() {
            return Err(CorruptionError::UsedOutOfRange {
                offset: id,
                used,
                degree: layout.degree(),
            });
        }

        Ok(Self {
            id,
            leaf: header.leaf,
            used,
            layout,
            page,
            children: vec![None; layout.degree() + 1],
        })
    }

    /// Offset of this node's page in the file.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.leaf
    }

    pub const fn set_leaf(&mut self, leaf: bool) {
        self.leaf = leaf;
    }

    /// Number of keys stored.
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.used == self.layout.degree()
    }

    #[must_use]
    pub fn key(&self, i: usize) -> Timestamp {
        self.page.read_u64(self.layout.key_offset(i))
    }

    fn set_key(&mut self, i: usize, key: Timestamp) {
        self.page.write_u64(self.layout.key_offset(i), key);
    }

    /// Raw slot: a value in a leaf, a child offset in an interior node.
    #[must_use]
    pub fn slot(&self, i: usize) -> u64 {
        self.page.read_u64(self.layout.slot_offset(i))
    }

    /// Overwrite a slot in place.
    pub fn set_slot(&mut self, i: usize, value: u64) {
        self.page.write_u64(self.layout.slot_offset(i), value);
    }

    /// Value of the separator that follows this leaf.
    #[must_use]
    pub fn fence(&self) -> u64 {
        self.slot(self.used)
    }

    pub fn set_fence(&mut self, value: u64) {
        self.set_slot(self.used, value);
    }

    /// Page number of child `i`, if mapped.
    #[must_use]
    pub fn child(&self, i: usize) -> Option<usize> {
        self.children[i]
    }

    /// Page numbers of all mapped children, left to right.
    #[must_use]
    pub fn children(&self) -> Vec<usize> {
        if self.leaf {
            return Vec::new();
        }
        self.children[..=self.used].iter().flatten().copied().collect()
    }

    /// Install `page_no` (at file offset `offset`) as child `i`.
    pub fn set_child(&mut self, i: usize, page_no: usize, offset: u64) {
        self.set_slot(i, offset);
        self.children[i] = Some(page_no);
    }

    /// Stored keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = Timestamp> + '_ {
        (0..self.used).map(|i| self.key(i))
    }

    /// Binary search for `key` among the stored keys.
    ///
    /// Narrows the half-open interval `[lo, hi)` of candidates, starting
    /// from `[0, used)`: keys before `lo` are less than `key` and keys from
    /// `hi` on are greater.
    #[must_use]
    pub fn locate(&self, key: Timestamp) -> Position {
        let mut lo = 0;
        let mut hi = self.used;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.key(mid).cmp(&key) {
                std::cmp::Ordering::Equal => return Position::Found(mid),
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Less => lo = mid + 1,
            }
        }
        Position::Missing(hi)
    }

    /// Shift keys `[key_at, used)` and slots `[slot_at, used]` one position
    /// to the right, leaving a hole at `key_at` and `slot_at`.
    ///
    /// Pre: `used < degree`, `key_at <= used`, `key_at <= slot_at <= used + 1`.
    /// Post: `used` is unchanged; the caller fills the hole and bumps it.
    pub fn open_gap(&mut self, key_at: usize, slot_at: usize) {
        assert!(self.used < self.layout.degree(), "no room to open a gap");
        assert!(key_at <= self.used, "gap past the last key");
        assert!(
            key_at <= slot_at && slot_at <= self.used + 1,
            "slot gap out of range"
        );

        let keys = self.used - key_at;
        if keys > 0 {
            self.page.move_words(
                self.layout.key_offset(key_at),
                self.layout.key_offset(key_at + 1),
                keys,
            );
        }

        let slots = self.used + 1 - slot_at;
        if slots > 0 {
            self.page.move_words(
                self.layout.slot_offset(slot_at),
                self.layout.slot_offset(slot_at + 1),
                slots,
            );
            self.children
                .copy_within(slot_at..=self.used, slot_at + 1);
        }
        self.children[slot_at] = None;
    }

    /// Insert a new key and its value into a leaf at index `i`.
    pub fn insert_entry(&mut self, i: usize, key: Timestamp, value: u64) {
        assert!(self.leaf, "entry inserted into an interior node");
        self.open_gap(i, i);
        self.set_key(i, key);
        self.set_slot(i, value);
        self.used += 1;
    }

    /// Record a split of child `i`: `median` becomes key `i` and the new
    /// sibling becomes child `i + 1`.
    pub fn insert_separator(&mut self, i: usize, median: Timestamp, sibling: usize, offset: u64) {
        assert!(!self.leaf, "separator inserted into a leaf");
        self.open_gap(i, i + 1);
        self.set_key(i, median);
        self.set_child(i + 1, sibling, offset);
        self.used += 1;
    }

    /// Split a full node, moving everything above the split point into the
    /// empty node `right`. Returns the median key, which neither half keeps.
    ///
    /// Pre: `self` is full, `right` is empty with the same leaf flag.
    /// Post: `used(self) + used(right) + 1 == degree`. For a leaf, the
    /// median's value stays behind as `self`'s fence and the old fence moves
    /// to `right`.
    pub fn split_into(&mut self, right: &mut Self) -> Timestamp {
        assert!(self.is_full(), "split of a node that is not full");
        assert_eq!(right.used, 0, "split into a non-empty node");
        assert_eq!(self.leaf, right.leaf, "split across node kinds");

        let mid = self.layout.split_point();
        let median = self.key(mid);
        let moved = self.used - mid - 1;

        if moved > 0 {
            let src = self.layout.key_offset(mid + 1);
            let dst = right.layout.key_offset(0);
            right
                .page
                .write_bytes(dst, self.page.read_bytes(src, moved * 8));
        }

        let src = self.layout.slot_offset(mid + 1);
        let dst = right.layout.slot_offset(0);
        right
            .page
            .write_bytes(dst, self.page.read_bytes(src, (moved + 1) * 8));
        for i in 0..=moved {
            right.children[i] = self.children[mid + 1 + i].take();
        }

        right.used = moved;
        self.used = mid;
        median
    }

    /// Copy this node's whole page and state into `other`.
    pub fn copy_into(&self, other: &mut Self) {
        other.page.as_bytes_mut().copy_from_slice(self.page.as_bytes());
        other.leaf = self.leaf;
        other.used = self.used;
        other.children.copy_from_slice(&self.children);
    }

    /// Turn this node into an interior node with a single separator.
    pub fn make_root(&mut self, median: Timestamp, left: (usize, u64), right: (usize, u64)) {
        self.leaf = false;
        self.used = 1;
        self.children.fill(None);
        self.set_key(0, median);
        self.set_child(0, left.0, left.1);
        self.set_child(1, right.0, right.1);
    }

    /// Encode the cached header fields into the page.
    pub fn write_header(&mut self) {
        let header = PageHeader {
            leaf: self.leaf,
            used: self.used as u16,
        };
        header.write_to(&mut self.page);
    }

    /// Write the header and make the page durable.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.write_header();
        self.page.sync()
    }
}

/// Ways an index file can be malformed.
#[derive(Debug)]
pub enum CorruptionError {
    /// The file holds no pages at all.
    Empty,
    /// File length is not a multiple of the page size.
    BadLength { file_len: u64, page_size: usize },
    /// A page does not start with the index magic.
    BadMagic { offset: u64, magic: [u8; 5] },
    /// A page claims as many keys as fit, or more.
    UsedOutOfRange {
        offset: u64,
        used: usize,
        degree: usize,
    },
    /// A child offset that is unaligned or past the end of the file.
    BadChildOffset { parent: u64, child: u64 },
    /// A page referenced more than once.
    SharedChild { parent: u64, child: u64 },
    /// A referenced child page could not be mapped.
    UnmappableChild {
        parent: u64,
        child: u64,
        source: StoreError,
    },
}

impl std::fmt::Display for CorruptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "index file is empty"),
            Self::BadLength {
                file_len,
                page_size,
            } => write!(
                f,
                "file length {file_len} is not a multiple of page size {page_size}"
            ),
            Self::BadMagic { offset, magic } => {
                write!(f, "page at {offset} has bad magic {magic:02x?}")
            }
            Self::UsedOutOfRange {
                offset,
                used,
                degree,
            } => write!(
                f,
                "page at {offset} claims {used} keys (degree is {degree})"
            ),
            Self::BadChildOffset { parent, child } => {
                write!(f, "page at {parent} references invalid child offset {child}")
            }
            Self::SharedChild { parent, child } => {
                write!(f, "page at {parent} references already mapped page {child}")
            }
            Self::UnmappableChild {
                parent,
                child,
                source,
            } => write!(
                f,
                "page at {parent} references unmappable page {child}: {source}"
            ),
        }
    }
}

impl std::error::Error for CorruptionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnmappableChild { source, .. } => Some(source),
            _ => None,
        }
    }
}
