//! Page layout and typed page access for the index file.
//!
//! Every page has the same shape:
//!
//! ```text
//! +-------+------+------+-------------------+-----------------------+
//! | magic | flag | used | keys[degree]      | slots[degree + 1]     |
//! | 5 B   | 1 B  | 2 B  | 8 B each (LE u64) | 8 B each (LE u64)     |
//! +-------+------+------+-------------------+-----------------------+
//! ```
//!
//! The flag byte has bit `0x80` set for leaves. Anything after the last slot
//! is left zeroed.

use crate::storage::io::StoreError;

/// Default page size in bytes (8KB).
pub const PAGE_SIZE: usize = 8192;

/// A timestamp key, in milliseconds.
pub type Timestamp = u64;

/// Magic bytes at the start of every page.
pub const MAGIC: [u8; 5] = *b"BTREE";

/// Flag bit marking a leaf page.
pub const LEAF_FLAG: u8 = 0x80;

/// Default split fraction.
pub const DEFAULT_SPLIT_FACTOR: f64 = 0.5;

/// Smallest degree that still leaves both halves of a split non-trivial.
pub const MIN_DEGREE: usize = 3;

/// Header at the start of every page.
///
/// Layout:
/// - `magic`: 5 bytes
/// - `flags`: 1 byte
/// - `used`: 2 bytes (little-endian)
///
/// Total: 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub leaf: bool,
    pub used: u16,
}

impl PageHeader {
    /// Size of the page header in bytes.
    pub const SIZE: usize = 8;

    /// Header of a freshly extended page.
    pub const EMPTY_LEAF: Self = Self {
        leaf: true,
        used: 0,
    };

    /// Serialize the header to bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..5].copy_from_slice(&MAGIC);
        buf[5] = if self.leaf { LEAF_FLAG } else { 0 };
        buf[6..8].copy_from_slice(&self.used.to_le_bytes());
        buf
    }

    /// Deserialize a header from bytes.
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Result<Self, PageError> {
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]];
        if magic != MAGIC {
            return Err(PageError::BadMagic(magic));
        }

        Ok(Self {
            leaf: bytes[5] & LEAF_FLAG != 0,
            used: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }

    /// Read the header from the start of a page.
    pub fn read_from<R: PageRegion + ?Sized>(region: &R) -> Result<Self, PageError> {
        let bytes = region.read_bytes(0, Self::SIZE);
        Self::from_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])
    }

    /// Write the header to the start of a page.
    pub fn write_to<R: PageRegion + ?Sized>(self, region: &mut R) {
        region.write_bytes(0, &self.to_bytes());
    }
}

/// Geometry of a page: where keys and slots live, and where nodes split.
///
/// Offsets are derived once from `page_size` and `degree`; every accessor
/// asserts its index is within the array it addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    page_size: usize,
    degree: usize,
    split_point: usize,
    slots_offset: usize,
}

impl Layout {
    /// Build a layout, validating that the arrays fit and the split point is
    /// usable.
    pub fn new(page_size: usize, degree: usize, split_factor: f64) -> Result<Self, LayoutError> {
        if degree < MIN_DEGREE {
            return Err(LayoutError::DegreeTooSmall(degree));
        }
        if degree > usize::from(u16::MAX) {
            return Err(LayoutError::DegreeTooLarge(degree));
        }

        let required = Self::required_size(degree);
        if page_size < required {
            return Err(LayoutError::PageTooSmall {
                page_size,
                required,
            });
        }

        if !split_factor.is_finite() || split_factor <= 0.0 || split_factor >= 1.0 {
            return Err(LayoutError::SplitFactor(split_factor));
        }

        // degree <= u16::MAX, so both casts are exact.
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let split_point = (degree as f64 * split_factor).floor() as usize;
        if split_point == 0 || split_point >= degree {
            return Err(LayoutError::SplitPoint {
                degree,
                split_point,
            });
        }

        Ok(Self {
            page_size,
            degree,
            split_point,
            slots_offset: PageHeader::SIZE + degree * 8,
        })
    }

    /// Layout with the largest degree a page of `page_size` can hold, split
    /// in half.
    pub fn for_page_size(page_size: usize) -> Result<Self, LayoutError> {
        Self::new(page_size, Self::max_degree(page_size), DEFAULT_SPLIT_FACTOR)
    }

    /// Bytes needed for a page of the given degree.
    #[must_use]
    pub const fn required_size(degree: usize) -> usize {
        PageHeader::SIZE + degree * 8 + (degree + 1) * 8
    }

    /// Largest degree that fits in a page of `page_size` bytes.
    #[must_use]
    pub const fn max_degree(page_size: usize) -> usize {
        page_size.saturating_sub(PageHeader::SIZE + 8) / 16
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Page size as u64 for offset calculations.
    #[must_use]
    pub const fn page_size_u64(&self) -> u64 {
        self.page_size as u64
    }

    /// Maximum number of keys in a node.
    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// Index of the key promoted when a full node splits.
    #[must_use]
    pub const fn split_point(&self) -> usize {
        self.split_point
    }

    /// Byte offset of `keys[i]`.
    #[must_use]
    pub const fn key_offset(&self, i: usize) -> usize {
        assert!(i < self.degree, "key index out of range");
        PageHeader::SIZE + i * 8
    }

    /// Byte offset of `slots[i]`.
    #[must_use]
    pub const fn slot_offset(&self, i: usize) -> usize {
        assert!(i <= self.degree, "slot index out of range");
        self.slots_offset + i * 8
    }

    /// Page number of a page offset.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn page_number(&self, offset: u64) -> usize {
        (offset / self.page_size_u64()) as usize
    }
}

impl Default for Layout {
    fn default() -> Self {
        let degree = Self::max_degree(PAGE_SIZE);
        Self {
            page_size: PAGE_SIZE,
            degree,
            split_point: degree / 2,
            slots_offset: PageHeader::SIZE + degree * 8,
        }
    }
}

/// A fixed-size, mapped page of the index file.
///
/// Implementors provide the raw bytes and durability; the typed accessors
/// are shared. All accessors panic on out-of-range offsets.
pub trait PageRegion {
    /// Get the raw page data.
    fn as_bytes(&self) -> &[u8];

    /// Get mutable access to the raw page data.
    fn as_bytes_mut(&mut self) -> &mut [u8];

    /// Flush this page to stable storage.
    fn sync(&self) -> Result<(), StoreError>;

    /// Read bytes at a specific offset.
    fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.as_bytes()[offset..offset + len]
    }

    /// Write bytes at a specific offset.
    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.as_bytes_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Read a u8 at the given offset.
    fn read_u8(&self, offset: usize) -> u8 {
        self.as_bytes()[offset]
    }

    /// Write a u8 at the given offset.
    fn write_u8(&mut self, offset: usize, value: u8) {
        self.as_bytes_mut()[offset] = value;
    }

    /// Read a u16 (little-endian) at the given offset.
    fn read_u16(&self, offset: usize) -> u16 {
        let data = self.as_bytes();
        u16::from_le_bytes([data[offset], data[offset + 1]])
    }

    /// Write a u16 (little-endian) at the given offset.
    fn write_u16(&mut self, offset: usize, value: u16) {
        self.as_bytes_mut()[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Read a u64 (little-endian) at the given offset.
    fn read_u64(&self, offset: usize) -> u64 {
        let data = self.as_bytes();
        u64::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ])
    }

    /// Write a u64 (little-endian) at the given offset.
    fn write_u64(&mut self, offset: usize, value: u64) {
        self.as_bytes_mut()[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Move `count` consecutive 8-byte words from `src` to `dst` within the
    /// page. The ranges may overlap.
    fn move_words(&mut self, src: usize, dst: usize, count: usize) {
        self.as_bytes_mut()
            .copy_within(src..src + count * 8, dst);
    }
}

/// Errors decoding a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The page does not start with the index magic.
    BadMagic([u8; 5]),
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic(m) => write!(f, "bad page magic: {m:02x?}"),
        }
    }
}

impl std::error::Error for PageError {}

/// Errors building a [`Layout`].
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Degree below [`MIN_DEGREE`].
    DegreeTooSmall(usize),
    /// Degree does not fit the 16-bit `used` field.
    DegreeTooLarge(usize),
    /// The key and slot arrays do not fit in the page.
    PageTooSmall { page_size: usize, required: usize },
    /// Split factor outside `(0, 1)`.
    SplitFactor(f64),
    /// The split factor puts the median at either end of the node.
    SplitPoint { degree: usize, split_point: usize },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegreeTooSmall(d) => write!(f, "degree {d} is below the minimum {MIN_DEGREE}"),
            Self::DegreeTooLarge(d) => write!(f, "degree {d} does not fit in 16 bits"),
            Self::PageTooSmall {
                page_size,
                required,
            } => write!(
                f,
                "page size {page_size} is too small (need at least {required} bytes)"
            ),
            Self::SplitFactor(s) => write!(f, "split factor {s} must be between 0 and 1"),
            Self::SplitPoint {
                degree,
                split_point,
            } => write!(
                f,
                "split point {split_point} is unusable for degree {degree}"
            ),
        }
    }
}

impl std::error::Error for LayoutError {}
