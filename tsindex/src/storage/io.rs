//! Page store abstraction.
//!
//! The index never touches the file directly. It asks a `PageStore` to grow
//! the file one page at a time and to map individual pages, so that real
//! memory-mapped files can be used in production and an in-memory store
//! with fault injection in tests.
//!
//! # Implementation Notes
//!
//! Implementations must ensure:
//! - `grow` appends exactly one zero-filled page and returns its offset
//! - `map` only succeeds for page-aligned offsets inside the file
//! - `PageRegion::sync` on a mapped page makes its bytes durable

use crate::storage::page::PageRegion;

/// Errors that can occur during page store operations.
#[derive(Debug)]
pub enum StoreError {
    /// I/O error.
    Io(std::io::Error),
    /// A page was requested past the end of the file.
    OutOfBounds { offset: u64, file_len: u64 },
    /// A page offset that is not a multiple of the page size.
    Misaligned { offset: u64, page_size: usize },
    /// Injected fault for testing.
    InjectedFault(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OutOfBounds { offset, file_len } => {
                write!(f, "page at {offset} out of bounds (file length: {file_len})")
            }
            Self::Misaligned { offset, page_size } => {
                write!(f, "offset {offset} is not a multiple of page size {page_size}")
            }
            Self::InjectedFault(msg) => write!(f, "injected fault: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// A file of fixed-size pages that can be grown and mapped page by page.
pub trait PageStore {
    /// A mapped page. Dropping it unmaps the page.
    type Region: PageRegion;

    /// Size of every page in bytes.
    fn page_size(&self) -> usize;

    /// Current length of the file in bytes.
    fn file_len(&self) -> Result<u64, StoreError>;

    /// Discard the whole file.
    fn truncate(&mut self) -> Result<(), StoreError>;

    /// Append one zero-filled page and return its offset.
    fn grow(&mut self) -> Result<u64, StoreError>;

    /// Map the page at `offset`.
    fn map(&mut self, offset: u64) -> Result<Self::Region, StoreError>;

    /// Check that `offset` names a whole page inside a file of `file_len`
    /// bytes.
    fn check_offset(&self, offset: u64, file_len: u64) -> Result<(), StoreError> {
        let page_size = self.page_size();
        if offset % page_size as u64 != 0 {
            return Err(StoreError::Misaligned { offset, page_size });
        }
        if offset.saturating_add(page_size as u64) > file_len {
            return Err(StoreError::OutOfBounds { offset, file_len });
        }
        Ok(())
    }
}
