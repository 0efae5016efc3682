//! Page storage for the index.
//!
//! The index lives in a single file of fixed-size pages. Pages are appended
//! one at a time and never moved or reused, so a page's byte offset is its
//! permanent identity. Offset 0 always holds the root.
//!
//! # Usage
//!
//! ```no_run
//! use tsindex::storage::{Layout, MmapStore, PageRegion, PageStore};
//!
//! # fn main() -> Result<(), tsindex::storage::StoreError> {
//! let layout = Layout::default();
//! let mut store = MmapStore::create("index.db".as_ref(), layout.page_size())?;
//!
//! // Append a page and map it
//! let offset = store.grow()?;
//! let mut page = store.map(offset)?;
//!
//! // Write into the mapping and make it durable
//! page.write_u64(layout.key_offset(0), 1_700_000_000_000);
//! page.sync()?;
//! # Ok(())
//! # }
//! ```

mod file;
mod io;
mod memory;
mod page;

pub use file::{MappedPage, MmapStore};
pub use io::{PageStore, StoreError};
pub use memory::{FaultConfig, MemoryPage, MemoryStore, MemoryStoreStats};
pub use page::{
    DEFAULT_SPLIT_FACTOR, LEAF_FLAG, Layout, LayoutError, MAGIC, MIN_DEGREE, PAGE_SIZE, PageError,
    PageHeader, PageRegion, Timestamp,
};
