//! Memory-mapped index file.
//!
//! Each page is mapped on its own with `MAP_SHARED`, so writes into a page
//! land in the page cache immediately and `sync` (an `msync` of just that
//! page) makes them durable. Growing the file never remaps existing pages.

// memmap2 exposes mapping as `unsafe`; every use is documented below.
#![allow(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

use crate::storage::io::{PageStore, StoreError};
use crate::storage::page::PageRegion;

/// An index file whose pages are mapped individually.
#[derive(Debug)]
pub struct MmapStore {
    file: File,
    page_size: usize,
}

impl MmapStore {
    /// Wrap an already opened file. The file must be readable and writable.
    #[must_use]
    pub const fn new(file: File, page_size: usize) -> Self {
        Self { file, page_size }
    }

    /// Open the file at `path`, creating it if it does not exist.
    ///
    /// Existing contents are kept; creating a tree on the store truncates it.
    pub fn create(path: &Path, page_size: usize) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self::new(file, page_size))
    }

    /// Open an existing file at `path`.
    pub fn open(path: &Path, page_size: usize) -> Result<Self, StoreError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self::new(file, page_size))
    }
}

impl PageStore for MmapStore {
    type Region = MappedPage;

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn file_len(&self) -> Result<u64, StoreError> {
        Ok(self.file.metadata()?.len())
    }

    fn truncate(&mut self) -> Result<(), StoreError> {
        self.file.set_len(0)?;
        Ok(())
    }

    fn grow(&mut self) -> Result<u64, StoreError> {
        let offset = self.file_len()?;
        self.file.set_len(offset + self.page_size as u64)?;
        Ok(offset)
    }

    fn map(&mut self, offset: u64) -> Result<MappedPage, StoreError> {
        let file_len = self.file_len()?;
        self.check_offset(offset, file_len)?;

        // SAFETY: MmapOptions::map_mut is unsafe because the file may be
        // modified or truncated by someone else while mapped. This is safe
        // because:
        // 1. The store owns the file handle and is the only writer
        // 2. The range [offset, offset + page_size) was checked to lie inside
        //    the file above
        // 3. The only truncation (`truncate`) happens while creating a tree,
        //    before any page of it is mapped
        let map = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(self.page_size)
                .map_mut(&self.file)?
        };

        Ok(MappedPage { offset, map })
    }
}

/// One page of an [`MmapStore`], mapped read-write.
#[derive(Debug)]
pub struct MappedPage {
    offset: u64,
    map: MmapMut,
}

impl MappedPage {
    /// Offset of this page in the file.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PageRegion for MappedPage {
    fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }

    fn sync(&self) -> Result<(), StoreError> {
        self.map.flush().map_err(StoreError::Io)
    }
}
