//! In-memory page store with fault injection.
//!
//! Mapped pages are private copies of the file bytes; a page only reaches
//! the shared "file" when it is synced. That mirrors what survives a crash
//! with a real mapping and lets tests inject failures at every I/O
//! boundary:
//! - growing the file
//! - mapping a page
//! - syncing a page
//!
//! All randomness comes from a seeded RNG, so a given seed always produces
//! the same sequence of faults.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::io::{PageStore, StoreError};
use crate::storage::page::PageRegion;

/// Configuration for fault injection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaultConfig {
    /// Probability of a failed file growth (0.0 - 1.0).
    pub grow_error_rate: f64,
    /// Probability of a failed page mapping (0.0 - 1.0).
    pub map_error_rate: f64,
    /// Probability of a failed page sync (0.0 - 1.0).
    pub sync_error_rate: f64,
    /// Every map of this offset fails.
    pub map_error_offset: Option<u64>,
}

impl FaultConfig {
    /// Create a fault config with no faults.
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Every growth fails.
    #[must_use]
    pub const fn full_disk() -> Self {
        Self {
            grow_error_rate: 1.0,
            map_error_rate: 0.0,
            sync_error_rate: 0.0,
            map_error_offset: None,
        }
    }
}

/// Statistics about store operations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub grows: u64,
    pub maps: u64,
    pub syncs: u64,
    pub injected_grow_errors: u64,
    pub injected_map_errors: u64,
    pub injected_sync_errors: u64,
}

#[derive(Debug)]
struct Shared {
    bytes: Vec<u8>,
    faults: FaultConfig,
    rng: StdRng,
    stats: MemoryStoreStats,
    sync_log: Vec<u64>,
}

impl Shared {
    /// Check if a fault should be injected based on the given rate.
    fn should_inject_fault(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        self.rng.random::<f64>() < rate
    }
}

/// A page file held in memory.
///
/// Cloning the store yields another handle on the same file, the way
/// reopening a path would.
///
/// # Thread Safety
///
/// Not thread-safe; the index is single-threaded.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    page_size: usize,
    shared: Rc<RefCell<Shared>>,
}

impl MemoryStore {
    /// Create an empty store without faults.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self::with_faults(page_size, 0, FaultConfig::default())
    }

    /// Create an empty store with the given seed and fault configuration.
    #[must_use]
    pub fn with_faults(page_size: usize, seed: u64, faults: FaultConfig) -> Self {
        Self::from_bytes(page_size, Vec::new(), seed, faults)
    }

    /// Create a store whose file already holds `bytes`.
    #[must_use]
    pub fn from_bytes(page_size: usize, bytes: Vec<u8>, seed: u64, faults: FaultConfig) -> Self {
        Self {
            page_size,
            shared: Rc::new(RefCell::new(Shared {
                bytes,
                faults,
                rng: StdRng::seed_from_u64(seed),
                stats: MemoryStoreStats::default(),
                sync_log: Vec::new(),
            })),
        }
    }

    /// Update the fault configuration.
    pub fn set_faults(&self, faults: FaultConfig) {
        self.shared.borrow_mut().faults = faults;
    }

    /// Durable contents of the file.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.shared.borrow().bytes.clone()
    }

    /// Get the current statistics.
    #[must_use]
    pub fn stats(&self) -> MemoryStoreStats {
        self.shared.borrow().stats
    }

    /// Offsets of every attempted sync, oldest first.
    #[must_use]
    pub fn sync_log(&self) -> Vec<u64> {
        self.shared.borrow().sync_log.clone()
    }
}

impl PageStore for MemoryStore {
    type Region = MemoryPage;

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn file_len(&self) -> Result<u64, StoreError> {
        Ok(self.shared.borrow().bytes.len() as u64)
    }

    fn truncate(&mut self) -> Result<(), StoreError> {
        self.shared.borrow_mut().bytes.clear();
        Ok(())
    }

    fn grow(&mut self) -> Result<u64, StoreError> {
        let mut shared = self.shared.borrow_mut();
        shared.stats.grows += 1;

        let rate = shared.faults.grow_error_rate;
        if shared.should_inject_fault(rate) {
            shared.stats.injected_grow_errors += 1;
            return Err(StoreError::InjectedFault("simulated full disk".to_string()));
        }

        let offset = shared.bytes.len();
        shared.bytes.resize(offset + self.page_size, 0);
        Ok(offset as u64)
    }

    fn map(&mut self, offset: u64) -> Result<MemoryPage, StoreError> {
        let file_len = self.file_len()?;
        self.check_offset(offset, file_len)?;

        let mut shared = self.shared.borrow_mut();
        shared.stats.maps += 1;

        let rate = shared.faults.map_error_rate;
        if shared.faults.map_error_offset == Some(offset) || shared.should_inject_fault(rate) {
            shared.stats.injected_map_errors += 1;
            return Err(StoreError::InjectedFault("simulated map error".to_string()));
        }

        #[allow(clippy::cast_possible_truncation)]
        let start = offset as usize;
        let data = shared.bytes[start..start + self.page_size].to_vec();

        Ok(MemoryPage {
            offset,
            data,
            shared: Rc::clone(&self.shared),
        })
    }
}

/// A private copy of one page of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryPage {
    offset: u64,
    data: Vec<u8>,
    shared: Rc<RefCell<Shared>>,
}

impl PageRegion for MemoryPage {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn sync(&self) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        shared.stats.syncs += 1;
        shared.sync_log.push(self.offset);

        let rate = shared.faults.sync_error_rate;
        if shared.should_inject_fault(rate) {
            shared.stats.injected_sync_errors += 1;
            return Err(StoreError::InjectedFault("simulated sync error".to_string()));
        }

        #[allow(clippy::cast_possible_truncation)]
        let start = self.offset as usize;
        let end = start + self.data.len();
        if end > shared.bytes.len() {
            return Err(StoreError::OutOfBounds {
                offset: self.offset,
                file_len: shared.bytes.len() as u64,
            });
        }
        shared.bytes[start..end].copy_from_slice(&self.data);
        Ok(())
    }
}
