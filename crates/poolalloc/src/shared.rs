//! A pool allocator many threads can use at once.

use crate::allocator::{LibcAllocator, PoolAllocator, RawAllocator};
use crate::config::Config;
use crate::error::ConfigError;
use crate::integrity::IntegrityResult;
use crate::region::{DefaultRegions, RegionProvider};
use crate::stats::Stats;
use parking_lot::Mutex;

/// [`PoolAllocator`] behind one `parking_lot` lock. Every call holds the
/// lock for its whole duration, so the context sees strictly serialized
/// operations.
pub struct SharedPoolAllocator<R: RegionProvider = DefaultRegions, F: RawAllocator = LibcAllocator> {
    inner: Mutex<PoolAllocator<R, F>>,
}

impl SharedPoolAllocator {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Ok(Self::from_allocator(PoolAllocator::new(config)?))
    }
}

impl<R: RegionProvider, F: RawAllocator> SharedPoolAllocator<R, F> {
    pub fn from_allocator(allocator: PoolAllocator<R, F>) -> Self {
        SharedPoolAllocator {
            inner: Mutex::new(allocator),
        }
    }

    pub fn malloc(&self, size: usize) -> *mut u8 {
        self.inner.lock().malloc(size)
    }

    pub fn calloc(&self, nmemb: usize, size: usize) -> *mut u8 {
        self.inner.lock().calloc(nmemb, size)
    }

    /// # Safety
    /// `ptr` must be null or a live pointer from this allocator.
    pub unsafe fn realloc(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        self.inner.lock().realloc(ptr, size)
    }

    /// # Safety
    /// `ptr` must be null or a live pointer from this allocator.
    pub unsafe fn free(&self, ptr: *mut u8) {
        self.inner.lock().free(ptr)
    }

    pub fn memalign(&self, alignment: usize, size: usize) -> *mut u8 {
        self.inner.lock().memalign(alignment, size)
    }

    /// # Safety
    /// `ptr` must be null or point into mapped memory.
    pub unsafe fn owns(&self, ptr: *const u8) -> bool {
        self.inner.lock().owns(ptr)
    }

    /// # Safety
    /// `ptr` must be null or point into mapped memory.
    pub unsafe fn usable_size(&self, ptr: *const u8) -> Option<usize> {
        self.inner.lock().usable_size(ptr)
    }

    pub fn allocated_blocks(&self) -> usize {
        self.inner.lock().allocated_blocks()
    }

    pub fn stats(&self) -> Stats {
        self.inner.lock().stats()
    }

    pub fn check_integrity(&self) -> IntegrityResult {
        self.inner.lock().check_integrity()
    }

    pub fn into_inner(self) -> PoolAllocator<R, F> {
        self.inner.into_inner()
    }
}
