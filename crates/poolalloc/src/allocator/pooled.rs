use super::passthrough::{LibcAllocator, RawAllocator};
use crate::config::Config;
use crate::error::ConfigError;
use crate::integrity::IntegrityResult;
use crate::pool::manager::PoolManager;
use crate::pool::{class_size, Geometry};
use crate::region::{DefaultRegions, RegionProvider};
use crate::stats::Stats;
use crate::util::ALIGNMENT;
use core::ptr;

/// Small-object allocator with a malloc-style front door.
///
/// Requests of 1..=512 bytes are served from pools carved out of arenas
/// that `R` supplies; everything else, and every pointer the pools do not
/// own, goes to `F`. Single-threaded: wrap it in a lock to share it (see
/// [`SharedPoolAllocator`](crate::SharedPoolAllocator)).
pub struct PoolAllocator<R: RegionProvider = DefaultRegions, F: RawAllocator = LibcAllocator> {
    pub(crate) pools: PoolManager,
    pub(crate) regions: R,
    pub(crate) raw: F,
    /// Live blocks obtained from `raw` through the front door.
    raw_allocated_blocks: usize,
    pub(crate) config: Config,
}

impl PoolAllocator<DefaultRegions, LibcAllocator> {
    /// Allocator on the default region provider and the C library.
    /// Acquires nothing until the first small request.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::with_parts(config, DefaultRegions::default(), LibcAllocator)
    }
}

impl<R: RegionProvider, F: RawAllocator> PoolAllocator<R, F> {
    pub fn with_parts(config: Config, regions: R, raw: F) -> Result<Self, ConfigError> {
        config.validate()?;
        let geometry = Geometry::new(config.pool_size, config.arena_size);
        event!(
            config.log_events,
            debug,
            "poolalloc: {} pools of {} bytes per arena",
            geometry.max_pools,
            geometry.pool_size
        );
        Ok(PoolAllocator {
            pools: PoolManager::new(geometry, config.log_events),
            regions,
            raw,
            raw_allocated_blocks: 0,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn malloc(&mut self, size: usize) -> *mut u8 {
        match self.allocate_block(size) {
            Ok(p) => p.as_ptr(),
            Err(_) => self.raw_malloc(size),
        }
    }

    /// Zeroed allocation of `nmemb * size` bytes; null if that overflows.
    pub fn calloc(&mut self, nmemb: usize, size: usize) -> *mut u8 {
        let Some(total) = nmemb.checked_mul(size) else {
            return ptr::null_mut();
        };
        match self.allocate_block(total) {
            Ok(p) => {
                unsafe { ptr::write_bytes(p.as_ptr(), 0, total) };
                p.as_ptr()
            }
            Err(_) => {
                let p = self.raw.calloc(nmemb, size);
                self.note_raw(p);
                p
            }
        }
    }

    /// # Safety
    /// `ptr` must be null or a live pointer from this allocator.
    pub unsafe fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        if ptr.is_null() {
            return self.malloc(size);
        }
        match self.reallocate_block(ptr, size) {
            Ok(Some(p)) => p.as_ptr(),
            Ok(None) => ptr::null_mut(),
            // Raw block stays raw, whatever its new size.
            Err(_) => self.raw.realloc(ptr, size),
        }
    }

    /// # Safety
    /// `ptr` must be null or a live pointer from this allocator.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        if self.free_block(ptr).is_err() {
            self.raw.free(ptr);
            self.raw_allocated_blocks = self.raw_allocated_blocks.saturating_sub(1);
        }
    }

    /// Allocation aligned to `alignment`. Pool blocks already satisfy
    /// `ALIGNMENT`; stricter requests go to the raw allocator.
    pub fn memalign(&mut self, alignment: usize, size: usize) -> *mut u8 {
        if !alignment.is_power_of_two() {
            return ptr::null_mut();
        }
        if alignment <= ALIGNMENT {
            return self.malloc(size);
        }
        let p = self.raw.memalign(alignment, size);
        self.note_raw(p);
        p
    }

    /// Whether `ptr` is a block of one of our pools.
    ///
    /// The test reads the would-be pool header at the start of the page
    /// holding `ptr`, so that page must be readable even when `ptr` is
    /// foreign.
    ///
    /// # Safety
    /// `ptr` must be null or point into mapped memory.
    pub unsafe fn owns(&self, ptr: *const u8) -> bool {
        self.pools.owning_pool(ptr as usize).is_some()
    }

    /// Block size behind an owned pointer; `None` for foreign pointers.
    ///
    /// # Safety
    /// Same as [`owns`](Self::owns).
    pub unsafe fn usable_size(&self, ptr: *const u8) -> Option<usize> {
        let pid = self.pools.owning_pool(ptr as usize)?;
        Some(class_size((*self.pools.header(pid)).size_class as usize))
    }

    /// Blocks handed out and not yet freed, pooled and raw together.
    pub fn allocated_blocks(&self) -> usize {
        self.raw_allocated_blocks + self.pools.blocks_in_use()
    }

    pub fn raw_allocated_blocks(&self) -> usize {
        self.raw_allocated_blocks
    }

    pub fn stats(&self) -> Stats {
        self.pools.stats(self.raw_allocated_blocks)
    }

    pub fn check_integrity(&self) -> IntegrityResult {
        self.pools.check_integrity()
    }

    fn raw_malloc(&mut self, size: usize) -> *mut u8 {
        event!(self.config.log_events, trace, "poolalloc: {} bytes go to the raw allocator", size);
        let p = self.raw.malloc(size);
        self.note_raw(p);
        p
    }

    #[inline]
    fn note_raw(&mut self, p: *mut u8) {
        if p.is_null() {
            event!(self.config.log_events, warn, "poolalloc: raw allocator returned null");
        } else {
            self.raw_allocated_blocks += 1;
        }
    }
}

impl<R: RegionProvider, F: RawAllocator> Drop for PoolAllocator<R, F> {
    fn drop(&mut self) {
        self.pools.dispose(&mut self.regions, &self.raw);
    }
}
