//! Block-level operations on the pools. These report routing decisions as
//! errors; the malloc-style front door in `pooled` acts on them.

use super::passthrough::RawAllocator;
use super::pooled::PoolAllocator;
use crate::error::AllocError;
use crate::pool::{class_of, class_size};
use crate::region::RegionProvider;
use crate::stats::FdWriter;
use core::fmt::Write;
use core::ptr::{self, NonNull};

impl<R: RegionProvider, F: RawAllocator> PoolAllocator<R, F> {
    /// Allocate a block for a request of `size` bytes from the pools.
    ///
    /// `Unsupported` for zero and for requests above the small threshold;
    /// `OutOfMemory` when no arena could be obtained.
    pub fn allocate_block(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let class = class_of(size).ok_or(AllocError::Unsupported { size })?;
        if self.config.dump_stats && self.pools.rings[class].is_none() && self.pools.usable.is_empty() {
            self.dump_stats();
        }
        unsafe { self.pools.allocate(class, &mut self.regions, &self.raw) }
    }

    /// Report the statistics before a new arena is acquired: through `log`
    /// when events are on, else straight to stderr without allocating.
    #[cold]
    fn dump_stats(&self) {
        let stats = self.stats();
        if self.config.log_events {
            log::info!("poolalloc: acquiring an arena\n{stats}");
        } else {
            let _ = write!(FdWriter(2), "poolalloc: acquiring an arena\n{stats}");
        }
    }

    /// Return a block to its pool. `ForeignAddress` if we do not own it.
    ///
    /// # Safety
    /// `ptr` must be null, a live block from this allocator, or a pointer
    /// into mapped memory that the caller will route elsewhere.
    pub unsafe fn free_block(&mut self, ptr: *mut u8) -> Result<(), AllocError> {
        let pid = self
            .pools
            .owning_pool(ptr as usize)
            .ok_or(AllocError::ForeignAddress)?;
        self.pools.free(pid, ptr, &mut self.regions);
        Ok(())
    }

    /// Resize an owned block.
    ///
    /// Keeps the block when the new size still fits and would not waste
    /// more than a quarter of it. Otherwise moves the contents through the
    /// front door, which may land in the raw allocator. `Ok(None)` means
    /// the move failed and `ptr` is untouched.
    ///
    /// # Safety
    /// Same as [`free_block`](Self::free_block).
    pub unsafe fn reallocate_block(
        &mut self,
        ptr: *mut u8,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let pid = self
            .pools
            .owning_pool(ptr as usize)
            .ok_or(AllocError::ForeignAddress)?;
        let old = class_size((*self.pools.header(pid)).size_class as usize);

        if size <= old && 4 * size > 3 * old {
            return Ok(NonNull::new(ptr));
        }

        let Some(fresh) = NonNull::new(self.malloc(size)) else {
            return Ok(None);
        };
        ptr::copy_nonoverlapping(ptr, fresh.as_ptr(), size.min(old));
        self.pools.free(pid, ptr, &mut self.regions);
        Ok(Some(fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn allocator() -> PoolAllocator {
        crate::util::init_page_size();
        PoolAllocator::new(Config::default().with_log_events(false)).unwrap()
    }

    #[test]
    fn sizes_outside_the_range_are_unsupported() {
        let mut a = allocator();
        assert_eq!(a.allocate_block(0), Err(AllocError::Unsupported { size: 0 }));
        assert_eq!(a.allocate_block(513), Err(AllocError::Unsupported { size: 513 }));
        assert!(a.allocate_block(512).is_ok());
    }

    #[test]
    fn stats_dump_without_logging_still_allocates() {
        crate::util::init_page_size();
        let config = Config::default()
            .with_pool_size(4096)
            .with_arena_size(4 * 4096)
            .with_log_events(false)
            .with_dump_stats(true);
        let mut a = PoolAllocator::new(config).unwrap();
        // Seven 512-byte blocks per pool, four pools per arena.
        let blocks: Vec<_> = (0..40).map(|_| a.allocate_block(512).unwrap()).collect();
        assert!(a.stats().arenas.total_allocated >= 2);
        for b in blocks {
            unsafe { a.free_block(b.as_ptr()).unwrap() };
        }
        assert_eq!(a.allocated_blocks(), 0);
    }

    #[test]
    fn foreign_pointers_are_reported() {
        let mut a = allocator();
        let p = unsafe { libc::malloc(32) } as *mut u8;
        unsafe {
            assert_eq!(a.free_block(p), Err(AllocError::ForeignAddress));
            assert_eq!(a.reallocate_block(p, 8), Err(AllocError::ForeignAddress));
            libc::free(p as *mut libc::c_void);
        }
    }

    #[test]
    fn shrink_within_three_quarters_stays_put() {
        let mut a = allocator();
        let p = a.allocate_block(64).unwrap().as_ptr();
        unsafe {
            // 64-byte class: 49..=64 keep the block, 48 and below move.
            assert_eq!(a.reallocate_block(p, 49).unwrap().unwrap().as_ptr(), p);
            assert_eq!(a.reallocate_block(p, 64).unwrap().unwrap().as_ptr(), p);
            let moved = a.reallocate_block(p, 48).unwrap().unwrap().as_ptr();
            assert_ne!(moved, p);
            assert!(a.owns(moved));
            a.free(moved);
        }
    }

    #[test]
    fn grow_copies_the_old_contents() {
        let mut a = allocator();
        let p = a.allocate_block(16).unwrap().as_ptr();
        unsafe {
            ptr::copy_nonoverlapping(b"0123456789abcdef".as_ptr(), p, 16);
            let q = a.reallocate_block(p, 300).unwrap().unwrap().as_ptr();
            assert_eq!(core::slice::from_raw_parts(q, 16), b"0123456789abcdef");
            let r = a.reallocate_block(q, 2000).unwrap().unwrap().as_ptr();
            assert!(!a.owns(r));
            assert_eq!(core::slice::from_raw_parts(r, 16), b"0123456789abcdef");
            a.free(r);
        }
        assert_eq!(a.allocated_blocks(), 0);
    }
}
