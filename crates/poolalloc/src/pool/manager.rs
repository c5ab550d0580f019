//! Pool lifecycle: carving pools out of arenas, handing out and taking
//! back blocks, and moving pools between the per-class rings and their
//! arena's free-pool list.
//!
//! Pool states:
//!   Used   - some blocks handed out, some free; linked in its class ring.
//!   Full   - no free block left; in no list.
//!   Empty  - nothing handed out; on its arena's free-pool list.
//!
//! Rings are non-cyclic doubly linked lists headed in `rings`, newest
//! first. All header accesses go through raw pointers into live pools.

use super::arena::{ArenaIndex, ArenaTable};
use super::header::{next_free, set_next_free, PoolHeader, PoolId, POOL_OVERHEAD};
use super::size_class::{class_size, NUM_SIZE_CLASSES};
use super::usable::UsableArenas;
use super::{ownership, Geometry};
use crate::allocator::passthrough::RawAllocator;
use crate::error::AllocError;
use crate::region::RegionProvider;
use core::ptr::{self, NonNull};

pub(crate) struct PoolManager {
    pub geometry: Geometry,
    pub arenas: ArenaTable,
    pub usable: UsableArenas,
    pub rings: [Option<PoolId>; NUM_SIZE_CLASSES],
    log_events: bool,
}

impl PoolManager {
    pub(crate) const fn new(geometry: Geometry, log_events: bool) -> Self {
        PoolManager {
            geometry,
            arenas: ArenaTable::new(log_events),
            usable: UsableArenas::new(),
            rings: [None; NUM_SIZE_CLASSES],
            log_events,
        }
    }

    #[inline(always)]
    pub(crate) fn pool_addr(&self, pid: PoolId) -> usize {
        self.arenas[pid.arena].first_pool + ((pid.slot as usize) << self.geometry.pool_shift)
    }

    #[inline(always)]
    pub(crate) fn header(&self, pid: PoolId) -> *mut PoolHeader {
        self.pool_addr(pid) as *mut PoolHeader
    }

    /// # Safety
    /// `addr` must be null or point into mapped memory.
    #[inline(always)]
    pub(crate) unsafe fn owning_pool(&self, addr: usize) -> Option<PoolId> {
        ownership::owning_pool(&self.arenas, &self.geometry, addr)
    }

    /// Hand out one block of `class`.
    ///
    /// # Safety
    /// Manager state must be consistent (single-threaded access).
    #[inline]
    pub(crate) unsafe fn allocate<R: RegionProvider, F: RawAllocator>(
        &mut self,
        class: usize,
        regions: &mut R,
        raw: &F,
    ) -> Result<NonNull<u8>, AllocError> {
        match self.rings[class] {
            Some(pid) => Ok(self.pop_block(pid, class)),
            None => self.allocate_from_new_pool(class, regions, raw),
        }
    }

    /// Take a block back. Returns the pool to its arena once nothing in it
    /// is handed out, which may release the arena.
    ///
    /// # Safety
    /// `block` must be a block of `pid` currently handed out.
    pub(crate) unsafe fn free<R: RegionProvider>(&mut self, pid: PoolId, block: *mut u8, regions: &mut R) {
        let h = self.header(pid);
        let class = (*h).size_class as usize;
        debug_assert!(class < NUM_SIZE_CLASSES);
        debug_assert!((*h).ref_count > 0);

        let last = (*h).free_block;
        set_next_free(block, last);
        (*h).free_block = block;
        (*h).ref_count -= 1;

        if last.is_null() {
            // Was full: back into circulation.
            self.ring_push_front(pid, class);
            return;
        }
        if (*h).ref_count == 0 {
            self.release_pool(pid, class, regions);
        }
    }

    #[inline(always)]
    unsafe fn pop_block(&mut self, pid: PoolId, class: usize) -> NonNull<u8> {
        let h = self.header(pid);
        let bp = (*h).free_block;
        debug_assert!(!bp.is_null());
        (*h).ref_count += 1;
        (*h).free_block = next_free(bp);
        if (*h).free_block.is_null() {
            self.extend_pool(pid, class);
        }
        NonNull::new_unchecked(bp)
    }

    /// Free list ran dry: bump-carve one more block, or retire the pool
    /// from its ring when it has no room left.
    #[cold]
    unsafe fn extend_pool(&mut self, pid: PoolId, class: usize) {
        let h = self.header(pid);
        if (*h).next_offset <= (*h).max_next_offset {
            let block = (self.pool_addr(pid) + (*h).next_offset as usize) as *mut u8;
            (*h).next_offset += class_size(class) as u32;
            set_next_free(block, ptr::null_mut());
            (*h).free_block = block;
        } else {
            self.ring_unlink(pid, class);
        }
    }

    #[cold]
    unsafe fn allocate_from_new_pool<R: RegionProvider, F: RawAllocator>(
        &mut self,
        class: usize,
        regions: &mut R,
        raw: &F,
    ) -> Result<NonNull<u8>, AllocError> {
        if self.usable.is_empty() {
            let idx = self.arenas.acquire(&self.geometry, regions, raw)?;
            self.usable.install(idx, &mut self.arenas);
        }
        let ai = self
            .usable
            .take_from_head(&mut self.arenas)
            .ok_or(AllocError::OutOfMemory)?;
        let pid = self.take_pool(ai);

        let h = self.header(pid);
        (*h).ref_count = 1;
        self.ring_push_front(pid, class);

        if (*h).size_class == class as u32 {
            // Same class as last time: its free list is still intact.
            let bp = (*h).free_block;
            debug_assert!(!bp.is_null());
            (*h).free_block = next_free(bp);
            if (*h).free_block.is_null() {
                self.extend_pool(pid, class);
            }
            return Ok(NonNull::new_unchecked(bp));
        }

        let size = class_size(class);
        let pool = self.pool_addr(pid);
        (*h).size_class = class as u32;
        (*h).next_offset = (POOL_OVERHEAD + 2 * size) as u32;
        (*h).max_next_offset = (self.geometry.pool_size - size) as u32;
        let bp = (pool + POOL_OVERHEAD) as *mut u8;
        let second = bp.add(size);
        set_next_free(second, ptr::null_mut());
        (*h).free_block = second;
        event!(
            self.log_events,
            trace,
            "pool {}:{} serves {}-byte blocks",
            pid.arena,
            pid.slot,
            size
        );
        Ok(NonNull::new_unchecked(bp))
    }

    /// Pop a pool off the arena's free list, or carve the next one.
    unsafe fn take_pool(&mut self, ai: ArenaIndex) -> PoolId {
        if let Some(slot) = self.arenas[ai].freepools {
            let pid = PoolId { arena: ai, slot };
            self.arenas[ai].freepools = (*self.header(pid)).next.map(|p| p.slot);
            return pid;
        }
        let a = &mut self.arenas[ai];
        debug_assert!(a.carved < a.ntotalpools);
        let pid = PoolId {
            arena: ai,
            slot: a.carved,
        };
        a.carved += 1;
        ptr::write(self.header(pid), PoolHeader::fresh(ai));
        pid
    }

    /// Empty pool goes back on its arena's free list.
    unsafe fn release_pool<R: RegionProvider>(&mut self, pid: PoolId, class: usize, regions: &mut R) {
        self.ring_unlink(pid, class);
        let ai = pid.arena;
        (*self.header(pid)).next = self.arenas[ai].freepools.map(|slot| PoolId { arena: ai, slot });
        self.arenas[ai].freepools = Some(pid.slot);
        if self.usable.pool_returned(ai, &mut self.arenas) {
            self.arenas.release(ai, &self.geometry, regions);
        }
    }

    unsafe fn ring_push_front(&mut self, pid: PoolId, class: usize) {
        let h = self.header(pid);
        let old = self.rings[class];
        (*h).prev = None;
        (*h).next = old;
        if let Some(o) = old {
            (*self.header(o)).prev = Some(pid);
        }
        self.rings[class] = Some(pid);
    }

    unsafe fn ring_unlink(&mut self, pid: PoolId, class: usize) {
        let h = self.header(pid);
        let (prev, next) = ((*h).prev, (*h).next);
        match prev {
            Some(p) => (*self.header(p)).next = next,
            None => {
                debug_assert_eq!(self.rings[class], Some(pid));
                self.rings[class] = next;
            }
        }
        if let Some(n) = next {
            (*self.header(n)).prev = prev;
        }
        (*h).next = None;
        (*h).prev = None;
    }

    /// Release every arena and the descriptor table.
    pub(crate) fn dispose<R: RegionProvider, F: RawAllocator>(&mut self, regions: &mut R, raw: &F) {
        self.arenas.dispose(&self.geometry, regions, raw);
        self.usable = UsableArenas::new();
        self.rings = [None; NUM_SIZE_CLASSES];
    }

    /// Blocks currently handed out from pools.
    pub(crate) fn blocks_in_use(&self) -> usize {
        let mut n = 0;
        for (ai, a) in self.arenas.live() {
            for slot in 0..a.carved {
                let h = self.header(PoolId { arena: ai, slot });
                n += unsafe { (*h).ref_count } as usize;
            }
        }
        n
    }
}
