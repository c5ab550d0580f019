//! Pool headers live at the start of every carved pool.
//!
//! Layout within a pool:
//!   [PoolHeader, padded to POOL_OVERHEAD][block 0][block 1]...[slack]
//!
//! Free blocks form an intrusive singly-linked list: the first word of a
//! free block holds the address of the next free block (null = end).

use super::arena::ArenaIndex;
use crate::util::{align_up, ALIGNMENT};
use core::sync::atomic::{AtomicU32, Ordering};

/// Handle to a pool: owning arena plus the pool's slot inside that arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolId {
    pub arena: ArenaIndex,
    pub slot: u32,
}

/// Size class of a pool that has never held blocks.
pub(crate) const UNASSIGNED_CLASS: u32 = u32::MAX;

#[repr(C)]
pub(crate) struct PoolHeader {
    /// First field on purpose: the ownership test loads it from a bare
    /// pool-aligned address, racing with writers.
    pub arena_index: AtomicU32,
    pub size_class: u32,
    /// Blocks currently handed out.
    pub ref_count: u32,
    /// Offset of the next never-used block; bump carving stops once it
    /// passes `max_next_offset`.
    pub next_offset: u32,
    pub max_next_offset: u32,
    pub free_block: *mut u8,
    /// Ring links while Used; `next` doubles as the arena free-pool link.
    pub next: Option<PoolId>,
    pub prev: Option<PoolId>,
}

/// Bytes reserved at the front of each pool for its header.
pub const POOL_OVERHEAD: usize = align_up(core::mem::size_of::<PoolHeader>(), ALIGNMENT);

impl PoolHeader {
    pub(crate) const fn fresh(arena: ArenaIndex) -> Self {
        PoolHeader {
            arena_index: AtomicU32::new(arena),
            size_class: UNASSIGNED_CLASS,
            ref_count: 0,
            next_offset: 0,
            max_next_offset: 0,
            free_block: core::ptr::null_mut(),
            next: None,
            prev: None,
        }
    }

    #[inline(always)]
    pub(crate) fn arena(&self) -> ArenaIndex {
        self.arena_index.load(Ordering::Relaxed)
    }
}

/// Read the free-list link stored in a free block.
///
/// # Safety
/// `block` must be a free block inside a live pool.
#[inline(always)]
pub(crate) unsafe fn next_free(block: *mut u8) -> *mut u8 {
    (block as *mut *mut u8).read()
}

/// Store the free-list link in a free block.
///
/// # Safety
/// `block` must be a block inside a live pool that nobody else is using.
#[inline(always)]
pub(crate) unsafe fn set_next_free(block: *mut u8, next: *mut u8) {
    (block as *mut *mut u8).write(next)
}

const _: () = assert!(POOL_OVERHEAD % ALIGNMENT == 0);
const _: () = assert!(core::mem::size_of::<*mut u8>() <= ALIGNMENT);
