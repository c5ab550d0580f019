//! Address ownership: is this pointer one of our blocks?
//!
//! The test reads the arena index stored in the header of the pool the
//! address would belong to, then confirms the address really lies inside
//! that arena. For foreign addresses the "header" is arbitrary memory, so
//! the index is only trusted after the range check.
//!
//! Reading that word is only safe because the pool-aligned address lies in
//! the same page as `addr` (pool size never exceeds the page size), and
//! `addr` itself is a live allocation from somewhere.

use super::arena::ArenaTable;
use super::header::PoolId;
use super::Geometry;
use crate::util::align_down;
use core::sync::atomic::{AtomicU32, Ordering};

/// The pool containing `addr`, if `addr` points into a carved pool of a
/// live arena.
///
/// # Safety
/// `addr` must be null or point into mapped memory.
#[inline]
pub(crate) unsafe fn owning_pool(table: &ArenaTable, geometry: &Geometry, addr: usize) -> Option<PoolId> {
    if addr == 0 {
        return None;
    }
    let pool = align_down(addr, geometry.pool_size);
    // Racy by nature: another thread may be initializing this header.
    let idx = AtomicU32::from_ptr(pool as *mut u32).load(Ordering::Relaxed);
    let a = table.get(idx)?;
    if !a.is_live() || addr.wrapping_sub(a.base) >= geometry.arena_size {
        return None;
    }
    if pool < a.first_pool {
        return None;
    }
    let slot = ((pool - a.first_pool) >> geometry.pool_shift) as u32;
    if slot >= a.carved {
        return None;
    }
    Some(PoolId { arena: idx, slot })
}
