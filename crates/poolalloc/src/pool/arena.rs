//! Arena descriptors and the growable table that holds them.
//!
//! Descriptors are addressed by index only. Growing the table moves the
//! backing store, which is harmless because nothing keeps a pointer into
//! it: pools and lists all refer to arenas by `ArenaIndex`.

use super::Geometry;
use crate::allocator::passthrough::RawAllocator;
use crate::error::AllocError;
use crate::region::RegionProvider;
use crate::util::{align_up, is_aligned, INITIAL_ARENA_OBJECTS};
use core::ops::{Index, IndexMut};
use core::ptr::{self, NonNull};

pub type ArenaIndex = u32;

/// Metadata for one coarse region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub(crate) struct ArenaDescriptor {
    /// Region start as returned by the provider; 0 = unassociated slot.
    pub base: usize,
    /// First pool-aligned address inside the region.
    pub first_pool: usize,
    pub nfreepools: u32,
    pub ntotalpools: u32,
    /// Pools carved so far; slot `carved` is the next never-used pool.
    pub carved: u32,
    /// Head of the singly-linked list of free pools (by slot).
    pub freepools: Option<u32>,
    /// Usable-list links while live; `next` chains the unused list otherwise.
    pub next: Option<ArenaIndex>,
    pub prev: Option<ArenaIndex>,
}

impl ArenaDescriptor {
    const UNASSOCIATED: ArenaDescriptor = ArenaDescriptor {
        base: 0,
        first_pool: 0,
        nfreepools: 0,
        ntotalpools: 0,
        carved: 0,
        freepools: None,
        next: None,
        prev: None,
    };

    #[inline(always)]
    pub(crate) fn is_live(&self) -> bool {
        self.base != 0
    }
}

/// Running arena totals. Diagnostic only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArenaCounters {
    pub current: usize,
    pub highwater: usize,
    pub total_allocated: usize,
}

pub(crate) struct ArenaTable {
    /// Backing store from the raw allocator; dangling while `capacity == 0`.
    slots: NonNull<ArenaDescriptor>,
    capacity: usize,
    unused: Option<ArenaIndex>,
    pub counters: ArenaCounters,
    log_events: bool,
}

// The table exclusively owns its backing store.
unsafe impl Send for ArenaTable {}

impl ArenaTable {
    pub(crate) const fn new(log_events: bool) -> Self {
        ArenaTable {
            slots: NonNull::dangling(),
            capacity: 0,
            unused: None,
            counters: ArenaCounters {
                current: 0,
                highwater: 0,
                total_allocated: 0,
            },
            log_events,
        }
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub(crate) fn as_slice(&self) -> &[ArenaDescriptor] {
        unsafe { core::slice::from_raw_parts(self.slots.as_ptr(), self.capacity) }
    }

    #[inline(always)]
    fn as_mut_slice(&mut self) -> &mut [ArenaDescriptor] {
        unsafe { core::slice::from_raw_parts_mut(self.slots.as_ptr(), self.capacity) }
    }

    /// Bounds-checked lookup for untrusted indices.
    #[inline(always)]
    pub(crate) fn get(&self, idx: ArenaIndex) -> Option<&ArenaDescriptor> {
        self.as_slice().get(idx as usize)
    }

    pub(crate) fn unused_head(&self) -> Option<ArenaIndex> {
        self.unused
    }

    /// Live arenas with their indices.
    pub(crate) fn live(&self) -> impl Iterator<Item = (ArenaIndex, &ArenaDescriptor)> {
        self.as_slice()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_live())
            .map(|(i, a)| (i as ArenaIndex, a))
    }

    /// Double the table and chain the new slots onto the unused list.
    #[cold]
    fn grow<F: RawAllocator>(&mut self, raw: &F) -> Result<(), AllocError> {
        debug_assert!(self.unused.is_none());
        let old = self.capacity;
        let new = if old == 0 {
            INITIAL_ARENA_OBJECTS
        } else {
            old.checked_mul(2).ok_or(AllocError::CapacityOverflow)?
        };
        if new > ArenaIndex::MAX as usize {
            return Err(AllocError::CapacityOverflow);
        }
        let bytes = new
            .checked_mul(core::mem::size_of::<ArenaDescriptor>())
            .ok_or(AllocError::CapacityOverflow)?;

        let old_ptr = if old == 0 {
            ptr::null_mut()
        } else {
            self.slots.as_ptr() as *mut u8
        };
        let grown = unsafe { raw.realloc(old_ptr, bytes) } as *mut ArenaDescriptor;
        let Some(grown) = NonNull::new(grown) else {
            event!(self.log_events, warn, "arena table: growth to {} slots failed", new);
            return Err(AllocError::OutOfMemory);
        };
        self.slots = grown;
        self.capacity = new;

        let slots = self.as_mut_slice();
        for i in old..new {
            slots[i] = ArenaDescriptor::UNASSOCIATED;
            slots[i].next = if i + 1 < new {
                Some((i + 1) as ArenaIndex)
            } else {
                None
            };
        }
        self.unused = Some(old as ArenaIndex);
        event!(self.log_events, debug, "arena table: grew {} -> {} slots", old, new);
        Ok(())
    }

    /// Associate a descriptor with a fresh region from `regions`.
    pub(crate) fn acquire<R: RegionProvider, F: RawAllocator>(
        &mut self,
        geometry: &Geometry,
        regions: &mut R,
        raw: &F,
    ) -> Result<ArenaIndex, AllocError> {
        if self.unused.is_none() {
            self.grow(raw)?;
        }
        let idx = self.unused.ok_or(AllocError::OutOfMemory)?;
        debug_assert!(!self[idx].is_live());
        self.unused = self[idx].next;

        let Some(base) = regions.acquire(geometry.arena_size) else {
            self[idx].next = self.unused;
            self.unused = Some(idx);
            event!(
                self.log_events,
                warn,
                "arena {}: region provider refused {} bytes",
                idx,
                geometry.arena_size
            );
            return Err(AllocError::OutOfMemory);
        };
        let base = base.as_ptr() as usize;

        let mut npools = geometry.max_pools;
        let first_pool = if is_aligned(base, geometry.pool_size) {
            base
        } else {
            // The partial pool in front of the first boundary is slack.
            npools -= 1;
            align_up(base, geometry.pool_size)
        };
        self[idx] = ArenaDescriptor {
            base,
            first_pool,
            nfreepools: npools,
            ntotalpools: npools,
            carved: 0,
            freepools: None,
            next: None,
            prev: None,
        };

        let c = &mut self.counters;
        c.current += 1;
        c.total_allocated += 1;
        c.highwater = c.highwater.max(c.current);
        event!(
            self.log_events,
            debug,
            "arena {}: acquired {:#x} with {} pools ({} live)",
            idx,
            base,
            npools,
            c.current
        );
        Ok(idx)
    }

    /// Hand the region back and put the slot on the unused list.
    /// The arena must already be off the usable list.
    pub(crate) fn release<R: RegionProvider>(
        &mut self,
        idx: ArenaIndex,
        geometry: &Geometry,
        regions: &mut R,
    ) {
        let a = self[idx];
        debug_assert!(a.is_live());
        debug_assert_eq!(a.nfreepools, a.ntotalpools);
        if let Some(base) = NonNull::new(a.base as *mut u8) {
            unsafe { regions.release(base, geometry.arena_size) };
        }
        self[idx] = ArenaDescriptor {
            next: self.unused,
            ..ArenaDescriptor::UNASSOCIATED
        };
        self.unused = Some(idx);
        self.counters.current -= 1;
        event!(
            self.log_events,
            debug,
            "arena {}: released ({} live)",
            idx,
            self.counters.current
        );
    }

    /// Release every live region and the table itself.
    pub(crate) fn dispose<R: RegionProvider, F: RawAllocator>(
        &mut self,
        geometry: &Geometry,
        regions: &mut R,
        raw: &F,
    ) {
        for a in self.as_slice() {
            if let Some(base) = NonNull::new(a.base as *mut u8) {
                unsafe { regions.release(base, geometry.arena_size) };
            }
        }
        if self.capacity != 0 {
            unsafe { raw.free(self.slots.as_ptr() as *mut u8) };
        }
        self.slots = NonNull::dangling();
        self.capacity = 0;
        self.unused = None;
        self.counters.current = 0;
    }
}

impl Index<ArenaIndex> for ArenaTable {
    type Output = ArenaDescriptor;

    #[inline(always)]
    fn index(&self, idx: ArenaIndex) -> &ArenaDescriptor {
        &self.as_slice()[idx as usize]
    }
}

impl IndexMut<ArenaIndex> for ArenaTable {
    #[inline(always)]
    fn index_mut(&mut self, idx: ArenaIndex) -> &mut ArenaDescriptor {
        &mut self.as_mut_slice()[idx as usize]
    }
}
