//! `#[global_allocator]` support.
//!
//! ```rust,ignore
//! use poolalloc::PoolMalloc;
//!
//! #[global_allocator]
//! static GLOBAL: PoolMalloc = PoolMalloc;
//! ```
//!
//! One context serves the whole process behind a single lock. A thread
//! that re-enters the allocator while holding that lock gets its
//! allocations straight from the C library; freeing from there would
//! need the lock again and aborts instead. So does a panic raised while
//! the context is locked.

use crate::allocator::{LibcAllocator, PoolAllocator, RawAllocator};
use crate::init::{self, STATE_READY};
use crate::integrity::IntegrityResult;
use crate::stats::Stats;
use crate::util::ALIGNMENT;
use crate::abort_with_message;
use core::alloc::{GlobalAlloc, Layout};
use core::cell::Cell;
use core::ptr;

/// Zero-sized handle implementing [`GlobalAlloc`] over the process-wide
/// pool allocator. `POOLALLOC_DISABLE` turns it into a pass-through to
/// the C library.
pub struct PoolMalloc;

thread_local! {
    static IN_ALLOCATOR: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the allocator until dropped.
struct Reentry;

impl Reentry {
    #[inline]
    fn enter() -> Option<Reentry> {
        // TLS already torn down: no way to nest from here, carry on.
        let first = IN_ALLOCATOR.try_with(|flag| !flag.replace(true)).unwrap_or(true);
        if first {
            Some(Reentry)
        } else {
            None
        }
    }
}

impl Drop for Reentry {
    #[inline]
    fn drop(&mut self) {
        let _ = IN_ALLOCATOR.try_with(|flag| flag.set(false));
    }
}

/// Aborts when dropped. Only unwinding drops it; the normal path forgets it.
struct AbortOnUnwind;

impl Drop for AbortOnUnwind {
    fn drop(&mut self) {
        abort_with_message("poolalloc: panic inside the allocator\n");
    }
}

/// Run `f` on the global context under its lock; `None` when there is no
/// context. A tripped consistency check must not unwind out of
/// `GlobalAlloc`, so a panic in `f` aborts the process.
#[inline]
fn with_context<T>(f: impl FnOnce(&mut PoolAllocator) -> T) -> Option<T> {
    let bomb = AbortOnUnwind;
    let out = init::context().as_mut().map(f);
    core::mem::forget(bomb);
    out
}

#[inline]
fn raw_alloc(size: usize, align: usize) -> *mut u8 {
    if align <= ALIGNMENT {
        LibcAllocator.malloc(size)
    } else {
        LibcAllocator.memalign(align, size)
    }
}

impl PoolMalloc {
    /// Snapshot of the global context; `None` before first use or when
    /// disabled. Format it after the call returns: the lock is released.
    pub fn stats() -> Option<Stats> {
        let _reentry = Reentry::enter()?;
        with_context(|c| c.stats())
    }

    pub fn check_integrity() -> Option<IntegrityResult> {
        let _reentry = Reentry::enter()?;
        with_context(|c| c.check_integrity())
    }

    #[inline]
    unsafe fn release(ptr: *mut u8) {
        if init::state() != STATE_READY {
            LibcAllocator.free(ptr);
            return;
        }
        let Some(_reentry) = Reentry::enter() else {
            abort_with_message("poolalloc: free while inside the allocator\n");
        };
        if with_context(|c| c.free(ptr)).is_none() {
            LibcAllocator.free(ptr);
        }
    }
}

unsafe impl GlobalAlloc for PoolMalloc {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let (size, align) = (layout.size(), layout.align());
        if size == 0 {
            return align as *mut u8;
        }
        if init::ensure_initialized() != STATE_READY {
            return raw_alloc(size, align);
        }
        let Some(_reentry) = Reentry::enter() else {
            return raw_alloc(size, align);
        };
        with_context(|c| {
            if align <= ALIGNMENT {
                c.malloc(size)
            } else {
                c.memalign(align, size)
            }
        })
        .unwrap_or_else(|| raw_alloc(size, align))
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let (size, align) = (layout.size(), layout.align());
        if size == 0 {
            return align as *mut u8;
        }
        if align <= ALIGNMENT && init::ensure_initialized() == STATE_READY {
            if let Some(_reentry) = Reentry::enter() {
                if let Some(p) = with_context(|c| c.calloc(1, size)) {
                    return p;
                }
            }
        }
        let p = self.alloc(layout);
        if !p.is_null() {
            ptr::write_bytes(p, 0, size);
        }
        p
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        Self::release(ptr);
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let (old_size, align) = (layout.size(), layout.align());
        if old_size == 0 {
            return self.alloc(Layout::from_size_align_unchecked(new_size, align));
        }

        if align <= ALIGNMENT {
            if init::state() != STATE_READY {
                return LibcAllocator.realloc(ptr, new_size);
            }
            let Some(_reentry) = Reentry::enter() else {
                abort_with_message("poolalloc: realloc while inside the allocator\n");
            };
            return with_context(|c| c.realloc(ptr, new_size))
                .unwrap_or_else(|| LibcAllocator.realloc(ptr, new_size));
        }

        // Neither the pools nor C realloc keep over-alignment.
        let fresh = self.alloc(Layout::from_size_align_unchecked(new_size, align));
        if !fresh.is_null() {
            ptr::copy_nonoverlapping(ptr, fresh, old_size.min(new_size));
            Self::release(ptr);
        }
        fresh
    }
}
