//! malloc-style front door behaviour.

use poolalloc::{Config, PoolAllocator};
use std::collections::HashSet;
use std::ptr;

fn alloc() -> PoolAllocator {
    poolalloc::util::init_page_size();
    PoolAllocator::new(Config::default().with_log_events(false)).unwrap()
}

// ---------------------------------------------------------------------------
// malloc(0), free(NULL), realloc(NULL, n)
// ---------------------------------------------------------------------------

#[test]
fn malloc_zero_returns_unique_pointers() {
    let mut a = alloc();
    let ptrs: Vec<_> = (0..64).map(|_| a.malloc(0)).collect();
    assert!(ptrs.iter().all(|p| !p.is_null()));
    let unique: HashSet<usize> = ptrs.iter().map(|p| *p as usize).collect();
    assert_eq!(unique.len(), ptrs.len(), "malloc(0) must return unique pointers");
    assert!(ptrs.iter().all(|&p| unsafe { !a.owns(p) }));
    assert_eq!(a.raw_allocated_blocks(), 64);
    for p in ptrs {
        unsafe { a.free(p) };
    }
    assert_eq!(a.raw_allocated_blocks(), 0);
}

#[test]
fn free_null_is_noop() {
    let mut a = alloc();
    let before = a.stats();
    unsafe { a.free(ptr::null_mut()) };
    assert_eq!(a.stats(), before);
}

#[test]
fn realloc_null_acts_as_malloc() {
    let mut a = alloc();
    let p = unsafe { a.realloc(ptr::null_mut(), 40) };
    assert!(!p.is_null());
    unsafe {
        assert!(a.owns(p));
        assert_eq!(a.usable_size(p), Some(48));
        a.free(p);
    }
}

// ---------------------------------------------------------------------------
// Threshold routing
// ---------------------------------------------------------------------------

#[test]
fn every_small_size_is_pooled_and_aligned() {
    let mut a = alloc();
    let ptrs: Vec<_> = (1..=512).map(|n| (n, a.malloc(n))).collect();
    for &(n, p) in &ptrs {
        assert_eq!(p as usize % 16, 0);
        unsafe {
            assert!(a.owns(p), "{n} bytes should come from a pool");
            assert!(a.usable_size(p).unwrap() >= n);
            ptr::write_bytes(p, 0x5A, n);
        }
    }
    assert!(a.check_integrity().is_ok());
    for (_, p) in ptrs {
        unsafe { a.free(p) };
    }
    assert_eq!(a.allocated_blocks(), 0);
}

#[test]
fn above_threshold_leaves_pools_untouched() {
    let mut a = alloc();
    let before = a.stats();
    let p = a.malloc(513);
    assert!(!p.is_null());
    assert!(unsafe { !a.owns(p) });
    let during = a.stats();
    assert_eq!(during.arenas, before.arenas);
    assert_eq!(during.blocks_in_use(), 0);
    assert_eq!(during.raw_blocks, 1);
    unsafe { a.free(p) };
}

// ---------------------------------------------------------------------------
// realloc
// ---------------------------------------------------------------------------

#[test]
fn realloc_preserves_prefix_across_routes() {
    let mut a = alloc();
    unsafe {
        let p = a.malloc(24);
        for i in 0..24 {
            *p.add(i) = i as u8;
        }
        // pool -> pool (grow)
        let q = a.realloc(p, 200);
        assert!(a.owns(q));
        // pool -> raw
        let r = a.realloc(q, 5000);
        assert!(!a.owns(r));
        // raw stays raw even when small again
        let s = a.realloc(r, 8);
        assert!(!a.owns(s));
        for i in 0..8 {
            assert_eq!(*s.add(i), i as u8);
        }
        a.free(s);
    }
    assert_eq!(a.allocated_blocks(), 0);
}

#[test]
fn realloc_shrink_rule() {
    let mut a = alloc();
    unsafe {
        let p = a.malloc(512);
        // Keeping more than three quarters of the block keeps the pointer.
        assert_eq!(a.realloc(p, 400), p);
        assert_eq!(a.realloc(p, 385), p);
        // Exactly three quarters moves.
        let q = a.realloc(p, 384);
        assert_ne!(q, p);
        assert_eq!(a.usable_size(q), Some(384));
        a.free(q);
    }
}

#[test]
fn realloc_to_zero_of_pooled_block_moves_to_raw() {
    let mut a = alloc();
    unsafe {
        let p = a.malloc(32);
        let q = a.realloc(p, 0);
        assert!(!q.is_null());
        assert!(!a.owns(q));
        a.free(q);
    }
    assert_eq!(a.allocated_blocks(), 0);
}

// ---------------------------------------------------------------------------
// calloc / memalign
// ---------------------------------------------------------------------------

#[test]
fn calloc_overflow_returns_null() {
    let mut a = alloc();
    assert!(a.calloc(usize::MAX, 16).is_null());
    assert!(a.calloc(usize::MAX / 2 + 1, 2).is_null());
    assert_eq!(a.allocated_blocks(), 0);
}

#[test]
fn calloc_large_is_zeroed_raw() {
    let mut a = alloc();
    let p = a.calloc(100, 100);
    assert!(unsafe { !a.owns(p) });
    let bytes = unsafe { std::slice::from_raw_parts(p, 10_000) };
    assert!(bytes.iter().all(|&b| b == 0));
    unsafe { a.free(p) };
}

#[test]
fn memalign_large_alignment() {
    let mut a = alloc();
    for align in [32usize, 64, 128, 4096] {
        let p = a.memalign(align, 100);
        assert!(!p.is_null());
        assert_eq!(p as usize % align, 0, "not {align}-aligned");
        unsafe { a.free(p) };
    }
    assert_eq!(a.allocated_blocks(), 0);
}

// ---------------------------------------------------------------------------
// Foreign pointers
// ---------------------------------------------------------------------------

#[test]
fn foreign_pointers_are_never_owned() {
    let a = alloc();
    let stack = [0u8; 64];
    let boxed = Box::new([0u64; 8]);
    // Readable memory outside every arena.
    unsafe {
        assert!(!a.owns(stack.as_ptr()));
        assert!(!a.owns(boxed.as_ptr() as *const u8));
        assert!(!a.owns(ptr::null()));
        assert_eq!(a.usable_size(stack.as_ptr()), None);
    }
}
