#![no_main]

use libfuzzer_sys::fuzz_target;
use poolalloc::{Config, PoolAllocator};
use std::sync::Once;

/// Operation stream against a small-geometry allocator.
///
/// Each operation is four bytes:
///   byte 0: opcode (0=malloc, 1=free, 2=realloc, 3=calloc)
///   byte 1-2: size (little-endian u16, folded to 0..=1024)
///   byte 3: slot index
///
/// Every slot's contents are checked before it is freed or resized, and the
/// structural invariants are checked after every operation.
const MAX_SLOTS: usize = 64;

static PAGE: Once = Once::new();

fn tag(slot: usize) -> u8 {
    0x40 | slot as u8
}

unsafe fn check(ptr: *mut u8, len: usize, slot: usize) {
    let bytes = std::slice::from_raw_parts(ptr, len);
    assert!(bytes.iter().all(|&b| b == tag(slot)), "slot {slot} corrupted");
}

fuzz_target!(|data: &[u8]| {
    PAGE.call_once(|| {
        poolalloc::util::init_page_size();
    });
    let config = Config::default()
        .with_pool_size(4096)
        .with_arena_size(4 * 4096)
        .with_log_events(false);
    let mut a = PoolAllocator::new(config).unwrap();

    let mut slots: [*mut u8; MAX_SLOTS] = [std::ptr::null_mut(); MAX_SLOTS];
    let mut sizes: [usize; MAX_SLOTS] = [0; MAX_SLOTS];

    for op in data.chunks_exact(4) {
        let size = u16::from_le_bytes([op[1], op[2]]) as usize % 1025;
        let slot = op[3] as usize % MAX_SLOTS;
        unsafe {
            match op[0] & 0x03 {
                0 | 3 => {
                    if !slots[slot].is_null() {
                        check(slots[slot], sizes[slot], slot);
                        a.free(slots[slot]);
                    }
                    let ptr = if op[0] & 0x03 == 0 {
                        a.malloc(size)
                    } else {
                        let p = a.calloc(1, size);
                        assert!(std::slice::from_raw_parts(p, size).iter().all(|&b| b == 0));
                        p
                    };
                    assert!(!ptr.is_null());
                    std::ptr::write_bytes(ptr, tag(slot), size);
                    slots[slot] = ptr;
                    sizes[slot] = size;
                }
                1 => {
                    if !slots[slot].is_null() {
                        check(slots[slot], sizes[slot], slot);
                        a.free(slots[slot]);
                        slots[slot] = std::ptr::null_mut();
                        sizes[slot] = 0;
                    }
                }
                _ => {
                    let old = sizes[slot];
                    let ptr = a.realloc(slots[slot], size);
                    assert!(!ptr.is_null());
                    check(ptr, old.min(size), slot);
                    std::ptr::write_bytes(ptr, tag(slot), size);
                    slots[slot] = ptr;
                    sizes[slot] = size;
                }
            }
        }
        let live = slots.iter().filter(|p| !p.is_null()).count();
        assert_eq!(a.allocated_blocks(), live);
        assert!(a.check_integrity().is_ok());
    }

    for &p in slots.iter() {
        unsafe { a.free(p) };
    }
    assert_eq!(a.allocated_blocks(), 0);
});
