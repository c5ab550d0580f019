#![no_main]

use libfuzzer_sys::fuzz_target;
use poolalloc::{Config, PoolAllocator};

// Interprets input as (size, alignment shift) pairs: every request must be
// aligned, writable to its full extent, routed by the small threshold, and
// report a usable size that covers it.

fuzz_target!(|data: &[u8]| {
    poolalloc::util::init_page_size();
    let mut a = PoolAllocator::new(Config::default().with_log_events(false)).unwrap();

    for chunk in data.chunks_exact(3) {
        let size = u16::from_le_bytes([chunk[0], chunk[1]]) as usize;
        let align = 1usize << (chunk[2] % 13);

        let ptr = a.memalign(align, size);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % align.max(16), 0, "memalign({align}, {size}) misaligned");

        unsafe {
            let pooled = a.owns(ptr);
            assert_eq!(pooled, (1..=512).contains(&size) && align <= 16);
            if let Some(usable) = a.usable_size(ptr) {
                assert!(usable >= size);
            }

            std::ptr::write_bytes(ptr, 0xBB, size);
            assert!(std::slice::from_raw_parts(ptr, size).iter().all(|&b| b == 0xBB));
            a.free(ptr);
        }
    }
    assert_eq!(a.allocated_blocks(), 0);
    assert!(a.check_integrity().is_ok());
});
