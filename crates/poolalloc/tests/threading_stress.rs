//! Many threads sharing one allocator through `SharedPoolAllocator`.

use poolalloc::{Config, SharedPoolAllocator};
use std::ptr;
use std::sync::{mpsc, Arc, Barrier};
use std::thread;

fn shared() -> Arc<SharedPoolAllocator> {
    poolalloc::util::init_page_size();
    Arc::new(SharedPoolAllocator::new(Config::default().with_log_events(false)).unwrap())
}

/// Lets allocation addresses cross threads; ownership moves with the value.
#[derive(Clone, Copy)]
struct SendPtr(*mut u8);
unsafe impl Send for SendPtr {}

// ---------------------------------------------------------------------------
// N threads doing rapid malloc/free cycles
// ---------------------------------------------------------------------------

fn stress_malloc_free(num_threads: usize) {
    const ITERATIONS: usize = 5_000;
    let a = shared();
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let a = Arc::clone(&a);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let size = 16 * (t % 32) + 8;
                for _ in 0..ITERATIONS {
                    let p = a.malloc(size);
                    assert!(!p.is_null());
                    unsafe {
                        ptr::write_bytes(p, t as u8, size);
                        a.free(p);
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("thread panicked during malloc/free stress");
    }
    assert_eq!(a.allocated_blocks(), 0);
    assert!(a.check_integrity().is_ok());
}

#[test]
fn stress_malloc_free_4_threads() {
    stress_malloc_free(4);
}

#[test]
fn stress_malloc_free_16_threads() {
    stress_malloc_free(16);
}

// ---------------------------------------------------------------------------
// Held blocks keep their contents while other threads churn
// ---------------------------------------------------------------------------

#[test]
fn held_blocks_are_not_clobbered() {
    const HELD: usize = 256;
    let a = shared();
    let handles: Vec<_> = (0..8u8)
        .map(|t| {
            let a = Arc::clone(&a);
            thread::spawn(move || {
                let held: Vec<_> = (0..HELD)
                    .map(|i| {
                        let size = 1 + (i * 7 + t as usize) % 512;
                        let p = a.malloc(size);
                        unsafe { ptr::write_bytes(p, t, size) };
                        (SendPtr(p), size)
                    })
                    .collect();
                for _ in 0..2_000 {
                    let p = a.malloc(64);
                    unsafe { a.free(p) };
                }
                for (SendPtr(p), size) in held {
                    let bytes = unsafe { std::slice::from_raw_parts(p, size) };
                    assert!(bytes.iter().all(|&b| b == t), "thread {t} block corrupted");
                    unsafe { a.free(p) };
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(a.allocated_blocks(), 0);
}

// ---------------------------------------------------------------------------
// Cross-thread free: one thread allocates, another frees
// ---------------------------------------------------------------------------

#[test]
fn cross_thread_free() {
    const COUNT: usize = 20_000;
    let a = shared();
    let (tx, rx) = mpsc::channel::<SendPtr>();

    let producer = {
        let a = Arc::clone(&a);
        thread::spawn(move || {
            for i in 0..COUNT {
                let p = a.malloc(8 + i % 500);
                tx.send(SendPtr(p)).unwrap();
            }
        })
    };
    let consumer = {
        let a = Arc::clone(&a);
        thread::spawn(move || {
            for SendPtr(p) in rx {
                unsafe { a.free(p) };
            }
        })
    };

    producer.join().unwrap();
    consumer.join().unwrap();
    assert_eq!(a.allocated_blocks(), 0);
    assert!(a.check_integrity().is_ok());
}
