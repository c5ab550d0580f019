//! Deterministic pseudo-random operation traces, checking the allocator's
//! structural invariants and every live block's contents after each step.

use poolalloc::{Config, HeapRegions, LibcAllocator, PoolAllocator, RegionProvider};

/// Knuth's MMIX LCG; good enough to shuffle operations.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

struct Live {
    ptr: *mut u8,
    size: usize,
    tag: u8,
}

fn fill(l: &Live) {
    unsafe { std::ptr::write_bytes(l.ptr, l.tag, l.size) };
}

fn verify(l: &Live, upto: usize) {
    let bytes = unsafe { std::slice::from_raw_parts(l.ptr, upto) };
    assert!(bytes.iter().all(|&b| b == l.tag), "block {:p} lost its contents", l.ptr);
}

fn random_size(rng: &mut Lcg) -> usize {
    match rng.below(10) {
        0 => 0,
        1 => 513 + rng.below(3000),
        _ => 1 + rng.below(512),
    }
}

fn replay<R: RegionProvider>(mut a: PoolAllocator<R, LibcAllocator>, seed: u64, steps: usize) {
    let mut rng = Lcg(seed);
    let mut live: Vec<Live> = Vec::new();

    for step in 0..steps {
        match rng.below(10) {
            0..=4 => {
                let size = random_size(&mut rng);
                let l = Live {
                    ptr: a.malloc(size),
                    size,
                    tag: step as u8,
                };
                assert!(!l.ptr.is_null());
                fill(&l);
                live.push(l);
            }
            5..=7 if !live.is_empty() => {
                let l = live.swap_remove(rng.below(live.len()));
                verify(&l, l.size);
                unsafe { a.free(l.ptr) };
            }
            8 if !live.is_empty() => {
                let i = rng.below(live.len());
                let size = random_size(&mut rng);
                let old = &live[i];
                verify(old, old.size);
                let ptr = unsafe { a.realloc(old.ptr, size) };
                assert!(!ptr.is_null());
                let moved = Live {
                    ptr,
                    size: old.size.min(size),
                    tag: old.tag,
                };
                verify(&moved, moved.size);
                live[i] = Live { size, ..moved };
                fill(&live[i]);
            }
            _ => {
                let size = 1 + rng.below(512);
                let p = a.calloc(1, size);
                let bytes = unsafe { std::slice::from_raw_parts(p, size) };
                assert!(bytes.iter().all(|&b| b == 0), "calloc returned dirty memory");
                unsafe { a.free(p) };
            }
        }

        let r = a.check_integrity();
        assert!(r.is_ok(), "step {step}: {r:?}");
        assert_eq!(a.allocated_blocks(), live.len(), "step {step}");
    }

    for l in live.drain(..) {
        verify(&l, l.size);
        unsafe { a.free(l.ptr) };
    }
    assert_eq!(a.allocated_blocks(), 0);
    let s = a.stats();
    assert_eq!(s.total_bytes(), s.arenas.current * s.arena_size);
    assert!(a.check_integrity().is_ok());
}

fn small_config() -> Config {
    poolalloc::util::init_page_size();
    Config::default()
        .with_pool_size(4096)
        .with_arena_size(4 * 4096)
        .with_log_events(false)
}

#[test]
fn replay_on_default_regions() {
    for seed in [1u64, 42, 0xDEAD_BEEF] {
        replay(PoolAllocator::new(small_config()).unwrap(), seed, 3_000);
    }
}

#[test]
fn replay_on_heap_regions() {
    for seed in [7u64, 1234] {
        let a = PoolAllocator::with_parts(small_config(), HeapRegions, LibcAllocator).unwrap();
        replay(a, seed, 3_000);
    }
}
