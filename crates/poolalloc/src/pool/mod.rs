pub mod arena;
pub mod header;
pub(crate) mod manager;
pub(crate) mod ownership;
pub mod size_class;
pub(crate) mod usable;

pub use arena::{ArenaCounters, ArenaIndex};
pub use header::{PoolId, POOL_OVERHEAD};
pub use size_class::{blocks_per_pool, class_of, class_size, NUM_SIZE_CLASSES};

/// Arena and pool sizes for one allocator instance. Validated by
/// `Config::validate` before construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub pool_size: usize,
    pub arena_size: usize,
    pub pool_shift: u32,
    /// Pools in a pool-aligned arena.
    pub max_pools: u32,
}

impl Geometry {
    pub(crate) const fn new(pool_size: usize, arena_size: usize) -> Self {
        Geometry {
            pool_size,
            arena_size,
            pool_shift: pool_size.trailing_zeros(),
            max_pools: (arena_size / pool_size) as u32,
        }
    }
}
