use thiserror::Error;

/// Why the pool layer did not hand out (or take back) a block.
///
/// `Unsupported` and `ForeignAddress` are routing signals rather than
/// failures: the front door answers them by going to the raw allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("capacity overflow")]
    CapacityOverflow,
    #[error("{size} bytes is outside the small-object range")]
    Unsupported { size: usize },
    #[error("address was not issued by this allocator")]
    ForeignAddress,
}

/// Rejected allocator geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pool size {0} is not a power of two")]
    PoolSizeNotPowerOfTwo(usize),
    #[error("pool size {pool} is below the minimum of {min}")]
    PoolTooSmall { pool: usize, min: usize },
    #[error("pool size {pool} exceeds the page size {page}")]
    PoolLargerThanPage { pool: usize, page: usize },
    #[error("arena size {arena} is not a multiple of the pool size {pool}")]
    ArenaNotPoolMultiple { arena: usize, pool: usize },
    #[error("arena holds {pools} pools, expected between {min} and {max}")]
    PoolCountOutOfRange { pools: usize, min: usize, max: usize },
}
