mod block;
pub mod passthrough;
pub mod pooled;

pub use passthrough::{LibcAllocator, RawAllocator};
pub use pooled::PoolAllocator;
