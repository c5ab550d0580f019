//! Small-object pool allocator.
//!
//! Memory is organised in three levels: arenas (large regions from a
//! [`RegionProvider`]), pools (page-sized slices of an arena dedicated to
//! one size class) and blocks (fixed-size slots inside a pool). Requests up
//! to 512 bytes are served from pools; everything else, and every pointer
//! the pools do not own, is forwarded to a [`RawAllocator`].

extern crate libc;

/// Log through the `log` facade when `$on` is set.
macro_rules! event {
    ($on:expr, $lvl:ident, $($arg:tt)+) => {
        if $on {
            log::$lvl!($($arg)+);
        }
    };
}

pub mod allocator;
pub mod config;
pub mod error;
pub mod global_alloc;
pub mod init;
pub mod integrity;
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub mod platform;
pub mod pool;
pub mod region;
pub mod shared;
pub mod stats;
pub mod sync;
pub mod util;

pub use allocator::{LibcAllocator, PoolAllocator, RawAllocator};
pub use config::Config;
pub use error::{AllocError, ConfigError};
pub use global_alloc::PoolMalloc;
pub use integrity::IntegrityResult;
pub use region::{DefaultRegions, HeapRegions, RegionProvider};
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub use region::MmapRegions;
pub use shared::SharedPoolAllocator;
pub use stats::{ClassStats, Stats};

/// Write `msg` to stderr and abort. Allocation-free.
pub fn abort_with_message(msg: &str) -> ! {
    unsafe {
        libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
        libc::abort();
    }
}
