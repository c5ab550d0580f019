use crate::error::ConfigError;
use crate::util::{page_size, DEFAULT_ARENA_SIZE, MAX_POOLS_IN_ARENA, MIN_POOL_SIZE};

/// Allocator geometry and behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bytes requested from the region provider per arena.
    pub arena_size: usize,
    /// Bytes per pool. Must not exceed the page size: the ownership test
    /// reads the pool header of arbitrary addresses.
    pub pool_size: usize,
    /// Emit `log` records on cold paths.
    pub log_events: bool,
    /// Log a statistics snapshot every time a new arena is acquired.
    pub dump_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            arena_size: DEFAULT_ARENA_SIZE,
            pool_size: page_size().max(MIN_POOL_SIZE),
            log_events: true,
            dump_stats: false,
        }
    }
}

impl Config {
    pub fn with_arena_size(mut self, arena_size: usize) -> Self {
        self.arena_size = arena_size;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_log_events(mut self, on: bool) -> Self {
        self.log_events = on;
        self
    }

    pub fn with_dump_stats(mut self, on: bool) -> Self {
        self.dump_stats = on;
        self
    }

    /// Default configuration overridden by `POOLALLOC_ARENA_SIZE`,
    /// `POOLALLOC_POOL_SIZE` and `POOLALLOC_STATS`.
    ///
    /// Reads the environment through `libc::getenv` and parses without
    /// allocating, so it is usable while bootstrapping a global allocator.
    /// [`PoolMalloc`](crate::PoolMalloc) honours `POOLALLOC_STATS` by
    /// writing each dump to stderr, since it runs with logging off.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        unsafe {
            if let Some(val) = getenv_usize(b"POOLALLOC_ARENA_SIZE\0") {
                config.arena_size = val;
            }
            if let Some(val) = getenv_usize(b"POOLALLOC_POOL_SIZE\0") {
                config.pool_size = val;
            }
            if let Some(val) = getenv_usize(b"POOLALLOC_STATS\0") {
                config.dump_stats = val != 0;
            }
        }
        config
    }

    /// Check the geometry against the page size and pool-count bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pool = self.pool_size;
        if !pool.is_power_of_two() {
            return Err(ConfigError::PoolSizeNotPowerOfTwo(pool));
        }
        if pool < MIN_POOL_SIZE {
            return Err(ConfigError::PoolTooSmall {
                pool,
                min: MIN_POOL_SIZE,
            });
        }
        if pool > page_size() {
            return Err(ConfigError::PoolLargerThanPage {
                pool,
                page: page_size(),
            });
        }
        if self.arena_size % pool != 0 {
            return Err(ConfigError::ArenaNotPoolMultiple {
                arena: self.arena_size,
                pool,
            });
        }
        let pools = self.arena_size / pool;
        if !(2..=MAX_POOLS_IN_ARENA).contains(&pools) {
            return Err(ConfigError::PoolCountOutOfRange {
                pools,
                min: 2,
                max: MAX_POOLS_IN_ARENA,
            });
        }
        Ok(())
    }
}

/// Check if the global allocator is disabled via `POOLALLOC_DISABLE`.
///
/// # Safety
/// Calls `libc::getenv`, which races with concurrent `setenv`.
pub unsafe fn is_disabled() -> bool {
    let key = b"POOLALLOC_DISABLE\0".as_ptr() as *const libc::c_char;
    !libc::getenv(key).is_null()
}

/// Parse an environment variable as a usize.
///
/// # Safety
/// Calls `libc::getenv`. `key` must be nul-terminated.
unsafe fn getenv_usize(key: &[u8]) -> Option<usize> {
    let val = libc::getenv(key.as_ptr() as *const libc::c_char);
    if val.is_null() {
        return None;
    }
    parse_usize(val as *const u8)
}

/// Parse a nul-terminated decimal string (no std allocation).
///
/// # Safety
/// `ptr` must point to a nul-terminated byte string.
unsafe fn parse_usize(mut ptr: *const u8) -> Option<usize> {
    let mut result: usize = 0;
    let mut digits = 0;
    loop {
        let byte = *ptr;
        if byte == 0 {
            break;
        }
        if !byte.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add((byte - b'0') as usize)?;
        digits += 1;
        ptr = ptr.add(1);
    }
    if digits == 0 {
        None
    } else {
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        crate::util::init_page_size();
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_geometry() {
        crate::util::init_page_size();
        let base = Config::default().with_pool_size(4096);
        assert_eq!(
            base.clone().with_pool_size(3000).validate(),
            Err(ConfigError::PoolSizeNotPowerOfTwo(3000))
        );
        assert!(matches!(
            base.clone().with_pool_size(2048).validate(),
            Err(ConfigError::PoolTooSmall { .. })
        ));
        assert!(matches!(
            base.clone().with_arena_size(4096 * 3 + 1).validate(),
            Err(ConfigError::ArenaNotPoolMultiple { .. })
        ));
        assert!(matches!(
            base.clone().with_arena_size(4096).validate(),
            Err(ConfigError::PoolCountOutOfRange { pools: 1, .. })
        ));
        assert!(matches!(
            base.with_arena_size(4096 * 512).validate(),
            Err(ConfigError::PoolCountOutOfRange { pools: 512, .. })
        ));
    }

    #[test]
    fn parses_decimal_strings() {
        unsafe {
            assert_eq!(parse_usize(b"262144\0".as_ptr()), Some(262144));
            assert_eq!(parse_usize(b"0\0".as_ptr()), Some(0));
            assert_eq!(parse_usize(b"\0".as_ptr()), None);
            assert_eq!(parse_usize(b"12k\0".as_ptr()), None);
            assert_eq!(parse_usize(b"99999999999999999999999\0".as_ptr()), None);
        }
    }
}
