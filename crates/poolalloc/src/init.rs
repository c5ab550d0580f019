//! Lazily initialised process-wide context behind [`crate::PoolMalloc`].

use crate::allocator::PoolAllocator;
use crate::config::{self, Config};
use crate::sync::{Mutex, MutexGuard};
use core::sync::atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
pub const STATE_READY: u8 = 2;
pub const STATE_DISABLED: u8 = 3;

static INIT_STATE: AtomicU8 = AtomicU8::new(UNINIT);

static CONTEXT: Mutex<Option<PoolAllocator>> = Mutex::new(None);

/// Build the global context on first use. Returns the settled state.
///
/// Nothing here allocates: the environment is read through `getenv` and
/// the context acquires no arena until its first small request.
#[inline]
pub fn ensure_initialized() -> u8 {
    let state = INIT_STATE.load(Ordering::Acquire);
    if state >= STATE_READY {
        return state;
    }
    initialize()
}

#[cold]
#[inline(never)]
fn initialize() -> u8 {
    match INIT_STATE.compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {}
        Err(INITIALIZING) => {
            while INIT_STATE.load(Ordering::Acquire) == INITIALIZING {
                core::hint::spin_loop();
            }
            return INIT_STATE.load(Ordering::Acquire);
        }
        Err(state) => return state,
    }

    crate::util::init_page_size();
    let state = if unsafe { config::is_disabled() } {
        STATE_DISABLED
    } else {
        let context = PoolAllocator::new(global_config(Config::from_env()))
            .or_else(|_| PoolAllocator::new(global_config(Config::default())));
        match context {
            Ok(context) => {
                *CONTEXT.lock() = Some(context);
                STATE_READY
            }
            Err(_) => STATE_DISABLED,
        }
    };
    INIT_STATE.store(state, Ordering::Release);
    state
}

/// Logging from inside the allocator could allocate. Statistics dumps
/// stay on when asked for: without logging they go straight to stderr.
fn global_config(config: Config) -> Config {
    config.with_log_events(false)
}

#[inline(always)]
pub fn state() -> u8 {
    INIT_STATE.load(Ordering::Acquire)
}

/// Lock the global context. `None` inside until initialised.
#[inline]
pub fn context() -> MutexGuard<'static, Option<PoolAllocator>> {
    CONTEXT.lock()
}
