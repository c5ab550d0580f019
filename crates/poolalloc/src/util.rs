/// Align `value` up to the next multiple of `align`.
/// `align` must be a power of two.
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Align `value` down to the previous multiple of `align`.
/// `align` must be a power of two.
#[inline(always)]
pub const fn align_down(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Check if `value` is aligned to `align`.
#[inline(always)]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

/// Alignment of every block, and the width of one size-class step.
pub const ALIGNMENT: usize = 16;
pub const ALIGNMENT_SHIFT: u32 = ALIGNMENT.trailing_zeros();

/// Largest request served from pools. Anything bigger goes to the raw allocator.
pub const SMALL_REQUEST_THRESHOLD: usize = 512;

/// Smallest pool the geometry accepts.
pub const MIN_POOL_SIZE: usize = 4096;

/// Default arena size: 64 pools of 4 KiB.
pub const DEFAULT_ARENA_SIZE: usize = 256 * 1024;

/// Upper bound on pools per arena; sizes the last-arena-with-k cache.
pub const MAX_POOLS_IN_ARENA: usize = 256;

/// Descriptor table capacity on first growth.
pub const INITIAL_ARENA_OBJECTS: usize = 16;

/// Runtime page size. Initialized to 4096 so `page_size()` never returns zero
/// before `init_page_size()` has run.
static PAGE_SIZE_CACHED: core::sync::atomic::AtomicUsize =
    core::sync::atomic::AtomicUsize::new(4096);

/// Read the page size from the OS and cache it.
pub fn init_page_size() -> usize {
    #[cfg(unix)]
    let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    #[cfg(not(unix))]
    let ps: libc::c_long = 4096;
    let ps = if ps > 0 { ps as usize } else { 4096 };
    PAGE_SIZE_CACHED.store(ps, core::sync::atomic::Ordering::Relaxed);
    ps
}

/// Get the system page size (4096 until `init_page_size()` has run).
#[inline(always)]
pub fn page_size() -> usize {
    PAGE_SIZE_CACHED.load(core::sync::atomic::Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 4096), 4096);
        assert_eq!(align_down(4097, 4096), 4096);
        assert_eq!(align_down(15, 16), 0);
        assert!(is_aligned(8192, 4096));
        assert!(!is_aligned(8200, 4096));
    }

    #[test]
    fn page_size_is_power_of_two() {
        let ps = init_page_size();
        assert!(ps.is_power_of_two());
        assert_eq!(page_size(), ps);
    }
}
