//! Region providers: where arenas come from.

use core::ptr::NonNull;

/// Supplies and takes back arena-sized regions.
///
/// `acquire` may fail (treated as out of memory by the caller) but must not
/// block indefinitely. Regions must be at least `ALIGNMENT`-aligned.
pub trait RegionProvider {
    fn acquire(&mut self, size: usize) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `acquire` on this provider with the same `size`,
    /// and must not be used afterwards.
    unsafe fn release(&mut self, ptr: NonNull<u8>, size: usize);
}

/// Arenas backed by anonymous private mappings. Mappings are page aligned,
/// so pool-sized alignment slack only appears when pools exceed a page.
#[cfg(any(target_os = "linux", target_os = "macos"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapRegions;

#[cfg(any(target_os = "linux", target_os = "macos"))]
impl RegionProvider for MmapRegions {
    fn acquire(&mut self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { crate::platform::map_anonymous(size) })
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>, size: usize) {
        crate::platform::unmap(ptr.as_ptr(), size);
    }
}

/// Arenas carved from the C heap with `malloc`/`free`. The base is rarely
/// pool aligned, so each arena loses one pool to alignment slack.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapRegions;

impl RegionProvider for HeapRegions {
    fn acquire(&mut self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { libc::malloc(size) } as *mut u8)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>, _size: usize) {
        libc::free(ptr.as_ptr() as *mut libc::c_void);
    }
}

/// The provider used when none is named.
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub type DefaultRegions = MmapRegions;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub type DefaultRegions = HeapRegions;
