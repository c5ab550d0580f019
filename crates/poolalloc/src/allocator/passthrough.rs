//! Raw fallback allocator: requests the pools do not serve go here.
//!
//! This crate does not export `malloc`/`free` symbols, so calling straight
//! into the C library cannot recurse back into us.

use core::ffi::c_void;
use core::ptr;

/// A general-purpose allocator consumed as the fallback for large and
/// foreign requests, and as the backing store for the descriptor table.
///
/// Null means failure. Pointers from any method are released with `free`
/// and resized with `realloc`.
pub trait RawAllocator {
    fn malloc(&self, size: usize) -> *mut u8;

    fn calloc(&self, nmemb: usize, size: usize) -> *mut u8;

    /// # Safety
    /// `ptr` must be null or a live pointer from this allocator.
    unsafe fn realloc(&self, ptr: *mut u8, size: usize) -> *mut u8;

    /// # Safety
    /// `ptr` must be null or a live pointer from this allocator.
    unsafe fn free(&self, ptr: *mut u8);

    /// Allocate with an alignment above what `malloc` guarantees.
    fn memalign(&self, alignment: usize, size: usize) -> *mut u8;
}

/// Pass-through to the C library allocator.
///
/// Zero-byte requests are bumped to one byte so every success is a unique,
/// non-null pointer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcAllocator;

impl RawAllocator for LibcAllocator {
    #[inline]
    fn malloc(&self, size: usize) -> *mut u8 {
        let size = if size == 0 { 1 } else { size };
        unsafe { libc::malloc(size) as *mut u8 }
    }

    #[inline]
    fn calloc(&self, nmemb: usize, size: usize) -> *mut u8 {
        let (nmemb, size) = if nmemb == 0 || size == 0 {
            (1, 1)
        } else {
            (nmemb, size)
        };
        unsafe { libc::calloc(nmemb, size) as *mut u8 }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        let size = if size == 0 { 1 } else { size };
        libc::realloc(ptr as *mut c_void, size) as *mut u8
    }

    #[inline]
    unsafe fn free(&self, ptr: *mut u8) {
        libc::free(ptr as *mut c_void);
    }

    #[cfg(unix)]
    fn memalign(&self, alignment: usize, size: usize) -> *mut u8 {
        let alignment = alignment.max(core::mem::size_of::<*mut c_void>());
        let size = if size == 0 { 1 } else { size };
        let mut out: *mut c_void = ptr::null_mut();
        let ret = unsafe { libc::posix_memalign(&mut out, alignment, size) };
        if ret == 0 {
            out as *mut u8
        } else {
            ptr::null_mut()
        }
    }

    #[cfg(not(unix))]
    fn memalign(&self, _alignment: usize, _size: usize) -> *mut u8 {
        ptr::null_mut()
    }
}
