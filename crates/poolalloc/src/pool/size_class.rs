use crate::util::{ALIGNMENT, ALIGNMENT_SHIFT, SMALL_REQUEST_THRESHOLD};

/// Size classes step by `ALIGNMENT` bytes:
///
/// Classes: 16, 32, 48, 64, 80, ..., 496, 512
pub const NUM_SIZE_CLASSES: usize = SMALL_REQUEST_THRESHOLD >> ALIGNMENT_SHIFT;

/// Look up the size class for a request of `size` bytes.
/// Returns `None` for zero and for anything above the threshold.
///
/// `size - 1` wraps for zero, so one unsigned comparison rejects both ends.
#[inline(always)]
pub const fn class_of(size: usize) -> Option<usize> {
    let biased = size.wrapping_sub(1);
    if biased < SMALL_REQUEST_THRESHOLD {
        Some(biased >> ALIGNMENT_SHIFT)
    } else {
        None
    }
}

/// Block size of a size class.
#[inline(always)]
pub const fn class_size(class: usize) -> usize {
    (class + 1) << ALIGNMENT_SHIFT
}

/// Number of blocks a pool of `pool_size` bytes holds for `class`, after
/// the pool header.
#[inline]
pub const fn blocks_per_pool(class: usize, pool_size: usize) -> usize {
    (pool_size - super::header::POOL_OVERHEAD) / class_size(class)
}

const _: () = assert!(class_size(NUM_SIZE_CLASSES - 1) == SMALL_REQUEST_THRESHOLD);
const _: () = assert!(class_size(0) == ALIGNMENT);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_are_sorted_and_aligned() {
        for c in 1..NUM_SIZE_CLASSES {
            assert!(class_size(c) > class_size(c - 1));
            assert_eq!(class_size(c) % ALIGNMENT, 0);
        }
    }

    #[test]
    fn lookup_boundary_sizes() {
        assert_eq!(class_of(0), None);
        assert_eq!(class_of(1), Some(0));
        assert_eq!(class_of(16), Some(0));
        assert_eq!(class_of(17), Some(1));
        assert_eq!(class_of(32), Some(1));
        assert_eq!(class_of(SMALL_REQUEST_THRESHOLD), Some(NUM_SIZE_CLASSES - 1));
        assert_eq!(class_of(SMALL_REQUEST_THRESHOLD + 1), None);
        assert_eq!(class_of(usize::MAX), None);
    }

    #[test]
    fn every_size_fits_its_class() {
        for n in 1..=SMALL_REQUEST_THRESHOLD {
            let c = class_of(n).unwrap();
            assert!(class_size(c) >= n);
            assert!(c == 0 || class_size(c - 1) < n);
        }
    }

    #[test]
    fn smallest_pool_holds_two_of_the_largest_blocks() {
        assert!(blocks_per_pool(NUM_SIZE_CLASSES - 1, crate::util::MIN_POOL_SIZE) >= 2);
    }
}
