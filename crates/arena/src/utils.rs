//! Alignment and address arithmetic helpers

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ArenaError, ArenaResult};

/// Memory alignment constants
pub mod alignment {
    /// Cache line size, used as the default arena base alignment
    pub const CACHE_LINE: usize = 64;

    /// Page size (platform dependent, this is the common default)
    pub const PAGE_SIZE: usize = 4096;
}

/// Rounds `addr` up to the next multiple of `align`.
///
/// `align` must be a power of two. Returns `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(addr: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match addr.checked_add(align - 1) {
        Some(bumped) => Some(bumped & !(align - 1)),
        None => None,
    }
}

/// Checks whether `addr` is a multiple of `align`
#[inline]
#[must_use]
pub const fn is_aligned(addr: usize, align: usize) -> bool {
    align.is_power_of_two() && addr & (align - 1) == 0
}

/// Validates that `align` is a non-zero power of two
#[inline]
pub fn validate_alignment(align: usize) -> ArenaResult<()> {
    if align.is_power_of_two() {
        Ok(())
    } else {
        Err(ArenaError::invalid_alignment(align))
    }
}

/// Atomically raises `current` to `value` if `value` is larger
#[inline]
pub(crate) fn atomic_max(current: &AtomicUsize, value: usize) {
    let mut max = current.load(Ordering::Relaxed);
    while value > max {
        match current.compare_exchange_weak(max, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => max = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(8, 8), Some(8));
        assert_eq!(align_up(17, 16), Some(32));
        assert_eq!(align_up(usize::MAX, 2), None);
    }

    #[test]
    fn test_is_aligned() {
        assert!(is_aligned(64, 64));
        assert!(is_aligned(0, 4096));
        assert!(!is_aligned(65, 2));
        assert!(!is_aligned(64, 3));
    }

    #[test]
    fn test_validate_alignment() {
        assert!(validate_alignment(1).is_ok());
        assert!(validate_alignment(64).is_ok());
        assert!(validate_alignment(0).is_err());
        assert!(validate_alignment(3).is_err());
        assert!(validate_alignment(24).is_err());
    }

    #[test]
    fn test_atomic_max() {
        let peak = AtomicUsize::new(10);
        atomic_max(&peak, 5);
        assert_eq!(peak.load(Ordering::Relaxed), 10);
        atomic_max(&peak, 42);
        assert_eq!(peak.load(Ordering::Relaxed), 42);
    }
}
