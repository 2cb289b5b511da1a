//! Cursor implementations for bump arenas
//!
//! Provides both atomic (thread-safe) and cell-based (single-thread) cursors.
//! The cursor stores the arena offset, i.e. the number of bytes already
//! handed out, never an absolute address.

use core::cell::Cell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Cursor abstraction (atomic or cell-based)
pub trait Cursor {
    fn new(offset: usize) -> Self;
    fn load(&self, ordering: Ordering) -> usize;
    fn store(&self, offset: usize, ordering: Ordering);
    fn compare_exchange_weak(
        &self,
        current: usize,
        new: usize,
        success: Ordering,
        failure: Ordering,
    ) -> Result<usize, usize>;
}

/// Atomic cursor for multi-threaded access, kept on its own cache line
pub struct AtomicCursor(CachePadded<AtomicUsize>);

impl Cursor for AtomicCursor {
    fn new(offset: usize) -> Self {
        Self(CachePadded::new(AtomicUsize::new(offset)))
    }

    #[inline]
    fn load(&self, ordering: Ordering) -> usize {
        self.0.load(ordering)
    }

    #[inline]
    fn store(&self, offset: usize, ordering: Ordering) {
        self.0.store(offset, ordering);
    }

    #[inline]
    fn compare_exchange_weak(
        &self,
        current: usize,
        new: usize,
        success: Ordering,
        failure: Ordering,
    ) -> Result<usize, usize> {
        self.0.compare_exchange_weak(current, new, success, failure)
    }
}

/// Cell-based cursor for single-threaded access (no atomic overhead)
///
/// `Cell` is `!Sync`, which is what keeps the owning arena `!Sync`.
pub struct CellCursor(Cell<usize>);

impl Cursor for CellCursor {
    fn new(offset: usize) -> Self {
        Self(Cell::new(offset))
    }

    #[inline]
    fn load(&self, _ordering: Ordering) -> usize {
        self.0.get()
    }

    #[inline]
    fn store(&self, offset: usize, _ordering: Ordering) {
        self.0.set(offset);
    }

    #[inline]
    fn compare_exchange_weak(
        &self,
        current: usize,
        new: usize,
        _success: Ordering,
        _failure: Ordering,
    ) -> Result<usize, usize> {
        let actual = self.0.get();
        if actual == current {
            self.0.set(new);
            Ok(actual)
        } else {
            Err(actual)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise<C: Cursor>() {
        let cursor = C::new(0);
        assert_eq!(cursor.load(Ordering::Acquire), 0);

        cursor.store(16, Ordering::Release);
        assert_eq!(cursor.load(Ordering::Acquire), 16);

        // A stale expectation must not move the cursor
        assert_eq!(
            cursor.compare_exchange_weak(0, 32, Ordering::AcqRel, Ordering::Acquire),
            Err(16)
        );
        assert_eq!(cursor.load(Ordering::Acquire), 16);

        // compare_exchange_weak may fail spuriously on some platforms
        while cursor
            .compare_exchange_weak(16, 32, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {}
        assert_eq!(cursor.load(Ordering::Acquire), 32);
    }

    #[test]
    fn test_cell_cursor() {
        exercise::<CellCursor>();
    }

    #[test]
    fn test_atomic_cursor() {
        exercise::<AtomicCursor>();
    }

    #[test]
    fn test_atomic_cursor_is_padded() {
        assert!(core::mem::size_of::<AtomicCursor>() > core::mem::size_of::<AtomicUsize>());
    }
}
