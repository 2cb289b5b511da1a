//! Backing memory for an arena
//!
//! # Safety
//!
//! - `base` is valid for reads and writes of `capacity` bytes for `'buf`
//! - Owned storage was obtained from `std::alloc::alloc` with `layout` and is
//!   released with the same layout exactly once, in `Drop`
//! - Borrowed storage is never released; the borrow is held through
//!   `PhantomData` so the buffer outlives the storage

use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;
use std::alloc::{alloc, dealloc};

use crate::error::{ArenaError, ArenaResult};

/// Contiguous block of raw memory an arena bumps through
#[derive(Debug)]
pub(crate) struct ArenaStorage<'buf> {
    base: NonNull<u8>,
    capacity: usize,
    /// `Some` when the memory came from the system allocator
    owned: Option<Layout>,
    _buffer: PhantomData<&'buf mut [MaybeUninit<u8>]>,
}

impl ArenaStorage<'static> {
    /// Acquires `capacity` bytes aligned to `base_align` from the system allocator
    pub(crate) fn allocate(capacity: usize, base_align: usize) -> ArenaResult<Self> {
        if capacity == 0 {
            return Err(ArenaError::zero_capacity());
        }

        let layout = Layout::from_size_align(capacity, base_align)
            .map_err(|_| ArenaError::allocation_failure(capacity, base_align))?;

        // SAFETY: layout has a non-zero size (checked above).
        let raw = unsafe { alloc(layout) };
        let base =
            NonNull::new(raw).ok_or_else(|| ArenaError::allocation_failure_with_layout(layout))?;

        Ok(Self {
            base,
            capacity,
            owned: Some(layout),
            _buffer: PhantomData,
        })
    }
}

impl<'buf> ArenaStorage<'buf> {
    /// Wraps a caller-supplied buffer without taking ownership of its allocation
    pub(crate) fn borrowed(buffer: &'buf mut [MaybeUninit<u8>]) -> ArenaResult<Self> {
        if buffer.is_empty() {
            return Err(ArenaError::zero_capacity());
        }

        let capacity = buffer.len();
        let base = NonNull::from(buffer).cast::<u8>();

        Ok(Self {
            base,
            capacity,
            owned: None,
            _buffer: PhantomData,
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn base_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    #[inline]
    pub(crate) fn is_owned(&self) -> bool {
        self.owned.is_some()
    }

    /// Pointer to the byte at `offset`
    ///
    /// # Safety
    ///
    /// `offset` must not exceed `capacity`.
    #[inline]
    pub(crate) unsafe fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.capacity);
        // SAFETY: offset <= capacity keeps the result inside (or one past) the block.
        unsafe { self.base.add(offset) }
    }

    /// Fills `[start, end)` with `byte`
    ///
    /// # Safety
    ///
    /// The range must lie within the storage and no live reference may
    /// point into it.
    #[inline]
    pub(crate) unsafe fn fill(&self, start: usize, end: usize, byte: u8) {
        debug_assert!(start <= end && end <= self.capacity);
        // SAFETY: the range is in bounds and unaliased (caller contract).
        unsafe { self.ptr_at(start).as_ptr().write_bytes(byte, end - start) };
    }
}

impl Drop for ArenaStorage<'_> {
    fn drop(&mut self) {
        if let Some(layout) = self.owned {
            // SAFETY: base was returned by `alloc(layout)` and is released only here.
            unsafe { dealloc(self.base.as_ptr(), layout) };
        }
    }
}
