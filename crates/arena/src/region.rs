//! Raw regions handed out by [`BumpArena::allocate`](crate::BumpArena::allocate)

use core::fmt;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::error::{ArenaError, ArenaResult};

/// Uninitialised bytes borrowed from an arena for the rest of its epoch.
///
/// The region borrows the arena, so the arena cannot be reset, restored or
/// dropped while the region is alive. The pointer returned by
/// [`RawRegion::as_ptr`] is not tied to that borrow; dereferencing it after
/// the epoch ends is undefined behaviour.
pub struct RawRegion<'a> {
    ptr: NonNull<u8>,
    len: usize,
    _arena: PhantomData<&'a mut [MaybeUninit<u8>]>,
}

// SAFETY: a region is an exclusive view of disjoint arena bytes, the same as
// `&'a mut [MaybeUninit<u8>]`, which is both `Send` and `Sync`.
unsafe impl Send for RawRegion<'_> {}
// SAFETY: see above.
unsafe impl Sync for RawRegion<'_> {}

impl<'a> RawRegion<'a> {
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `len` bytes for `'a`, and no other
    /// region or reference may overlap it during `'a`.
    pub(crate) unsafe fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            _arena: PhantomData,
        }
    }

    /// Start of the region
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Start of the region as an integer address
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` for zero-length regions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the start address is a multiple of `align`
    #[inline]
    pub fn is_aligned_to(&self, align: usize) -> bool {
        crate::utils::is_aligned(self.addr(), align)
    }

    /// Views the region as uninitialised bytes
    pub fn as_uninit_mut(&mut self) -> &mut [MaybeUninit<u8>] {
        // SAFETY: the region owns `len` writable bytes and `&mut self` is unique.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr().cast(), self.len) }
    }

    /// Consumes the region into an uninitialised slice living for the epoch
    pub fn into_uninit(self) -> &'a mut [MaybeUninit<u8>] {
        // SAFETY: as in `as_uninit_mut`; `self` is consumed so no alias remains.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr().cast(), self.len) }
    }

    /// Fills every byte with `byte` and returns the now-initialised slice
    pub fn fill(self, byte: u8) -> &'a mut [u8] {
        // SAFETY: writing `len` bytes into memory the region owns exclusively;
        // afterwards every byte is initialised.
        unsafe {
            self.ptr.as_ptr().write_bytes(byte, self.len);
            core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
        }
    }

    /// Copies `src` into the region and returns the initialised slice
    ///
    /// `src` must be exactly as long as the region.
    pub fn copy_from(self, src: &[u8]) -> ArenaResult<&'a mut [u8]> {
        if src.len() != self.len {
            return Err(ArenaError::InvalidArgument {
                reason: format!(
                    "source has {} bytes, region has {}",
                    src.len(),
                    self.len
                ),
            });
        }
        // SAFETY: lengths match, `src` cannot overlap memory the region owns
        // exclusively, and the copy initialises every byte.
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.as_ptr(), self.len);
            Ok(core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len))
        }
    }
}

impl fmt::Debug for RawRegion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRegion")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len)
            .finish()
    }
}
