//! Fixed-capacity bump arena with typed object tracking
//!
//! A bump arena serves every request by advancing a single offset through one
//! contiguous block. Individual regions are never freed; the whole arena is
//! reclaimed at once by [`BumpArena::reset`] or when it is dropped. This is
//! only correct for values that share one lifetime, such as all temporaries
//! of a request or a frame.
//!
//! # Safety
//!
//! - The cursor only moves forward within an epoch, except for `restore`,
//!   `reset` and the rewind of a failed construction, all of which release
//!   bytes nobody can still reference
//! - Handed-out ranges never overlap: each one is claimed by a successful
//!   compare-and-swap of the cursor
//! - Every range lies within `[base, base + capacity)`
//! - `reset` and `restore` take `&mut self`, so no region, value or scope
//!   borrowed from the arena can survive into the next epoch
//!
//! ## Invariants
//!
//! - `0 <= used <= capacity`
//! - Pending destructors run newest-first, on reset, restore and drop

use core::alloc::Layout;
use core::convert::Infallible;
use core::fmt;
use core::mem::{self, MaybeUninit};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::Backoff;

use crate::checkpoint::{ArenaCheckpoint, ArenaScope};
use crate::config::ArenaConfig;
use crate::cursor::Cursor;
use crate::drop_list::{self, DropRegistry, DropThunk};
use crate::error::{ArenaError, ArenaResult, ConstructError};
use crate::mode::{MultiThreaded, SingleThreaded, ThreadMode};
use crate::region::RawRegion;
use crate::stats::{ArenaStats, OptionalStats};
use crate::storage::ArenaStorage;
use crate::traits::MemoryUsage;
use crate::utils::{align_up, atomic_max, validate_alignment};

/// Single-threaded bump arena; not `Send`, not `Sync`
pub type PoolAllocator<'buf> = BumpArena<'buf, SingleThreaded>;

/// Bump arena whose cursor is advanced with compare-and-swap; `Send + Sync`
pub type ConcurrentPoolAllocator<'buf> = BumpArena<'buf, MultiThreaded>;

/// Bump arena over one contiguous block of memory.
///
/// Every constructed value must outlive `'buf`, and `'buf` must outlive the
/// arena. For an arena over a caller buffer `'buf` is also the buffer
/// borrow. Use the [`PoolAllocator`] and [`ConcurrentPoolAllocator`] aliases
/// to pick the threading mode.
pub struct BumpArena<'buf, M: ThreadMode = SingleThreaded> {
    storage: ArenaStorage<'buf>,
    cursor: M::Cursor,
    drops: M::Drops,
    config: ArenaConfig,
    stats: OptionalStats,
    peak_used: AtomicUsize,
    generation: u32,
    /// Serial handed to the next checkpoint
    next_serial: AtomicUsize,
    /// First serial of the current epoch
    epoch_start: usize,
    /// Serial ranges `(target, end)` discarded by restores: a checkpoint with
    /// `target < serial < end` describes state that no longer exists.
    /// Disjoint and sorted.
    discarded: Vec<(usize, usize)>,
}

// SAFETY: the multi-threaded arena owns (or exclusively borrows) plain bytes,
// its cursor is atomic, its thunk list is behind a mutex and only holds
// destructors of `T: Send` values. Nothing in it is tied to a thread.
unsafe impl Send for BumpArena<'_, MultiThreaded> {}

// SAFETY: every `&self` operation either reads immutable fields or claims a
// disjoint byte range through a CAS on the atomic cursor; `generation`,
// the discarded checkpoint ranges and the storage release paths are only
// written through `&mut self`.
unsafe impl Sync for BumpArena<'_, MultiThreaded> {}

/// Byte range claimed by one successful bump
#[derive(Clone, Copy)]
struct Reservation {
    ptr: NonNull<u8>,
    /// Cursor value before the bump, padding included
    previous: usize,
    /// Cursor value after the bump
    end: usize,
}

impl<'buf, M: ThreadMode> BumpArena<'buf, M> {
    /// Creates an arena owning `capacity` bytes with the default configuration
    pub fn new(capacity: usize) -> ArenaResult<Self> {
        Self::with_config(capacity, ArenaConfig::default())
    }

    /// Creates an arena owning `capacity` bytes
    pub fn with_config(capacity: usize, config: ArenaConfig) -> ArenaResult<Self> {
        if capacity == 0 {
            return Err(ArenaError::zero_capacity());
        }
        config.validate()?;
        let storage = ArenaStorage::allocate(capacity, config.base_align)?;
        Ok(Self::from_storage(storage, config))
    }

    /// Creates production-optimized arena
    pub fn production(capacity: usize) -> ArenaResult<Self> {
        Self::with_config(capacity, ArenaConfig::production())
    }

    /// Creates debug-optimized arena
    pub fn debug(capacity: usize) -> ArenaResult<Self> {
        Self::with_config(capacity, ArenaConfig::debug())
    }

    /// Creates an arena over a caller-supplied buffer.
    ///
    /// The buffer is never freed by the arena and can be reused once the
    /// arena is dropped.
    pub fn with_buffer(buffer: &'buf mut [MaybeUninit<u8>]) -> ArenaResult<Self> {
        Self::with_buffer_and_config(buffer, ArenaConfig::default())
    }

    /// Creates an arena over a caller-supplied buffer with a configuration.
    ///
    /// `base_align` is ignored: the buffer's own address decides the padding
    /// of the first allocation.
    pub fn with_buffer_and_config(
        buffer: &'buf mut [MaybeUninit<u8>],
        config: ArenaConfig,
    ) -> ArenaResult<Self> {
        config.validate()?;
        let storage = ArenaStorage::borrowed(buffer)?;
        Ok(Self::from_storage(storage, config))
    }

    fn from_storage(storage: ArenaStorage<'buf>, config: ArenaConfig) -> Self {
        #[cfg(feature = "logging")]
        tracing::debug!(
            mode = M::NAME,
            capacity = storage.capacity(),
            owned = storage.is_owned(),
            base_align = config.base_align,
            "arena created"
        );

        Self {
            storage,
            cursor: M::Cursor::new(0),
            drops: M::Drops::default(),
            stats: OptionalStats::new(config.track_stats),
            config,
            peak_used: AtomicUsize::new(0),
            generation: 0,
            next_serial: AtomicUsize::new(0),
            epoch_start: 0,
            discarded: Vec::new(),
        }
    }

    /// Total capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Bytes handed out in this epoch, alignment padding included
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Bytes still available
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Highest `used` value observed since construction
    #[inline]
    pub fn peak_used(&self) -> usize {
        self.peak_used.load(Ordering::Relaxed)
    }

    /// Epoch number; incremented by every reset
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of constructed values whose destructor has not run yet
    pub fn pending_drops(&self) -> usize {
        self.drops.len()
    }

    /// Whether the arena memory came from the system allocator
    pub fn owns_memory(&self) -> bool {
        self.storage.is_owned()
    }

    /// Configuration the arena was built with
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Reserves `size` uninitialised bytes aligned to `align`.
    ///
    /// Fails with [`ArenaError::InvalidArgument`] when `size` is zero or
    /// `align` is not a power of two, and with [`ArenaError::OutOfMemory`]
    /// when the arena cannot fit the request; the cursor is unchanged on
    /// failure.
    pub fn allocate(&self, size: usize, align: usize) -> ArenaResult<RawRegion<'_>> {
        validate_alignment(align)?;
        if size == 0 {
            return Err(ArenaError::invalid_argument(
                "allocation size must be greater than zero",
            ));
        }

        let reservation = self.bump(size, align)?;
        // SAFETY: the bump claimed `size` in-bounds bytes for this call alone.
        Ok(unsafe { RawRegion::new(reservation.ptr, size) })
    }

    /// Reserves uninitialised bytes for `layout`
    pub fn allocate_layout(&self, layout: Layout) -> ArenaResult<RawRegion<'_>> {
        self.allocate(layout.size(), layout.align())
    }

    /// Copies a slice of `Copy` values into the arena
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> ArenaResult<&mut [T]> {
        let layout = Layout::array::<T>(src.len())
            .map_err(|_| ArenaError::invalid_argument("slice length overflows its layout"))?;

        let dst = if layout.size() == 0 {
            NonNull::<T>::dangling()
        } else {
            self.bump(layout.size(), layout.align())?.ptr.cast::<T>()
        };

        // SAFETY: `dst` is a fresh reservation sized and aligned for
        // `src.len()` values of `T` (or dangling when that is zero bytes),
        // so it cannot overlap `src`; `T: Copy` needs no drop tracking.
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len());
            Ok(core::slice::from_raw_parts_mut(dst.as_ptr(), src.len()))
        }
    }

    /// Copies a string into the arena
    pub fn alloc_str(&self, src: &str) -> ArenaResult<&mut str> {
        let bytes = self.alloc_slice_copy(src.as_bytes())?;
        // SAFETY: the bytes were copied verbatim from a valid `str`.
        Ok(unsafe { core::str::from_utf8_unchecked_mut(bytes) })
    }

    /// Captures the current position for a later [`restore`](Self::restore)
    #[must_use = "a checkpoint is only useful if it is restored later"]
    pub fn checkpoint(&self) -> ArenaCheckpoint {
        // Thunks are pushed after their bytes are bumped, so reading the
        // thunk count first never keeps a thunk whose bytes are released.
        let drops = self.drops.len();
        ArenaCheckpoint {
            offset: self.used(),
            drops,
            generation: self.generation,
            serial: self.next_serial.fetch_add(1, Ordering::Relaxed),
            arena: self.storage.base_addr(),
        }
    }

    /// Rolls the arena back to `checkpoint`.
    ///
    /// Values constructed after the checkpoint are dropped newest-first and
    /// their bytes are returned to the arena. Restoring also discards every
    /// checkpoint taken after this one; the same checkpoint stays valid and
    /// can be restored again.
    ///
    /// A checkpoint taken before the last reset, or discarded by an earlier
    /// restore, is rejected with [`ArenaError::InvalidState`]; one taken from
    /// another arena, or ahead of the cursor, with
    /// [`ArenaError::InvalidArgument`].
    pub fn restore(&mut self, checkpoint: ArenaCheckpoint) -> ArenaResult<()> {
        if checkpoint.arena != self.storage.base_addr() {
            return Err(ArenaError::invalid_argument(
                "checkpoint belongs to a different arena",
            ));
        }
        if checkpoint.generation != self.generation || checkpoint.serial < self.epoch_start {
            return Err(ArenaError::stale_checkpoint(
                self.generation,
                checkpoint.generation,
            ));
        }
        if self.is_discarded(checkpoint.serial) {
            return Err(ArenaError::InvalidState {
                reason: "checkpoint was discarded by an earlier restore".to_string(),
            });
        }

        let current = self.used();
        if checkpoint.offset > current || checkpoint.drops > self.drops.len() {
            return Err(ArenaError::invalid_argument(
                "checkpoint is ahead of the arena",
            ));
        }

        #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
        // SAFETY: `&mut self` proves nothing constructed in this arena is borrowed.
        let dropped = unsafe { drop_list::run_until(&self.drops, checkpoint.drops) };

        if let Some(pattern) = self.config.reset_pattern {
            // SAFETY: `[checkpoint.offset, current)` is in bounds and unborrowed.
            unsafe { self.storage.fill(checkpoint.offset, current, pattern) };
        }
        self.cursor.store(checkpoint.offset, Ordering::Release);
        self.discard_after(checkpoint.serial);

        #[cfg(feature = "logging")]
        tracing::trace!(
            mode = M::NAME,
            released = current - checkpoint.offset,
            dropped,
            "arena restored to checkpoint"
        );

        Ok(())
    }

    fn is_discarded(&self, serial: usize) -> bool {
        self.discarded
            .iter()
            .any(|&(target, end)| target < serial && serial < end)
    }

    /// Discards the checkpoints issued after `target` so far
    fn discard_after(&mut self, target: usize) {
        let end = *self.next_serial.get_mut();
        // Ranges starting at or after `target` end no later than `end`, so the new
        // range covers them. Earlier ranges end at or before `target`.
        while self
            .discarded
            .last()
            .is_some_and(|&(start, _)| start >= target)
        {
            self.discarded.pop();
        }
        if target + 1 < end {
            self.discarded.push((target, end));
        }
    }

    /// Opens a scope that restores the arena when it is dropped
    pub fn scope(&mut self) -> ArenaScope<'_, 'buf, M> {
        ArenaScope::new(self)
    }

    /// Ends the current epoch.
    ///
    /// Drops every constructed value newest-first, then moves the cursor back
    /// to zero. Memory is not zeroed; it is only overwritten when a
    /// `reset_pattern` is configured.
    pub fn reset(&mut self) {
        #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
        // SAFETY: `&mut self` proves nothing constructed in this arena is borrowed.
        let dropped = unsafe { drop_list::run_until(&self.drops, 0) };

        let used = self.used();
        if let Some(pattern) = self.config.reset_pattern {
            // SAFETY: `[0, used)` is in bounds and unborrowed.
            unsafe { self.storage.fill(0, used, pattern) };
        }

        self.cursor.store(0, Ordering::Release);
        self.generation = self.generation.wrapping_add(1);
        self.epoch_start = *self.next_serial.get_mut();
        self.discarded.clear();
        self.stats.record_reset();

        #[cfg(feature = "logging")]
        tracing::trace!(
            mode = M::NAME,
            released = used,
            dropped,
            generation = self.generation,
            "arena reset"
        );
    }

    /// Snapshot of the arena's counters
    pub fn stats(&self) -> ArenaStats {
        let capacity = self.capacity();
        let used = self.used();
        let mut stats = ArenaStats {
            capacity,
            used,
            available: capacity - used,
            peak_used: self.peak_used(),
            pending_drops: self.pending_drops(),
            generation: self.generation,
            ..ArenaStats::default()
        };
        self.stats.fill(&mut stats);
        stats
    }

    fn bump(&self, size: usize, align: usize) -> ArenaResult<Reservation> {
        let base = self.storage.base_addr();
        let capacity = self.capacity();
        let backoff = Backoff::new();

        loop {
            let current = self.cursor.load(Ordering::Acquire);
            // Alignment is computed on the absolute address so that buffers
            // with a weaker base alignment still hand out aligned regions.
            let fit = align_up(base + current, align)
                .map(|addr| addr - base)
                .and_then(|start| start.checked_add(size).map(|end| (start, end)))
                .filter(|&(_, end)| end <= capacity);

            let Some((start, end)) = fit else {
                self.stats.record_failure();
                return Err(ArenaError::out_of_memory(size, align, capacity - current));
            };

            if self
                .cursor
                .compare_exchange_weak(current, end, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.stats.record_allocation();
                atomic_max(&self.peak_used, end);

                if let Some(pattern) = self.config.alloc_pattern {
                    // SAFETY: `[start, end)` was claimed by the CAS above and
                    // is not visible to anyone else yet.
                    unsafe { self.storage.fill(start, end, pattern) };
                }

                return Ok(Reservation {
                    // SAFETY: start <= end <= capacity.
                    ptr: unsafe { self.storage.ptr_at(start) },
                    previous: current,
                    end,
                });
            }
            backoff.spin();
        }
    }

    /// Hands an unused reservation back, if nothing was bumped after it
    fn rewind(&self, reservation: Reservation) -> bool {
        if let Some(pattern) = self.config.reset_pattern {
            // SAFETY: the reservation is still exclusively ours; it is poisoned
            // before the CAS can make it available to other callers.
            unsafe {
                self.storage
                    .fill(reservation.previous, reservation.end, pattern);
            }
        }

        loop {
            match self.cursor.compare_exchange_weak(
                reservation.end,
                reservation.previous,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                // Spurious failure, the cursor still sits at our end
                Err(actual) if actual == reservation.end => {}
                Err(_) => return false,
            }
        }
    }

    fn reserve_value<T>(&self) -> ArenaResult<Option<Reservation>> {
        let layout = Layout::new::<T>();
        if layout.size() == 0 {
            Ok(None)
        } else {
            self.bump(layout.size(), layout.align()).map(Some)
        }
    }

    /// Moves `value` into its slot and records its destructor
    ///
    /// # Safety
    ///
    /// `reservation` must come from `reserve_value::<T>()` on this arena and
    /// must not have been handed out or rewound.
    unsafe fn place<T: 'buf>(&self, reservation: Option<Reservation>, value: T) -> &mut T {
        let ptr = reservation.map_or(NonNull::<T>::dangling(), |r| r.ptr.cast::<T>());
        // SAFETY: the slot is sized and aligned for `T` (dangling is valid for
        // zero-sized `T`) and nobody else can reach it.
        unsafe { ptr.as_ptr().write(value) };
        if mem::needs_drop::<T>() {
            self.drops.push(DropThunk::new(ptr));
        }
        // SAFETY: initialised just above; the borrow is tied to `&self`,
        // which ends before any reset can run the destructor.
        unsafe { &mut *ptr.as_ptr() }
    }

    fn construct_value<T: 'buf>(&self, value: T) -> ArenaResult<&mut T> {
        let reservation = self.reserve_value::<T>()?;
        // SAFETY: fresh reservation for `T`.
        Ok(unsafe { self.place(reservation, value) })
    }

    fn construct_inner<T: 'buf, E>(
        &self,
        init: impl FnOnce() -> Result<T, E>,
    ) -> Result<&mut T, ConstructError<E>> {
        let reservation = self.reserve_value::<T>()?;
        let guard = RewindGuard {
            arena: self,
            reservation,
            armed: true,
        };
        let value = init().map_err(ConstructError::Init)?;
        guard.disarm();
        // SAFETY: fresh reservation for `T`, never rewound (the guard is disarmed).
        Ok(unsafe { self.place(reservation, value) })
    }
}

impl<'buf> BumpArena<'buf, SingleThreaded> {
    /// Moves `value` into the arena.
    ///
    /// Its destructor runs on the next reset, on a restore to an earlier
    /// checkpoint, or when the arena is dropped, after every value
    /// constructed later.
    pub fn construct<T: 'buf>(&self, value: T) -> ArenaResult<&mut T> {
        self.construct_value(value)
    }

    /// Reserves space, then builds the value in place.
    ///
    /// If `init` panics the reservation is handed back to the arena, unless
    /// `init` itself allocated from this arena.
    pub fn construct_with<T: 'buf, F>(&self, init: F) -> ArenaResult<&mut T>
    where
        F: FnOnce() -> T,
    {
        self.construct_inner(|| Ok::<T, Infallible>(init()))
            .map_err(ConstructError::into_arena)
    }

    /// Reserves space, then builds the value with a fallible initialiser.
    ///
    /// On `Err` (or a panic) the cursor is rewound to where it was before the
    /// call, unless `init` itself allocated from this arena; in that case the
    /// reserved bytes stay unused until the next reset.
    pub fn try_construct_with<T: 'buf, E, F>(&self, init: F) -> Result<&mut T, ConstructError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.construct_inner(init)
    }
}

impl<'buf> BumpArena<'buf, MultiThreaded> {
    /// Moves `value` into the arena.
    ///
    /// `T: Send` because the destructor runs on whichever thread resets or
    /// drops the arena.
    pub fn construct<T: Send + 'buf>(&self, value: T) -> ArenaResult<&mut T> {
        self.construct_value(value)
    }

    /// Reserves space, then builds the value in place
    pub fn construct_with<T: Send + 'buf, F>(&self, init: F) -> ArenaResult<&mut T>
    where
        F: FnOnce() -> T,
    {
        self.construct_inner(|| Ok::<T, Infallible>(init()))
            .map_err(ConstructError::into_arena)
    }

    /// Reserves space, then builds the value with a fallible initialiser.
    ///
    /// The reservation is handed back only if no other allocation landed
    /// after it in the meantime.
    pub fn try_construct_with<T: Send + 'buf, E, F>(
        &self,
        init: F,
    ) -> Result<&mut T, ConstructError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.construct_inner(init)
    }
}

/// Hands a reservation back if construction does not complete
struct RewindGuard<'r, 'buf, M: ThreadMode> {
    arena: &'r BumpArena<'buf, M>,
    reservation: Option<Reservation>,
    armed: bool,
}

impl<M: ThreadMode> RewindGuard<'_, '_, M> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<M: ThreadMode> Drop for RewindGuard<'_, '_, M> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(reservation) = self.reservation {
                self.arena.rewind(reservation);
            }
        }
    }
}

impl<M: ThreadMode> Drop for BumpArena<'_, M> {
    fn drop(&mut self) {
        #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
        // SAFETY: the arena is being dropped, so nothing borrows from it.
        let dropped = unsafe { drop_list::run_until(&self.drops, 0) };

        #[cfg(feature = "logging")]
        tracing::trace!(
            mode = M::NAME,
            capacity = self.capacity(),
            dropped,
            "arena dropped"
        );
    }
}

impl<M: ThreadMode> MemoryUsage for BumpArena<'_, M> {
    fn used_memory(&self) -> usize {
        self.used()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.available())
    }
}

impl<M: ThreadMode> fmt::Debug for BumpArena<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BumpArena")
            .field("mode", &M::NAME)
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .field("generation", &self.generation)
            .field("pending_drops", &self.pending_drops())
            .field("owns_memory", &self.owns_memory())
            .finish()
    }
}
