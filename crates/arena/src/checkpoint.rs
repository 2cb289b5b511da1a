//! Checkpoints and scoped rollback for bump arenas

use core::fmt;
use core::ops::Deref;

use crate::arena::BumpArena;
use crate::error::ArenaResult;
use crate::mode::ThreadMode;

/// Saved arena position.
///
/// Only valid for the arena and the epoch it was taken in, and only until
/// the arena is restored to an earlier checkpoint; restoring it after any of
/// those is rejected.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ArenaCheckpoint {
    pub(crate) offset: usize,
    pub(crate) drops: usize,
    pub(crate) generation: u32,
    /// Issue order within the arena; restores discard later serials
    pub(crate) serial: usize,
    /// Base address of the arena, identifies it while it is alive
    pub(crate) arena: usize,
}

impl ArenaCheckpoint {
    /// Offset the arena will return to
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Epoch the checkpoint was taken in
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaCheckpoint")
            .field("offset", &self.offset)
            .field("drops", &self.drops)
            .field("generation", &self.generation)
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// RAII rollback guard returned by [`BumpArena::scope`].
///
/// Everything allocated or constructed through the scope is released when it
/// is dropped, unless [`commit`](Self::commit) is called first.
///
/// ```
/// use epoch_arena::PoolAllocator;
///
/// let mut arena = PoolAllocator::production(256)?;
/// arena.allocate(16, 8)?;
/// {
///     let scope = arena.scope();
///     scope.allocate(64, 8)?;
///     assert_eq!(scope.used(), 80);
/// }
/// assert_eq!(arena.used(), 16);
/// # Ok::<(), epoch_arena::ArenaError>(())
/// ```
#[must_use = "the scope rolls the arena back as soon as it is dropped"]
pub struct ArenaScope<'a, 'buf, M: ThreadMode> {
    arena: &'a mut BumpArena<'buf, M>,
    checkpoint: ArenaCheckpoint,
    active: bool,
}

impl<'a, 'buf, M: ThreadMode> ArenaScope<'a, 'buf, M> {
    pub(crate) fn new(arena: &'a mut BumpArena<'buf, M>) -> Self {
        let checkpoint = arena.checkpoint();
        Self {
            arena,
            checkpoint,
            active: true,
        }
    }

    /// Checkpoint the scope rolls back to
    pub fn checkpoint(&self) -> ArenaCheckpoint {
        self.checkpoint
    }

    /// Rolls back now and keeps the scope open
    pub fn rollback(&mut self) -> ArenaResult<()> {
        self.arena.restore(self.checkpoint)
    }

    /// Opens a nested scope
    pub fn nested(&mut self) -> ArenaScope<'_, 'buf, M> {
        ArenaScope::new(self.arena)
    }

    /// Keeps everything allocated in the scope
    pub fn commit(mut self) {
        self.active = false;
    }
}

impl<'buf, M: ThreadMode> Deref for ArenaScope<'_, 'buf, M> {
    type Target = BumpArena<'buf, M>;

    fn deref(&self) -> &Self::Target {
        self.arena
    }
}

impl<M: ThreadMode> Drop for ArenaScope<'_, '_, M> {
    fn drop(&mut self) {
        if self.active {
            // Cannot fail: the arena was exclusively borrowed since the
            // checkpoint, so no reset or foreign restore happened in between.
            let _ = self.arena.restore(self.checkpoint);
        }
    }
}

impl<M: ThreadMode> fmt::Debug for ArenaScope<'_, '_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaScope")
            .field("checkpoint", &self.checkpoint)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
