//! Threading modes for [`BumpArena`](crate::BumpArena)
//!
//! The mode picks the cursor and the thunk list an arena is built from.
//! It is a sealed trait: only the two modes below exist.

use crate::cursor::{AtomicCursor, CellCursor, Cursor};
use crate::drop_list::{DropRegistry, LocalDropList, SharedDropList};

mod private {
    pub trait Sealed {}

    impl Sealed for super::SingleThreaded {}
    impl Sealed for super::MultiThreaded {}
}

/// Selects how an arena synchronises its cursor and pending destructors
pub trait ThreadMode: private::Sealed + 'static {
    #[doc(hidden)]
    type Cursor: Cursor;
    #[doc(hidden)]
    type Drops: DropRegistry;

    /// Human-readable mode name, used in logs and `Debug` output
    const NAME: &'static str;
}

/// Plain `Cell` cursor; the arena is neither `Send` nor `Sync`
#[derive(Debug, Clone, Copy)]
pub enum SingleThreaded {}

/// CAS-advanced atomic cursor; the arena is `Send + Sync`
#[derive(Debug, Clone, Copy)]
pub enum MultiThreaded {}

impl ThreadMode for SingleThreaded {
    type Cursor = CellCursor;
    type Drops = LocalDropList;

    const NAME: &'static str = "single-threaded";
}

impl ThreadMode for MultiThreaded {
    type Cursor = AtomicCursor;
    type Drops = SharedDropList;

    const NAME: &'static str = "multi-threaded";
}
