//! # epoch-arena
//!
//! Fixed-capacity bump arenas for values that share one lifetime.
//!
//! An arena reserves one contiguous block up front and serves every request
//! by advancing an offset through it. Nothing is freed individually: the
//! whole epoch is released at once by a reset, a checkpoint restore or by
//! dropping the arena.
//!
//! - [`PoolAllocator`] - single-threaded arena with a `Cell` cursor
//! - [`ConcurrentPoolAllocator`] - `Send + Sync` arena advanced by compare-and-swap
//! - `construct` - typed values whose destructors run newest-first
//! - [`ArenaCheckpoint`] / [`ArenaScope`] - partial rollback within an epoch
//!
//! ## Quick Start
//!
//! ```rust
//! use epoch_arena::prelude::*;
//!
//! let mut arena = PoolAllocator::new(4096)?;
//!
//! let header = arena.allocate(16, 8)?.fill(0);
//! assert_eq!(header.len(), 16);
//!
//! let name = arena.construct(String::from("frame-1"))?;
//! name.push_str("-done");
//! assert_eq!(arena.pending_drops(), 1);
//!
//! // Drops the String and hands every byte back
//! arena.reset();
//! assert_eq!(arena.used(), 0);
//! # Ok::<(), ArenaError>(())
//! ```
//!
//! ## Features
//!
//! - `logging`: structured `tracing` events for arena lifecycle (create,
//!   reset, restore, drop). Allocation paths never log.
//!
//! ## Configuration
//!
//! [`ArenaConfig`] controls base alignment, debug fill patterns and
//! counters; [`ArenaConfig::from_env`] reads the `EPOCH_ARENA_*` variables.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![allow(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Precision loss in usize -> f64 casts is acceptable for stats
#![allow(clippy::cast_precision_loss)]
// Explicit lifetimes are clearer in arena code even when elidable
#![allow(clippy::elidable_lifetime_names)]
#![allow(clippy::return_self_not_must_use)]
// Arena handouts are `&mut` borrows carved out of `&self`
#![allow(clippy::mut_from_ref)]

// Error types
pub mod error;

// Core modules
pub mod arena;
pub mod checkpoint;
pub mod config;
#[doc(hidden)]
pub mod cursor;
#[doc(hidden)]
pub mod drop_list;
pub mod mode;
pub mod region;
pub mod stats;
mod storage;
pub mod traits;
pub mod utils;

// Re-export core types for convenience
pub use crate::arena::{BumpArena, ConcurrentPoolAllocator, PoolAllocator};
pub use crate::checkpoint::{ArenaCheckpoint, ArenaScope};
pub use crate::config::ArenaConfig;
pub use crate::error::{ArenaError, ArenaResult, ConstructError};
pub use crate::mode::{MultiThreaded, SingleThreaded, ThreadMode};
pub use crate::region::RawRegion;
pub use crate::stats::ArenaStats;
pub use crate::traits::MemoryUsage;

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::arena::{BumpArena, ConcurrentPoolAllocator, PoolAllocator};
    pub use crate::checkpoint::{ArenaCheckpoint, ArenaScope};
    pub use crate::config::ArenaConfig;
    pub use crate::error::{ArenaError, ArenaResult, ConstructError};
    pub use crate::mode::{MultiThreaded, SingleThreaded, ThreadMode};
    pub use crate::region::RawRegion;
    pub use crate::stats::ArenaStats;
    pub use crate::traits::MemoryUsage;
}
