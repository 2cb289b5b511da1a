//! Standalone error types for epoch-arena
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.
//!
//! Allocation failures come in three flavours: a malformed request
//! ([`ArenaError::InvalidArgument`]), a system allocator that could not supply
//! the arena itself ([`ArenaError::AllocationFailure`]), and a healthy arena
//! whose cursor has reached its capacity ([`ArenaError::OutOfMemory`]).

use core::alloc::Layout;
use thiserror::Error;

// ============================================================================
// Main Error Types
// ============================================================================

/// Arena allocation errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    // --- Caller Errors ---
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // --- System Errors ---
    #[error("Arena acquisition failed: {size} bytes with {align} byte alignment")]
    AllocationFailure { size: usize, align: usize },

    // --- Arena Errors ---
    #[error(
        "Arena exhausted: requested {requested} bytes aligned to {align}, available {available}"
    )]
    OutOfMemory {
        requested: usize,
        align: usize,
        available: usize,
    },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl ArenaError {
    /// Returns `true` when the arena is healthy but full.
    ///
    /// This is the only failure where allocating from a fresh arena (or after
    /// a [`reset`](crate::BumpArena::reset)) can succeed without changing the
    /// request.
    #[must_use]
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Returns `true` for errors caused by the caller's input
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "ARENA:ARG:INVALID",
            Self::AllocationFailure { .. } => "ARENA:SYSTEM:ALLOC",
            Self::OutOfMemory { .. } => "ARENA:ALLOC:OOM",
            Self::InvalidState { .. } => "ARENA:STATE:INVALID",
            Self::InvalidConfig { .. } => "ARENA:CONFIG:INVALID",
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create invalid argument error
    pub fn invalid_argument(reason: &str) -> Self {
        Self::InvalidArgument {
            reason: reason.to_string(),
        }
    }

    /// Create invalid alignment error
    #[must_use]
    pub fn invalid_alignment(alignment: usize) -> Self {
        Self::InvalidArgument {
            reason: format!("alignment {alignment} is not a power of two"),
        }
    }

    /// Create zero capacity error
    #[must_use]
    pub fn zero_capacity() -> Self {
        Self::invalid_argument("arena capacity must be greater than zero")
    }

    /// Create arena acquisition failure
    #[must_use]
    pub fn allocation_failure(size: usize, align: usize) -> Self {
        Self::AllocationFailure { size, align }
    }

    /// Create arena acquisition failure from layout
    #[must_use]
    pub fn allocation_failure_with_layout(layout: Layout) -> Self {
        Self::allocation_failure(layout.size(), layout.align())
    }

    /// Create arena exhausted error
    #[must_use]
    pub fn out_of_memory(requested: usize, align: usize, available: usize) -> Self {
        Self::OutOfMemory {
            requested,
            align,
            available,
        }
    }

    /// Create stale checkpoint error
    #[must_use]
    pub fn stale_checkpoint(expected: u32, found: u32) -> Self {
        Self::InvalidState {
            reason: format!("stale checkpoint: arena is at generation {expected}, checkpoint is from {found}"),
        }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }
}

/// Failure of a fallible in-place construction
///
/// Either the arena could not supply storage for the value, or the
/// initialiser itself failed. In the second case the reserved storage has
/// already been handed back to the arena where possible.
#[derive(Error, Debug)]
pub enum ConstructError<E> {
    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error("value initialisation failed: {0}")]
    Init(E),
}

impl<E> ConstructError<E> {
    /// Returns the initialiser's error, if that is what failed
    pub fn into_init(self) -> Option<E> {
        match self {
            Self::Init(err) => Some(err),
            Self::Arena(_) => None,
        }
    }
}

impl ConstructError<core::convert::Infallible> {
    /// Unwraps the arena error of an initialiser that cannot fail
    pub fn into_arena(self) -> ArenaError {
        match self {
            Self::Arena(err) => err,
            Self::Init(never) => match never {},
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for arena operations
pub type ArenaResult<T> = core::result::Result<T, ArenaError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ArenaError::out_of_memory(16, 8, 8);
        assert!(error.to_string().contains("16"));
        assert!(error.is_exhaustion());
        assert!(!error.is_caller_error());
    }

    #[test]
    fn test_error_with_layout() {
        let layout = Layout::new::<u64>();
        let error = ArenaError::allocation_failure_with_layout(layout);
        assert!(error.to_string().contains(&layout.size().to_string()));
        assert_eq!(error.code(), "ARENA:SYSTEM:ALLOC");
    }

    #[test]
    fn test_exhaustion_is_distinct_from_system_failure() {
        assert!(!ArenaError::allocation_failure(64, 16).is_exhaustion());
        assert!(ArenaError::out_of_memory(64, 16, 0).is_exhaustion());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ArenaError::invalid_alignment(3).code(), "ARENA:ARG:INVALID");
        assert_eq!(ArenaError::out_of_memory(1, 1, 0).code(), "ARENA:ALLOC:OOM");
        assert_eq!(ArenaError::stale_checkpoint(2, 1).code(), "ARENA:STATE:INVALID");
        assert_eq!(ArenaError::invalid_config("x").code(), "ARENA:CONFIG:INVALID");
    }

    #[test]
    fn test_construct_error() {
        let err: ConstructError<&str> = ArenaError::zero_capacity().into();
        assert!(matches!(err, ConstructError::Arena(_)));
        assert!(err.into_init().is_none());

        let err = ConstructError::Init("bad input");
        assert_eq!(err.to_string(), "value initialisation failed: bad input");
        assert_eq!(err.into_init(), Some("bad input"));
    }
}
