//! # Allocator Error Types
//!
//! One error type for all three allocators. Exhaustion is always reported to
//! the caller, never turned into an abort.

use thiserror::Error;

/// Errors that can occur in the region allocators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// No free chunk or block of the requested size is available.
    #[error("allocator exhausted: no free block for {requested} bytes")]
    Exhausted {
        /// Bytes requested by the caller.
        requested: usize,
    },

    /// The stack arena does not have room for the object and its header.
    #[error("arena capacity exceeded: need {requested} bytes, {remaining} remaining")]
    CapacityExceeded {
        /// Bytes the allocation needs, padding and header included.
        requested: usize,
        /// Bytes left in the arena.
        remaining: usize,
    },

    /// A buddy request is larger than the whole arena.
    #[error("request of {requested} bytes exceeds the {max} byte arena")]
    RequestTooLarge {
        /// Bytes requested by the caller.
        requested: usize,
        /// Size of the arena.
        max: usize,
    },

    /// A pool or arena was configured with zero capacity.
    #[error("capacity must be greater than zero")]
    InvalidCapacity,

    /// Buddy level exponents out of the supported range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The object type needs a stricter alignment than the arena provides.
    #[error("alignment {align} exceeds the arena alignment of {max}")]
    UnsupportedAlignment {
        /// Alignment required by the type.
        align: usize,
        /// Alignment of the arena base.
        max: usize,
    },

    /// A stack arena is already alive on this thread.
    #[error("a stack arena already exists on this thread")]
    ArenaAlreadyCreated,

    /// Pool handle is out of range or refers to a free chunk.
    #[error("invalid pool handle: chunk {index} is not live")]
    InvalidHandle {
        /// Chunk index carried by the handle.
        index: usize,
    },

    /// Buddy free of an offset that is not an allocated block of that size.
    #[error("invalid free at offset {offset}")]
    InvalidFree {
        /// Offset passed to `free`.
        offset: usize,
    },

    /// Internal bookkeeping disagrees with itself.
    #[error("allocator state corrupted: {0}")]
    Corrupted(String),
}

impl AllocError {
    /// Returns true for the errors a frame loop can ride out by allocating
    /// less this frame.
    #[must_use]
    pub const fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::Exhausted { .. } | Self::CapacityExceeded { .. }
        )
    }
}

/// Result type for allocator operations.
pub type AllocResult<T> = Result<T, AllocError>;
