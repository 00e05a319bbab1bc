//! Error types.
//!
//! Every failure is reported as an [`Error`]; nothing is folded into a
//! `false` or `None` return. A failed operation leaves the container exactly
//! as it was before the call.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::judy::JudyType;

/// Result type alias for judy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by containers and cursors.
#[derive(Debug, Error)]
pub enum Error {
    /// The key kind or value shape does not fit the container's variant.
    #[error("type mismatch: {judy_type} does not accept {found}")]
    TypeMismatch {
        /// Variant of the container the operation ran against.
        judy_type: JudyType,
        /// What the caller supplied.
        found: &'static str,
    },

    /// A string key reached the configured bound under [`KeyPolicy::Reject`](crate::KeyPolicy::Reject).
    #[error("key too long: {len} bytes, limit is {max}")]
    KeyTooLong {
        /// Length of the (NUL-trimmed) key.
        len: usize,
        /// Configured `max_key_len`.
        max: usize,
    },

    /// The backing index could not reserve memory for an insert.
    #[error("allocation failure in the backing index")]
    AllocationFailure,

    /// Current key or value was read while the cursor was not valid.
    #[error("cursor is not positioned on a present entry")]
    InvalidCursorState,

    /// A by-reference (mutating) traversal was requested.
    #[error("by-reference traversal is not supported")]
    UnsupportedTraversalMode,

    /// A raw type tag outside `1..=5`.
    #[error("not a valid judy type: {0}")]
    InvalidType(i64),

    /// Configuration rejected by [`Config::validate`](crate::Config::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every integer key up to `u64::MAX` is already present.
    #[error("no free integer key left")]
    KeySpaceExhausted,

    /// The cursor outlived the container it was bound to.
    #[error("container has been released")]
    ContainerReleased,

    /// The container was mutably borrowed while a cursor step ran.
    #[error("container is mutably borrowed")]
    ContainerBusy,
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::AllocationFailure
    }
}

impl From<smallvec::CollectionAllocErr> for Error {
    fn from(_: smallvec::CollectionAllocErr) -> Self {
        Error::AllocationFailure
    }
}

impl From<std::cell::BorrowError> for Error {
    fn from(_: std::cell::BorrowError) -> Self {
        Error::ContainerBusy
    }
}
