//! Crate-wide error type.

use crate::key::KeyError;
use crate::mode::{Mode, Op};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The key is absent and no default was supplied.
    #[error("key not found")]
    KeyNotFound,

    /// A bulk source yielded an item that is not a 2-element pair.
    #[error("malformed pair at position {index}: expected 2 elements, found {len}")]
    Shape { index: usize, len: usize },

    /// The active mode does not allow this mutation.
    #[error("{op} is not permitted in {mode} mode")]
    ModePolicyViolation { mode: Mode, op: Op },

    /// Slot storage could not be allocated. Any previous table is intact.
    #[error("failed to allocate table storage for {capacity} slots")]
    AllocationFailure { capacity: usize },

    /// The key's hash or equality capability failed.
    #[error("key hash or equality failed: {0}")]
    Key(#[from] KeyError),

    #[error("unsupported mode {0:?}, expected one of: mutable, immutable, readonly, insert, arena")]
    UnknownMode(String),
}
