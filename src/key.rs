//! Key contract: the hash and equality capability `SlotTable` needs.
//!
//! Both operations are fallible so that keys backed by host objects can
//! report a failed hash or comparison. The table calls them strictly
//! before it writes to any slot, so an `Err` leaves the table unchanged.
//! Every `Hash + Eq` type gets an infallible implementation for free.

use core::hash::{BuildHasher, Hash};

/// Failure raised by a key's hash or equality capability.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct KeyError(String);

impl KeyError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Hash and equality as seen by the table.
///
/// Implementations must be consistent: keys that compare equal must hash
/// equal under the same `BuildHasher`, and a borrowed form `Q` of a key
/// `K: Borrow<Q>` must hash and compare exactly like `K`.
pub trait TableKey {
    /// Hash `self` with a hasher built from `build`.
    fn table_hash<S: BuildHasher>(&self, build: &S) -> Result<u64, KeyError>;

    /// Compare `self` with a stored key.
    fn table_eq(&self, other: &Self) -> Result<bool, KeyError>;
}

impl<T> TableKey for T
where
    T: ?Sized + Hash + Eq,
{
    #[inline]
    fn table_hash<S: BuildHasher>(&self, build: &S) -> Result<u64, KeyError> {
        Ok(build.hash_one(self))
    }

    #[inline]
    fn table_eq(&self, other: &Self) -> Result<bool, KeyError> {
        Ok(self == other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::RandomState;

    #[test]
    fn blanket_impl_matches_build_hasher() {
        let s = RandomState::new();
        let k = "abc".to_string();
        assert_eq!(k.table_hash(&s), Ok(s.hash_one(&k)));
        // Borrowed form hashes identically.
        assert_eq!("abc".table_hash(&s), k.table_hash(&s));
        assert_eq!(k.table_eq(&"abc".to_string()), Ok(true));
        assert_eq!(k.table_eq(&"abd".to_string()), Ok(false));
    }

    #[test]
    fn key_error_displays_message() {
        let e = KeyError::new("unhashable type: list");
        assert_eq!(e.message(), "unhashable type: list");
        assert_eq!(e.to_string(), "unhashable type: list");
    }
}
