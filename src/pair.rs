//! Pair-like items accepted by bulk updates.
//!
//! A tuple is always a well-formed pair. Sequence rows (`Vec<T>`,
//! `Box<[T]>`) come from homogeneous sources and must hold exactly two
//! elements; anything else is reported with its observed length.

/// A row that did not have exactly two elements.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MalformedPair {
    pub len: usize,
}

/// Conversion of one bulk-update item into a key/value pair.
pub trait IntoPair<K, V> {
    fn into_pair(self) -> Result<(K, V), MalformedPair>;
}

impl<K, V> IntoPair<K, V> for (K, V) {
    #[inline]
    fn into_pair(self) -> Result<(K, V), MalformedPair> {
        Ok(self)
    }
}

impl<T> IntoPair<T, T> for [T; 2] {
    #[inline]
    fn into_pair(self) -> Result<(T, T), MalformedPair> {
        let [k, v] = self;
        Ok((k, v))
    }
}

impl<T> IntoPair<T, T> for Vec<T> {
    fn into_pair(self) -> Result<(T, T), MalformedPair> {
        let len = self.len();
        let mut it = self.into_iter();
        match (it.next(), it.next(), it.next()) {
            (Some(k), Some(v), None) => Ok((k, v)),
            _ => Err(MalformedPair { len }),
        }
    }
}

impl<T> IntoPair<T, T> for Box<[T]> {
    fn into_pair(self) -> Result<(T, T), MalformedPair> {
        self.into_vec().into_pair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuples_and_arrays_are_always_pairs() {
        assert_eq!(("a", 1).into_pair(), Ok(("a", 1)));
        assert_eq!([1, 2].into_pair(), Ok((1, 2)));
    }

    #[test]
    fn rows_need_exactly_two_elements() {
        assert_eq!(vec![1, 2].into_pair(), Ok((1, 2)));
        assert_eq!(Vec::<i32>::new().into_pair(), Err(MalformedPair { len: 0 }));
        assert_eq!(vec![1].into_pair(), Err(MalformedPair { len: 1 }));
        assert_eq!(vec![1, 2, 3].into_pair(), Err(MalformedPair { len: 3 }));
        let row: Box<[i32]> = vec![7, 8].into_boxed_slice();
        assert_eq!(row.into_pair(), Ok((7, 8)));
        let row: Box<[i32]> = vec![7].into_boxed_slice();
        assert_eq!(row.into_pair(), Err(MalformedPair { len: 1 }));
    }
}
