//! Dict: the mapping facade over `SlotTable`.
//!
//! Absent keys surface as `Error::KeyNotFound` instead of `None`, bulk
//! updates accept pair-like items (`IntoPair`), and content equality is
//! defined against any other `Dict` or a `std` `HashMap`.

use crate::error::{Error, Result};
use crate::key::TableKey;
use crate::pair::IntoPair;
use crate::slot_table::{IntoIter, Iter, IterMut, SlotTable};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use hashbrown::DefaultHashBuilder;
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone)]
pub struct Dict<K, V, S = DefaultHashBuilder> {
    table: SlotTable<K, V, S>,
}

impl<K, V> Dict<K, V> {
    pub fn new() -> Self {
        Self {
            table: SlotTable::new(),
        }
    }

    pub fn try_with_capacity(hint: usize) -> Result<Self> {
        Ok(Self {
            table: SlotTable::try_with_capacity(hint)?,
        })
    }
}

impl<K, V> Default for Dict<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Dict<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: SlotTable::with_hasher(hasher),
        }
    }

    pub fn try_with_capacity_and_hasher(hint: usize, hasher: S) -> Result<Self> {
        Ok(Self {
            table: SlotTable::try_with_capacity_and_hasher(hint, hasher)?,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }
    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    /// The engine underneath, for inspection.
    pub fn table(&self) -> &SlotTable<K, V, S> {
        &self.table
    }

    /// Remove and return one entry; `KeyNotFound` when empty.
    pub fn pop_item(&mut self) -> Result<(K, V)> {
        self.table.take_any().ok_or(Error::KeyNotFound)
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.table.iter()
    }
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.table.iter_mut()
    }
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.table.iter().map(|(k, _)| k)
    }
    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        self.table.iter().map(|(_, v)| v)
    }
    pub fn values_mut(&mut self) -> impl ExactSizeIterator<Item = &mut V> + '_ {
        self.table.iter_mut().map(|(_, v)| v)
    }
}

impl<K, V, S> Dict<K, V, S>
where
    K: TableKey,
    S: BuildHasher,
{
    pub fn contains_key<Q>(&self, q: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.table.contains_key(q)
    }

    pub fn get<Q>(&self, q: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.table.get(q)?.ok_or(Error::KeyNotFound)
    }

    /// Like `get`, but an absent key yields `default` instead of an error.
    /// Key failures still propagate.
    pub fn get_or<'a, Q>(&'a self, q: &Q, default: &'a V) -> Result<&'a V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        Ok(self.table.get(q)?.unwrap_or(default))
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Result<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.table.get_key_value(q)?.ok_or(Error::KeyNotFound)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.table.get_mut(q)?.ok_or(Error::KeyNotFound)
    }

    /// Store `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.table.insert(key, value)
    }

    /// Remove `q` and drop its key and value.
    pub fn delete<Q>(&mut self, q: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.table.remove(q).map(drop)
    }

    pub fn pop<Q>(&mut self, q: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.table.remove(q).map(|(_, v)| v)
    }

    pub fn pop_or<Q>(&mut self, q: &Q, default: V) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        match self.table.remove(q) {
            Ok((_, v)) => Ok(v),
            Err(Error::KeyNotFound) => Ok(default),
            Err(e) => Err(e),
        }
    }

    /// Return the value under `key`, storing `default` first if absent.
    pub fn set_default(&mut self, key: K, default: V) -> Result<&mut V> {
        self.table.get_or_insert_with(key, || default)
    }

    /// Copy every entry of `other` into `self`, overwriting equal keys.
    pub fn update<S2>(&mut self, other: &Dict<K, V, S2>) -> Result<()>
    where
        K: Clone,
        V: Clone,
    {
        for (k, v) in other.iter() {
            self.table.insert(k.clone(), v.clone())?;
        }
        Ok(())
    }

    /// Insert each pair-like item in order. A malformed item stops the
    /// update with `Error::Shape`; items before it stay applied.
    pub fn extend_pairs<I, T>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: IntoPair<K, V>,
    {
        for (index, item) in items.into_iter().enumerate() {
            let (k, v) = decode_pair(index, item)?;
            self.table.insert(k, v)?;
        }
        Ok(())
    }

    /// Insert named fields, converting each name into a key. Same
    /// partial-application rule as `extend_pairs`.
    pub fn extend_named<'a, I>(&mut self, fields: I) -> Result<()>
    where
        K: From<&'a str>,
        I: IntoIterator<Item = (&'a str, V)>,
    {
        self.extend_pairs(fields.into_iter().map(|(name, v)| (K::from(name), v)))
    }

    pub fn try_from_pairs<I, T>(items: I) -> Result<Self>
    where
        S: Default,
        I: IntoIterator<Item = T>,
        T: IntoPair<K, V>,
    {
        let mut dict = Self::with_hasher(S::default());
        dict.extend_pairs(items)?;
        Ok(dict)
    }

    /// Build from named fields, converting each name into a key.
    pub fn from_named<'a, I>(fields: I) -> Result<Self>
    where
        S: Default,
        K: From<&'a str>,
        I: IntoIterator<Item = (&'a str, V)>,
    {
        let mut dict = Self::with_hasher(S::default());
        dict.extend_named(fields)?;
        Ok(dict)
    }
}

pub(crate) fn decode_pair<K, V, T: IntoPair<K, V>>(index: usize, item: T) -> Result<(K, V)> {
    item.into_pair().map_err(|m| {
        debug!(index, len = m.len, "malformed pair in bulk update");
        Error::Shape { index, len: m.len }
    })
}

impl<K, Q, V, S> Index<&Q> for Dict<K, V, S>
where
    K: TableKey + Borrow<Q>,
    Q: ?Sized + TableKey,
    S: BuildHasher,
{
    type Output = V;

    /// Panics if the key is absent or its hash/equality fails.
    fn index(&self, q: &Q) -> &V {
        match self.get(q) {
            Ok(v) => v,
            Err(e) => panic!("Dict index: {e}"),
        }
    }
}

impl<K, V, S, S2> PartialEq<Dict<K, V, S2>> for Dict<K, V, S>
where
    K: TableKey,
    V: PartialEq,
    S2: BuildHasher,
{
    /// Same length and every pair of `self` present in `other`. A key
    /// failure during the comparison counts as unequal.
    fn eq(&self, other: &Dict<K, V, S2>) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| matches!(other.table.get(k), Ok(Some(ov)) if ov == v))
    }
}

impl<K, V, S> Eq for Dict<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S, S2> PartialEq<HashMap<K, V, S2>> for Dict<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S2: BuildHasher,
{
    fn eq(&self, other: &HashMap<K, V, S2>) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> fmt::Debug for Dict<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.table, f)
    }
}

impl<K, V, S> IntoIterator for Dict<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a Dict<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.table.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut Dict<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.table.iter_mut()
    }
}
