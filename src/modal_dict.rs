//! ModalDict: a `Dict` under a mutation discipline.
//!
//! The discipline is the type parameter `P: Policy`. Every mutating call
//! consults `P::MODE.permits(op)` once and returns
//! `Error::ModePolicyViolation` before the facade runs, so a rejected call
//! never changes the contents. Reads always delegate.
//!
//! Only `ModalDict<_, _, Immutable, _>` exposes a content hash and
//! implements `Hash`; frozen contents are the only ones whose hash can be
//! cached for the lifetime of the value.

use crate::dict::{decode_pair, Dict};
use crate::error::{Error, Result};
use crate::key::TableKey;
use crate::mode::{Arena, Immutable, InsertOnly, Mode, Mutable, Op, Policy, ReadOnly};
use crate::pair::IntoPair;
use crate::slot_table::{Iter, IterMut};
use core::borrow::Borrow;
use core::cell::OnceCell;
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Index;
use hashbrown::DefaultHashBuilder;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone)]
pub struct ModalDict<K, V, P = Mutable, S = DefaultHashBuilder> {
    dict: Dict<K, V, S>,
    content_hash: OnceCell<u64>,
    _policy: PhantomData<P>,
}

pub type MutableDict<K, V, S = DefaultHashBuilder> = ModalDict<K, V, Mutable, S>;
pub type ImmutableDict<K, V, S = DefaultHashBuilder> = ModalDict<K, V, Immutable, S>;
pub type ReadOnlyDict<K, V, S = DefaultHashBuilder> = ModalDict<K, V, ReadOnly, S>;
pub type InsertOnlyDict<K, V, S = DefaultHashBuilder> = ModalDict<K, V, InsertOnly, S>;
pub type ArenaDict<K, V, S = DefaultHashBuilder> = ModalDict<K, V, Arena, S>;

impl<K, V, P: Policy> ModalDict<K, V, P> {
    pub fn new() -> Self {
        Self::from_dict(Dict::new())
    }
}

impl<K, V, P: Policy> Default for ModalDict<K, V, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, P: Policy, S> ModalDict<K, V, P, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_dict(Dict::with_hasher(hasher))
    }

    /// Adopt existing contents. Construction is allowed in every mode.
    pub fn from_dict(dict: Dict<K, V, S>) -> Self {
        Self {
            dict,
            content_hash: OnceCell::new(),
            _policy: PhantomData,
        }
    }

    pub fn into_dict(self) -> Dict<K, V, S> {
        self.dict
    }

    pub fn as_dict(&self) -> &Dict<K, V, S> {
        &self.dict
    }

    pub fn mode(&self) -> Mode {
        P::MODE
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }
    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.dict.capacity()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.dict.iter()
    }
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.dict.keys()
    }
    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        self.dict.values()
    }

    fn check(&self, op: Op) -> Result<()> {
        let mode = P::MODE;
        if mode.permits(op) {
            return Ok(());
        }
        debug!(%mode, %op, "mutation rejected by mode policy");
        Err(Error::ModePolicyViolation { mode, op })
    }

    /// Mutable access to every value counts as an overwrite.
    pub fn iter_mut(&mut self) -> Result<IterMut<'_, K, V>> {
        self.check(Op::Overwrite)?;
        Ok(self.dict.iter_mut())
    }

    pub fn values_mut(&mut self) -> Result<impl ExactSizeIterator<Item = &mut V> + '_> {
        self.check(Op::Overwrite)?;
        Ok(self.dict.values_mut())
    }

    pub fn pop_item(&mut self) -> Result<(K, V)> {
        self.check(Op::Delete)?;
        self.dict.pop_item()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.check(Op::Delete)?;
        self.dict.clear();
        Ok(())
    }
}

impl<K, V, P, S> ModalDict<K, V, P, S>
where
    K: TableKey,
    P: Policy,
    S: BuildHasher,
{
    pub fn try_from_pairs<I, T>(items: I) -> Result<Self>
    where
        S: Default,
        I: IntoIterator<Item = T>,
        T: IntoPair<K, V>,
    {
        Dict::try_from_pairs(items).map(Self::from_dict)
    }

    pub fn from_named<'a, I>(fields: I) -> Result<Self>
    where
        S: Default,
        K: From<&'a str>,
        I: IntoIterator<Item = (&'a str, V)>,
    {
        Dict::from_named(fields).map(Self::from_dict)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.dict.contains_key(q)
    }

    pub fn get<Q>(&self, q: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.dict.get(q)
    }

    pub fn get_or<'a, Q>(&'a self, q: &Q, default: &'a V) -> Result<&'a V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.dict.get_or(q, default)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Result<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.dict.get_key_value(q)
    }

    /// Whether storing `key` would overwrite or insert, checked against the
    /// mode. Only looks the key up when the mode tells the two apart.
    fn check_store(&self, key: &K) -> Result<()> {
        let mode = P::MODE;
        if mode.permits(Op::Overwrite) && mode.permits(Op::Insert) {
            return Ok(());
        }
        let op = if self.dict.contains_key(key)? {
            Op::Overwrite
        } else {
            Op::Insert
        };
        self.check(op)
    }

    /// Bulk counterpart of `check_store`: the whole batch is admitted or
    /// rejected before anything is written.
    fn check_batch<'a, I>(&self, keys: I) -> Result<()>
    where
        K: 'a,
        I: IntoIterator<Item = &'a K>,
    {
        self.check(Op::Insert)?;
        if !P::MODE.permits(Op::Overwrite) {
            for k in keys {
                if self.dict.contains_key(k)? {
                    return self.check(Op::Overwrite);
                }
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.check_store(&key)?;
        self.dict.insert(key, value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.check(Op::Overwrite)?;
        self.dict.get_mut(q)
    }

    pub fn delete<Q>(&mut self, q: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.check(Op::Delete)?;
        self.dict.delete(q)
    }

    pub fn pop<Q>(&mut self, q: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.check(Op::Delete)?;
        self.dict.pop(q)
    }

    pub fn pop_or<Q>(&mut self, q: &Q, default: V) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        self.check(Op::Delete)?;
        self.dict.pop_or(q, default)
    }

    /// Reading an existing key is allowed in every mode; storing
    /// `default` under an absent key is an insert.
    pub fn set_default(&mut self, key: K, default: V) -> Result<&V> {
        if !self.dict.contains_key(&key)? {
            self.check(Op::Insert)?;
        }
        self.dict.set_default(key, default).map(|v| &*v)
    }

    pub fn update<S2>(&mut self, other: &Dict<K, V, S2>) -> Result<()>
    where
        K: Clone,
        V: Clone,
    {
        self.check_batch(other.keys())?;
        self.dict.update(other)
    }

    /// Insert pair-like items. Unrestricted modes apply items as they are
    /// decoded; restricted modes decode the whole batch first, so a
    /// malformed item or a rejected key leaves the contents unchanged.
    pub fn extend_pairs<I, T>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: IntoPair<K, V>,
    {
        let mode = P::MODE;
        if mode.permits(Op::Overwrite) && mode.permits(Op::Insert) {
            return self.dict.extend_pairs(items);
        }
        self.check(Op::Insert)?;
        let pairs = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| decode_pair(index, item))
            .collect::<Result<Vec<_>>>()?;
        self.check_batch(pairs.iter().map(|(k, _)| k))?;
        self.dict.extend_pairs(pairs)
    }

    /// Named-field form of `extend_pairs`, under the same policy rules.
    pub fn extend_named<'a, I>(&mut self, fields: I) -> Result<()>
    where
        K: From<&'a str>,
        I: IntoIterator<Item = (&'a str, V)>,
    {
        self.extend_pairs(fields.into_iter().map(|(name, v)| (K::from(name), v)))
    }
}

impl<K, V, S> ModalDict<K, V, Immutable, S>
where
    K: Hash,
    V: Hash,
{
    /// Order-independent hash of the contents, computed once and cached.
    ///
    /// Each pair is hashed with a fixed-key hasher and the per-pair hashes
    /// are summed, so the result depends neither on slot order nor on the
    /// table's own `BuildHasher`.
    pub fn content_hash(&self) -> u64 {
        *self
            .content_hash
            .get_or_init(|| content_hash_of(self.dict.iter(), self.dict.len()))
    }
}

fn content_hash_of<'a, K, V>(pairs: impl Iterator<Item = (&'a K, &'a V)>, len: usize) -> u64
where
    K: Hash + 'a,
    V: Hash + 'a,
{
    let sum = pairs.fold(0u64, |acc, (k, v)| {
        let mut h = DefaultHasher::new();
        k.hash(&mut h);
        v.hash(&mut h);
        acc.wrapping_add(h.finish())
    });
    let mut h = DefaultHasher::new();
    len.hash(&mut h);
    sum.hash(&mut h);
    h.finish()
}

impl<K, V, S> Hash for ModalDict<K, V, Immutable, S>
where
    K: Hash,
    V: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

impl<K, V, P: Policy, S> From<Dict<K, V, S>> for ModalDict<K, V, P, S> {
    fn from(dict: Dict<K, V, S>) -> Self {
        Self::from_dict(dict)
    }
}

impl<K, Q, V, P, S> Index<&Q> for ModalDict<K, V, P, S>
where
    K: TableKey + Borrow<Q>,
    Q: ?Sized + TableKey,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, q: &Q) -> &V {
        &self.dict[q]
    }
}

impl<K, V, P, S, P2, S2> PartialEq<ModalDict<K, V, P2, S2>> for ModalDict<K, V, P, S>
where
    K: TableKey,
    V: PartialEq,
    S2: BuildHasher,
{
    fn eq(&self, other: &ModalDict<K, V, P2, S2>) -> bool {
        self.dict == other.dict
    }
}

impl<K, V, P, S> Eq for ModalDict<K, V, P, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, P, S, S2> PartialEq<Dict<K, V, S2>> for ModalDict<K, V, P, S>
where
    K: TableKey,
    V: PartialEq,
    S2: BuildHasher,
{
    fn eq(&self, other: &Dict<K, V, S2>) -> bool {
        self.dict == *other
    }
}

impl<K, V, P, S, S2> PartialEq<HashMap<K, V, S2>> for ModalDict<K, V, P, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S2: BuildHasher,
{
    fn eq(&self, other: &HashMap<K, V, S2>) -> bool {
        self.dict == *other
    }
}

impl<K, V, P, S> fmt::Debug for ModalDict<K, V, P, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
    P: Policy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModalDict({:?}, mode={})", self.dict, P::MODE)
    }
}

impl<'a, K, V, P, S> IntoIterator for &'a ModalDict<K, V, P, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.iter()
    }
}
