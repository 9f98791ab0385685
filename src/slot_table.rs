//! SlotTable: open-addressing storage with tombstones and metadata bytes.
//!
//! Layout
//! - A power-of-two array of `Slot`s: `Empty`, `Tombstone` or `Occupied`.
//! - An occupied slot keeps the key, the value, the full 64-bit hash and a
//!   one-byte fingerprint (`meta`, the top byte of the hash).
//!
//! Probing
//! - Linear: start at `hash & (capacity - 1)`, step 1, wrap. `Empty` ends a
//!   search, `Tombstone` does not. Key equality only runs when the
//!   fingerprint matches.
//! - All key code (`TableKey`) runs inside `locate`, before any slot is
//!   written. A failing hash or comparison leaves the table untouched.
//!
//! Growth
//! - Writing a new key that would push `len / capacity` above 7/10 first
//!   doubles the capacity. When live entries fit but tombstones crowd out
//!   empty slots, the table is rebuilt: at the same capacity while live
//!   entries fill at most half the bound, doubled otherwise.
//! - Rebuilds place entries by their stored hash and never call key code,
//!   so they cannot fail halfway. Allocation happens before the old slots
//!   are touched.

use crate::error::{Error, Result};
use crate::key::TableKey;
use crate::probe_guard::ProbeGuard;
use core::borrow::Borrow;
use core::fmt;
use core::hash::BuildHasher;
use core::mem;
use hashbrown::DefaultHashBuilder;
use tracing::{debug, trace};

/// Smallest slot count a table is ever allocated with.
pub const MIN_CAPACITY: usize = 16;

const MAX_LOAD_NUM: usize = 7;
const MAX_LOAD_DEN: usize = 10;

#[inline]
fn over_max_load(used: usize, capacity: usize) -> bool {
    used.saturating_mul(MAX_LOAD_DEN) > capacity.saturating_mul(MAX_LOAD_NUM)
}

#[inline]
fn meta_of(hash: u64) -> u8 {
    (hash >> 56) as u8
}

/// Slot count for a capacity hint: at least `MIN_CAPACITY`, rounded up to
/// a power of two.
fn capacity_for(hint: usize) -> Result<usize> {
    hint.max(MIN_CAPACITY)
        .checked_next_power_of_two()
        .ok_or(Error::AllocationFailure { capacity: hint })
}

/// Slot count that holds `entries` live entries within the load bound.
fn capacity_for_entries(entries: usize) -> Result<usize> {
    let slots = entries
        .checked_mul(MAX_LOAD_DEN)
        .map(|n| n.div_ceil(MAX_LOAD_NUM))
        .ok_or(Error::AllocationFailure {
            capacity: usize::MAX,
        })?;
    capacity_for(slots)
}

fn empty_slots<K, V>(capacity: usize) -> Vec<Slot<K, V>> {
    (0..capacity).map(|_| Slot::Empty).collect()
}

fn try_empty_slots<K, V>(capacity: usize) -> Result<Vec<Slot<K, V>>> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| Error::AllocationFailure { capacity })?;
    slots.resize_with(capacity, || Slot::Empty);
    trace!(capacity, "allocated slot array");
    Ok(slots)
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    meta: u8,
}

impl<K, V> Entry<K, V> {
    fn new(hash: u64, key: K, value: V) -> Self {
        Self {
            key,
            value,
            hash,
            meta: meta_of(hash),
        }
    }
}

#[derive(Debug)]
enum Slot<K, V> {
    Empty,
    Tombstone,
    Occupied(Entry<K, V>),
}

/// Outcome of walking a probe sequence.
enum Probe {
    Found(usize),
    /// Key absent; first reusable slot on the path, if any.
    Absent(Option<usize>),
}

/// Work counters checked by the amortization tests.
#[cfg(test)]
#[derive(Clone, Copy, Debug, Default)]
struct Stats {
    rebuilds: usize,
    take_scanned: usize,
}

pub struct SlotTable<K, V, S = DefaultHashBuilder> {
    hasher: S,
    slots: Vec<Slot<K, V>>,
    len: usize,
    tombstones: usize,
    /// One past the highest slot index that may be occupied.
    tail: usize,
    probe_guard: ProbeGuard,
    #[cfg(test)]
    stats: Stats,
}

impl<K, V> SlotTable<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    pub fn try_with_capacity(hint: usize) -> Result<Self> {
        Self::try_with_capacity_and_hasher(hint, DefaultHashBuilder::default())
    }
}

impl<K, V> Default for SlotTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> SlotTable<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            slots: empty_slots(MIN_CAPACITY),
            len: 0,
            tombstones: 0,
            tail: 0,
            probe_guard: ProbeGuard::new(),
            #[cfg(test)]
            stats: Stats::default(),
        }
    }

    /// Allocate `hint` slots rounded up to a power of two (minimum 16).
    pub fn try_with_capacity_and_hasher(hint: usize, hasher: S) -> Result<Self> {
        let capacity = capacity_for(hint)?;
        Ok(Self {
            hasher,
            slots: try_empty_slots(capacity)?,
            len: 0,
            tombstones: 0,
            tail: 0,
            probe_guard: ProbeGuard::new(),
            #[cfg(test)]
            stats: Stats::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn entry(&self, idx: usize) -> &Entry<K, V> {
        match &self.slots[idx] {
            Slot::Occupied(e) => e,
            _ => unreachable!("slot {idx} is not occupied"),
        }
    }

    fn entry_mut(&mut self, idx: usize) -> &mut Entry<K, V> {
        match &mut self.slots[idx] {
            Slot::Occupied(e) => e,
            _ => unreachable!("slot {idx} is not occupied"),
        }
    }

    /// First non-occupied slot on the probe path of `hash`.
    fn vacant_slot(&self, hash: u64) -> usize {
        let mask = self.mask();
        let mut idx = hash as usize & mask;
        // The load bound keeps at least one slot unoccupied.
        while matches!(self.slots[idx], Slot::Occupied(_)) {
            idx = (idx + 1) & mask;
        }
        idx
    }

    fn occupy(&mut self, idx: usize, hash: u64, key: K, value: V) {
        if matches!(self.slots[idx], Slot::Tombstone) {
            self.tombstones -= 1;
        }
        self.slots[idx] = Slot::Occupied(Entry::new(hash, key, value));
        self.len += 1;
        if idx >= self.tail {
            self.tail = idx + 1;
        }
    }

    fn vacate(&mut self, idx: usize) -> (K, V) {
        match mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Occupied(e) => {
                self.len -= 1;
                self.tombstones += 1;
                (e.key, e.value)
            }
            _ => unreachable!("slot {idx} is not occupied"),
        }
    }

    /// Replace the slot array with `new_capacity` fresh slots and re-place
    /// every live entry. On allocation failure the table is unchanged.
    fn rebuild(&mut self, new_capacity: usize) -> Result<()> {
        let fresh = try_empty_slots(new_capacity)?;
        let old = mem::replace(&mut self.slots, fresh);
        let old_capacity = old.len();
        let purged = mem::take(&mut self.tombstones);
        self.tail = 0;
        for slot in old {
            if let Slot::Occupied(e) = slot {
                let idx = self.vacant_slot(e.hash);
                self.slots[idx] = Slot::Occupied(Entry::new(e.hash, e.key, e.value));
                self.tail = self.tail.max(idx + 1);
            }
        }
        #[cfg(test)]
        {
            self.stats.rebuilds += 1;
        }
        debug!(
            old_capacity,
            new_capacity,
            len = self.len,
            purged,
            "rebuilt slot table"
        );
        Ok(())
    }

    /// Capacity to rebuild at before a new entry goes into `vacant`, if the
    /// write would otherwise break the load bound.
    fn rebuild_target(&self, vacant: Option<usize>) -> Result<Option<usize>> {
        let capacity = self.capacity();
        let doubled = || {
            capacity
                .checked_mul(2)
                .map(Some)
                .ok_or(Error::AllocationFailure {
                    capacity: usize::MAX,
                })
        };
        if over_max_load(self.len + 1, capacity) {
            return doubled();
        }
        match vacant.map(|idx| &self.slots[idx]) {
            Some(Slot::Tombstone) => Ok(None),
            Some(_) if !over_max_load(self.len + self.tombstones + 1, capacity) => Ok(None),
            // Tombstones crowd out empty slots. Purging in place is only
            // worth it while live entries fill at most half the bound;
            // that leaves a capacity-proportional run of inserts before
            // the next purge.
            _ if !over_max_load((self.len + 1).saturating_mul(2), capacity) => Ok(Some(capacity)),
            _ => doubled(),
        }
    }

    /// Write a key known to be absent. Returns the slot it landed in.
    fn insert_absent(&mut self, hash: u64, vacant: Option<usize>, key: K, value: V) -> Result<usize> {
        let idx = match self.rebuild_target(vacant)? {
            Some(capacity) => {
                self.rebuild(capacity)?;
                self.vacant_slot(hash)
            }
            None => vacant.unwrap_or_else(|| self.vacant_slot(hash)),
        };
        self.occupy(idx, hash, key, value);
        Ok(idx)
    }

    /// Make room for `additional` more entries without further growth.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let wanted = self
            .len
            .checked_add(additional)
            .ok_or(Error::AllocationFailure {
                capacity: usize::MAX,
            })?;
        let capacity = capacity_for_entries(wanted)?;
        if capacity > self.capacity() {
            self.rebuild(capacity)?;
        }
        Ok(())
    }

    /// Remove and return one live entry. Which one is unspecified.
    ///
    /// Scans down from `tail` and leaves `tail` at the slot it emptied, so
    /// draining a table visits each slot once.
    pub fn take_any(&mut self) -> Option<(K, V)> {
        let found = self.slots[..self.tail]
            .iter()
            .rposition(|s| matches!(s, Slot::Occupied(_)));
        #[cfg(test)]
        {
            self.stats.take_scanned += self.tail - found.unwrap_or(0);
        }
        match found {
            Some(idx) => {
                self.tail = idx;
                Some(self.vacate(idx))
            }
            None => {
                self.tail = 0;
                None
            }
        }
    }

    /// Drop every entry and reset all slots to `Empty`. Capacity is kept.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::Empty;
        }
        trace!(capacity = self.slots.len(), dropped = self.len, "cleared slot table");
        self.len = 0;
        self.tombstones = 0;
        self.tail = 0;
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.len,
        }
    }

    /// Verify structural invariants. Intended for tests and debugging.
    pub fn check_invariants(&self) -> core::result::Result<(), String> {
        let capacity = self.capacity();
        if !capacity.is_power_of_two() || capacity < MIN_CAPACITY {
            return Err(format!("capacity {capacity} is not a power of two >= {MIN_CAPACITY}"));
        }
        if over_max_load(self.len, capacity) {
            return Err(format!("load {}/{capacity} exceeds 7/10", self.len));
        }
        let mut live = 0;
        let mut dead = 0;
        for (idx, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Empty => {}
                Slot::Tombstone => dead += 1,
                Slot::Occupied(e) => {
                    live += 1;
                    if idx >= self.tail {
                        return Err(format!("slot {idx} is occupied above tail {}", self.tail));
                    }
                    if e.meta != meta_of(e.hash) {
                        return Err(format!("slot {idx}: fingerprint does not match hash"));
                    }
                }
            }
        }
        if live != self.len {
            return Err(format!("len {} but {live} occupied slots", self.len));
        }
        if dead != self.tombstones {
            return Err(format!("{} tombstones recorded, {dead} found", self.tombstones));
        }
        Ok(())
    }
}

impl<K, V, S> SlotTable<K, V, S>
where
    K: TableKey,
    S: BuildHasher,
{
    fn probe<Q>(&self, hash: u64, q: &Q) -> Result<Probe>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        let mask = self.mask();
        let meta = meta_of(hash);
        let mut idx = hash as usize & mask;
        let mut reusable = None;
        for _ in 0..self.slots.len() {
            match &self.slots[idx] {
                Slot::Empty => return Ok(Probe::Absent(Some(reusable.unwrap_or(idx)))),
                Slot::Tombstone => {
                    reusable.get_or_insert(idx);
                }
                Slot::Occupied(e) => {
                    if e.meta == meta && q.table_eq(e.key.borrow())? {
                        return Ok(Probe::Found(idx));
                    }
                }
            }
            idx = (idx + 1) & mask;
        }
        Ok(Probe::Absent(reusable))
    }

    /// Hash `q` and walk its probe sequence. The only place key code runs.
    fn locate<Q>(&self, q: &Q) -> Result<(u64, Probe)>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        let _probing = self.probe_guard.begin();
        let hash = q.table_hash(&self.hasher)?;
        let probe = self.probe(hash, q)?;
        Ok((hash, probe))
    }

    fn find_index<Q>(&self, q: &Q) -> Result<Option<usize>>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        match self.locate(q)?.1 {
            Probe::Found(idx) => Ok(Some(idx)),
            Probe::Absent(_) => Ok(None),
        }
    }

    pub fn contains_key<Q>(&self, q: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        Ok(self.find_index(q)?.is_some())
    }

    pub fn get<Q>(&self, q: &Q) -> Result<Option<&V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        Ok(self.find_index(q)?.map(|idx| &self.entry(idx).value))
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Result<Option<(&K, &V)>>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        Ok(self.find_index(q)?.map(|idx| {
            let e = self.entry(idx);
            (&e.key, &e.value)
        }))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Result<Option<&mut V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        let idx = self.find_index(q)?;
        Ok(idx.map(move |idx| &mut self.entry_mut(idx).value))
    }

    /// Store `value` under `key`. An equal key already present keeps its
    /// slot and its original key object; the replaced value is returned.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let (hash, probe) = self.locate(&key)?;
        match probe {
            Probe::Found(idx) => Ok(Some(mem::replace(&mut self.entry_mut(idx).value, value))),
            Probe::Absent(vacant) => {
                self.insert_absent(hash, vacant, key, value)?;
                Ok(None)
            }
        }
    }

    /// Return the value under `key`, inserting `default()` first if absent.
    /// `default` only runs when the key is inserted.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> Result<&mut V>
    where
        F: FnOnce() -> V,
    {
        let (hash, probe) = self.locate(&key)?;
        let idx = match probe {
            Probe::Found(idx) => idx,
            Probe::Absent(vacant) => self.insert_absent(hash, vacant, key, default())?,
        };
        Ok(&mut self.entry_mut(idx).value)
    }

    /// Remove `q`, leaving a tombstone in its slot.
    pub fn remove<Q>(&mut self, q: &Q) -> Result<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + TableKey,
    {
        match self.locate(q)?.1 {
            Probe::Found(idx) => Ok(self.vacate(idx)),
            Probe::Absent(_) => Err(Error::KeyNotFound),
        }
    }
}

impl<K, V, S> Clone for SlotTable<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    /// Fresh slot array of the same capacity; tombstones are not carried over.
    fn clone(&self) -> Self {
        let mut out = Self {
            hasher: self.hasher.clone(),
            slots: empty_slots(self.capacity()),
            len: self.len,
            tombstones: 0,
            tail: 0,
            probe_guard: ProbeGuard::new(),
            #[cfg(test)]
            stats: Stats::default(),
        };
        for slot in &self.slots {
            if let Slot::Occupied(e) = slot {
                let idx = out.vacant_slot(e.hash);
                out.slots[idx] = Slot::Occupied(Entry::new(e.hash, e.key.clone(), e.value.clone()));
                out.tail = out.tail.max(idx + 1);
            }
        }
        out
    }
}

impl<K, V, S> fmt::Debug for SlotTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over live entries of a `SlotTable`.
pub struct Iter<'a, K, V> {
    slots: core::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Slot::Occupied(e) = slot {
                self.remaining -= 1;
                return Some((&e.key, &e.value));
            }
        }
        None
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Iterator over live entries with mutable values.
pub struct IterMut<'a, K, V> {
    slots: core::slice::IterMut<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Slot::Occupied(Entry { key, value, .. }) = slot {
                self.remaining -= 1;
                return Some((&*key, value));
            }
        }
        None
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// Owning iterator; drains the table.
pub struct IntoIter<K, V> {
    slots: std::vec::IntoIter<Slot<K, V>>,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Slot::Occupied(e) = slot {
                self.remaining -= 1;
                return Some((e.key, e.value));
            }
        }
        None
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V, S> IntoIterator for SlotTable<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            remaining: self.len,
            slots: self.slots.into_iter(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a SlotTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut SlotTable<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
