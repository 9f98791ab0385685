#![cfg(test)]

// Property tests for SlotTable kept inside the crate so they can use the
// collision hasher and `check_invariants` without extra exports.

use crate::error::Error;
use crate::slot_table::SlotTable;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations: indices shrink to earlier keys, the pool
// shrinks in length, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertWith(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    TakeAny,
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=40).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertWith(i, v)),
            4 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::TakeAny),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `len` equals the number of distinct keys present.
// - `get` after `insert` returns the inserted value; overwrite returns the old one.
// - `remove` returns the owned pair or `KeyNotFound`, and the key is gone afterwards.
// - After every op: power-of-two capacity, load <= 7/10, tombstone and
//   fingerprint bookkeeping consistent (`check_invariants`).
fn run_state_machine<S: BuildHasher>(
    mut sut: SlotTable<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let prev = sut.insert(k.clone(), v).expect("infallible key");
                prop_assert_eq!(prev, model.insert(k.clone(), v));
                prop_assert_eq!(sut.get(&k).expect("infallible key"), Some(&v));
            }
            OpI::InsertWith(i, v) => {
                let k = key_from(&pool, i);
                let got = *sut.get_or_insert_with(k.clone(), || v).expect("infallible key");
                prop_assert_eq!(got, *model.entry(k).or_insert(v));
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                match (sut.remove(&k), model.remove(&k)) {
                    (Ok((kk, vv)), Some(mv)) => {
                        prop_assert_eq!(kk, k.clone());
                        prop_assert_eq!(vv, mv);
                    }
                    (Err(Error::KeyNotFound), None) => {}
                    (got, want) => prop_assert!(false, "remove mismatch: {:?} vs {:?}", got, want),
                }
                prop_assert_eq!(sut.get(&k).expect("infallible key"), None);
            }
            OpI::Get(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k).expect("infallible key"), model.get(&k));
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str()).expect("infallible key");
                prop_assert_eq!(has, model.contains_key(&Key(s)));
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(v) = sut.get_mut(&k).expect("infallible key") {
                    *v = v.wrapping_add(d);
                }
                if let Some(mv) = model.get_mut(&k) {
                    *mv = mv.wrapping_add(d);
                }
            }
            OpI::TakeAny => match sut.take_any() {
                Some((k, v)) => prop_assert_eq!(model.remove(&k), Some(v)),
                None => prop_assert!(model.is_empty()),
            },
            OpI::Clear => {
                let cap = sut.capacity();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), cap);
            }
            OpI::Iterate => {
                let s: BTreeMap<Key, i32> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let m: BTreeMap<Key, i32> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s, m);
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        if let Err(e) = sut.check_invariants() {
            prop_assert!(false, "invariant violated: {}", e);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(SlotTable::new(), pool, ops)?;
    }
}

// Collision variant: every key hashes to 0, so every key shares one probe
// chain and one fingerprint. Stresses tombstone handling and equality.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(SlotTable::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Property: a resize preserves the exact set of pairs, and capacity only
// changes by doubling.
proptest! {
    #[test]
    fn prop_growth_preserves_pairs(keys in proptest::collection::hash_set(any::<u64>(), 1..300)) {
        let mut t: SlotTable<u64, u64> = SlotTable::new();
        for &k in &keys {
            let before: BTreeMap<u64, u64> = t.iter().map(|(k, v)| (*k, *v)).collect();
            let cap = t.capacity();
            t.insert(k, !k).expect("infallible key");
            if t.capacity() != cap {
                prop_assert_eq!(t.capacity(), cap * 2);
                let mut after: BTreeMap<u64, u64> = t.iter().map(|(k, v)| (*k, *v)).collect();
                after.remove(&k);
                prop_assert_eq!(after, before);
            }
        }
        prop_assert_eq!(t.len(), keys.len());
        for &k in &keys {
            prop_assert_eq!(t.get(&k).expect("infallible key"), Some(&!k));
        }
    }
}
