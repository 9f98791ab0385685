use proptest::prelude::*;
use slot_dict::{Dict, Error, ImmutableDict, InsertOnlyDict, ModalDict, Mode, Op};
use std::collections::HashMap;

// Facade operations against a std HashMap model. Keys come from a small
// range so that overwrites, misses and tombstone reuse all happen often.
#[derive(Clone, Debug)]
enum DictOp {
    Set(u8, i64),
    Delete(u8),
    Pop(u8),
    PopOr(u8, i64),
    SetDefault(u8, i64),
    PopItem,
    Update(Vec<(u8, i64)>),
}

fn arb_op() -> impl Strategy<Value = DictOp> {
    let k = 0u8..48;
    prop_oneof![
        6 => (k.clone(), any::<i64>()).prop_map(|(k, v)| DictOp::Set(k, v)),
        3 => k.clone().prop_map(DictOp::Delete),
        2 => k.clone().prop_map(DictOp::Pop),
        1 => (k.clone(), any::<i64>()).prop_map(|(k, v)| DictOp::PopOr(k, v)),
        2 => (k.clone(), any::<i64>()).prop_map(|(k, v)| DictOp::SetDefault(k, v)),
        1 => Just(DictOp::PopItem),
        1 => proptest::collection::vec((k, any::<i64>()), 0..8).prop_map(DictOp::Update),
    ]
}

proptest! {
    #[test]
    fn prop_dict_matches_std(ops in proptest::collection::vec(arb_op(), 1..200)) {
        let mut d: Dict<u8, i64> = Dict::new();
        let mut model: HashMap<u8, i64> = HashMap::new();

        for op in ops {
            match op {
                DictOp::Set(k, v) => {
                    prop_assert_eq!(d.insert(k, v).unwrap(), model.insert(k, v));
                    prop_assert_eq!(d.get(&k), Ok(&v));
                }
                DictOp::Delete(k) => {
                    let expected = if model.remove(&k).is_some() { Ok(()) } else { Err(Error::KeyNotFound) };
                    prop_assert_eq!(d.delete(&k), expected);
                    prop_assert_eq!(d.get(&k), Err(Error::KeyNotFound));
                }
                DictOp::Pop(k) => {
                    prop_assert_eq!(d.pop(&k), model.remove(&k).ok_or(Error::KeyNotFound));
                }
                DictOp::PopOr(k, default) => {
                    prop_assert_eq!(d.pop_or(&k, default), Ok(model.remove(&k).unwrap_or(default)));
                }
                DictOp::SetDefault(k, v) => {
                    let got = *d.set_default(k, v).unwrap();
                    prop_assert_eq!(got, *model.entry(k).or_insert(v));
                }
                DictOp::PopItem => match d.pop_item() {
                    Ok((k, v)) => prop_assert_eq!(model.remove(&k), Some(v)),
                    Err(e) => {
                        prop_assert_eq!(e, Error::KeyNotFound);
                        prop_assert!(model.is_empty());
                    }
                },
                DictOp::Update(pairs) => {
                    let src: Dict<u8, i64> = Dict::try_from_pairs(pairs.clone()).unwrap();
                    d.update(&src).unwrap();
                    // Later duplicates in the source win, as with repeated sets.
                    model.extend(pairs);
                }
            }

            prop_assert_eq!(d.len(), model.len());
            prop_assert!(d.capacity().is_power_of_two());
            prop_assert!(d.len() * 10 <= d.capacity() * 7);
            if let Err(e) = d.table().check_invariants() {
                prop_assert!(false, "invariant violated: {}", e);
            }
        }
        prop_assert!(d == model);
    }
}

proptest! {
    // Equal contents hash equal, whatever the insertion order or history.
    #[test]
    fn prop_content_hash_is_order_independent(
        pairs in proptest::collection::hash_map(any::<u16>(), any::<u32>(), 0..64),
        extra in proptest::collection::vec(any::<u16>(), 0..16),
    ) {
        let forward: Vec<(u16, u32)> = pairs.iter().map(|(k, v)| (*k, *v)).collect();
        let a: ImmutableDict<u16, u32> = ModalDict::try_from_pairs(forward.clone()).unwrap();

        // Same contents, reversed order, with transient keys added and removed.
        let mut src: Dict<u16, u32> = Dict::new();
        for k in &extra {
            if !pairs.contains_key(k) {
                src.insert(*k, 0).unwrap();
            }
        }
        for (k, v) in forward.iter().rev() {
            src.insert(*k, *v).unwrap();
        }
        for k in &extra {
            if !pairs.contains_key(k) {
                let _ = src.delete(k);
            }
        }
        let b: ImmutableDict<u16, u32> = ModalDict::from_dict(src);

        prop_assert!(a == b);
        prop_assert_eq!(a.content_hash(), b.content_hash());
        prop_assert_eq!(a.content_hash(), a.content_hash());
    }
}

proptest! {
    // InsertOnly: setting an existing key leaves the value and signals a
    // violation; absent keys go in.
    #[test]
    fn prop_insert_only_never_overwrites(
        ops in proptest::collection::vec((0u8..16, any::<i32>()), 1..100),
    ) {
        let mut d: InsertOnlyDict<u8, i32> = ModalDict::new();
        let mut model: HashMap<u8, i32> = HashMap::new();
        for (k, v) in ops {
            match model.get(&k) {
                Some(&old) => {
                    prop_assert_eq!(
                        d.insert(k, v),
                        Err(Error::ModePolicyViolation { mode: Mode::InsertOnly, op: Op::Overwrite })
                    );
                    prop_assert_eq!(d.get(&k), Ok(&old));
                }
                None => {
                    prop_assert_eq!(d.insert(k, v), Ok(None));
                    model.insert(k, v);
                }
            }
            prop_assert_eq!(d.len(), model.len());
        }
        prop_assert!(d == model);
    }
}
