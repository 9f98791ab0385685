use slot_dict::{
    ArenaDict, Dict, Error, ImmutableDict, InsertOnlyDict, KeyError, ModalDict, Mode, MutableDict,
    Op, Policy, ReadOnlyDict, TableKey,
};
use std::cell::Cell;
use std::collections::HashSet;
use std::hash::BuildHasher;
use std::rc::Rc;

/// Key whose hash fails while its switch is on.
#[derive(Clone, Debug)]
struct Switched {
    id: u32,
    broken: Rc<Cell<bool>>,
}

impl TableKey for Switched {
    fn table_hash<S: BuildHasher>(&self, build: &S) -> Result<u64, KeyError> {
        if self.broken.get() {
            return Err(KeyError::new("unhashable key"));
        }
        Ok(build.hash_one(self.id))
    }
    fn table_eq(&self, other: &Self) -> Result<bool, KeyError> {
        Ok(self.id == other.id)
    }
}

fn good(id: u32) -> Switched {
    Switched {
        id,
        broken: Rc::new(Cell::new(false)),
    }
}

fn bad(id: u32) -> Switched {
    Switched {
        id,
        broken: Rc::new(Cell::new(true)),
    }
}

fn key_failure() -> Error {
    Error::Key(KeyError::new("unhashable key"))
}

fn contents<P: Policy>(d: &ModalDict<Switched, i32, P>) -> Vec<(u32, i32)> {
    let mut v: Vec<(u32, i32)> = d.iter().map(|(k, v)| (k.id, *v)).collect();
    v.sort();
    v
}

#[test]
fn immutable_set_is_a_violation_and_hash_is_stable() {
    let mut d: ImmutableDict<String, i32> = ModalDict::from_named([("a", 1), ("b", 2)]).unwrap();
    let err = d.insert("a".to_string(), 3).unwrap_err();
    assert_eq!(
        err,
        Error::ModePolicyViolation {
            mode: Mode::Immutable,
            op: Op::Overwrite
        }
    );
    assert_eq!(err.to_string(), "overwrite is not permitted in immutable mode");
    let h1 = d.content_hash();
    let h2 = d.content_hash();
    assert_eq!(h1, h2);
}

#[test]
fn insert_only_keeps_existing_value() {
    let mut d: InsertOnlyDict<String, i32> = ModalDict::from_named([("a", 1)]).unwrap();
    assert!(matches!(
        d.insert("a".to_string(), 2),
        Err(Error::ModePolicyViolation {
            mode: Mode::InsertOnly,
            op: Op::Overwrite
        })
    ));
    assert_eq!(d.get("a"), Ok(&1));
}

#[test]
fn equal_contents_hash_equal() {
    let a: ImmutableDict<u32, String> =
        ModalDict::try_from_pairs((0..30).map(|i| (i, i.to_string()))).unwrap();
    let mut src: Dict<u32, String> = Dict::new();
    for i in (0..30).rev() {
        src.insert(i, i.to_string()).unwrap();
    }
    // Churn leaves tombstones behind; contents end up the same.
    src.insert(100, String::new()).unwrap();
    src.delete(&100).unwrap();
    let b: ImmutableDict<u32, String> = src.into();
    assert_eq!(a, b);
    assert_eq!(a.content_hash(), b.content_hash());

    let set: HashSet<ImmutableDict<u32, String>> = [a, b].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn readonly_allows_reads_only() {
    let mut d: ReadOnlyDict<&str, i32> = ModalDict::try_from_pairs([("k", 1)]).unwrap();
    assert_eq!(d.get(&"k"), Ok(&1));
    assert_eq!(d.get_or(&"missing", &0), Ok(&0));
    assert!(d.contains_key(&"k").unwrap());
    assert_eq!(d.iter().count(), 1);
    assert!(d.insert("n", 2).is_err());
    assert!(d.pop(&"k").is_err());
    assert!(d.clear().is_err());
    assert_eq!(d.len(), 1);
}

#[test]
fn arena_behaves_as_mutable() {
    let mut a: ArenaDict<&str, i32> = ModalDict::new();
    let mut m: MutableDict<&str, i32> = ModalDict::new();
    a.insert("x", 1).unwrap();
    m.insert("x", 1).unwrap();
    a.insert("x", 2).unwrap();
    m.insert("x", 2).unwrap();
    assert_eq!(a.pop_or(&"y", 0), Ok(0));
    assert_eq!(m.pop_or(&"y", 0), Ok(0));
    assert!(a == m);
    assert_eq!(a.mode(), Mode::Arena);
}

#[test]
fn modes_parse_from_names() {
    assert_eq!("insert".parse::<Mode>(), Ok(Mode::InsertOnly));
    assert_eq!("readonly".parse::<Mode>(), Ok(Mode::ReadOnly));
    let err = "frozen".parse::<Mode>().unwrap_err();
    assert_eq!(err, Error::UnknownMode("frozen".to_string()));
}

#[test]
fn into_dict_lifts_the_policy() {
    let frozen: ImmutableDict<&str, i32> = ModalDict::try_from_pairs([("a", 1)]).unwrap();
    let mut d = frozen.into_dict();
    d.insert("a", 2).unwrap();
    let thawed: MutableDict<&str, i32> = d.into();
    assert_eq!(thawed[&"a"], 2);
}

#[test]
fn failing_key_leaves_insert_only_dict_untouched() {
    // 11 entries in 16 slots: one more new key would grow the table.
    let mut d: InsertOnlyDict<Switched, i32> =
        ModalDict::try_from_pairs((0..11u32).map(|i| (good(i), i as i32))).unwrap();
    let before = contents(&d);
    assert_eq!(d.capacity(), 16);

    assert_eq!(d.insert(bad(50), 0), Err(key_failure()));
    assert_eq!(d.set_default(bad(51), 0), Err(key_failure()));
    assert_eq!(
        d.extend_pairs([(good(60), 60), (bad(61), 61)]),
        Err(key_failure())
    );

    // Hashable while the source was built, failing by the time it is merged.
    let flip = Rc::new(Cell::new(false));
    let mut src: Dict<Switched, i32> = Dict::new();
    src.insert(good(70), 70).unwrap();
    src.insert(
        Switched {
            id: 71,
            broken: flip.clone(),
        },
        71,
    )
    .unwrap();
    flip.set(true);
    assert_eq!(d.update(&src), Err(key_failure()));

    assert_eq!(contents(&d), before);
    assert_eq!(d.capacity(), 16);
    assert_eq!(d.insert(good(11), 11), Ok(None));
}

#[test]
fn failing_key_in_mutable_bulk_keeps_prefix() {
    let mut d: MutableDict<Switched, i32> = ModalDict::new();
    assert_eq!(d.insert(bad(1), 1), Err(key_failure()));
    assert!(d.is_empty());
    assert_eq!(
        d.extend_pairs([(good(2), 2), (bad(3), 3), (good(4), 4)]),
        Err(key_failure())
    );
    assert_eq!(contents(&d), vec![(2, 2)]);
    assert_eq!(d.pop(&bad(2)), Err(key_failure()));
    assert_eq!(d.len(), 1);
}
