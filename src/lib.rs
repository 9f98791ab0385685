//! slot-dict: an open-addressing hash map with tombstones and per-slot
//! fingerprints, a mapping facade on top, and type-level mutation modes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a dictionary engine in small layers, each with its own
//!   contract, so failures can be reasoned about one layer at a time.
//! - Layers:
//!   - SlotTable<K, V, S>: linear-probing storage. Power-of-two capacity
//!     (minimum 16), load bounded by 7/10, tombstones for deleted slots,
//!     one fingerprint byte per slot checked before key equality. Includes
//!     a debug-only guard that catches key code re-entering a probe.
//!   - Dict<K, V, S>: mapping facade. Absent keys become `KeyNotFound`,
//!     bulk updates decode pair-like items, content equality against other
//!     dicts and `std` maps.
//!   - ModalDict<K, V, P, S>: a Dict under a mutation discipline `P`
//!     (`Mutable`, `Immutable`, `ReadOnly`, `InsertOnly`, `Arena`). Policy
//!     checks run before the facade; only `Immutable` contents hash.
//!
//! Constraints
//! - Single-threaded: no locking or atomics.
//! - Keys and values are owned by the table. Ownership leaves through
//!   `pop`, `pop_item`, replaced values and owned iteration; `delete`,
//!   `clear` and drop release them.
//! - O(1) expected operations; O(n) rebuilds amortized over insertions.
//!
//! Failure boundaries
//! - Key code (`TableKey::table_hash` / `table_eq`) runs only while
//!   locating a key, strictly before any slot is written. A failing key
//!   leaves len, capacity and contents unchanged.
//! - A new key is located before the table grows, so a failed insert never
//!   leaves a grown-but-unchanged table behind.
//! - Storage comes from `try_reserve_exact`; allocation failure surfaces as
//!   `Error::AllocationFailure` with the previous table intact.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its full `u64` hash and its top byte as the
//!   fingerprint. Rebuilds, growth and `Clone` place entries by the stored
//!   hash and never call key code.
//! - Tombstones count toward the rebuild trigger: when they crowd out
//!   empty slots the table is rebuilt, at the same capacity while live
//!   entries fill at most half the load bound and at double otherwise.
//! - `take_any` scans down from a cursor above the highest occupied slot,
//!   so draining a table walks the slot array once.
//!
//! Reentrancy
//! - The guard is held only while hashing and probing; the table is
//!   consistent whenever it is released. `Drop` for `K`/`V` may reenter.
//!
//! Notes and non-goals
//! - No thread safety, persistence or iteration-order guarantees.
//! - `FromIterator`/`Extend` are not implemented because insertion is
//!   fallible; use `try_from_pairs` / `extend_pairs`.
//! - Modes have no transition operation; convert with `into_dict` and
//!   `ModalDict::from_dict`.

pub mod dict;
pub mod error;
pub mod key;
pub mod modal_dict;
pub mod mode;
pub mod pair;
mod probe_guard;
pub mod slot_table;
mod slot_table_proptest;

// Public surface
pub use dict::Dict;
pub use error::{Error, Result};
pub use key::{KeyError, TableKey};
pub use modal_dict::{ArenaDict, ImmutableDict, InsertOnlyDict, ModalDict, MutableDict, ReadOnlyDict};
pub use mode::{Arena, Immutable, InsertOnly, Mode, Mutable, Op, Policy, ReadOnly};
pub use pair::{IntoPair, MalformedPair};
pub use slot_table::{SlotTable, MIN_CAPACITY};
