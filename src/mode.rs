//! Mutation disciplines.
//!
//! A `ModalDict` carries its mode as a type parameter (`Mutable`,
//! `Immutable`, `ReadOnly`, `InsertOnly`, `Arena`). Each marker maps to a
//! `Mode` value whose `permits` method is the decision table consulted
//! before every mutating call.

use crate::error::Error;
use core::fmt;
use core::str::FromStr;

/// Runtime name of a mutation discipline.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    Mutable,
    Immutable,
    ReadOnly,
    InsertOnly,
    Arena,
}

/// Kind of mutation checked against a mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Op {
    /// Store a new value under a key that is already present.
    Overwrite,
    /// Store a key that is absent.
    Insert,
    /// Remove one or more entries.
    Delete,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Mutable,
        Mode::Immutable,
        Mode::ReadOnly,
        Mode::InsertOnly,
        Mode::Arena,
    ];

    /// Decision table: whether `op` is allowed under this mode.
    pub const fn permits(self, op: Op) -> bool {
        match (self, op) {
            (Mode::Mutable | Mode::Arena, _) => true,
            (Mode::InsertOnly, Op::Insert) => true,
            _ => false,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Mode::Mutable => "mutable",
            Mode::Immutable => "immutable",
            Mode::ReadOnly => "readonly",
            Mode::InsertOnly => "insert",
            Mode::Arena => "arena",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::UnknownMode(s.to_string()))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Overwrite => "overwrite",
            Op::Insert => "insert",
            Op::Delete => "delete",
        })
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Type-level mode of a `ModalDict`. Sealed: the five markers below are
/// the only implementations.
pub trait Policy: sealed::Sealed {
    const MODE: Mode;
}

macro_rules! policy_marker {
    ($(#[$doc:meta])* $name:ident => $mode:expr) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl Policy for $name {
            const MODE: Mode = $mode;
        }
    };
}

policy_marker!(
    /// Every mutation allowed.
    Mutable => Mode::Mutable
);
policy_marker!(
    /// Frozen after construction; contents can be hashed.
    Immutable => Mode::Immutable
);
policy_marker!(
    /// Frozen after construction; not hashable.
    ReadOnly => Mode::ReadOnly
);
policy_marker!(
    /// New keys may be added; existing entries never change or disappear.
    InsertOnly => Mode::InsertOnly
);
policy_marker!(
    /// Unrestricted, behaves as `Mutable`.
    Arena => Mode::Arena
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_table() {
        use Op::*;
        let rows = [
            (Mode::Mutable, [true, true, true]),
            (Mode::Immutable, [false, false, false]),
            (Mode::ReadOnly, [false, false, false]),
            (Mode::InsertOnly, [false, true, false]),
            (Mode::Arena, [true, true, true]),
        ];
        for (mode, [overwrite, insert, delete]) in rows {
            assert_eq!(mode.permits(Overwrite), overwrite, "{mode} overwrite");
            assert_eq!(mode.permits(Insert), insert, "{mode} insert");
            assert_eq!(mode.permits(Delete), delete, "{mode} delete");
        }
    }

    #[test]
    fn names_round_trip_and_unknown_is_rejected() {
        for m in Mode::ALL {
            assert_eq!(m.to_string().parse::<Mode>(), Ok(m));
        }
        assert_eq!(
            "frozen".parse::<Mode>(),
            Err(Error::UnknownMode("frozen".to_string()))
        );
    }

    #[test]
    fn markers_map_to_modes() {
        assert_eq!(Mutable::MODE, Mode::Mutable);
        assert_eq!(Immutable::MODE, Mode::Immutable);
        assert_eq!(ReadOnly::MODE, Mode::ReadOnly);
        assert_eq!(InsertOnly::MODE, Mode::InsertOnly);
        assert_eq!(Arena::MODE, Mode::Arena);
    }
}
