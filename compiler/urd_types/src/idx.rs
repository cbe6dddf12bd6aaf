//! Index handles into the constructor pool and the global table.
//!
//! `Idx` is the only way to refer to a constructor. Constructors are
//! hash-consed, so two structurally identical constructors always share an
//! index and syntactic equality is an integer comparison.

use std::fmt;

/// A 32-bit index into the constructor pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Idx(u32);

impl Idx {
    // === Pre-interned constructors ===
    // Allocated by `Pool::new` in exactly this order.

    /// `int`
    pub const INT: Self = Self(0);
    /// `float`
    pub const FLOAT: Self = Self(1);
    /// `string`
    pub const STRING: Self = Self(2);
    /// `char`
    pub const CHAR: Self = Self(3);
    /// `bool`
    pub const BOOL: Self = Self(4);
    /// `()`, the inhabitant of kind `Unit`.
    pub const UNIT: Self = Self(5);
    /// Poison constructor; unifies with everything.
    pub const ERROR: Self = Self(6);
    /// `[]` at element kind `Type`.
    pub const EMPTY_ROW: Self = Self(7);
    /// `$[]`, the empty record type.
    pub const UNIT_TYPE: Self = Self(8);

    /// Number of pre-interned constructors.
    pub const PREINTERNED: u32 = 9;

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }

    /// Name of a pre-interned constructor, if this is one.
    pub const fn builtin_name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("int"),
            1 => Some("float"),
            2 => Some("string"),
            3 => Some("char"),
            4 => Some("bool"),
            5 => Some("()"),
            6 => Some("<error>"),
            7 => Some("[]"),
            8 => Some("$[]"),
            _ => None,
        }
    }
}

impl fmt::Debug for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => write!(f, "Idx({name})"),
            None => write!(f, "Idx({})", self.0),
        }
    }
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(
    /// A constructor metavariable cell.
    MetaId,
    "?"
);
id_type!(
    /// A rigid variable introduced when a declaration is generalized.
    SkolemId,
    "'"
);
id_type!(
    /// A global definition: constructor, class, or value.
    DefId,
    "def#"
);
id_type!(
    /// A module identity: structure, sealed view, functor, parameter or
    /// functor application result.
    ModId,
    "mod#"
);
id_type!(
    /// A named signature.
    SgnId,
    "sgn#"
);

#[cfg(test)]
mod tests;
