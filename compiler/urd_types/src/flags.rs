//! Pre-computed constructor metadata.
//!
//! Flags are computed once, when a constructor is interned, and let the
//! traversals in this crate skip subtrees that cannot contain what they are
//! looking for (metavariables for zonking and the occurs check, module
//! references for signature substitution, and so on).

use bitflags::bitflags;

bitflags! {
    /// Properties of an interned constructor, including all its children.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ConFlags: u32 {
        /// Contains a metavariable occurrence (solved or not).
        const HAS_META = 1 << 0;
        /// Contains the poison constructor.
        const HAS_ERROR = 1 << 1;
        /// Contains a generalization skolem.
        const HAS_SKOLEM = 1 << 2;
        /// Contains a signature-relative module reference.
        const HAS_MOD_REL = 1 << 3;
        /// Contains an absolute module projection.
        const HAS_MOD_PROJ = 1 << 4;
        /// Contains a reference to a global definition.
        const HAS_NAMED = 1 << 5;
        /// A kind somewhere inside mentions a kind variable.
        const HAS_KIND_REL = 1 << 6;
        /// Contains row operators (concat, map, projection).
        const HAS_ROW_OP = 1 << 7;
        /// Contains an application, projection or kind application that
        /// might reduce.
        const HAS_REDEX = 1 << 8;
        /// A kind somewhere inside mentions a kind metavariable.
        const HAS_KIND_META = 1 << 9;
    }
}

impl ConFlags {
    /// Flags a parent inherits from its children.
    pub const PROPAGATE: Self = Self::all();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_union() {
        let f = ConFlags::HAS_META | ConFlags::HAS_ROW_OP;
        assert!(f.contains(ConFlags::HAS_META));
        assert!(!f.contains(ConFlags::HAS_ERROR));
        assert!(ConFlags::PROPAGATE.contains(f));
    }
}
