//! Unification error types.

use std::fmt;

use crate::{Idx, KindError};

/// Why two constructors failed to unify.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MismatchReason {
    /// Different head constructors.
    Structural,
    /// A metavariable would have to contain itself.
    Occurs,
    /// A solution would mention a variable bound inside the metavariable's
    /// scope.
    Escape,
    /// A row lacks a field the other row has.
    MissingField { field: Idx },
    /// Tuples of different widths.
    Arity { expected: usize, found: usize },
}

impl MismatchReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Structural => "constructors differ",
            Self::Occurs => "a metavariable occurs in its own solution",
            Self::Escape => "a bound variable escapes its scope",
            Self::MissingField { .. } => "a field is missing",
            Self::Arity { .. } => "tuple widths differ",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UnifyError {
    Mismatch {
        expected: Idx,
        found: Idx,
        reason: MismatchReason,
    },
    /// Constructors whose kinds disagree.
    Kind(KindError),
}

impl UnifyError {
    pub(crate) fn mismatch(expected: Idx, found: Idx, reason: MismatchReason) -> Self {
        Self::Mismatch {
            expected,
            found,
            reason,
        }
    }
}

impl From<KindError> for UnifyError {
    fn from(err: KindError) -> Self {
        Self::Kind(err)
    }
}

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { reason, .. } => {
                write!(f, "type mismatch: {}", reason.description())
            }
            Self::Kind(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for UnifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Kind(err) => Some(err),
            Self::Mismatch { .. } => None,
        }
    }
}
