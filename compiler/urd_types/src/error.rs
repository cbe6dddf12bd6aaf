//! Elaboration errors.
//!
//! [`ElabError`] is what the driver collects: a span, what went wrong, and
//! every constructor involved so a caller can render a precise message
//! without re-deriving anything. Engine-level errors ([`UnifyError`],
//! [`KindError`], [`DisjointError`], [`ClassError`]) are converted at the
//! site where the driver knows the span.

use std::fmt;

use urd_ir::{Name, Span, StringInterner};

use crate::class::ClassError;
use crate::disjoint::DisjointError;
use crate::global::NamedGlobals;
use crate::unify::{MismatchReason, UnifyError};
use crate::{GlobalTable, Idx, InstanceRef, KindError, KindIdx, MetaId, Namespace, Pool};

/// Error codes. The leading `2` is the type-checking phase.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    /// Type mismatch
    E2001,
    /// Kind mismatch
    E2002,
    /// Unbound name
    E2003,
    /// Rows share a field
    E2004,
    /// Disjointness cannot be proved
    E2005,
    /// Cannot infer type
    E2006,
    /// No instance
    E2007,
    /// Ambiguous instance
    E2008,
    /// Signature mismatch
    E2009,
    /// Not a structure
    E2010,
    /// Not a functor
    E2011,
    /// Not a class
    E2012,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E2009 => "E2009",
            ErrorCode::E2010 => "E2010",
            ErrorCode::E2011 => "E2011",
            ErrorCode::E2012 => "E2012",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a structure item failed to match its signature item.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ItemMismatch {
    /// The structure has no such item.
    Missing,
    /// Both have the name, but not in the same namespace (e.g. a class
    /// where a constructor was expected).
    Namespace { expected: Namespace },
    Kind {
        expected: KindIdx,
        found: KindIdx,
    },
    Type {
        expected: Idx,
        found: Idx,
        reason: MismatchReason,
    },
    /// A manifest definition differs.
    Definition { expected: Idx, found: Idx },
    /// A nested structure or functor signature failed; `inner` is its
    /// first failing item.
    Nested {
        item: Name,
        inner: Box<ItemMismatch>,
    },
    /// Functor expected where a structure was found, or the reverse.
    Shape,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ElabErrorKind {
    KindMismatch {
        error: KindError,
        /// The constructor whose kind was being checked.
        con: Option<Idx>,
    },
    TypeMismatch {
        expected: Idx,
        found: Idx,
        reason: MismatchReason,
    },
    FieldOverlap {
        field: Idx,
        left: Idx,
        right: Idx,
    },
    UnprovableDisjointness {
        left: Idx,
        right: Idx,
    },
    UnboundVariable {
        name: Name,
        namespace: Namespace,
    },
    NoInstance {
        goal: Idx,
    },
    AmbiguousInstance {
        goal: Idx,
        candidates: Vec<InstanceRef>,
    },
    SignatureMismatch {
        item: Name,
        namespace: Namespace,
        mismatch: ItemMismatch,
    },
    /// A metavariable survived its declaration group.
    AmbiguousType {
        meta: MetaId,
    },
    NotAStructure {
        path: Vec<Name>,
    },
    NotAFunctor {
        path: Vec<Name>,
    },
    NotAClass {
        goal: Idx,
    },
}

/// An elaboration error with its location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ElabError {
    pub span: Span,
    pub kind: ElabErrorKind,
}

impl ElabError {
    pub fn new(span: Span, kind: ElabErrorKind) -> Self {
        Self { span, kind }
    }

    pub fn unbound(span: Span, name: Name, namespace: Namespace) -> Self {
        Self::new(span, ElabErrorKind::UnboundVariable { name, namespace })
    }

    pub fn ambiguous_type(span: Span, meta: MetaId) -> Self {
        Self::new(span, ElabErrorKind::AmbiguousType { meta })
    }

    pub fn from_unify(span: Span, err: UnifyError) -> Self {
        match err {
            UnifyError::Mismatch {
                expected,
                found,
                reason,
            } => Self::new(
                span,
                ElabErrorKind::TypeMismatch {
                    expected,
                    found,
                    reason,
                },
            ),
            UnifyError::Kind(error) => Self::from_kind(span, error, None),
        }
    }

    pub fn from_kind(span: Span, error: KindError, con: Option<Idx>) -> Self {
        Self::new(span, ElabErrorKind::KindMismatch { error, con })
    }

    pub fn from_disjoint(span: Span, err: DisjointError) -> Self {
        match err {
            DisjointError::Overlap { field, left, right } => {
                Self::new(span, ElabErrorKind::FieldOverlap { field, left, right })
            }
        }
    }

    pub fn from_class(span: Span, err: ClassError) -> Self {
        let kind = match err {
            ClassError::NoInstance { goal } | ClassError::DepthExceeded { goal } => {
                ElabErrorKind::NoInstance { goal }
            }
            ClassError::Ambiguous { goal, candidates } => {
                ElabErrorKind::AmbiguousInstance { goal, candidates }
            }
            ClassError::NotAClass { goal } => ElabErrorKind::NotAClass { goal },
        };
        Self::new(span, kind)
    }

    pub fn code(&self) -> ErrorCode {
        match &self.kind {
            ElabErrorKind::TypeMismatch { .. } => ErrorCode::E2001,
            ElabErrorKind::KindMismatch { .. } => ErrorCode::E2002,
            ElabErrorKind::UnboundVariable { .. } => ErrorCode::E2003,
            ElabErrorKind::FieldOverlap { .. } => ErrorCode::E2004,
            ElabErrorKind::UnprovableDisjointness { .. } => ErrorCode::E2005,
            ElabErrorKind::AmbiguousType { .. } => ErrorCode::E2006,
            ElabErrorKind::NoInstance { .. } => ErrorCode::E2007,
            ElabErrorKind::AmbiguousInstance { .. } => ErrorCode::E2008,
            ElabErrorKind::SignatureMismatch { .. } => ErrorCode::E2009,
            ElabErrorKind::NotAStructure { .. } => ErrorCode::E2010,
            ElabErrorKind::NotAFunctor { .. } => ErrorCode::E2011,
            ElabErrorKind::NotAClass { .. } => ErrorCode::E2012,
        }
    }

    /// A one-line message with constructors and names spelled out.
    pub fn render(
        &self,
        pool: &mut Pool,
        globals: &GlobalTable,
        interner: &StringInterner,
    ) -> String {
        let names = NamedGlobals { globals, interner };
        let mut con = |pool: &mut Pool, c: Idx| pool.format_with(c, interner, &names);
        let body = match &self.kind {
            ElabErrorKind::KindMismatch { error, con: site } => {
                let what = match error {
                    KindError::Mismatch { expected, found } => format!(
                        "expected kind `{}`, found `{}`",
                        pool.kinds().format(*expected, interner),
                        pool.kinds().format(*found, interner)
                    ),
                    KindError::Occurs { kind, .. } => format!(
                        "kind `{}` would contain itself",
                        pool.kinds().format(*kind, interner)
                    ),
                    KindError::Predicate { found, .. } => format!(
                        "kind `{}` is not allowed here",
                        pool.kinds().format(*found, interner)
                    ),
                };
                match site {
                    Some(c) => format!("kind mismatch in `{}`: {what}", con(pool, *c)),
                    None => format!("kind mismatch: {what}"),
                }
            }
            ElabErrorKind::TypeMismatch {
                expected,
                found,
                reason,
            } => {
                let detail = match reason {
                    MismatchReason::MissingField { field } => {
                        format!("field `{}` is missing", con(pool, *field))
                    }
                    other => other.description().to_owned(),
                };
                format!(
                    "type mismatch: expected `{}`, found `{}` ({detail})",
                    con(pool, *expected),
                    con(pool, *found)
                )
            }
            ElabErrorKind::FieldOverlap { field, left, right } => format!(
                "rows `{}` and `{}` both contain field `{}`",
                con(pool, *left),
                con(pool, *right),
                con(pool, *field)
            ),
            ElabErrorKind::UnprovableDisjointness { left, right } => format!(
                "cannot prove rows `{}` and `{}` disjoint",
                con(pool, *left),
                con(pool, *right)
            ),
            ElabErrorKind::UnboundVariable { name, namespace } => format!(
                "unbound {} `{}`",
                namespace.describe(),
                interner.lookup(*name)
            ),
            ElabErrorKind::NoInstance { goal } => {
                format!("no instance for `{}`", con(pool, *goal))
            }
            ElabErrorKind::AmbiguousInstance { goal, candidates } => format!(
                "{} instances match `{}`",
                candidates.len(),
                con(pool, *goal)
            ),
            ElabErrorKind::SignatureMismatch {
                item,
                namespace,
                mismatch,
            } => format!(
                "signature mismatch at {} `{}`: {}",
                namespace.describe(),
                interner.lookup(*item),
                describe_item(pool, interner, &mut con, mismatch)
            ),
            ElabErrorKind::AmbiguousType { meta } => {
                format!("cannot infer the type standing for {meta:?}")
            }
            ElabErrorKind::NotAStructure { path } => {
                format!("`{}` is not a structure", join(interner, path))
            }
            ElabErrorKind::NotAFunctor { path } => {
                format!("`{}` is not a functor", join(interner, path))
            }
            ElabErrorKind::NotAClass { goal } => {
                format!("`{}` is not a class", con(pool, *goal))
            }
        };
        format!("error[{}]: {body}", self.code())
    }
}

fn describe_item(
    pool: &mut Pool,
    interner: &StringInterner,
    con: &mut dyn FnMut(&mut Pool, Idx) -> String,
    mismatch: &ItemMismatch,
) -> String {
    match mismatch {
        ItemMismatch::Missing => "missing from the structure".to_owned(),
        ItemMismatch::Namespace { expected } => {
            format!("expected a {}", expected.describe())
        }
        ItemMismatch::Kind { expected, found } => format!(
            "expected kind `{}`, found `{}`",
            pool.kinds().format(*expected, interner),
            pool.kinds().format(*found, interner)
        ),
        ItemMismatch::Type {
            expected, found, ..
        } => format!(
            "expected `{}`, found `{}`",
            con(pool, *expected),
            con(pool, *found)
        ),
        ItemMismatch::Definition { expected, found } => format!(
            "defined as `{}`, expected `{}`",
            con(pool, *found),
            con(pool, *expected)
        ),
        ItemMismatch::Nested { item, inner } => format!(
            "in `{}`, {}",
            interner.lookup(*item),
            describe_item(pool, interner, con, inner)
        ),
        ItemMismatch::Shape => "structure and functor do not match".to_owned(),
    }
}

fn join(interner: &StringInterner, path: &[Name]) -> String {
    path.iter()
        .map(|n| interner.lookup(*n))
        .collect::<Vec<_>>()
        .join(".")
}

impl fmt::Display for ElabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match &self.kind {
            ElabErrorKind::KindMismatch { error, .. } => {
                return write!(f, "[{}] {error}", self.code());
            }
            ElabErrorKind::TypeMismatch { reason, .. } => reason.description(),
            ElabErrorKind::FieldOverlap { .. } => "rows share a field",
            ElabErrorKind::UnprovableDisjointness { .. } => "cannot prove rows disjoint",
            ElabErrorKind::UnboundVariable { .. } => "unbound name",
            ElabErrorKind::NoInstance { .. } => "no instance",
            ElabErrorKind::AmbiguousInstance { .. } => "ambiguous instance",
            ElabErrorKind::SignatureMismatch { .. } => "signature mismatch",
            ElabErrorKind::AmbiguousType { .. } => "cannot infer type",
            ElabErrorKind::NotAStructure { .. } => "not a structure",
            ElabErrorKind::NotAFunctor { .. } => "not a functor",
            ElabErrorKind::NotAClass { .. } => "not a class",
        };
        write!(f, "[{}] {what}", self.code())
    }
}

impl std::error::Error for ElabError {}

#[cfg(test)]
mod tests;
