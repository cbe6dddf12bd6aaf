//! Disjointness of rows.
//!
//! Two rows are disjoint when no field name can appear in both. Each side
//! is flattened into pieces and every cross pair is checked: two field-name
//! constants compare by name, anything involving a rigid variable needs a
//! fact from an enclosing `[c1 ~ c2]` binder or precondition, and anything
//! involving an unsolved metavariable waits.

use std::fmt;

use smallvec::SmallVec;

use crate::row::{strip_maps, summarize, Piece, RowSummary};
use crate::{ConData, GlobalTable, Idx, MetaId, Pool};

/// A disjointness assumption in scope.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Fact {
    pub left: Idx,
    pub right: Idx,
}

/// Outcome of a check that did not fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Disjointness {
    /// Proved.
    Definite,
    /// Not decidable yet. With no blockers the rows are rigid and nothing
    /// in scope proves them disjoint.
    Deferred { blockers: SmallVec<[MetaId; 2]> },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DisjointError {
    /// Both rows contain `field`.
    Overlap { field: Idx, left: Idx, right: Idx },
}

impl fmt::Display for DisjointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap { field, .. } => write!(f, "rows share field {field:?}"),
        }
    }
}

impl std::error::Error for DisjointError {}

/// Key under which a piece is looked up in facts.
fn key(pool: &Pool, piece: &Piece) -> Option<Idx> {
    match *piece {
        Piece::Field { name, .. } => Some(name),
        Piece::Atom(c) | Piece::Flex { con: c, .. } => Some(strip_maps(pool, c)),
        Piece::Error => None,
    }
}

fn is_const_name(pool: &Pool, name: Idx) -> bool {
    matches!(pool.data(name), ConData::FieldName(_))
}

/// The metavariable a piece waits on, if any.
fn piece_blocker(pool: &Pool, piece: &Piece) -> Option<MetaId> {
    match *piece {
        Piece::Flex { var, .. } => Some(var),
        Piece::Field { name, .. } => match pool.data(name) {
            ConData::Meta { var, .. } => Some(*var),
            _ => None,
        },
        Piece::Atom(_) | Piece::Error => None,
    }
}

/// Facts flattened into sets of keys.
struct KnownFacts {
    pairs: Vec<(Vec<Idx>, Vec<Idx>)>,
}

impl KnownFacts {
    fn new(pool: &mut Pool, globals: &GlobalTable, facts: &[Fact]) -> Self {
        let mut pairs = Vec::with_capacity(facts.len());
        for fact in facts {
            let l = summarize(pool, globals, fact.left);
            let r = summarize(pool, globals, fact.right);
            pairs.push((keys(pool, &l), keys(pool, &r)));
        }
        Self { pairs }
    }

    fn covers(&self, a: Idx, b: Idx) -> bool {
        self.pairs.iter().any(|(l, r)| {
            (l.contains(&a) && r.contains(&b)) || (l.contains(&b) && r.contains(&a))
        })
    }
}

fn keys(pool: &Pool, summary: &RowSummary) -> Vec<Idx> {
    summary.pieces.iter().filter_map(|p| key(pool, p)).collect()
}

/// Check that `left` and `right` share no field, using `facts`.
#[tracing::instrument(level = "trace", skip(pool, globals, facts))]
pub fn check_disjoint(
    pool: &mut Pool,
    globals: &GlobalTable,
    left: Idx,
    right: Idx,
    facts: &[Fact],
) -> Result<Disjointness, DisjointError> {
    let sl = summarize(pool, globals, left);
    let sr = summarize(pool, globals, right);
    if sl.has_error() || sr.has_error() {
        return Ok(Disjointness::Definite);
    }

    // A name on both sides is a clash no matter what else is unknown.
    for (n1, _) in sl.fields() {
        if let Some((n2, _)) = sr.fields().find(|&(n2, _)| n2 == n1) {
            return Err(DisjointError::Overlap {
                field: n2,
                left,
                right,
            });
        }
    }

    let mut known: Option<KnownFacts> = None;
    let mut blockers: SmallVec<[MetaId; 2]> = SmallVec::new();
    let mut unproved = false;
    for p in &sl.pieces {
        for q in &sr.pieces {
            if let Some(var) = piece_blocker(pool, p).or_else(|| piece_blocker(pool, q)) {
                if !blockers.contains(&var) {
                    blockers.push(var);
                }
                continue;
            }
            if let (Piece::Field { name: a, .. }, Piece::Field { name: b, .. }) = (p, q) {
                if is_const_name(pool, *a) && is_const_name(pool, *b) {
                    continue;
                }
            }
            let (Some(a), Some(b)) = (key(pool, p), key(pool, q)) else {
                continue;
            };
            let facts = known.get_or_insert_with(|| KnownFacts::new(pool, globals, facts));
            if !facts.covers(a, b) {
                tracing::trace!(?a, ?b, "no fact separates pieces");
                unproved = true;
            }
        }
    }

    if blockers.is_empty() && !unproved {
        Ok(Disjointness::Definite)
    } else {
        Ok(Disjointness::Deferred { blockers })
    }
}

#[cfg(test)]
mod tests;
