//! Row summaries.
//!
//! A row constructor is a tree of literals, concatenations and maps. For
//! unification and disjointness only the multiset of its pieces matters:
//! the fields it is known to have, and whatever it cannot yet be reduced
//! past. [`summarize`] flattens a row into that multiset.

use smallvec::SmallVec;

use crate::norm::hnorm;
use crate::{ConData, GlobalTable, Idx, MetaId, Pool};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Piece {
    /// A single field. `name` is a field-name constant, a name variable or
    /// a metavariable of kind `Name`.
    Field { name: Idx, value: Idx },
    /// A rigid remainder: a row variable, an abstract row, or a row
    /// operator stuck on one.
    Atom(Idx),
    /// A remainder that cannot be reduced until `var` is solved.
    Flex { con: Idx, var: MetaId },
    /// Poison; the whole row is treated as anything.
    Error,
}

impl Piece {
    /// The constructor this piece stands for, if it is not a field.
    pub fn rest(&self) -> Option<Idx> {
        match *self {
            Piece::Atom(c) | Piece::Flex { con: c, .. } => Some(c),
            Piece::Field { .. } | Piece::Error => None,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RowSummary {
    pub pieces: Vec<Piece>,
}

impl RowSummary {
    pub fn fields(&self) -> impl Iterator<Item = (Idx, Idx)> + '_ {
        self.pieces.iter().filter_map(|p| match *p {
            Piece::Field { name, value } => Some((name, value)),
            _ => None,
        })
    }

    pub fn has_error(&self) -> bool {
        self.pieces.iter().any(|p| matches!(p, Piece::Error))
    }

    /// Metavariables that block this row from being fully known.
    pub fn blockers(&self, pool: &Pool) -> SmallVec<[MetaId; 2]> {
        let mut out = SmallVec::new();
        for piece in &self.pieces {
            let var = match *piece {
                Piece::Flex { var, .. } => Some(var),
                Piece::Field { name, .. } => match pool.data(name) {
                    ConData::Meta { var, .. } => Some(*var),
                    _ => None,
                },
                _ => None,
            };
            if let Some(var) = var {
                if !out.contains(&var) {
                    out.push(var);
                }
            }
        }
        out
    }
}

/// What a row is known to contain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldSet {
    /// Exactly these fields.
    Closed(Vec<(Idx, Idx)>),
    /// These fields and an unknown remainder `tail`.
    Open { fields: Vec<(Idx, Idx)>, tail: Idx },
    /// Nothing is known until the metavariable is solved.
    Unknown(MetaId),
}

/// Flatten `row` into its pieces, reducing as far as possible.
pub fn summarize(pool: &mut Pool, globals: &GlobalTable, row: Idx) -> RowSummary {
    let mut summary = RowSummary::default();
    collect(pool, globals, row, &mut summary.pieces);
    summary
}

fn collect(pool: &mut Pool, globals: &GlobalTable, row: Idx, out: &mut Vec<Piece>) {
    urd_stack::ensure_sufficient_stack(|| {
        let row = hnorm(pool, globals, row);
        match pool.data(row).clone() {
            ConData::Row { fields, .. } => {
                for (name, value) in fields {
                    let name = hnorm(pool, globals, name);
                    out.push(Piece::Field { name, value });
                }
            }
            ConData::Concat(a, b) => {
                collect(pool, globals, a, out);
                collect(pool, globals, b, out);
            }
            ConData::Error => out.push(Piece::Error),
            _ => out.push(match blocker(pool, row) {
                Some(var) => Piece::Flex { con: row, var },
                None => Piece::Atom(row),
            }),
        }
    });
}

/// The unsolved metavariable a head-normal constructor is stuck on.
pub fn blocker(pool: &Pool, c: Idx) -> Option<MetaId> {
    match pool.data(c) {
        ConData::Meta { var, .. } => Some(*var),
        ConData::App(f, _) => blocker(pool, *f),
        ConData::KApp(c, _) | ConData::TupleProj(c, _) => blocker(pool, *c),
        ConData::Map { func, row, .. } => blocker(pool, *row).or_else(|| blocker(pool, *func)),
        ConData::Proj { row, field } => blocker(pool, *row).or_else(|| blocker(pool, *field)),
        ConData::Concat(a, b) => blocker(pool, *a).or_else(|| blocker(pool, *b)),
        _ => None,
    }
}

/// The row under any number of maps. Two pieces with the same base can
/// share fields no matter which functions are mapped over them.
pub fn strip_maps(pool: &Pool, mut c: Idx) -> Idx {
    while let ConData::Map { row, .. } = pool.data(c) {
        c = *row;
    }
    c
}

/// Classify what `row` is known to contain.
pub fn fields_of(pool: &mut Pool, globals: &GlobalTable, row: Idx) -> FieldSet {
    let summary = summarize(pool, globals, row);
    let fields: Vec<_> = summary.fields().collect();
    let rest: Vec<Piece> = summary
        .pieces
        .iter()
        .copied()
        .filter(|p| !matches!(p, Piece::Field { .. }))
        .collect();
    match rest.as_slice() {
        [] => FieldSet::Closed(fields),
        [Piece::Flex { var, .. }] if fields.is_empty() => FieldSet::Unknown(*var),
        _ => {
            let tail = rebuild(pool, row_kind(pool, row), &rest);
            FieldSet::Open { fields, tail }
        }
    }
}

/// Element kind of a row literal, `Type` when it cannot be read off.
fn row_kind(pool: &Pool, row: Idx) -> crate::KindIdx {
    match pool.data(row) {
        ConData::Row { kind, .. } => *kind,
        _ => crate::KindIdx::TYPE,
    }
}

/// Rebuild a row from pieces; the empty row at `kind` when there are none.
pub fn rebuild(pool: &mut Pool, kind: crate::KindIdx, pieces: &[Piece]) -> Idx {
    let fields: Vec<(Idx, Idx)> = pieces
        .iter()
        .filter_map(|p| match *p {
            Piece::Field { name, value } => Some((name, value)),
            _ => None,
        })
        .collect();
    let mut acc = pool.row(kind, fields);
    let literal_empty = matches!(pool.data(acc), ConData::Row { fields, .. } if fields.is_empty());
    let mut first = literal_empty;
    for piece in pieces {
        let c = match *piece {
            Piece::Field { .. } => continue,
            Piece::Error => Idx::ERROR,
            Piece::Atom(c) | Piece::Flex { con: c, .. } => c,
        };
        acc = if first {
            first = false;
            c
        } else {
            pool.concat(acc, c)
        };
    }
    acc
}
