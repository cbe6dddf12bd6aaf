//! Row unification.
//!
//! Both rows are flattened into pieces. Fields with the same name unify
//! pairwise and identical remainders cancel. What is left decides the
//! outcome:
//!
//! - nothing on either side: done;
//! - a lone metavariable tail on one side: it is solved to the other
//!   side's leftovers;
//! - a lone metavariable tail on each side: both are solved to the other
//!   side's fields plus one fresh common tail;
//! - `map f ?u` against known fields: `?u` is solved to a row of fresh
//!   metavariables with those names, after which the map reduces;
//! - leftovers that no metavariable can absorb: mismatch;
//! - anything else: postponed.

use smallvec::SmallVec;

use super::{pattern_positions, MismatchReason, UnifyEngine, UnifyError};
use crate::row::{rebuild, summarize, Piece};
use crate::{ConData, Idx, KindData, KindIdx, MetaId};

/// Remove the field called `name` from `pieces`, returning its value.
fn take_field(pieces: &mut Vec<Piece>, name: Idx) -> Option<Idx> {
    let pos = pieces
        .iter()
        .position(|p| matches!(p, Piece::Field { name: n, .. } if *n == name))?;
    match pieces.remove(pos) {
        Piece::Field { value, .. } => Some(value),
        _ => None,
    }
}

/// Remove a remainder piece standing for `con` from `pieces`.
fn take_rest(pieces: &mut Vec<Piece>, con: Idx) -> bool {
    match pieces.iter().position(|p| p.rest() == Some(con)) {
        Some(pos) => {
            pieces.remove(pos);
            true
        }
        None => false,
    }
}

/// Leftover pieces of one side.
struct Side {
    fields: Vec<Piece>,
    rest: Vec<Piece>,
}

impl Side {
    fn split(pieces: Vec<Piece>) -> Self {
        let (fields, rest) = pieces
            .into_iter()
            .partition(|p| matches!(p, Piece::Field { .. }));
        Self { fields, rest }
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.rest.is_empty()
    }

    fn all(&self) -> Vec<Piece> {
        self.fields.iter().chain(&self.rest).copied().collect()
    }

    /// Nothing here needs a place on a rigid other side: a rigid side can
    /// only equal this one if every leftover is still unsolved.
    fn only_flex(&self) -> bool {
        self.fields.is_empty() && self.rest.iter().all(|p| matches!(p, Piece::Flex { .. }))
    }

    fn first_field(&self) -> Option<Idx> {
        self.fields.iter().find_map(|p| match *p {
            Piece::Field { name, .. } => Some(name),
            _ => None,
        })
    }
}

impl UnifyEngine<'_> {
    pub(super) fn unify_rows(&mut self, a: Idx, b: Idx) -> Result<(), UnifyError> {
        let sa = summarize(self.pool, self.globals, a);
        let sb = summarize(self.pool, self.globals, b);
        if sa.has_error() || sb.has_error() {
            return Ok(());
        }
        let mut left = sa.pieces;
        let mut right = sb.pieces;

        // Fields with the same name.
        let mut i = 0;
        while i < left.len() {
            if let Piece::Field { name, value } = left[i] {
                if let Some(other) = take_field(&mut right, name) {
                    left.remove(i);
                    self.unify_inner(value, other)?;
                    continue;
                }
            }
            i += 1;
        }

        // Identical remainders.
        left.retain(|p| match p.rest() {
            Some(con) => !take_rest(&mut right, con),
            None => true,
        });

        let left = Side::split(left);
        let right = Side::split(right);
        if left.is_empty() && right.is_empty() {
            return Ok(());
        }
        tracing::trace!(left = ?left.all(), right = ?right.all(), "row leftovers");

        if left.rest.is_empty() && right.rest.is_empty() {
            return self.unify_leftover_fields(a, b, &left, &right);
        }

        if let Some(result) = self.solve_tail(&left, &right) {
            return result;
        }
        if let Some(result) = self.solve_tail(&right, &left) {
            return result;
        }
        if let Some(result) = self.solve_common_tail(&left, &right) {
            return result;
        }
        if let Some(result) = self.solve_mapped(a, b, &left, &right) {
            return result;
        }
        if let Some(result) = self.solve_mapped(a, b, &right, &left) {
            return result;
        }

        let lb = self.side_blockers(&left);
        let rb = self.side_blockers(&right);
        let rigid_mismatch =
            (lb.is_empty() && !right.only_flex()) || (rb.is_empty() && !left.only_flex());
        if rigid_mismatch || (lb.is_empty() && rb.is_empty()) {
            let reason = match left.first_field().or_else(|| right.first_field()) {
                Some(field) => MismatchReason::MissingField { field },
                None => MismatchReason::Structural,
            };
            return Err(UnifyError::mismatch(a, b, reason));
        }
        let mut blockers = lb;
        for v in rb {
            if !blockers.contains(&v) {
                blockers.push(v);
            }
        }
        self.postpone(a, b, blockers);
        Ok(())
    }

    /// Both sides are only fields, none of them shared by name.
    fn unify_leftover_fields(
        &mut self,
        a: Idx,
        b: Idx,
        left: &Side,
        right: &Side,
    ) -> Result<(), UnifyError> {
        if let ([l], [r]) = (left.fields.as_slice(), right.fields.as_slice()) {
            let (Piece::Field { name: n1, value: v1 }, Piece::Field { name: n2, value: v2 }) =
                (*l, *r)
            else {
                return Err(UnifyError::mismatch(a, b, MismatchReason::Structural));
            };
            if self.is_meta(n1) || self.is_meta(n2) {
                self.unify_inner(n1, n2)?;
                return self.unify_inner(v1, v2);
            }
        }
        let blockers = {
            let mut lb = self.side_blockers(left);
            lb.extend(self.side_blockers(right));
            lb
        };
        if blockers.is_empty() || left.fields.len() != right.fields.len() {
            let field = left.first_field().or_else(|| right.first_field());
            let reason = field.map_or(MismatchReason::Structural, |field| {
                MismatchReason::MissingField { field }
            });
            return Err(UnifyError::mismatch(a, b, reason));
        }
        self.postpone(a, b, blockers);
        Ok(())
    }

    /// `this` is nothing but a metavariable tail: solve it to `other`.
    fn solve_tail(&mut self, this: &Side, other: &Side) -> Option<Result<(), UnifyError>> {
        let [Piece::Flex { con, .. }] = this.rest.as_slice() else {
            return None;
        };
        if !this.fields.is_empty() || !self.is_meta(*con) {
            return None;
        }
        let kind = self.element_kind(*con);
        let rest = rebuild(self.pool, kind, &other.all());
        Some(self.unify_inner(*con, rest))
    }

    /// One metavariable tail on each side: `fields_l ++ ?l = fields_r ++ ?r`
    /// becomes `?l := fields_r ++ ?z` and `?r := fields_l ++ ?z`.
    fn solve_common_tail(&mut self, left: &Side, right: &Side) -> Option<Result<(), UnifyError>> {
        let ([Piece::Flex { con: l, var: vl }], [Piece::Flex { con: r, var: vr }]) =
            (left.rest.as_slice(), right.rest.as_slice())
        else {
            return None;
        };
        if vl == vr || !self.is_meta(*l) || !self.is_meta(*r) {
            return None;
        }
        let (ConData::Meta { spine: sl, .. }, ConData::Meta { spine: sr, .. }) =
            (self.pool.data(*l).clone(), self.pool.data(*r).clone())
        else {
            return None;
        };
        pattern_positions(self.pool, &sl)?;
        pattern_positions(self.pool, &sr)?;
        let common: Vec<Idx> = sl.iter().copied().filter(|c| sr.contains(c)).collect();
        let row_kind = self.pool.meta(*vl).kind;
        let elem = self.element_kind(*l);
        let z = self.pool.fresh_meta_with_spine(row_kind, self.span, common);
        tracing::trace!(?vl, ?vr, ?z, "common row tail");

        let mut for_l = right.fields.clone();
        for_l.push(Piece::Flex { con: z, var: *vl });
        let mut for_r = left.fields.clone();
        for_r.push(Piece::Flex { con: z, var: *vr });
        let sol_l = rebuild(self.pool, elem, &for_l);
        let sol_r = rebuild(self.pool, elem, &for_r);
        Some(
            self.unify_inner(*l, sol_l)
                .and_then(|()| self.unify_inner(*r, sol_r)),
        )
    }

    /// `map f ?u` against a side made only of fields.
    fn solve_mapped(
        &mut self,
        a: Idx,
        b: Idx,
        this: &Side,
        other: &Side,
    ) -> Option<Result<(), UnifyError>> {
        let [Piece::Flex { con, .. }] = this.rest.as_slice() else {
            return None;
        };
        if !this.fields.is_empty() || !other.rest.is_empty() || other.fields.is_empty() {
            return None;
        }
        let ConData::Map { dom, row, .. } = self.pool.data(*con).clone() else {
            return None;
        };
        let row = crate::norm::hnorm(self.pool, self.globals, row);
        if !self.is_meta(row) {
            return None;
        }
        let fields: Vec<(Idx, Idx)> = other
            .fields
            .iter()
            .filter_map(|p| match *p {
                Piece::Field { name, .. } => Some(name),
                _ => None,
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|name| (name, self.fresh(dom)))
            .collect();
        let literal = self.pool.row(dom, fields);
        tracing::trace!(?row, ?literal, "solve mapped row");
        Some(
            self.unify_inner(row, literal)
                .and_then(|()| self.unify_inner(a, b)),
        )
    }

    fn side_blockers(&self, side: &Side) -> SmallVec<[MetaId; 2]> {
        let mut out: SmallVec<[MetaId; 2]> = SmallVec::new();
        for piece in side.fields.iter().chain(&side.rest) {
            let var = match *piece {
                Piece::Flex { var, .. } => Some(var),
                Piece::Field { name, .. } => match self.pool.data(name) {
                    ConData::Meta { var, .. } => Some(*var),
                    _ => None,
                },
                Piece::Atom(_) | Piece::Error => None,
            };
            if let Some(var) = var {
                if !out.contains(&var) {
                    out.push(var);
                }
            }
        }
        out
    }

    fn is_meta(&self, c: Idx) -> bool {
        matches!(self.pool.data(c), ConData::Meta { .. })
    }

    /// Element kind of the row metavariable `meta`.
    fn element_kind(&mut self, meta: Idx) -> KindIdx {
        let ConData::Meta { var, .. } = *self.pool.data(meta) else {
            return KindIdx::TYPE;
        };
        let kind = self.pool.meta(var).kind;
        let kind = self.pool.kinds_mut().resolve(kind);
        match self.pool.kinds().data(kind) {
            KindData::Record(elem) => *elem,
            _ => KindIdx::TYPE,
        }
    }
}
