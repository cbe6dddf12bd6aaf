//! Constructor unification.
//!
//! # Design
//!
//! - Metavariables are solved by linking their cell (see [`Pool::resolve_var`]);
//!   there are no substitution maps.
//! - A metavariable occurrence applied to distinct bound variables is a
//!   pattern: the other side is renamed through the spine and becomes the
//!   cell's solution. Renaming is where the occurs check and the scope
//!   escape check happen.
//! - Rows unify through their summaries (see [`rows`]).
//! - Anything that cannot be decided yet (non-pattern metavariables, stuck
//!   redexes, rows with several unknown tails) is postponed. The caller
//!   collects postponed equations with [`UnifyEngine::take_postponed`] and
//!   re-runs them once one of their blockers is solved.

mod error;
mod rows;

pub use error::{MismatchReason, UnifyError};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use urd_ir::Span;

use crate::row::blocker;
use crate::traverse::{fold_con, Binders, ConFolder};
use crate::{ConData, ConFlags, GlobalTable, Idx, KindIdx, MetaId, Pool};

/// An equation that could not be decided yet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Postponed {
    pub expected: Idx,
    pub found: Idx,
    /// Binder depth the equation lives at.
    pub depth: u32,
    /// Solving any of these may make progress.
    pub blockers: SmallVec<[MetaId; 2]>,
}

/// Outcome of a speculative unification.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TryResult {
    Yes,
    No,
    /// Succeeded only by postponing part of the problem.
    Maybe,
}

/// The unification engine.
pub struct UnifyEngine<'a> {
    pool: &'a mut Pool,
    globals: &'a GlobalTable,
    /// Constructor binders in scope at the current position.
    depth: u32,
    span: Span,
    postponed: Vec<Postponed>,
}

impl<'a> UnifyEngine<'a> {
    pub fn new(pool: &'a mut Pool, globals: &'a GlobalTable, depth: u32, span: Span) -> Self {
        Self {
            pool,
            globals,
            depth,
            span,
            postponed: Vec::new(),
        }
    }

    #[inline]
    pub fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    /// Equations postponed so far, leaving none behind.
    pub fn take_postponed(&mut self) -> Vec<Postponed> {
        std::mem::take(&mut self.postponed)
    }

    // ========================================
    // Unification
    // ========================================

    /// Unify `expected` with `found`.
    ///
    /// Failures report these two constructors together with the reason
    /// found wherever inside them unification broke down.
    pub fn unify(&mut self, expected: Idx, found: Idx) -> Result<(), UnifyError> {
        tracing::trace!(?expected, ?found, depth = self.depth, "unify");
        self.unify_inner(expected, found).map_err(|err| match err {
            UnifyError::Mismatch { reason, .. } => UnifyError::mismatch(expected, found, reason),
            other @ UnifyError::Kind(_) => other,
        })
    }

    fn unify_inner(&mut self, a: Idx, b: Idx) -> Result<(), UnifyError> {
        urd_stack::ensure_sufficient_stack(|| self.unify_step(a, b))
    }

    fn unify_step(&mut self, a: Idx, b: Idx) -> Result<(), UnifyError> {
        if a == b {
            return Ok(());
        }
        let a = crate::norm::hnorm(self.pool, self.globals, a);
        let b = crate::norm::hnorm(self.pool, self.globals, b);
        if a == b || a.is_error() || b.is_error() {
            return Ok(());
        }

        let da = self.pool.data(a).clone();
        let db = self.pool.data(b).clone();
        match (&da, &db) {
            (
                ConData::Meta { var: va, spine: sa },
                ConData::Meta { var: vb, spine: sb },
            ) if va == vb => {
                if sa.len() != sb.len() {
                    return Err(UnifyError::mismatch(a, b, MismatchReason::Structural));
                }
                for (&x, &y) in sa.iter().zip(sb) {
                    self.unify_inner(x, y)?;
                }
                return Ok(());
            }
            (ConData::Meta { var, spine }, _) => return self.solve(a, *var, spine, b),
            (_, ConData::Meta { var, spine }) => return self.solve(b, *var, spine, a),
            _ => {}
        }

        if da.is_row_op() || db.is_row_op() {
            return self.unify_rows(a, b);
        }

        let stuck: SmallVec<[MetaId; 2]> = [blocker(self.pool, a), blocker(self.pool, b)]
            .into_iter()
            .flatten()
            .collect();
        if !stuck.is_empty() {
            self.postpone(a, b, stuck);
            return Ok(());
        }

        self.unify_structural(a, b, da, db)
    }

    fn unify_structural(
        &mut self,
        a: Idx,
        b: Idx,
        da: ConData,
        db: ConData,
    ) -> Result<(), UnifyError> {
        let mismatch = || UnifyError::mismatch(a, b, MismatchReason::Structural);
        match (da, db) {
            (ConData::Fun(a1, a2), ConData::Fun(b1, b2))
            | (ConData::App(a1, a2), ConData::App(b1, b2)) => {
                self.unify_inner(a1, b1)?;
                self.unify_inner(a2, b2)
            }
            (
                ConData::Abs {
                    kind: k1,
                    body: b1,
                    ..
                },
                ConData::Abs {
                    kind: k2,
                    body: b2,
                    ..
                },
            ) => {
                self.unify_kinds(k1, k2)?;
                self.under_binder(|this| this.unify_inner(b1, b2))
            }
            (
                ConData::Poly {
                    implicit: i1,
                    kind: k1,
                    body: b1,
                    ..
                },
                ConData::Poly {
                    implicit: i2,
                    kind: k2,
                    body: b2,
                    ..
                },
            ) => {
                if i1 != i2 {
                    return Err(mismatch());
                }
                self.unify_kinds(k1, k2)?;
                self.under_binder(|this| this.unify_inner(b1, b2))
            }
            (ConData::KPoly { body: b1, .. }, ConData::KPoly { body: b2, .. })
            | (ConData::KAbs { body: b1, .. }, ConData::KAbs { body: b2, .. }) => {
                self.unify_inner(b1, b2)
            }
            (ConData::KApp(c1, k1), ConData::KApp(c2, k2)) => {
                self.unify_inner(c1, c2)?;
                self.unify_kinds(k1, k2)
            }
            (
                ConData::Disjoint {
                    left: l1,
                    right: r1,
                    body: b1,
                },
                ConData::Disjoint {
                    left: l2,
                    right: r2,
                    body: b2,
                },
            ) => {
                self.unify_inner(l1, l2)?;
                self.unify_inner(r1, r2)?;
                self.unify_inner(b1, b2)
            }
            (ConData::Record(r1), ConData::Record(r2))
            | (ConData::Variant(r1), ConData::Variant(r2)) => self.unify_inner(r1, r2),
            (ConData::Tuple(xs), ConData::Tuple(ys)) => {
                if xs.len() != ys.len() {
                    return Err(UnifyError::mismatch(
                        a,
                        b,
                        MismatchReason::Arity {
                            expected: xs.len(),
                            found: ys.len(),
                        },
                    ));
                }
                for (x, y) in xs.into_iter().zip(ys) {
                    self.unify_inner(x, y)?;
                }
                Ok(())
            }
            (ConData::TupleProj(c1, i), ConData::TupleProj(c2, j)) if i == j => {
                self.unify_inner(c1, c2)
            }
            (ConData::Proj { row: r1, field: f1 }, ConData::Proj { row: r2, field: f2 }) => {
                self.unify_inner(r1, r2)?;
                self.unify_inner(f1, f2)
            }
            _ => Err(mismatch()),
        }
    }

    fn unify_kinds(&mut self, expected: KindIdx, found: KindIdx) -> Result<(), UnifyError> {
        self.pool.kinds_mut().unify(expected, found)?;
        Ok(())
    }

    fn under_binder<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    pub(crate) fn postpone(&mut self, expected: Idx, found: Idx, blockers: SmallVec<[MetaId; 2]>) {
        tracing::debug!(?expected, ?found, ?blockers, "postpone equation");
        self.postponed.push(Postponed {
            expected,
            found,
            depth: self.depth,
            blockers,
        });
    }

    // ========================================
    // Metavariable solving
    // ========================================

    /// Solve the metavariable occurrence `meta` (cell `var` applied to
    /// `spine`) with `other`, or postpone if the occurrence is not a
    /// pattern.
    fn solve(
        &mut self,
        meta: Idx,
        var: MetaId,
        spine: &[Idx],
        other: Idx,
    ) -> Result<(), UnifyError> {
        let Some(positions) = pattern_positions(self.pool, spine) else {
            let mut blockers: SmallVec<[MetaId; 2]> = SmallVec::new();
            blockers.push(var);
            for &c in spine {
                if let Some(v) = self.pool.unresolved_head(c) {
                    blockers.push(v);
                }
            }
            self.postpone(meta, other, blockers);
            return Ok(());
        };

        let other_z = self.pool.zonk(other);
        let arity = u32::try_from(spine.len()).unwrap_or(u32::MAX);
        let mut rename = Rename {
            pool: self.pool,
            var,
            positions: &positions,
            arity,
            in_foreign: 0,
            outcome: Outcome::Renamed,
            stuck_on: SmallVec::new(),
        };
        let solution = fold_con(&mut rename, other_z, Binders::default());
        match rename.outcome {
            Outcome::Occurs => Err(UnifyError::mismatch(meta, other, MismatchReason::Occurs)),
            Outcome::Escape => Err(UnifyError::mismatch(meta, other, MismatchReason::Escape)),
            Outcome::Stuck => {
                let mut blockers = rename.stuck_on;
                blockers.push(var);
                self.postpone(meta, other, blockers);
                Ok(())
            }
            Outcome::Renamed => {
                let cell_kind = self.pool.meta(var).kind;
                if let Some(k) = kind_of_head(self.pool, solution) {
                    self.unify_kinds(cell_kind, k)?;
                }
                if let Err(err) = self.pool.resolve_var(var, solution) {
                    tracing::error!(%err, "solved metavariable reassigned during unification");
                    return Err(UnifyError::mismatch(meta, other, MismatchReason::Structural));
                }
                Ok(())
            }
        }
    }

    /// A fresh metavariable at the current depth.
    pub(crate) fn fresh(&mut self, kind: KindIdx) -> Idx {
        self.pool.fresh_meta(kind, self.span, self.depth)
    }
}

/// For a pattern spine, the position of each bound variable in it.
fn pattern_positions(pool: &mut Pool, spine: &[Idx]) -> Option<FxHashMap<u32, u32>> {
    let mut positions = FxHashMap::default();
    for (p, &c) in spine.iter().enumerate() {
        let c = pool.resolve(c);
        let ConData::Rel(i) = *pool.data(c) else {
            return None;
        };
        if positions.insert(i, u32::try_from(p).unwrap_or(u32::MAX)).is_some() {
            return None;
        }
    }
    Some(positions)
}

/// The kind of a constructor when it can be read off its head alone.
pub fn kind_of_head(pool: &mut Pool, c: Idx) -> Option<KindIdx> {
    match pool.data(c).clone() {
        ConData::Int
        | ConData::Float
        | ConData::String
        | ConData::Char
        | ConData::Bool
        | ConData::Fun(..)
        | ConData::Poly { .. }
        | ConData::KPoly { .. }
        | ConData::Disjoint { .. }
        | ConData::Record(_)
        | ConData::Variant(_) => Some(KindIdx::TYPE),
        ConData::Unit => Some(KindIdx::UNIT),
        ConData::FieldName(_) => Some(KindIdx::NAME),
        ConData::Row { kind, .. } => Some(pool.kinds_mut().record(kind)),
        ConData::Meta { var, .. } => Some(pool.meta(var).kind),
        _ => None,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Outcome {
    Renamed,
    Occurs,
    Escape,
    /// A variable outside the spine occurs only in another metavariable's
    /// spine; that metavariable might drop it.
    Stuck,
}

/// Renames a solution candidate into the context of the metavariable
/// being solved.
struct Rename<'p, 'm> {
    pool: &'p mut Pool,
    var: MetaId,
    positions: &'m FxHashMap<u32, u32>,
    arity: u32,
    in_foreign: u32,
    outcome: Outcome,
    stuck_on: SmallVec<[MetaId; 2]>,
}

impl ConFolder for Rename<'_, '_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx> {
        if matches!(self.outcome, Outcome::Occurs | Outcome::Escape) {
            return Some(idx);
        }
        if self.pool.outer(idx) <= at.con && !self.pool.flags(idx).contains(ConFlags::HAS_META) {
            return Some(idx);
        }
        match self.pool.data(idx).clone() {
            ConData::Rel(i) if i >= at.con => {
                if let Some(&p) = self.positions.get(&(i - at.con)) {
                    return Some(self.pool.rel(at.con + self.arity - 1 - p));
                }
                if self.in_foreign > 0 {
                    self.outcome = Outcome::Stuck;
                } else {
                    self.outcome = Outcome::Escape;
                }
                Some(idx)
            }
            ConData::Meta { var, spine } => {
                if var == self.var {
                    self.outcome = Outcome::Occurs;
                    return Some(idx);
                }
                let before = self.outcome;
                self.in_foreign += 1;
                let spine = spine.into_iter().map(|c| fold_con(self, c, at)).collect();
                self.in_foreign -= 1;
                let newly_stuck = self.outcome == Outcome::Stuck && before != Outcome::Stuck;
                if newly_stuck && !self.stuck_on.contains(&var) {
                    self.stuck_on.push(var);
                }
                Some(self.pool.intern(ConData::Meta { var, spine }))
            }
            _ => None,
        }
    }
}

fn attempt(
    pool: &mut Pool,
    globals: &GlobalTable,
    depth: u32,
    expected: Idx,
    found: Idx,
) -> TryResult {
    let mut engine = UnifyEngine::new(pool, globals, depth, Span::DUMMY);
    match engine.unify(expected, found) {
        Err(_) => TryResult::No,
        Ok(()) if engine.postponed.is_empty() => TryResult::Yes,
        Ok(()) => TryResult::Maybe,
    }
}

/// Unify speculatively, keeping the result only if it succeeded without
/// postponing anything.
pub fn try_unify(
    pool: &mut Pool,
    globals: &GlobalTable,
    depth: u32,
    expected: Idx,
    found: Idx,
) -> TryResult {
    let snapshot = pool.snapshot();
    let result = attempt(pool, globals, depth, expected, found);
    if result == TryResult::Yes {
        pool.commit(snapshot);
    } else {
        pool.rollback_to(snapshot);
    }
    result
}

#[cfg(test)]
mod tests;
