//! The constructor pool.
//!
//! Every constructor lives here exactly once. The pool also owns the
//! metavariable cells, the generalization skolems and the [`KindPool`], so a
//! single `&mut Pool` is all the mutable state unification needs.
//!
//! Cell writes are recorded in an undo log while a [`Snapshot`] is open,
//! which is how speculative unification (instance search) backs out.

mod construct;
mod format;

pub use format::GlobalNames;

use std::fmt;

use rustc_hash::FxHashMap;
use urd_ir::{Name, Span};

use crate::{ConData, ConFlags, Idx, KindIdx, KindPool, MetaId, SkolemId};

/// State of a constructor metavariable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VarState {
    Unbound,
    /// Solved. `target` lives in the cell's own context: its free `Rel`s
    /// refer to the spine of each occurrence.
    Link { target: Idx },
}

/// A metavariable cell.
#[derive(Clone, Debug)]
pub struct MetaCell {
    pub state: VarState,
    pub kind: KindIdx,
    pub span: Span,
    /// Number of constructor binders in scope when the cell was created.
    pub arity: u32,
}

#[derive(Clone, Debug)]
pub struct SkolemInfo {
    pub name: Name,
    pub kind: KindIdx,
}

/// Violation of the single-assignment discipline.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum AssignError {
    /// The cell already holds a different solution.
    AlreadyResolved {
        var: MetaId,
        existing: Idx,
        attempted: Idx,
    },
}

impl fmt::Display for AssignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyResolved {
                var,
                existing,
                attempted,
            } => write!(
                f,
                "metavariable {var:?} already resolved to {existing:?}, cannot resolve to {attempted:?}"
            ),
        }
    }
}

impl std::error::Error for AssignError {}

/// Open speculation scope. Pass back to [`Pool::rollback_to`] or
/// [`Pool::commit`].
#[derive(Debug)]
#[must_use]
pub struct Snapshot {
    undo: usize,
    kind_undo: usize,
    resolved: usize,
}

pub struct Pool {
    items: Vec<ConData>,
    flags: Vec<ConFlags>,
    /// One past the largest free `Rel` index, 0 for closed constructors.
    outer: Vec<u32>,
    intern_map: FxHashMap<ConData, Idx>,
    metas: Vec<MetaCell>,
    skolems: Vec<SkolemInfo>,
    kinds: KindPool,
    undo: Vec<(MetaId, VarState)>,
    snapshots: u32,
    /// Cells solved since the last [`Pool::take_resolved`].
    resolved: Vec<MetaId>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    pub fn new() -> Self {
        let mut pool = Self {
            items: Vec::with_capacity(256),
            flags: Vec::with_capacity(256),
            outer: Vec::with_capacity(256),
            intern_map: FxHashMap::default(),
            metas: Vec::new(),
            skolems: Vec::new(),
            kinds: KindPool::new(),
            undo: Vec::new(),
            snapshots: 0,
            resolved: Vec::new(),
        };
        let preinterned = [
            ConData::Int,
            ConData::Float,
            ConData::String,
            ConData::Char,
            ConData::Bool,
            ConData::Unit,
            ConData::Error,
            ConData::Row {
                kind: KindIdx::TYPE,
                fields: Vec::new(),
            },
            ConData::Record(Idx::EMPTY_ROW),
        ];
        for data in preinterned {
            pool.intern(data);
        }
        debug_assert_eq!(pool.items.len(), Idx::PREINTERNED as usize);
        pool
    }

    // === Interning ===

    /// Intern a constructor, returning the existing index if an identical
    /// one is already present.
    pub fn intern(&mut self, data: ConData) -> Idx {
        if let Some(&idx) = self.intern_map.get(&data) {
            return idx;
        }
        let (flags, outer) = self.compute_flags(&data);
        let idx = Idx::from_raw(u32::try_from(self.items.len()).unwrap_or(u32::MAX));
        self.items.push(data.clone());
        self.flags.push(flags);
        self.outer.push(outer);
        self.intern_map.insert(data, idx);
        idx
    }

    fn compute_flags(&self, data: &ConData) -> (ConFlags, u32) {
        let mut flags = ConFlags::empty();
        let mut outer = 0u32;
        let child = |flags: &mut ConFlags, outer: &mut u32, c: Idx, binders: u32| {
            *flags |= self.flags(c) & ConFlags::PROPAGATE;
            *outer = (*outer).max(self.outer(c).saturating_sub(binders));
        };
        let kind_flags = |k: KindIdx| {
            let mut f = ConFlags::empty();
            if self.kinds.has_rel(k) {
                f |= ConFlags::HAS_KIND_REL;
            }
            if self.kinds.mentions_meta(k) {
                f |= ConFlags::HAS_KIND_META;
            }
            f
        };
        match data {
            ConData::Int
            | ConData::Float
            | ConData::String
            | ConData::Char
            | ConData::Bool
            | ConData::Unit
            | ConData::FieldName(_) => {}
            ConData::Error => flags |= ConFlags::HAS_ERROR,
            ConData::Rel(i) => outer = i + 1,
            ConData::Named(_) => flags |= ConFlags::HAS_NAMED,
            ConData::ModProj { .. } => flags |= ConFlags::HAS_MOD_PROJ,
            ConData::ModRel { .. } => flags |= ConFlags::HAS_MOD_REL,
            ConData::Skolem(_) => flags |= ConFlags::HAS_SKOLEM,
            ConData::Meta { spine, .. } => {
                flags |= ConFlags::HAS_META;
                for &c in spine {
                    child(&mut flags, &mut outer, c, 0);
                }
            }
            ConData::App(f, a) => {
                flags |= ConFlags::HAS_REDEX;
                child(&mut flags, &mut outer, *f, 0);
                child(&mut flags, &mut outer, *a, 0);
            }
            ConData::Abs { kind, body, .. } | ConData::Poly { kind, body, .. } => {
                flags |= kind_flags(*kind);
                child(&mut flags, &mut outer, *body, 1);
            }
            ConData::KAbs { body, .. } | ConData::KPoly { body, .. } => {
                child(&mut flags, &mut outer, *body, 0);
            }
            ConData::KApp(c, k) => {
                flags |= ConFlags::HAS_REDEX;
                flags |= kind_flags(*k);
                child(&mut flags, &mut outer, *c, 0);
            }
            ConData::Fun(a, b) | ConData::Concat(a, b) => {
                if matches!(data, ConData::Concat(..)) {
                    flags |= ConFlags::HAS_ROW_OP;
                }
                child(&mut flags, &mut outer, *a, 0);
                child(&mut flags, &mut outer, *b, 0);
            }
            ConData::Disjoint { left, right, body } => {
                child(&mut flags, &mut outer, *left, 0);
                child(&mut flags, &mut outer, *right, 0);
                child(&mut flags, &mut outer, *body, 0);
            }
            ConData::Record(r) | ConData::Variant(r) => child(&mut flags, &mut outer, *r, 0),
            ConData::Row { kind, fields } => {
                flags |= kind_flags(*kind);
                for &(n, v) in fields {
                    child(&mut flags, &mut outer, n, 0);
                    child(&mut flags, &mut outer, v, 0);
                }
            }
            ConData::Map {
                dom,
                cod,
                func,
                row,
            } => {
                flags |= ConFlags::HAS_ROW_OP | ConFlags::HAS_REDEX;
                flags |= kind_flags(*dom) | kind_flags(*cod);
                child(&mut flags, &mut outer, *func, 0);
                child(&mut flags, &mut outer, *row, 0);
            }
            ConData::Proj { row, field } => {
                flags |= ConFlags::HAS_ROW_OP | ConFlags::HAS_REDEX;
                child(&mut flags, &mut outer, *row, 0);
                child(&mut flags, &mut outer, *field, 0);
            }
            ConData::Tuple(cs) => {
                for &c in cs {
                    child(&mut flags, &mut outer, c, 0);
                }
            }
            ConData::TupleProj(c, _) => {
                flags |= ConFlags::HAS_REDEX;
                child(&mut flags, &mut outer, *c, 0);
            }
        }
        (flags, outer)
    }

    // === Queries ===

    #[inline]
    pub fn data(&self, idx: Idx) -> &ConData {
        &self.items[idx.raw() as usize]
    }

    #[inline]
    pub fn flags(&self, idx: Idx) -> ConFlags {
        self.flags[idx.raw() as usize]
    }

    /// One past the largest free bound-variable index in `idx`.
    #[inline]
    pub fn outer(&self, idx: Idx) -> u32 {
        self.outer[idx.raw() as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn kinds(&self) -> &KindPool {
        &self.kinds
    }

    #[inline]
    pub fn kinds_mut(&mut self) -> &mut KindPool {
        &mut self.kinds
    }

    // === Metavariables ===

    /// A fresh metavariable in a context of `depth` constructor binders.
    pub fn fresh_meta(&mut self, kind: KindIdx, span: Span, depth: u32) -> Idx {
        let spine = (0..depth).rev().map(|i| self.rel(i)).collect();
        self.fresh_meta_with_spine(kind, span, spine)
    }

    /// A fresh metavariable applied to an explicit spine.
    pub fn fresh_meta_with_spine(&mut self, kind: KindIdx, span: Span, spine: Vec<Idx>) -> Idx {
        let var = MetaId::from_raw(u32::try_from(self.metas.len()).unwrap_or(u32::MAX));
        self.metas.push(MetaCell {
            state: VarState::Unbound,
            kind,
            span,
            arity: u32::try_from(spine.len()).unwrap_or(u32::MAX),
        });
        tracing::trace!(?var, ?kind, arity = spine.len(), "fresh metavariable");
        self.intern(ConData::Meta { var, spine })
    }

    #[inline]
    pub fn meta(&self, var: MetaId) -> &MetaCell {
        &self.metas[var.index()]
    }

    /// Whether the cell has been solved.
    #[inline]
    pub fn is_resolved(&self, var: MetaId) -> bool {
        matches!(self.metas[var.index()].state, VarState::Link { .. })
    }

    /// Solve a metavariable.
    ///
    /// Single assignment: solving a solved cell again with the same
    /// constructor is a no-op, with a different one an error.
    pub fn resolve_var(&mut self, var: MetaId, solution: Idx) -> Result<(), AssignError> {
        match self.metas[var.index()].state {
            VarState::Link { target } if target == solution => Ok(()),
            VarState::Link { target } => Err(AssignError::AlreadyResolved {
                var,
                existing: target,
                attempted: solution,
            }),
            VarState::Unbound => {
                tracing::trace!(?var, ?solution, "resolve metavariable");
                self.set_state(var, VarState::Link { target: solution });
                self.resolved.push(var);
                Ok(())
            }
        }
    }

    fn set_state(&mut self, var: MetaId, state: VarState) {
        let prev = std::mem::replace(&mut self.metas[var.index()].state, state);
        if self.snapshots > 0 {
            self.undo.push((var, prev));
        }
    }

    /// Cells solved since the last call, for waking postponed obligations.
    pub fn take_resolved(&mut self) -> Vec<MetaId> {
        std::mem::take(&mut self.resolved)
    }

    /// Follow solved metavariables at the head of `idx`.
    ///
    /// Each step instantiates the solution with the occurrence's spine.
    /// Chains are compressed: a cell whose solution is itself a solved
    /// occurrence is relinked to the final answer.
    pub fn resolve(&mut self, idx: Idx) -> Idx {
        let ConData::Meta { var, spine } = self.data(idx) else {
            return idx;
        };
        let var = *var;
        let VarState::Link { target } = self.metas[var.index()].state else {
            return idx;
        };
        let spine = spine.clone();

        // Compress within the cell's own context first.
        let final_target = self.resolve(target);
        if final_target != target {
            self.set_state(
                var,
                VarState::Link {
                    target: final_target,
                },
            );
        }
        self.instantiate_spine(final_target, &spine)
    }

    /// The unresolved metavariable at the head of `idx`, if any.
    pub fn unresolved_head(&mut self, idx: Idx) -> Option<MetaId> {
        let idx = self.resolve(idx);
        match self.data(idx) {
            ConData::Meta { var, .. } => Some(*var),
            _ => None,
        }
    }

    // === Skolems ===

    pub fn fresh_skolem(&mut self, name: Name, kind: KindIdx) -> Idx {
        let id = SkolemId::from_raw(u32::try_from(self.skolems.len()).unwrap_or(u32::MAX));
        self.skolems.push(SkolemInfo { name, kind });
        self.intern(ConData::Skolem(id))
    }

    #[inline]
    pub fn skolem(&self, id: SkolemId) -> &SkolemInfo {
        &self.skolems[id.index()]
    }

    // === Snapshots ===

    pub fn snapshot(&mut self) -> Snapshot {
        self.snapshots += 1;
        Snapshot {
            undo: self.undo.len(),
            kind_undo: self.kinds.snapshot(),
            resolved: self.resolved.len(),
        }
    }

    pub fn rollback_to(&mut self, snapshot: Snapshot) {
        while self.undo.len() > snapshot.undo {
            if let Some((var, prev)) = self.undo.pop() {
                self.metas[var.index()].state = prev;
            }
        }
        self.kinds.rollback_to(snapshot.kind_undo);
        self.resolved.truncate(snapshot.resolved);
        self.snapshots = self.snapshots.saturating_sub(1);
    }

    pub fn commit(&mut self, snapshot: Snapshot) {
        let _ = snapshot;
        self.kinds.commit();
        self.snapshots = self.snapshots.saturating_sub(1);
        if self.snapshots == 0 {
            self.undo.clear();
        }
    }
}
