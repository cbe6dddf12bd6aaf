//! de Bruijn utilities: lifting, substitution, metavariable instantiation,
//! zonking, and the module-level re-anchoring used by signatures.

use rustc_hash::FxHashMap;
use urd_ir::Name;

use crate::traverse::{fold_con, visit_con, Binders, ConFolder, ConVisitor};
use crate::{ConData, ConFlags, DefId, Idx, KindIdx, MetaId, ModId, ModRef, Pool, SkolemId};

struct Lift<'p> {
    pool: &'p mut Pool,
    by: u32,
    cutoff: u32,
}

impl ConFolder for Lift<'_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx> {
        let limit = self.cutoff + at.con;
        if self.pool.outer(idx) <= limit {
            return Some(idx);
        }
        match *self.pool.data(idx) {
            ConData::Rel(i) => Some(self.pool.rel(i + self.by)),
            _ => None,
        }
    }
}

struct Subst<'p> {
    pool: &'p mut Pool,
    arg: Idx,
}

impl ConFolder for Subst<'_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx> {
        let depth = at.con;
        if self.pool.outer(idx) <= depth {
            return Some(idx);
        }
        match *self.pool.data(idx) {
            ConData::Rel(i) if i == depth => {
                let lifted = self.pool.lift(self.arg, depth);
                Some(self.pool.lift_kinds(lifted, at.kind))
            }
            ConData::Rel(i) => Some(self.pool.rel(i - 1)),
            _ => None,
        }
    }
}

/// Replaces the `n` outermost free variables with a metavariable spine.
struct Spine<'p, 's> {
    pool: &'p mut Pool,
    spine: &'s [Idx],
}

impl ConFolder for Spine<'_, '_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx> {
        let depth = at.con;
        if self.pool.outer(idx) <= depth {
            return Some(idx);
        }
        let ConData::Rel(i) = *self.pool.data(idx) else {
            return None;
        };
        let n = self.spine.len() as u32;
        let j = i - depth;
        if j < n {
            let arg = self.spine[(n - 1 - j) as usize];
            let lifted = self.pool.lift(arg, depth);
            Some(self.pool.lift_kinds(lifted, at.kind))
        } else {
            Some(self.pool.rel(i - n))
        }
    }
}

struct KindSubst<'p> {
    pool: &'p mut Pool,
    arg: KindIdx,
}

impl ConFolder for KindSubst<'_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, _at: Binders) -> Option<Idx> {
        (!self.pool.flags(idx).contains(ConFlags::HAS_KIND_REL)).then_some(idx)
    }

    fn fold_kind(&mut self, kind: KindIdx, at: Binders) -> KindIdx {
        self.pool.kinds_mut().subst(kind, self.arg, at.kind)
    }
}

struct KindLift<'p> {
    pool: &'p mut Pool,
    by: u32,
}

impl ConFolder for KindLift<'_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, _at: Binders) -> Option<Idx> {
        (!self.pool.flags(idx).contains(ConFlags::HAS_KIND_REL)).then_some(idx)
    }

    fn fold_kind(&mut self, kind: KindIdx, at: Binders) -> KindIdx {
        self.pool.kinds_mut().lift(kind, self.by, at.kind)
    }
}

struct Zonk<'p> {
    pool: &'p mut Pool,
}

impl ConFolder for Zonk<'_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx> {
        let flags = self.pool.flags(idx);
        if !flags.intersects(ConFlags::HAS_META | ConFlags::HAS_KIND_META) {
            return Some(idx);
        }
        if let ConData::Meta { .. } = self.pool.data(idx) {
            let resolved = self.pool.resolve(idx);
            if resolved != idx {
                return Some(fold_con(self, resolved, at));
            }
        }
        None
    }

    fn fold_kind(&mut self, kind: KindIdx, _at: Binders) -> KindIdx {
        self.pool.kinds_mut().zonk(kind)
    }
}

struct Strengthen<'p> {
    pool: &'p mut Pool,
    by: u32,
    failed: bool,
}

impl ConFolder for Strengthen<'_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx> {
        if self.failed || self.pool.outer(idx) <= at.con {
            return Some(idx);
        }
        let ConData::Rel(i) = *self.pool.data(idx) else {
            return None;
        };
        if i - at.con < self.by {
            self.failed = true;
            Some(idx)
        } else {
            Some(self.pool.rel(i - self.by))
        }
    }
}

struct ModSubst<'p, 'r> {
    pool: &'p mut Pool,
    from: u32,
    refs: &'r [ModRef],
}

impl ConFolder for ModSubst<'_, '_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, _at: Binders) -> Option<Idx> {
        if !self.pool.flags(idx).contains(ConFlags::HAS_MOD_REL) {
            return Some(idx);
        }
        let ConData::ModRel { index, path, item } = self.pool.data(idx).clone() else {
            return None;
        };
        let len = self.refs.len() as u32;
        if index < self.from {
            return Some(idx);
        }
        Some(match self.refs.get((index - self.from) as usize) {
            Some(target) => {
                let mut full = target.path.clone();
                full.extend(path);
                self.pool.mod_proj(target.module, full, item)
            }
            None => self.pool.mod_rel(index - len, path, item),
        })
    }
}

/// Where an abstracted reference points: `up` signature levels above the
/// one being described, then down `path`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Anchor {
    pub up: u32,
    pub path: Vec<Name>,
}

/// Definitions and modules to be turned back into signature-relative
/// references.
#[derive(Default, Debug, Clone)]
pub struct Abstraction {
    pub defs: FxHashMap<DefId, (Anchor, Name)>,
    pub modules: FxHashMap<ModId, Anchor>,
}

impl Abstraction {
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty() && self.modules.is_empty()
    }
}

struct Abstract<'p, 'a> {
    pool: &'p mut Pool,
    level: u32,
    map: &'a Abstraction,
}

impl ConFolder for Abstract<'_, '_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, _at: Binders) -> Option<Idx> {
        if !self
            .pool
            .flags(idx)
            .intersects(ConFlags::HAS_NAMED | ConFlags::HAS_MOD_PROJ)
        {
            return Some(idx);
        }
        match self.pool.data(idx).clone() {
            ConData::Named(def) => {
                let (anchor, item) = self.map.defs.get(&def)?;
                let (index, path) = (self.level + anchor.up, anchor.path.clone());
                Some(self.pool.mod_rel(index, path, *item))
            }
            ConData::ModProj { module, path, item } => {
                let anchor = self.map.modules.get(&module)?;
                let mut full = anchor.path.clone();
                full.extend(path);
                Some(self.pool.mod_rel(self.level + anchor.up, full, item))
            }
            _ => None,
        }
    }
}

struct AbstractSkolems<'p, 's> {
    pool: &'p mut Pool,
    skolems: &'s [SkolemId],
    base: u32,
}

impl ConFolder for AbstractSkolems<'_, '_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx> {
        if !self.pool.flags(idx).contains(ConFlags::HAS_SKOLEM) {
            return Some(idx);
        }
        let ConData::Skolem(id) = *self.pool.data(idx) else {
            return None;
        };
        let n = self.skolems.len() as u32;
        let j = self.skolems.iter().position(|s| *s == id)? as u32;
        Some(self.pool.rel(at.con + self.base + (n - 1 - j)))
    }
}

#[derive(Default)]
struct CollectMetas {
    seen: Vec<MetaId>,
}

impl ConVisitor for CollectMetas {
    fn visit_node(&mut self, pool: &Pool, idx: Idx, _at: Binders) -> bool {
        if !pool.flags(idx).contains(ConFlags::HAS_META) {
            return false;
        }
        if let ConData::Meta { var, .. } = pool.data(idx) {
            if !self.seen.contains(var) {
                self.seen.push(*var);
            }
        }
        true
    }
}

#[derive(Default)]
struct CollectSkolems {
    seen: Vec<SkolemId>,
}

impl ConVisitor for CollectSkolems {
    fn visit_node(&mut self, pool: &Pool, idx: Idx, _at: Binders) -> bool {
        if !pool.flags(idx).contains(ConFlags::HAS_SKOLEM) {
            return false;
        }
        if let ConData::Skolem(id) = pool.data(idx) {
            if !self.seen.contains(id) {
                self.seen.push(*id);
            }
        }
        true
    }
}

impl Pool {
    /// Shift every free variable of `c` up by `by`.
    pub fn lift(&mut self, c: Idx, by: u32) -> Idx {
        self.lift_above(c, by, 0)
    }

    /// Shift free variables with index at least `cutoff` up by `by`.
    pub fn lift_above(&mut self, c: Idx, by: u32, cutoff: u32) -> Idx {
        if by == 0 || self.outer(c) <= cutoff {
            return c;
        }
        fold_con(
            &mut Lift {
                pool: self,
                by,
                cutoff,
            },
            c,
            Binders::default(),
        )
    }

    /// `body[0 := arg]`: the body of a binder applied to `arg`.
    pub fn subst(&mut self, body: Idx, arg: Idx) -> Idx {
        if self.outer(body) == 0 {
            return body;
        }
        fold_con(&mut Subst { pool: self, arg }, body, Binders::default())
    }

    /// Read a metavariable solution at an occurrence with `spine`.
    pub fn instantiate_spine(&mut self, solution: Idx, spine: &[Idx]) -> Idx {
        if spine.is_empty() || self.outer(solution) == 0 {
            return solution;
        }
        fold_con(&mut Spine { pool: self, spine }, solution, Binders::default())
    }

    /// Substitute `arg` for kind variable 0 in every kind inside `c`.
    pub fn subst_kind(&mut self, c: Idx, arg: KindIdx) -> Idx {
        fold_con(&mut KindSubst { pool: self, arg }, c, Binders::default())
    }

    /// Shift kind variables in every kind inside `c`.
    pub fn lift_kinds(&mut self, c: Idx, by: u32) -> Idx {
        if by == 0 {
            return c;
        }
        fold_con(&mut KindLift { pool: self, by }, c, Binders::default())
    }

    /// Replace every solved metavariable in `c` by its solution, and every
    /// solved kind metavariable inside it likewise.
    pub fn zonk(&mut self, c: Idx) -> Idx {
        fold_con(&mut Zonk { pool: self }, c, Binders::default())
    }

    /// Remove the `by` innermost binders from the context of `c`.
    ///
    /// Fails when `c` mentions one of them.
    pub fn strengthen(&mut self, c: Idx, by: u32) -> Option<Idx> {
        if by == 0 || self.outer(c) == 0 {
            return Some(c);
        }
        let mut folder = Strengthen {
            pool: self,
            by,
            failed: false,
        };
        let result = fold_con(&mut folder, c, Binders::default());
        (!folder.failed).then_some(result)
    }

    /// Re-anchor signature-relative references: `ModRel` indices
    /// `from..from + refs.len()` become projections from `refs`, indices
    /// above that range are lowered, indices below it are untouched.
    pub fn subst_modules(&mut self, c: Idx, from: u32, refs: &[ModRef]) -> Idx {
        if refs.is_empty() || !self.flags(c).contains(ConFlags::HAS_MOD_REL) {
            return c;
        }
        fold_con(&mut ModSubst { pool: self, from, refs }, c, Binders::default())
    }

    /// Turn references to the definitions and modules in `map` into
    /// `ModRel` references, for a constructor sitting `level` signatures
    /// below the one the anchors are relative to.
    pub fn abstract_modules(&mut self, c: Idx, level: u32, map: &Abstraction) -> Idx {
        if map.is_empty() {
            return c;
        }
        fold_con(&mut Abstract { pool: self, level, map }, c, Binders::default())
    }

    /// Bind generalization skolems: skolem `j` of `n` becomes the variable
    /// bound by the `j`-th of `n` binders wrapped around a context that
    /// already has `base` binders.
    pub fn abstract_skolems(&mut self, c: Idx, skolems: &[SkolemId], base: u32) -> Idx {
        if skolems.is_empty() {
            return c;
        }
        fold_con(
            &mut AbstractSkolems {
                pool: self,
                skolems,
                base,
            },
            c,
            Binders::default(),
        )
    }

    /// Unresolved metavariables of `c`, in order of first occurrence.
    pub fn unresolved_metas(&mut self, c: Idx) -> Vec<MetaId> {
        let c = self.zonk(c);
        let mut collector = CollectMetas::default();
        visit_con(self, &mut collector, c, Binders::default());
        collector.seen
    }

    /// Skolems mentioned by `c` (after zonking).
    pub fn skolems_of(&mut self, c: Idx) -> Vec<SkolemId> {
        let c = self.zonk(c);
        let mut collector = CollectSkolems::default();
        visit_con(self, &mut collector, c, Binders::default());
        collector.seen
    }
}

#[cfg(test)]
mod tests;
