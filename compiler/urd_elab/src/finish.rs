//! Closing a declaration group.
//!
//! At the end of a group every postponed obligation is forced. What is
//! still open after that is either generalized or reported:
//!
//! 1. Residual unifications are errors.
//! 2. Unresolved metavariables of the members' types become skolems, and
//!    later implicit quantifiers.
//! 3. Residual disjointness and class obligations that only mention those
//!    skolems become `[r1 ~ r2] =>` preconditions and dictionary
//!    parameters. Anything else is an error.
//! 4. Types and bodies are zonked, skolems abstracted, slots replaced by
//!    dictionaries, and recursive uses applied to the new parameters.

use std::collections::VecDeque;

use urd_ir::Span;
use urd_types::{
    check_disjoint,
    traverse::{fold_con, Binders, ConFolder},
    ClassError, ClassResolver, ConFlags, DefId, Dict, Disjointness, ElabError, ElabErrorKind, Idx,
    KindData, KindIdx, MetaId, MismatchReason, Obligation, Pool, Resolution, SkolemId, SlotId,
};

use crate::driver::Elaborator;
use crate::pat::bound_count;
use crate::tree::{Arm, Binding, Expr, Pat, RecFun};

/// One member of a declaration group: its type and elaborated body, and
/// its definition when other members may refer to it recursively.
#[derive(Clone, Debug)]
pub(crate) struct Member {
    pub(crate) def: Option<DefId>,
    pub(crate) ty: Idx,
    pub(crate) body: Expr,
    pub(crate) span: Span,
}

/// What generalization adds in front of every member of a group.
#[derive(Default)]
struct Generalized {
    /// Skolems standing for the new quantifiers, outermost first.
    skolems: Vec<SkolemId>,
    /// Disjointness preconditions, in terms of the skolems.
    facts: Vec<(Idx, Idx)>,
    /// Dictionary parameter types, in terms of the skolems.
    dicts: Vec<Idx>,
}

impl Generalized {
    fn is_empty(&self) -> bool {
        self.skolems.is_empty() && self.facts.is_empty() && self.dicts.is_empty()
    }

    /// Whether `c` may be abstracted: it is closed over the group, has no
    /// metavariables, and mentions at least one of the new quantifiers.
    fn liftable(&self, pool: &mut Pool, c: Idx) -> bool {
        if !pool.unresolved_metas(c).is_empty() {
            return false;
        }
        let skolems = pool.skolems_of(c);
        !skolems.is_empty() && skolems.iter().all(|s| self.skolems.contains(s))
    }
}

impl Elaborator<'_> {
    // ========================================
    // Constructors and kinds
    // ========================================

    /// Force the group's obligations and close a constructor: no
    /// metavariable may survive.
    pub(crate) fn close_con(&mut self, con: Idx, span: Span) -> Result<Idx, ElabError> {
        let residue = self.force()?;
        if let Some((obligation, blockers)) = residue.into_iter().next() {
            return Err(residual_error(&mut self.pool, obligation, &blockers));
        }
        let con = self.pool.zonk(con);
        let con = self.default_con_kinds(con);
        match self.pool.unresolved_metas(con).first() {
            Some(&meta) => Err(ElabError::ambiguous_type(span, meta)),
            None => Ok(con),
        }
    }

    /// Zonk a kind, defaulting its remaining metavariables.
    pub(crate) fn close_kind(&mut self, kind: KindIdx) -> KindIdx {
        let kinds = self.pool.kinds_mut();
        let kind = kinds.zonk(kind);
        if self.config.default_kinds {
            kinds.default_metas(kind)
        } else {
            kind
        }
    }

    fn default_con_kinds(&mut self, con: Idx) -> Idx {
        if !self.config.default_kinds || !self.pool.flags(con).contains(ConFlags::HAS_KIND_META) {
            return con;
        }
        fold_con(
            &mut DefaultKinds {
                pool: &mut self.pool,
            },
            con,
            Binders::default(),
        )
    }

    // ========================================
    // Value groups
    // ========================================

    /// Close a group of value declarations. The returned members have
    /// their final types and bodies.
    #[tracing::instrument(level = "debug", skip_all, fields(members = members.len()))]
    pub(crate) fn finish_group(
        &mut self,
        members: Vec<Member>,
    ) -> Result<Vec<Member>, ElabError> {
        let residue = self.force()?;
        let mut open = VecDeque::with_capacity(residue.len());
        for (obligation, blockers) in residue {
            if let Obligation::Unify { .. } = obligation {
                return Err(residual_error(&mut self.pool, obligation, &blockers));
            }
            open.push_back(obligation);
        }

        let mut quant = Generalized::default();
        if self.config.generalize {
            self.generalize(&members, &mut quant);
        }
        let lifted = self.settle(open, &mut quant)?;
        let m = u32::try_from(quant.dicts.len()).unwrap_or(u32::MAX);
        for (slot, k, val_depth) in lifted {
            self.queue.fill_slot(
                slot,
                Dict::Local {
                    index: val_depth + m - 1 - k,
                },
            );
        }
        if !quant.is_empty() {
            tracing::debug!(
                quantifiers = quant.skolems.len(),
                facts = quant.facts.len(),
                dicts = quant.dicts.len(),
                "generalized group"
            );
        }

        let recursive: Vec<DefId> = members.iter().filter_map(|m| m.def).collect();
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            let ty = self.close_type(member.ty, &quant, member.span)?;
            let body = self.close_body(member.body, &quant, &recursive, member.span)?;
            out.push(Member { ty, body, ..member });
        }
        Ok(out)
    }

    /// Turn the unresolved metavariables of the members' types into skolems.
    fn generalize(&mut self, members: &[Member], quant: &mut Generalized) {
        let mut metas: Vec<MetaId> = Vec::new();
        for member in members {
            for meta in self.pool.unresolved_metas(member.ty) {
                if !metas.contains(&meta) {
                    metas.push(meta);
                }
            }
        }
        let (mut rows, mut others) = (0, 0);
        for meta in metas {
            let kind = self.pool.meta(meta).kind;
            let kind = self.close_kind(kind);
            let name = if matches!(self.pool.kinds().data(kind), KindData::Record(_)) {
                rows += 1;
                format!("r{rows}")
            } else {
                others += 1;
                format!("t{others}")
            };
            let name = self.intern(&name);
            let skolem = self.pool.fresh_skolem(name, kind);
            if let Err(err) = self.pool.resolve_var(meta, skolem) {
                tracing::error!(%err, "generalizing a solved metavariable");
                continue;
            }
            if let urd_types::ConData::Skolem(id) = *self.pool.data(skolem) {
                quant.skolems.push(id);
            }
        }
        let solved = self.pool.take_resolved();
        self.queue.wake(&solved);
    }

    /// Re-check the residual obligations now that the quantifiers are
    /// known. Returns the class slots answered by a lifted dictionary, with
    /// its position and the term depth of the use.
    fn settle(
        &mut self,
        mut open: VecDeque<Obligation>,
        quant: &mut Generalized,
    ) -> Result<Vec<(SlotId, u32, u32)>, ElabError> {
        let mut lifted = Vec::new();
        while let Some(obligation) = open.pop_front() {
            match obligation {
                Obligation::Unify { .. } => {
                    return Err(residual_error(&mut self.pool, obligation, &[]));
                }
                Obligation::Disjoint {
                    left,
                    right,
                    depth,
                    facts,
                    span,
                } => match check_disjoint(&mut self.pool, &self.globals, left, right, &facts) {
                    Ok(Disjointness::Definite) => {}
                    Ok(Disjointness::Deferred { blockers }) => {
                        if let Some(&meta) = blockers.first() {
                            return Err(ElabError::ambiguous_type(span, meta));
                        }
                        let fact = self.lift_fact(left, right, depth, quant);
                        let Some(fact) = fact else {
                            let left = self.pool.zonk(left);
                            let right = self.pool.zonk(right);
                            return Err(ElabError::new(
                                span,
                                ElabErrorKind::UnprovableDisjointness { left, right },
                            ));
                        };
                        if !quant.facts.contains(&fact) {
                            quant.facts.push(fact);
                        }
                    }
                    Err(err) => return Err(ElabError::from_disjoint(span, err)),
                },
                Obligation::Class {
                    slot,
                    goal,
                    depth,
                    scope,
                    facts,
                    val_depth,
                    span,
                } => {
                    let resolution = ClassResolver::new(
                        &mut self.pool,
                        &self.globals,
                        &scope,
                        depth,
                        val_depth,
                    )
                    .with_max_depth(self.config.max_instance_depth)
                    .with_span(span)
                    .resolve(goal);
                    match resolution {
                        Ok(Resolution::Resolved { dict, disjoint }) => {
                            self.queue.fill_slot(slot, dict);
                            for (left, right) in disjoint {
                                open.push_back(Obligation::Disjoint {
                                    left,
                                    right,
                                    depth,
                                    facts: facts.clone(),
                                    span,
                                });
                            }
                        }
                        Ok(Resolution::Deferred { blockers }) => {
                            return Err(match blockers.first() {
                                Some(&meta) => ElabError::ambiguous_type(span, meta),
                                None => ElabError::new(span, ElabErrorKind::NoInstance { goal }),
                            });
                        }
                        Err(ClassError::NoInstance { goal } | ClassError::DepthExceeded { goal }) => {
                            let strengthened = self.pool.zonk(goal);
                            let strengthened = self.pool.strengthen(strengthened, depth);
                            match strengthened {
                                Some(g) if quant.liftable(&mut self.pool, g) => {
                                    let k = match quant.dicts.iter().position(|d| *d == g) {
                                        Some(k) => k,
                                        None => {
                                            quant.dicts.push(g);
                                            quant.dicts.len() - 1
                                        }
                                    };
                                    let k = u32::try_from(k).unwrap_or(u32::MAX);
                                    lifted.push((slot, k, val_depth));
                                }
                                _ => {
                                    return Err(ElabError::new(
                                        span,
                                        ElabErrorKind::NoInstance { goal },
                                    ))
                                }
                            }
                        }
                        Err(err) => return Err(ElabError::from_class(span, err)),
                    }
                }
            }
        }
        Ok(lifted)
    }

    fn lift_fact(
        &mut self,
        left: Idx,
        right: Idx,
        depth: u32,
        quant: &Generalized,
    ) -> Option<(Idx, Idx)> {
        let left = self.pool.zonk(left);
        let right = self.pool.zonk(right);
        let left = self.pool.strengthen(left, depth)?;
        let right = self.pool.strengthen(right, depth)?;
        let both = self.pool.concat(left, right);
        quant.liftable(&mut self.pool, both).then_some((left, right))
    }

    /// The final type of a member: quantifiers, preconditions and
    /// dictionary parameters in front of its zonked type.
    fn close_type(&mut self, ty: Idx, quant: &Generalized, span: Span) -> Result<Idx, ElabError> {
        let mut ty = self.pool.zonk(ty);
        for &dict in quant.dicts.iter().rev() {
            ty = self.pool.fun(dict, ty);
        }
        for &(left, right) in quant.facts.iter().rev() {
            ty = self.pool.disjoint(left, right, ty);
        }
        ty = self.pool.abstract_skolems(ty, &quant.skolems, 0);
        for &skolem in quant.skolems.iter().rev() {
            let info = self.pool.skolem(skolem).clone();
            ty = self.pool.poly(info.name, true, info.kind, ty);
        }
        let ty = self.default_con_kinds(ty);
        match self.pool.unresolved_metas(ty).first() {
            Some(&meta) => Err(ElabError::ambiguous_type(span, meta)),
            None => Ok(ty),
        }
    }

    fn close_body(
        &mut self,
        body: Expr,
        quant: &Generalized,
        recursive: &[DefId],
        span: Span,
    ) -> Result<Expr, ElabError> {
        let dict_name = self.intern("dict");
        let mut finisher = Finisher {
            elab: self,
            quant,
            recursive,
            con: 0,
            val: 0,
            ambiguous: None,
            unfilled: None,
        };
        let mut body = finisher.expr(body);
        if let Some(meta) = finisher.ambiguous {
            return Err(ElabError::ambiguous_type(span, meta));
        }
        if let Some(slot) = finisher.unfilled {
            let goal = self.queue.slot_goal(slot).unwrap_or(Idx::ERROR);
            let goal = self.pool.zonk(goal);
            return Err(ElabError::new(span, ElabErrorKind::NoInstance { goal }));
        }
        for &dict in quant.dicts.iter().rev() {
            let ty = self.pool.abstract_skolems(dict, &quant.skolems, 0);
            body = Expr::Abs {
                name: dict_name,
                ty,
                body: Box::new(body),
            };
        }
        for &(left, right) in quant.facts.iter().rev() {
            let left = self.pool.abstract_skolems(left, &quant.skolems, 0);
            let right = self.pool.abstract_skolems(right, &quant.skolems, 0);
            body = Expr::DisjointAbs {
                left,
                right,
                body: Box::new(body),
            };
        }
        for &skolem in quant.skolems.iter().rev() {
            let info = self.pool.skolem(skolem).clone();
            body = Expr::CAbs {
                name: info.name,
                kind: info.kind,
                body: Box::new(body),
            };
        }
        Ok(body)
    }
}

/// The error for an obligation nothing could decide.
pub(crate) fn residual_error(pool: &mut Pool, obligation: Obligation, blockers: &[MetaId]) -> ElabError {
    let span = obligation.span();
    if let Some(&meta) = blockers.first() {
        return ElabError::ambiguous_type(span, meta);
    }
    match obligation {
        Obligation::Unify {
            expected, found, ..
        } => {
            let expected = pool.zonk(expected);
            let found = pool.zonk(found);
            ElabError::new(
                span,
                ElabErrorKind::TypeMismatch {
                    expected,
                    found,
                    reason: MismatchReason::Structural,
                },
            )
        }
        Obligation::Disjoint { left, right, .. } => {
            let left = pool.zonk(left);
            let right = pool.zonk(right);
            ElabError::new(span, ElabErrorKind::UnprovableDisjointness { left, right })
        }
        Obligation::Class { goal, .. } => {
            let goal = pool.zonk(goal);
            ElabError::new(span, ElabErrorKind::NoInstance { goal })
        }
    }
}

/// Defaults the kind metavariables left inside a constructor.
struct DefaultKinds<'p> {
    pool: &'p mut Pool,
}

impl ConFolder for DefaultKinds<'_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, _at: Binders) -> Option<Idx> {
        if self.pool.flags(idx).contains(ConFlags::HAS_KIND_META) {
            None
        } else {
            Some(idx)
        }
    }

    fn fold_kind(&mut self, kind: KindIdx, _at: Binders) -> KindIdx {
        let kinds = self.pool.kinds_mut();
        let kind = kinds.zonk(kind);
        kinds.default_metas(kind)
    }
}

/// Rewrites a member body into its final form. `con` and `val` count the
/// constructor and term binders crossed from the top of the body.
struct Finisher<'e, 'a, 'g> {
    elab: &'e mut Elaborator<'a>,
    quant: &'g Generalized,
    recursive: &'g [DefId],
    con: u32,
    val: u32,
    ambiguous: Option<MetaId>,
    /// First dictionary slot still empty after forcing.
    unfilled: Option<SlotId>,
}

impl Finisher<'_, '_, '_> {
    fn con(&mut self, c: Idx) -> Idx {
        let c = self.elab.pool.zonk(c);
        let c = self.elab.pool.abstract_skolems(c, &self.quant.skolems, self.con);
        let c = self.elab.default_con_kinds(c);
        if self.ambiguous.is_none() {
            self.ambiguous = self.elab.pool.unresolved_metas(c).first().copied();
        }
        c
    }

    fn kind(&mut self, k: KindIdx) -> KindIdx {
        self.elab.close_kind(k)
    }

    fn under_con<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.con += 1;
        let out = f(self);
        self.con -= 1;
        out
    }

    fn under_vals<T>(&mut self, n: u32, f: impl FnOnce(&mut Self) -> T) -> T {
        self.val += n;
        let out = f(self);
        self.val -= n;
        out
    }

    fn boxed(&mut self, e: Box<Expr>) -> Box<Expr> {
        Box::new(self.expr(*e))
    }

    fn expr(&mut self, e: Expr) -> Expr {
        urd_stack::ensure_sufficient_stack(|| self.expr_inner(e))
    }

    fn expr_inner(&mut self, e: Expr) -> Expr {
        match e {
            Expr::Lit(_) | Expr::Rel(_) | Expr::ModProj { .. } => e,
            Expr::Named(def) if self.recursive.contains(&def) => self.recursive_use(def),
            Expr::Named(_) => e,
            Expr::App(f, a) => Expr::App(self.boxed(f), self.boxed(a)),
            Expr::Abs { name, ty, body } => Expr::Abs {
                name,
                ty: self.con(ty),
                body: self.under_vals(1, |this| this.boxed(body)),
            },
            Expr::CApp(f, c) => Expr::CApp(self.boxed(f), self.con(c)),
            Expr::CAbs { name, kind, body } => Expr::CAbs {
                name,
                kind: self.kind(kind),
                body: self.under_con(|this| this.boxed(body)),
            },
            Expr::KApp(f, k) => Expr::KApp(self.boxed(f), self.kind(k)),
            Expr::KAbs { name, body } => Expr::KAbs {
                name,
                body: self.boxed(body),
            },
            Expr::DisjointAbs { left, right, body } => Expr::DisjointAbs {
                left: self.con(left),
                right: self.con(right),
                body: self.boxed(body),
            },
            Expr::DisjointApp(f) => Expr::DisjointApp(self.boxed(f)),
            Expr::Record(fields) => Expr::Record(
                fields
                    .into_iter()
                    .map(|(name, value)| (self.con(name), self.expr(value)))
                    .collect(),
            ),
            Expr::Field {
                record,
                field,
                rest,
            } => Expr::Field {
                record: self.boxed(record),
                field: self.con(field),
                rest: self.con(rest),
            },
            Expr::Concat {
                left,
                right,
                left_row,
                right_row,
            } => Expr::Concat {
                left: self.boxed(left),
                right: self.boxed(right),
                left_row: self.con(left_row),
                right_row: self.con(right_row),
            },
            Expr::Cut {
                record,
                field,
                rest,
            } => Expr::Cut {
                record: self.boxed(record),
                field: self.con(field),
                rest: self.con(rest),
            },
            Expr::CutMulti { record, row, rest } => Expr::CutMulti {
                record: self.boxed(record),
                row: self.con(row),
                rest: self.con(rest),
            },
            Expr::Inject { field, value, row } => Expr::Inject {
                field: self.con(field),
                value: self.boxed(value),
                row: self.con(row),
            },
            Expr::Case {
                scrutinee,
                arms,
                ty,
            } => Expr::Case {
                scrutinee: self.boxed(scrutinee),
                arms: arms
                    .into_iter()
                    .map(|arm| {
                        let n = bound_count(&arm.pat);
                        Arm {
                            pat: self.pat(arm.pat),
                            body: self.under_vals(n, |this| this.expr(arm.body)),
                        }
                    })
                    .collect(),
                ty: self.con(ty),
            },
            Expr::Let { binding, body } => match binding {
                Binding::Val { name, ty, value } => Expr::Let {
                    binding: Binding::Val {
                        name,
                        ty: self.con(ty),
                        value: self.boxed(value),
                    },
                    body: self.under_vals(1, |this| this.boxed(body)),
                },
                Binding::Rec(funs) => {
                    let n = u32::try_from(funs.len()).unwrap_or(u32::MAX);
                    self.under_vals(n, |this| Expr::Let {
                        binding: Binding::Rec(
                            funs.into_iter()
                                .map(|fun| RecFun {
                                    name: fun.name,
                                    ty: this.con(fun.ty),
                                    body: this.expr(fun.body),
                                })
                                .collect(),
                        ),
                        body: this.boxed(body),
                    })
                }
            },
            Expr::If { cond, then, els } => Expr::If {
                cond: self.boxed(cond),
                then: self.boxed(then),
                els: self.boxed(els),
            },
            Expr::Dict(dict) => Expr::Dict(self.dict(dict)),
            Expr::Slot(slot) => match self.elab.queue.slot(slot).cloned() {
                Some(dict) => Expr::Dict(self.dict(dict)),
                None => {
                    tracing::debug!(?slot, "dictionary slot left unfilled");
                    self.unfilled.get_or_insert(slot);
                    Expr::Slot(slot)
                }
            },
        }
    }

    fn pat(&mut self, p: Pat) -> Pat {
        match p {
            Pat::Wild | Pat::Lit(_) => p,
            Pat::Var { name, ty } => Pat::Var {
                name,
                ty: self.con(ty),
            },
            Pat::Variant { field, payload } => Pat::Variant {
                field: self.con(field),
                payload: Box::new(self.pat(*payload)),
            },
            Pat::Record { fields, rest } => Pat::Record {
                fields: fields
                    .into_iter()
                    .map(|(field, p)| (self.con(field), self.pat(p)))
                    .collect(),
                rest: rest.map(|rest| self.con(rest)),
            },
        }
    }

    fn dict(&mut self, dict: Dict) -> Dict {
        match dict {
            Dict::Local { .. } => dict,
            Dict::Instance {
                source,
                kinds,
                cons,
                dicts,
            } => Dict::Instance {
                source,
                kinds: kinds.into_iter().map(|k| self.kind(k)).collect(),
                cons: cons.into_iter().map(|c| self.con(c)).collect(),
                dicts: dicts.into_iter().map(|d| self.dict(d)).collect(),
            },
            Dict::Record(fields) => Dict::Record(
                fields
                    .into_iter()
                    .map(|(field, d)| (self.con(field), self.dict(d)))
                    .collect(),
            ),
        }
    }

    /// A recursive use of a member, applied to the group's new parameters.
    fn recursive_use(&mut self, def: DefId) -> Expr {
        let n = u32::try_from(self.quant.skolems.len()).unwrap_or(u32::MAX);
        let m = u32::try_from(self.quant.dicts.len()).unwrap_or(u32::MAX);
        let mut e = Expr::Named(def);
        for j in 0..n {
            let var = self.elab.pool.rel(self.con + n - 1 - j);
            e = Expr::CApp(Box::new(e), var);
        }
        for _ in &self.quant.facts {
            e = Expr::DisjointApp(Box::new(e));
        }
        for k in 0..m {
            let dict = Dict::Local {
                index: self.val + m - 1 - k,
            };
            e = Expr::app(e, Expr::Dict(dict));
        }
        e
    }
}
