//! Type-class resolution.
//!
//! A class is a constructor function without a definition; a goal is that
//! function applied to arguments, e.g. `show (list int)`. Dictionaries come
//! from two places, tried in this order:
//!
//! 1. term variables in scope whose type is a class application;
//! 2. the global instance table.
//!
//! Instance search is speculative. Every candidate is matched under a
//! snapshot and rolled back; only a candidate that is the single definite
//! match is matched again for real. A goal whose metavariables could still
//! decide between candidates waits.
//!
//! A record goal `$(map show r)` asks for one dictionary per field and is
//! answered by a record of dictionaries once the fields of `r` are known.

use std::fmt;

use smallvec::SmallVec;
use urd_ir::Span;

use crate::norm::hnorm;
use crate::row::{fields_of, summarize, FieldSet};
use crate::unify::{try_unify, TryResult, UnifyEngine};
use crate::{ConData, GlobalTable, Idx, Instance, InstanceRef, KindIdx, MetaId, Pool};

/// A class-typed term variable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalDict {
    /// De Bruijn level of the term binder.
    pub level: u32,
    /// Its type, in a context of `depth` constructor binders.
    pub ty: Idx,
    pub depth: u32,
}

/// The dictionaries visible at a use site, innermost last.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClassScope {
    pub locals: Vec<LocalDict>,
}

/// Evidence for a class goal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Dict {
    /// The term variable with this de Bruijn index.
    Local { index: u32 },
    /// A global instance applied to the kinds and constructors it
    /// quantifies over and to the dictionaries it needs.
    Instance {
        source: InstanceRef,
        kinds: Vec<KindIdx>,
        cons: Vec<Idx>,
        dicts: Vec<Dict>,
    },
    /// One dictionary per field of a record goal.
    Record(Vec<(Idx, Dict)>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// `disjoint` are the instances' disjointness preconditions, still to
    /// be checked by the caller.
    Resolved { dict: Dict, disjoint: Vec<(Idx, Idx)> },
    Deferred { blockers: SmallVec<[MetaId; 2]> },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClassError {
    NoInstance { goal: Idx },
    Ambiguous { goal: Idx, candidates: Vec<InstanceRef> },
    NotAClass { goal: Idx },
    DepthExceeded { goal: Idx },
}

impl fmt::Display for ClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassError::NoInstance { goal } => write!(f, "no instance for {goal:?}"),
            ClassError::Ambiguous { goal, candidates } => write!(
                f,
                "{} instances match {goal:?}",
                candidates.len()
            ),
            ClassError::NotAClass { goal } => write!(f, "{goal:?} is not a class"),
            ClassError::DepthExceeded { goal } => {
                write!(f, "instance search for {goal:?} is too deep")
            }
        }
    }
}

impl std::error::Error for ClassError {}

/// An instance type taken apart with fresh metavariables.
struct Opened {
    kinds: Vec<KindIdx>,
    cons: Vec<Idx>,
    premises: Vec<Idx>,
    disjoint: Vec<(Idx, Idx)>,
    head: Idx,
}

enum Step {
    Found(Dict),
    Wait(SmallVec<[MetaId; 2]>),
}

pub struct ClassResolver<'a> {
    pool: &'a mut Pool,
    globals: &'a GlobalTable,
    scope: &'a ClassScope,
    /// Constructor binders in scope at the use site.
    depth: u32,
    /// Term binders in scope at the use site.
    val_depth: u32,
    max_depth: u32,
    span: Span,
    disjoint: Vec<(Idx, Idx)>,
}

impl<'a> ClassResolver<'a> {
    pub fn new(
        pool: &'a mut Pool,
        globals: &'a GlobalTable,
        scope: &'a ClassScope,
        depth: u32,
        val_depth: u32,
    ) -> Self {
        Self {
            pool,
            globals,
            scope,
            depth,
            val_depth,
            max_depth: 32,
            span: Span::DUMMY,
            disjoint: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Find the dictionary for `goal`. Nothing is committed unless the
    /// whole goal, premises included, resolves.
    #[tracing::instrument(level = "debug", skip(self), fields(depth = self.depth))]
    pub fn resolve(&mut self, goal: Idx) -> Result<Resolution, ClassError> {
        let snapshot = self.pool.snapshot();
        self.disjoint.clear();
        match self.resolve_goal(goal, 0) {
            Ok(Step::Found(dict)) => {
                self.pool.commit(snapshot);
                tracing::debug!(?dict, "resolved class goal");
                Ok(Resolution::Resolved {
                    dict,
                    disjoint: std::mem::take(&mut self.disjoint),
                })
            }
            Ok(Step::Wait(blockers)) => {
                self.pool.rollback_to(snapshot);
                Ok(Resolution::Deferred { blockers })
            }
            Err(err) => {
                self.pool.rollback_to(snapshot);
                Err(err)
            }
        }
    }

    fn resolve_goal(&mut self, goal: Idx, level: u32) -> Result<Step, ClassError> {
        if level > self.max_depth {
            return Err(ClassError::DepthExceeded { goal });
        }
        let goal = hnorm(self.pool, self.globals, goal);
        let goal_metas = self.pool.unresolved_metas(goal);

        if let Some(step) = self.from_locals(goal, &goal_metas) {
            return Ok(step);
        }

        if let ConData::Record(row) = *self.pool.data(goal) {
            return self.resolve_record(goal, row, level);
        }

        let head = self.head(goal);
        if let ConData::Meta { var, .. } = *self.pool.data(head) {
            return Ok(Step::Wait(SmallVec::from_elem(var, 1)));
        }
        if !self.globals.is_class_head(self.pool, head) {
            return Err(ClassError::NotAClass { goal });
        }

        let globals = self.globals;
        let mut yes: Vec<&Instance> = Vec::new();
        let mut maybe = 0usize;
        for inst in globals.instances() {
            match self.attempt(inst, goal, &goal_metas) {
                TryResult::Yes => yes.push(inst),
                TryResult::Maybe => maybe += 1,
                TryResult::No => {}
            }
        }
        tracing::trace!(?goal, yes = yes.len(), maybe, "instance candidates");

        if let ([inst], 0) = (yes.as_slice(), maybe) {
            return self.commit(inst, goal, level);
        }
        if !goal_metas.is_empty() {
            return Ok(Step::Wait(goal_metas.into_iter().collect()));
        }
        match yes.as_slice() {
            [] => Err(ClassError::NoInstance { goal }),
            [inst] => self.commit(inst, goal, level),
            many => Err(ClassError::Ambiguous {
                goal,
                candidates: many.iter().map(|inst| inst.source.clone()).collect(),
            }),
        }
    }

    /// Innermost local dictionary matching `goal`. `None` means global
    /// search should go ahead.
    fn from_locals(&mut self, goal: Idx, goal_metas: &[MetaId]) -> Option<Step> {
        let scope = self.scope;
        let mut undecided = false;
        for local in scope.locals.iter().rev() {
            let ty = self.pool.lift(local.ty, self.depth.saturating_sub(local.depth));
            match self.matches(ty, goal, goal_metas) {
                TryResult::Yes => {
                    if try_unify(self.pool, self.globals, self.depth, ty, goal) != TryResult::Yes {
                        continue;
                    }
                    let index = self.val_depth.saturating_sub(local.level + 1);
                    return Some(Step::Found(Dict::Local { index }));
                }
                TryResult::Maybe => undecided = true,
                TryResult::No => {}
            }
        }
        undecided.then(|| Step::Wait(goal_metas.iter().copied().collect()))
    }

    fn resolve_record(&mut self, goal: Idx, row: Idx, level: u32) -> Result<Step, ClassError> {
        let (fields, tail) = match fields_of(self.pool, self.globals, row) {
            FieldSet::Unknown(var) => return Ok(Step::Wait(SmallVec::from_elem(var, 1))),
            FieldSet::Closed(fields) => (fields, None),
            FieldSet::Open { fields, tail } => (fields, Some(tail)),
        };
        let mut blockers: SmallVec<[MetaId; 2]> = fields
            .iter()
            .filter_map(|&(name, _)| self.pool.unresolved_head(name))
            .collect();
        let mut rigid = false;
        if let Some(tail) = tail {
            let rest = summarize(self.pool, self.globals, tail);
            blockers.extend(rest.blockers(self.pool));
            rigid = rest.pieces.iter().any(|p| p.rest().is_some());
        }
        if !blockers.is_empty() {
            return Ok(Step::Wait(blockers));
        }
        // A row variable of goals has no dictionary to build here.
        if rigid {
            return Err(ClassError::NoInstance { goal });
        }

        let mut dicts = Vec::with_capacity(fields.len());
        let mut waiting: SmallVec<[MetaId; 2]> = SmallVec::new();
        for (name, value) in fields {
            match self.resolve_goal(value, level + 1)? {
                Step::Found(dict) => dicts.push((name, dict)),
                Step::Wait(b) => waiting.extend(b),
            }
        }
        if waiting.is_empty() {
            Ok(Step::Found(Dict::Record(dicts)))
        } else {
            Ok(Step::Wait(waiting))
        }
    }

    /// Match `inst` against `goal` and roll back.
    fn attempt(&mut self, inst: &Instance, goal: Idx, goal_metas: &[MetaId]) -> TryResult {
        let snapshot = self.pool.snapshot();
        let opened = self.open(inst.ty);
        let result = self.matches(opened.head, goal, goal_metas);
        self.pool.rollback_to(snapshot);
        result
    }

    /// Unify `candidate` with `goal` and roll back. A match that has to
    /// solve one of the goal's own metavariables is only a maybe: another
    /// candidate could fit just as well.
    fn matches(&mut self, candidate: Idx, goal: Idx, goal_metas: &[MetaId]) -> TryResult {
        let snapshot = self.pool.snapshot();
        let outcome = match try_unify(self.pool, self.globals, self.depth, candidate, goal) {
            TryResult::Yes if goal_metas.iter().any(|&v| self.pool.is_resolved(v)) => {
                TryResult::Maybe
            }
            outcome => outcome,
        };
        self.pool.rollback_to(snapshot);
        outcome
    }

    fn commit(&mut self, inst: &Instance, goal: Idx, level: u32) -> Result<Step, ClassError> {
        let opened = self.open(inst.ty);
        let mut engine = UnifyEngine::new(self.pool, self.globals, self.depth, self.span);
        if engine.unify(opened.head, goal).is_err() {
            tracing::error!(?goal, source = ?inst.source, "instance stopped matching on commit");
            return Err(ClassError::NoInstance { goal });
        }
        let mut dicts = Vec::with_capacity(opened.premises.len());
        let mut waiting: SmallVec<[MetaId; 2]> = SmallVec::new();
        for premise in opened.premises {
            match self.resolve_goal(premise, level + 1)? {
                Step::Found(dict) => dicts.push(dict),
                Step::Wait(b) => waiting.extend(b),
            }
        }
        if !waiting.is_empty() {
            return Ok(Step::Wait(waiting));
        }
        self.disjoint.extend(opened.disjoint);
        Ok(Step::Found(Dict::Instance {
            source: inst.source.clone(),
            kinds: opened.kinds,
            cons: opened.cons,
            dicts,
        }))
    }

    /// Strip the quantifiers, preconditions and dictionary parameters off
    /// an instance type.
    fn open(&mut self, ty: Idx) -> Opened {
        let mut opened = Opened {
            kinds: Vec::new(),
            cons: Vec::new(),
            premises: Vec::new(),
            disjoint: Vec::new(),
            head: ty,
        };
        let mut ty = ty;
        loop {
            ty = hnorm(self.pool, self.globals, ty);
            match self.pool.data(ty).clone() {
                ConData::Poly {
                    implicit: true,
                    kind,
                    body,
                    ..
                } => {
                    let meta = self.pool.fresh_meta(kind, self.span, self.depth);
                    opened.cons.push(meta);
                    ty = self.pool.subst(body, meta);
                }
                ConData::KPoly { body, .. } => {
                    let k = self.pool.kinds_mut().fresh(self.span);
                    opened.kinds.push(k);
                    ty = self.pool.subst_kind(body, k);
                }
                ConData::Disjoint { left, right, body } => {
                    opened.disjoint.push((left, right));
                    ty = body;
                }
                ConData::Fun(dom, cod) if self.is_goal(dom) => {
                    opened.premises.push(dom);
                    ty = cod;
                }
                _ => break,
            }
        }
        opened.head = ty;
        opened
    }

    /// Whether `c` is a class application or a record of them.
    fn is_goal(&mut self, c: Idx) -> bool {
        let c = hnorm(self.pool, self.globals, c);
        if let ConData::Record(row) = *self.pool.data(c) {
            let summary = summarize(self.pool, self.globals, row);
            let values: Vec<Idx> = summary.fields().map(|(_, v)| v).collect();
            return !values.is_empty() && values.into_iter().all(|v| self.is_goal(v));
        }
        let head = self.head(c);
        self.globals.is_class_head(self.pool, head)
    }

    fn head(&mut self, c: Idx) -> Idx {
        let mut c = c;
        loop {
            match *self.pool.data(c) {
                ConData::App(f, _) | ConData::KApp(f, _) => {
                    c = hnorm(self.pool, self.globals, f);
                }
                _ => return c,
            }
        }
    }
}

/// Whether `ty` is a class application, i.e. something a value of this type
/// can serve as an instance of.
pub fn is_class_type(pool: &mut Pool, globals: &GlobalTable, ty: Idx) -> bool {
    let scope = ClassScope::default();
    let snapshot = pool.snapshot();
    let mut resolver = ClassResolver::new(pool, globals, &scope, 0, 0);
    let opened = resolver.open(ty);
    let head = resolver.head(opened.head);
    let is_class = globals.is_class_head(resolver.pool, head);
    pool.rollback_to(snapshot);
    is_class
}

/// Whether `c` is a class application or a record of them: a parameter
/// that instance search fills in.
pub fn is_class_goal(pool: &mut Pool, globals: &GlobalTable, c: Idx) -> bool {
    let scope = ClassScope::default();
    let mut resolver = ClassResolver::new(pool, globals, &scope, 0, 0);
    resolver.is_goal(c)
}
