//! Kinds and the kind unifier.
//!
//! Kinds are interned in a [`KindPool`] the same way constructors are
//! interned in the [`Pool`](crate::Pool): structurally equal kinds share a
//! [`KindIdx`]. Kind metavariables are cells in the same pool, resolved by
//! linking, with path compression on the way back out.
//!
//! Kind metavariables do not track binder depth. A kind metavariable created
//! under a kind binder (`fn [[k]] => ...`) may be solved with a kind that
//! mentions that binder; reading the solution outside the binder is not
//! re-indexed. Kind-polymorphic code is rare enough that the elaborator
//! accepts this.
//!
//! Kind relationships are always decidable, so kind unification never
//! postpones: it succeeds or fails on the spot.

use std::fmt;

use rustc_hash::FxHashMap;
use urd_ir::{Name, Span, StringInterner};

/// Index into the kind pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct KindIdx(u32);

impl KindIdx {
    /// `Type`
    pub const TYPE: Self = Self(0);
    /// `Unit`
    pub const UNIT: Self = Self(1);
    /// `Name`
    pub const NAME: Self = Self(2);
    /// Poison kind.
    pub const ERROR: Self = Self(3);
    /// `{Type}`
    pub const ROW_TYPE: Self = Self(4);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for KindIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::TYPE => write!(f, "KindIdx(Type)"),
            Self::UNIT => write!(f, "KindIdx(Unit)"),
            Self::NAME => write!(f, "KindIdx(Name)"),
            Self::ERROR => write!(f, "KindIdx(<error>)"),
            Self::ROW_TYPE => write!(f, "KindIdx({{Type}})"),
            _ => write!(f, "KindIdx({})", self.0),
        }
    }
}

/// A kind metavariable.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct KindVarId(u32);

impl KindVarId {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Kind structure.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum KindData {
    Type,
    Unit,
    Name,
    Error,
    Arrow(KindIdx, KindIdx),
    /// `{k}`: rows whose fields have kind `k`.
    Record(KindIdx),
    Tuple(Vec<KindIdx>),
    /// Kind variable bound by an enclosing kind binder (de Bruijn).
    Rel(u32),
    /// `x --> k`
    Poly { name: Name, body: KindIdx },
    Meta(KindVarId),
}

/// What an unresolved kind metavariable may be solved with.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KindPredicate {
    Any,
    /// Only row kinds `{k}`.
    Record,
    /// Only tuple kinds with at least this many components.
    TupleWidth(u32),
}

impl KindPredicate {
    /// Conjunction of two predicates, or `None` when they conflict.
    pub fn meet(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Any, p) | (p, Self::Any) => Some(p),
            (Self::Record, Self::Record) => Some(Self::Record),
            (Self::TupleWidth(a), Self::TupleWidth(b)) => Some(Self::TupleWidth(a.max(b))),
            (Self::Record, Self::TupleWidth(_)) | (Self::TupleWidth(_), Self::Record) => None,
        }
    }
}

impl fmt::Display for KindPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any kind"),
            Self::Record => write!(f, "a row kind"),
            Self::TupleWidth(n) => write!(f, "a tuple kind of width at least {n}"),
        }
    }
}

/// State of a kind metavariable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KindVarState {
    Unbound {
        span: Span,
        predicate: KindPredicate,
        /// Kinds already demanded of particular tuple components
        /// (zero-based), for `TupleWidth` predicates.
        components: Vec<(u32, KindIdx)>,
    },
    Link {
        target: KindIdx,
    },
}

/// Kind unification failure.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum KindError {
    Mismatch { expected: KindIdx, found: KindIdx },
    Occurs { var: KindVarId, kind: KindIdx },
    Predicate { predicate: KindPredicate, found: KindIdx },
}

impl fmt::Display for KindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { expected, found } => {
                write!(f, "kind mismatch: expected {expected:?}, found {found:?}")
            }
            Self::Occurs { var, kind } => {
                write!(f, "kind variable {var:?} occurs in {kind:?}")
            }
            Self::Predicate { predicate, found } => {
                write!(f, "expected {predicate}, found {found:?}")
            }
        }
    }
}

impl std::error::Error for KindError {}

/// Kind arena.
pub struct KindPool {
    items: Vec<KindData>,
    /// Whether each kind mentions a free `Rel`, for cheap lift/subst skips.
    has_rel: Vec<bool>,
    /// Whether each kind mentions a metavariable, solved or not.
    mentions_meta: Vec<bool>,
    intern_map: FxHashMap<KindData, KindIdx>,
    vars: Vec<KindVarState>,
    undo: Vec<(KindVarId, KindVarState)>,
    snapshots: u32,
}

impl Default for KindPool {
    fn default() -> Self {
        Self::new()
    }
}

impl KindPool {
    pub fn new() -> Self {
        let mut pool = Self {
            items: Vec::with_capacity(64),
            has_rel: Vec::with_capacity(64),
            mentions_meta: Vec::with_capacity(64),
            intern_map: FxHashMap::default(),
            vars: Vec::new(),
            undo: Vec::new(),
            snapshots: 0,
        };
        pool.intern(KindData::Type);
        pool.intern(KindData::Unit);
        pool.intern(KindData::Name);
        pool.intern(KindData::Error);
        pool.intern(KindData::Record(KindIdx::TYPE));
        pool
    }

    pub fn intern(&mut self, data: KindData) -> KindIdx {
        if let Some(&idx) = self.intern_map.get(&data) {
            return idx;
        }
        let has_rel = match &data {
            KindData::Rel(_) => true,
            KindData::Arrow(a, b) => self.has_rel(*a) || self.has_rel(*b),
            KindData::Record(k) => self.has_rel(*k),
            KindData::Tuple(ks) => ks.iter().any(|k| self.has_rel(*k)),
            // Conservative: the body may refer to outer binders.
            KindData::Poly { body, .. } => self.has_rel(*body),
            KindData::Type
            | KindData::Unit
            | KindData::Name
            | KindData::Error
            | KindData::Meta(_) => false,
        };
        let mentions_meta = match &data {
            KindData::Meta(_) => true,
            KindData::Arrow(a, b) => self.mentions_meta(*a) || self.mentions_meta(*b),
            KindData::Record(k) | KindData::Poly { body: k, .. } => self.mentions_meta(*k),
            KindData::Tuple(ks) => ks.iter().any(|k| self.mentions_meta(*k)),
            _ => false,
        };
        let idx = KindIdx(u32::try_from(self.items.len()).unwrap_or(u32::MAX));
        self.items.push(data.clone());
        self.has_rel.push(has_rel);
        self.mentions_meta.push(mentions_meta);
        self.intern_map.insert(data, idx);
        idx
    }

    #[inline]
    pub fn data(&self, k: KindIdx) -> &KindData {
        &self.items[k.0 as usize]
    }

    #[inline]
    pub fn has_rel(&self, k: KindIdx) -> bool {
        self.has_rel[k.0 as usize]
    }

    /// Whether `k` syntactically mentions a metavariable, solved or not.
    #[inline]
    pub fn mentions_meta(&self, k: KindIdx) -> bool {
        self.mentions_meta[k.0 as usize]
    }

    // === Construction helpers ===

    pub fn arrow(&mut self, dom: KindIdx, cod: KindIdx) -> KindIdx {
        self.intern(KindData::Arrow(dom, cod))
    }

    pub fn record(&mut self, elem: KindIdx) -> KindIdx {
        self.intern(KindData::Record(elem))
    }

    pub fn tuple(&mut self, ks: Vec<KindIdx>) -> KindIdx {
        self.intern(KindData::Tuple(ks))
    }

    pub fn rel(&mut self, index: u32) -> KindIdx {
        self.intern(KindData::Rel(index))
    }

    pub fn poly(&mut self, name: Name, body: KindIdx) -> KindIdx {
        self.intern(KindData::Poly { name, body })
    }

    /// A fresh unconstrained kind metavariable.
    pub fn fresh(&mut self, span: Span) -> KindIdx {
        self.fresh_with(span, KindPredicate::Any)
    }

    pub fn fresh_with(&mut self, span: Span, predicate: KindPredicate) -> KindIdx {
        let var = KindVarId(u32::try_from(self.vars.len()).unwrap_or(u32::MAX));
        self.vars.push(KindVarState::Unbound {
            span,
            predicate,
            components: Vec::new(),
        });
        self.intern(KindData::Meta(var))
    }

    #[inline]
    pub fn var_state(&self, var: KindVarId) -> &KindVarState {
        &self.vars[var.0 as usize]
    }

    fn set_var(&mut self, var: KindVarId, state: KindVarState) {
        let slot = &mut self.vars[var.0 as usize];
        let prev = std::mem::replace(slot, state);
        if self.snapshots > 0 {
            self.undo.push((var, prev));
        }
    }

    // === Snapshots ===

    pub(crate) fn snapshot(&mut self) -> usize {
        self.snapshots += 1;
        self.undo.len()
    }

    pub(crate) fn rollback_to(&mut self, mark: usize) {
        while self.undo.len() > mark {
            if let Some((var, prev)) = self.undo.pop() {
                self.vars[var.0 as usize] = prev;
            }
        }
        self.snapshots = self.snapshots.saturating_sub(1);
    }

    /// Keep everything since the snapshot. Entries stay in the log while an
    /// outer snapshot is still open so that it can roll them back.
    pub(crate) fn commit(&mut self) {
        self.snapshots = self.snapshots.saturating_sub(1);
        if self.snapshots == 0 {
            self.undo.clear();
        }
    }

    // === Resolution ===

    /// Follow links to the representative, compressing the path.
    pub fn resolve(&mut self, k: KindIdx) -> KindIdx {
        let KindData::Meta(var) = *self.data(k) else {
            return k;
        };
        match *self.var_state(var) {
            KindVarState::Link { target } => {
                let resolved = self.resolve(target);
                if resolved != target {
                    self.set_var(var, KindVarState::Link { target: resolved });
                }
                resolved
            }
            KindVarState::Unbound { .. } => k,
        }
    }

    /// Resolve without path compression.
    pub fn resolve_readonly(&self, k: KindIdx) -> KindIdx {
        let KindData::Meta(var) = *self.data(k) else {
            return k;
        };
        match *self.var_state(var) {
            KindVarState::Link { target } => self.resolve_readonly(target),
            KindVarState::Unbound { .. } => k,
        }
    }

    /// Replace every solved metavariable inside `k` by its solution.
    pub fn zonk(&mut self, k: KindIdx) -> KindIdx {
        let k = self.resolve(k);
        match self.data(k).clone() {
            KindData::Arrow(a, b) => {
                let a = self.zonk(a);
                let b = self.zonk(b);
                self.arrow(a, b)
            }
            KindData::Record(e) => {
                let e = self.zonk(e);
                self.record(e)
            }
            KindData::Tuple(ks) => {
                let ks = ks.into_iter().map(|k| self.zonk(k)).collect();
                self.tuple(ks)
            }
            KindData::Poly { name, body } => {
                let body = self.zonk(body);
                self.poly(name, body)
            }
            _ => k,
        }
    }

    /// Whether `k` still mentions an unresolved metavariable.
    pub fn has_meta(&self, k: KindIdx) -> bool {
        let k = self.resolve_readonly(k);
        match self.data(k) {
            KindData::Meta(_) => true,
            KindData::Arrow(a, b) => self.has_meta(*a) || self.has_meta(*b),
            KindData::Record(e) => self.has_meta(*e),
            KindData::Tuple(ks) => ks.iter().any(|k| self.has_meta(*k)),
            KindData::Poly { body, .. } => self.has_meta(*body),
            _ => false,
        }
    }

    fn occurs(&self, var: KindVarId, k: KindIdx) -> bool {
        let k = self.resolve_readonly(k);
        match self.data(k) {
            KindData::Meta(other) => *other == var,
            KindData::Arrow(a, b) => self.occurs(var, *a) || self.occurs(var, *b),
            KindData::Record(e) => self.occurs(var, *e),
            KindData::Tuple(ks) => ks.iter().any(|k| self.occurs(var, *k)),
            KindData::Poly { body, .. } => self.occurs(var, *body),
            _ => false,
        }
    }

    // === Unification ===

    /// Unify two kinds.
    pub fn unify(&mut self, expected: KindIdx, found: KindIdx) -> Result<(), KindError> {
        if expected == found {
            return Ok(());
        }
        let a = self.resolve(expected);
        let b = self.resolve(found);
        if a == b || a == KindIdx::ERROR || b == KindIdx::ERROR {
            return Ok(());
        }
        tracing::trace!(?a, ?b, "unify kinds");

        match (self.data(a).clone(), self.data(b).clone()) {
            (KindData::Meta(va), KindData::Meta(vb)) => self.merge_vars(va, vb, b),
            (KindData::Meta(va), _) => self.solve(va, b),
            (_, KindData::Meta(vb)) => self.solve(vb, a),
            (KindData::Arrow(d1, c1), KindData::Arrow(d2, c2)) => {
                self.unify(d1, d2)?;
                self.unify(c1, c2)
            }
            (KindData::Record(e1), KindData::Record(e2)) => self.unify(e1, e2),
            (KindData::Tuple(k1), KindData::Tuple(k2)) if k1.len() == k2.len() => {
                for (x, y) in k1.into_iter().zip(k2) {
                    self.unify(x, y)?;
                }
                Ok(())
            }
            (KindData::Poly { body: b1, .. }, KindData::Poly { body: b2, .. }) => {
                self.unify(b1, b2)
            }
            _ => Err(KindError::Mismatch {
                expected: a,
                found: b,
            }),
        }
    }

    /// Solve an unbound variable, honoring its predicate.
    fn solve(&mut self, var: KindVarId, target: KindIdx) -> Result<(), KindError> {
        let KindVarState::Unbound {
            predicate,
            components,
            ..
        } = self.var_state(var).clone()
        else {
            // `resolve` returned a meta, so it must be unbound.
            tracing::error!(?var, "solving a linked kind variable");
            return Ok(());
        };
        if self.occurs(var, target) {
            return Err(KindError::Occurs { var, kind: target });
        }
        let data = self.data(target).clone();
        match predicate {
            KindPredicate::Any => {}
            KindPredicate::Record => {
                if !matches!(data, KindData::Record(_)) {
                    return Err(KindError::Predicate {
                        predicate,
                        found: target,
                    });
                }
            }
            KindPredicate::TupleWidth(n) => {
                let KindData::Tuple(ks) = &data else {
                    return Err(KindError::Predicate {
                        predicate,
                        found: target,
                    });
                };
                if (ks.len() as u64) < u64::from(n) {
                    return Err(KindError::Predicate {
                        predicate,
                        found: target,
                    });
                }
            }
        }
        self.set_var(var, KindVarState::Link { target });
        if let KindData::Tuple(ks) = data {
            for (i, k) in components {
                if let Some(&actual) = ks.get(i as usize) {
                    self.unify(k, actual)?;
                }
            }
        }
        Ok(())
    }

    /// Merge two unbound variables: `a` links to `b`, which keeps the
    /// conjunction of both predicates.
    fn merge_vars(&mut self, a: KindVarId, b: KindVarId, b_idx: KindIdx) -> Result<(), KindError> {
        let (
            KindVarState::Unbound {
                predicate: pa,
                components: ca,
                ..
            },
            KindVarState::Unbound {
                span,
                predicate: pb,
                components: cb,
            },
        ) = (self.var_state(a).clone(), self.var_state(b).clone())
        else {
            return Ok(());
        };
        let Some(predicate) = pa.meet(pb) else {
            return Err(KindError::Predicate {
                predicate: pa,
                found: b_idx,
            });
        };
        let mut components = cb;
        let mut pending = Vec::new();
        for (i, k) in ca {
            match components.iter().find(|(j, _)| *j == i) {
                Some(&(_, existing)) => pending.push((k, existing)),
                None => components.push((i, k)),
            }
        }
        self.set_var(
            b,
            KindVarState::Unbound {
                span,
                predicate,
                components,
            },
        );
        self.set_var(a, KindVarState::Link { target: b_idx });
        for (x, y) in pending {
            self.unify(x, y)?;
        }
        Ok(())
    }

    /// The kind of component `index` (zero-based) of a tuple-kinded
    /// constructor whose kind is `k`.
    ///
    /// When `k` is still unknown it is constrained to a tuple of sufficient
    /// width and the component kind is remembered for when it is solved.
    pub fn tuple_component(
        &mut self,
        k: KindIdx,
        index: u32,
        span: Span,
    ) -> Result<KindIdx, KindError> {
        let k = self.resolve(k);
        match self.data(k).clone() {
            KindData::Tuple(ks) => ks.get(index as usize).copied().ok_or(KindError::Predicate {
                predicate: KindPredicate::TupleWidth(index + 1),
                found: k,
            }),
            KindData::Meta(var) => {
                let KindVarState::Unbound {
                    span: var_span,
                    predicate,
                    mut components,
                } = self.var_state(var).clone()
                else {
                    return Ok(KindIdx::ERROR);
                };
                let Some(predicate) = predicate.meet(KindPredicate::TupleWidth(index + 1)) else {
                    return Err(KindError::Predicate {
                        predicate,
                        found: k,
                    });
                };
                if let Some(&(_, existing)) = components.iter().find(|(i, _)| *i == index) {
                    return Ok(existing);
                }
                let comp = self.fresh(span);
                components.push((index, comp));
                self.set_var(
                    var,
                    KindVarState::Unbound {
                        span: var_span,
                        predicate,
                        components,
                    },
                );
                Ok(comp)
            }
            KindData::Error => Ok(KindIdx::ERROR),
            _ => Err(KindError::Predicate {
                predicate: KindPredicate::TupleWidth(index + 1),
                found: k,
            }),
        }
    }

    /// Default every unresolved metavariable inside `k`.
    ///
    /// `Any` becomes `Type`, `Record` becomes `{Type}`, and `TupleWidth(n)`
    /// becomes an `n`-tuple whose demanded components keep their kinds and
    /// whose other components are `Type`.
    pub fn default_metas(&mut self, k: KindIdx) -> KindIdx {
        let k = self.resolve(k);
        match self.data(k).clone() {
            KindData::Meta(var) => {
                let KindVarState::Unbound {
                    predicate,
                    components,
                    ..
                } = self.var_state(var).clone()
                else {
                    return k;
                };
                let target = match predicate {
                    KindPredicate::Any => KindIdx::TYPE,
                    KindPredicate::Record => KindIdx::ROW_TYPE,
                    KindPredicate::TupleWidth(n) => {
                        let ks = (0..n)
                            .map(|i| {
                                components
                                    .iter()
                                    .find(|(j, _)| *j == i)
                                    .map_or(KindIdx::TYPE, |(_, c)| *c)
                            })
                            .collect();
                        self.tuple(ks)
                    }
                };
                self.set_var(var, KindVarState::Link { target });
                self.default_metas(target)
            }
            KindData::Arrow(a, b) => {
                let a = self.default_metas(a);
                let b = self.default_metas(b);
                self.arrow(a, b)
            }
            KindData::Record(e) => {
                let e = self.default_metas(e);
                self.record(e)
            }
            KindData::Tuple(ks) => {
                let ks = ks.into_iter().map(|k| self.default_metas(k)).collect();
                self.tuple(ks)
            }
            KindData::Poly { name, body } => {
                let body = self.default_metas(body);
                self.poly(name, body)
            }
            _ => k,
        }
    }

    // === de Bruijn ===

    /// Shift free kind variables at or above `cutoff` by `by`.
    pub fn lift(&mut self, k: KindIdx, by: u32, cutoff: u32) -> KindIdx {
        if by == 0 {
            return k;
        }
        let k = self.resolve(k);
        if !self.has_rel(k) {
            return k;
        }
        match self.data(k).clone() {
            KindData::Rel(i) if i >= cutoff => self.rel(i + by),
            KindData::Arrow(a, b) => {
                let a = self.lift(a, by, cutoff);
                let b = self.lift(b, by, cutoff);
                self.arrow(a, b)
            }
            KindData::Record(e) => {
                let e = self.lift(e, by, cutoff);
                self.record(e)
            }
            KindData::Tuple(ks) => {
                let ks = ks.into_iter().map(|k| self.lift(k, by, cutoff)).collect();
                self.tuple(ks)
            }
            KindData::Poly { name, body } => {
                let body = self.lift(body, by, cutoff + 1);
                self.poly(name, body)
            }
            _ => k,
        }
    }

    /// Substitute `arg` for kind variable `depth` in `k`, lowering the
    /// variables above it.
    pub fn subst(&mut self, k: KindIdx, arg: KindIdx, depth: u32) -> KindIdx {
        let k = self.resolve(k);
        if !self.has_rel(k) {
            return k;
        }
        match self.data(k).clone() {
            KindData::Rel(i) if i == depth => self.lift(arg, depth, 0),
            KindData::Rel(i) if i > depth => self.rel(i - 1),
            KindData::Arrow(a, b) => {
                let a = self.subst(a, arg, depth);
                let b = self.subst(b, arg, depth);
                self.arrow(a, b)
            }
            KindData::Record(e) => {
                let e = self.subst(e, arg, depth);
                self.record(e)
            }
            KindData::Tuple(ks) => {
                let ks = ks.into_iter().map(|k| self.subst(k, arg, depth)).collect();
                self.tuple(ks)
            }
            KindData::Poly { name, body } => {
                let body = self.subst(body, arg, depth + 1);
                self.poly(name, body)
            }
            _ => k,
        }
    }

    // === Formatting ===

    pub fn format(&self, k: KindIdx, interner: &StringInterner) -> String {
        let mut buf = String::new();
        self.format_into(k, interner, &mut Vec::new(), &mut buf);
        buf
    }

    pub(crate) fn format_into(
        &self,
        k: KindIdx,
        interner: &StringInterner,
        names: &mut Vec<Name>,
        buf: &mut String,
    ) {
        let k = self.resolve_readonly(k);
        match self.data(k) {
            KindData::Type => buf.push_str("Type"),
            KindData::Unit => buf.push_str("Unit"),
            KindData::Name => buf.push_str("Name"),
            KindData::Error => buf.push_str("<error>"),
            KindData::Arrow(a, b) => {
                let parens = matches!(self.data(self.resolve_readonly(*a)), KindData::Arrow(..));
                if parens {
                    buf.push('(');
                }
                self.format_into(*a, interner, names, buf);
                if parens {
                    buf.push(')');
                }
                buf.push_str(" -> ");
                self.format_into(*b, interner, names, buf);
            }
            KindData::Record(e) => {
                buf.push('{');
                self.format_into(*e, interner, names, buf);
                buf.push('}');
            }
            KindData::Tuple(ks) => {
                buf.push('(');
                for (i, k) in ks.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(" * ");
                    }
                    self.format_into(*k, interner, names, buf);
                }
                buf.push(')');
            }
            KindData::Rel(i) => {
                let depth = names.len();
                match (*i as usize).checked_add(1).and_then(|n| depth.checked_sub(n)) {
                    Some(pos) => buf.push_str(interner.lookup(names[pos])),
                    None => {
                        buf.push_str("_k");
                        buf.push_str(&i.to_string());
                    }
                }
            }
            KindData::Poly { name, body } => {
                buf.push_str(interner.lookup(*name));
                buf.push_str(" --> ");
                names.push(*name);
                self.format_into(*body, interner, names, buf);
                names.pop();
            }
            KindData::Meta(var) => {
                buf.push_str("?k");
                buf.push_str(&var.0.to_string());
            }
        }
    }
}
