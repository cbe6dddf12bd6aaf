//! Kinds and constructors.
//!
//! Constructors are elaborated bidirectionally against kinds: `infer_con`
//! synthesizes a kind, `check_con` pushes an expected one inward where
//! that helps (unannotated binders, wildcards) and unifies otherwise.

use urd_ir::{
    ast::{ConNode, KindNode, RawCon, RawKind},
    Name, Span,
};
use urd_stack::ensure_sufficient_stack;
use urd_types::{
    Def, ElabError, ElabErrorKind, Idx, KindData, KindError, KindIdx, KindPredicate, ModItem,
    Namespace, SgnItem,
};

use crate::driver::Elaborator;
use crate::env::Binding;

impl Elaborator<'_> {
    // ========================================
    // Kinds
    // ========================================

    pub(crate) fn elab_kind(&mut self, k: &RawKind) -> Result<KindIdx, ElabError> {
        Ok(match &k.node {
            KindNode::Type => KindIdx::TYPE,
            KindNode::Unit => KindIdx::UNIT,
            KindNode::Name => KindIdx::NAME,
            KindNode::Arrow(dom, cod) => {
                let dom = self.elab_kind(dom)?;
                let cod = self.elab_kind(cod)?;
                self.pool.kinds_mut().arrow(dom, cod)
            }
            KindNode::Record(elem) => {
                let elem = self.elab_kind(elem)?;
                self.pool.kinds_mut().record(elem)
            }
            KindNode::Tuple(ks) => {
                let ks = ks
                    .iter()
                    .map(|k| self.elab_kind(k))
                    .collect::<Result<Vec<_>, _>>()?;
                self.pool.kinds_mut().tuple(ks)
            }
            KindNode::Var(name) => match self.env.lookup_kind(*name) {
                Some(index) => self.pool.kinds_mut().rel(index),
                None => return Err(ElabError::unbound(k.span, *name, Namespace::Con)),
            },
            KindNode::Poly(name, body) => {
                let mark = self.env.mark();
                self.env.push_kind(*name);
                let body = self.elab_kind(body);
                self.env.reset(mark);
                let body = body?;
                self.pool.kinds_mut().poly(*name, body)
            }
            KindNode::Wild => self.fresh_kind(k.span),
        })
    }

    // ========================================
    // Constructors
    // ========================================

    pub(crate) fn check_con(&mut self, c: &RawCon, expected: KindIdx) -> Result<Idx, ElabError> {
        ensure_sufficient_stack(|| self.check_con_inner(c, expected))
    }

    fn check_con_inner(&mut self, c: &RawCon, expected: KindIdx) -> Result<Idx, ElabError> {
        match &c.node {
            ConNode::Wild => Ok(self.fresh_meta(expected, c.span)),
            ConNode::Abs(name, None, body) => {
                let resolved = self.pool.kinds_mut().resolve(expected);
                if let KindData::Arrow(dom, cod) = *self.pool.kinds().data(resolved) {
                    let mark = self.env.mark();
                    self.env.push_con(*name, dom);
                    let body = self.check_con(body, cod);
                    self.env.reset(mark);
                    return Ok(self.pool.abs(*name, dom, body?));
                }
                self.check_by_inference(c, expected)
            }
            _ => self.check_by_inference(c, expected),
        }
    }

    fn check_by_inference(&mut self, c: &RawCon, expected: KindIdx) -> Result<Idx, ElabError> {
        let (con, found) = self.infer_con(c)?;
        self.unify_kind(expected, found, Some(con), c.span)?;
        Ok(con)
    }

    pub(crate) fn infer_con(&mut self, c: &RawCon) -> Result<(Idx, KindIdx), ElabError> {
        ensure_sufficient_stack(|| self.infer_con_inner(c))
    }

    fn infer_con_inner(&mut self, c: &RawCon) -> Result<(Idx, KindIdx), ElabError> {
        let span = c.span;
        match &c.node {
            ConNode::Var(name) => {
                let (con, kind) = self.con_var(*name, span)?;
                Ok(self.instantiate_kind(con, kind, span))
            }
            ConNode::Path(modules, item) => {
                let (con, kind) = self.con_path(modules, *item, span)?;
                Ok(self.instantiate_kind(con, kind, span))
            }
            ConNode::App(func, arg) => {
                let (func, fk) = self.infer_con(func)?;
                let fk = self.pool.kinds_mut().resolve(fk);
                let (dom, cod) = match *self.pool.kinds().data(fk) {
                    KindData::Arrow(dom, cod) => (dom, cod),
                    _ => {
                        let dom = self.fresh_kind(span);
                        let cod = self.fresh_kind(span);
                        let arrow = self.pool.kinds_mut().arrow(dom, cod);
                        self.unify_kind(arrow, fk, Some(func), span)?;
                        (dom, cod)
                    }
                };
                let arg = self.check_con(arg, dom)?;
                Ok((self.pool.app(func, arg), cod))
            }
            ConNode::Abs(name, kind, body) => {
                let kind = match kind {
                    Some(k) => self.elab_kind(k)?,
                    None => self.fresh_kind(span),
                };
                let mark = self.env.mark();
                self.env.push_con(*name, kind);
                let body = self.infer_con(body);
                self.env.reset(mark);
                let (body, body_kind) = body?;
                let arrow = self.pool.kinds_mut().arrow(kind, body_kind);
                Ok((self.pool.abs(*name, kind, body), arrow))
            }
            ConNode::Fun(dom, cod) => {
                let dom = self.check_con(dom, KindIdx::TYPE)?;
                let cod = self.check_con(cod, KindIdx::TYPE)?;
                Ok((self.pool.fun(dom, cod), KindIdx::TYPE))
            }
            ConNode::Poly {
                name,
                implicit,
                kind,
                body,
            } => {
                let kind = match kind {
                    Some(k) => self.elab_kind(k)?,
                    None => self.fresh_kind(span),
                };
                let mark = self.env.mark();
                self.env.push_con(*name, kind);
                let body = self.check_con(body, KindIdx::TYPE);
                self.env.reset(mark);
                Ok((self.pool.poly(*name, *implicit, kind, body?), KindIdx::TYPE))
            }
            ConNode::KPoly(name, body) => {
                let mark = self.env.mark();
                self.env.push_kind(*name);
                let body = self.check_con(body, KindIdx::TYPE);
                self.env.reset(mark);
                Ok((self.pool.kpoly(*name, body?), KindIdx::TYPE))
            }
            ConNode::Disjoint(left, right, body) => {
                let left = self.infer_row(left)?;
                let right = self.infer_row(right)?;
                let mark = self.env.mark();
                self.env.push_fact(left, right);
                let body = self.check_con(body, KindIdx::TYPE);
                self.env.reset(mark);
                Ok((self.pool.disjoint(left, right, body?), KindIdx::TYPE))
            }
            ConNode::Record(row) => {
                let row = self.check_con(row, KindIdx::ROW_TYPE)?;
                Ok((self.pool.record(row), KindIdx::TYPE))
            }
            ConNode::Variant(row) => {
                let row = self.check_con(row, KindIdx::ROW_TYPE)?;
                Ok((self.pool.variant(row), KindIdx::TYPE))
            }
            ConNode::Row(fields) => {
                let elem = self.fresh_kind(span);
                let mut out = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    let name = self.check_con(name, KindIdx::NAME)?;
                    let value = self.check_con(value, elem)?;
                    out.push((name, value));
                }
                self.check_literal_fields(elem, &out, span)?;
                let kind = self.pool.kinds_mut().record(elem);
                Ok((self.pool.row(elem, out), kind))
            }
            ConNode::FieldName(name) => Ok((self.pool.field_name(*name), KindIdx::NAME)),
            ConNode::Concat(left, right) => {
                let elem = self.fresh_kind(span);
                let kind = self.pool.kinds_mut().record(elem);
                let left = self.check_con(left, kind)?;
                let right = self.check_con(right, kind)?;
                self.require_disjoint(left, right, span)?;
                Ok((self.pool.concat(left, right), kind))
            }
            ConNode::Map(func, row) => {
                let dom = self.fresh_kind(span);
                let cod = self.fresh_kind(span);
                let arrow = self.pool.kinds_mut().arrow(dom, cod);
                let func = self.check_con(func, arrow)?;
                let dom_row = self.pool.kinds_mut().record(dom);
                let row = self.check_con(row, dom_row)?;
                let kind = self.pool.kinds_mut().record(cod);
                Ok((self.pool.map(dom, cod, func, row), kind))
            }
            ConNode::Proj(row, field) => {
                let elem = self.fresh_kind(span);
                let row_kind = self.pool.kinds_mut().record(elem);
                let row = self.check_con(row, row_kind)?;
                let field = self.check_con(field, KindIdx::NAME)?;
                Ok((self.pool.proj(row, field), elem))
            }
            ConNode::Unit => Ok((Idx::UNIT, KindIdx::UNIT)),
            ConNode::Tuple(elems) => {
                let mut cons = Vec::with_capacity(elems.len());
                let mut kinds = Vec::with_capacity(elems.len());
                for elem in elems {
                    let (con, kind) = self.infer_con(elem)?;
                    cons.push(con);
                    kinds.push(kind);
                }
                let kind = self.pool.kinds_mut().tuple(kinds);
                Ok((self.pool.tuple(cons), kind))
            }
            ConNode::TupleProj(tuple, index) => {
                let (tuple, kind) = self.infer_con(tuple)?;
                let Some(index) = index.checked_sub(1) else {
                    let error = KindError::Predicate {
                        predicate: KindPredicate::TupleWidth(1),
                        found: kind,
                    };
                    return Err(ElabError::from_kind(span, error, Some(tuple)));
                };
                let component = self
                    .pool
                    .kinds_mut()
                    .tuple_component(kind, index, span)
                    .map_err(|err| ElabError::from_kind(span, err, Some(tuple)))?;
                Ok((self.pool.tuple_proj(tuple, index), component))
            }
            ConNode::KAbs(name, body) => {
                let mark = self.env.mark();
                self.env.push_kind(*name);
                let body = self.infer_con(body);
                self.env.reset(mark);
                let (body, kind) = body?;
                let kind = self.pool.kinds_mut().poly(*name, kind);
                Ok((self.pool.kabs(*name, body), kind))
            }
            ConNode::KApp(func, arg) => {
                let (func, kind) = match &func.node {
                    ConNode::Var(name) => self.con_var(*name, func.span)?,
                    ConNode::Path(modules, item) => self.con_path(modules, *item, func.span)?,
                    _ => self.infer_con(func)?,
                };
                let kind = self.pool.kinds_mut().resolve(kind);
                let KindData::Poly { body, .. } = *self.pool.kinds().data(kind) else {
                    let var = self.fresh_kind(span);
                    let expected = self.pool.kinds_mut().poly(Name::EMPTY, var);
                    let error = KindError::Mismatch {
                        expected,
                        found: kind,
                    };
                    return Err(ElabError::from_kind(span, error, Some(func)));
                };
                let arg = self.elab_kind(arg)?;
                let result = self.pool.kinds_mut().subst(body, arg, 0);
                Ok((self.pool.kapp(func, arg), result))
            }
            ConNode::Annot(con, kind) => {
                let kind = self.elab_kind(kind)?;
                let con = self.check_con(con, kind)?;
                Ok((con, kind))
            }
            ConNode::Wild => {
                let kind = self.fresh_kind(span);
                Ok((self.fresh_meta(kind, span), kind))
            }
        }
    }

    /// A row of any element kind.
    fn infer_row(&mut self, c: &RawCon) -> Result<Idx, ElabError> {
        let elem = self.fresh_kind(c.span);
        let kind = self.pool.kinds_mut().record(elem);
        self.check_con(c, kind)
    }

    /// Fields of one literal must be distinct: equal constant names are an
    /// overlap, names not known yet are disjointness obligations.
    pub(crate) fn check_literal_fields(
        &mut self,
        elem: KindIdx,
        fields: &[(Idx, Idx)],
        span: Span,
    ) -> Result<(), ElabError> {
        for (i, &(n1, v1)) in fields.iter().enumerate() {
            for &(n2, v2) in &fields[i + 1..] {
                let left = self.pool.row(elem, vec![(n1, v1)]);
                let right = self.pool.row(elem, vec![(n2, v2)]);
                if n1 == n2 {
                    return Err(ElabError::new(
                        span,
                        ElabErrorKind::FieldOverlap {
                            field: n1,
                            left,
                            right,
                        },
                    ));
                }
                let both_constant = [n1, n2]
                    .iter()
                    .all(|&n| matches!(self.pool.data(n), urd_types::ConData::FieldName(_)));
                if !both_constant {
                    self.require_disjoint(left, right, span)?;
                }
            }
        }
        Ok(())
    }

    /// Apply a kind-polymorphic constructor to fresh kinds.
    fn instantiate_kind(&mut self, mut con: Idx, mut kind: KindIdx, span: Span) -> (Idx, KindIdx) {
        loop {
            let resolved = self.pool.kinds_mut().resolve(kind);
            let KindData::Poly { body, .. } = *self.pool.kinds().data(resolved) else {
                return (con, kind);
            };
            let arg = self.fresh_kind(span);
            con = self.pool.kapp(con, arg);
            kind = self.pool.kinds_mut().subst(body, arg, 0);
        }
    }

    // ========================================
    // Names
    // ========================================

    /// An unqualified constructor name: local binders, then declared
    /// names, then builtins.
    fn con_var(&mut self, name: Name, span: Span) -> Result<(Idx, KindIdx), ElabError> {
        if let Some((index, kind)) = self.env.lookup_con(&mut self.pool, name) {
            return Ok((self.pool.rel(index), kind));
        }
        if let Some(binding) = self.env.resolve(name, Namespace::Con).cloned() {
            return self.con_binding(&binding, name, span);
        }
        if let Some(prim) = self.builtin(name) {
            return Ok((prim, KindIdx::TYPE));
        }
        Err(ElabError::unbound(span, name, Namespace::Con))
    }

    fn con_binding(
        &mut self,
        binding: &Binding,
        name: Name,
        span: Span,
    ) -> Result<(Idx, KindIdx), ElabError> {
        match binding {
            Binding::Def(def) => {
                let kind = match self.globals.def(*def).def {
                    Def::Con { kind, .. } | Def::Class { kind, .. } => kind,
                    Def::Val { .. } => return Err(ElabError::unbound(span, name, Namespace::Con)),
                };
                Ok((self.pool.named(*def), kind))
            }
            Binding::Opened(module) => self.module_con(module, name, span),
            Binding::SgnCon { level, path, kind } => {
                let index = self.sgn_level - level;
                Ok((self.pool.mod_rel(index, path.clone(), name), *kind))
            }
            Binding::Module(_) | Binding::Sgn(_) | Binding::SgnStr { .. } => {
                Err(ElabError::unbound(span, name, Namespace::Con))
            }
        }
    }

    fn module_con(
        &mut self,
        module: &urd_types::ModRef,
        item: Name,
        span: Span,
    ) -> Result<(Idx, KindIdx), ElabError> {
        match self
            .globals
            .module_item(&mut self.pool, module, item, Namespace::Con)
        {
            Some(ModItem::Con { kind, .. } | ModItem::Class { kind, .. }) => {
                let canonical = self.globals.canonical(module);
                let con = self.pool.mod_proj(canonical.module, canonical.path, item);
                Ok((con, kind))
            }
            _ => Err(ElabError::unbound(span, item, Namespace::Con)),
        }
    }

    /// `M.N.t`: a module in scope, or a structure item of the signature
    /// being elaborated.
    fn con_path(
        &mut self,
        modules: &[Name],
        item: Name,
        span: Span,
    ) -> Result<(Idx, KindIdx), ElabError> {
        let Some((&first, rest)) = modules.split_first() else {
            return self.con_var(item, span);
        };
        match self.env.resolve(first, Namespace::Module).cloned() {
            Some(Binding::SgnStr { level, path, sgn }) => {
                let mut sgn = sgn;
                let mut path = path;
                for &step in rest {
                    sgn = match sgn.item(step, Namespace::Module) {
                        Some(SgnItem::Str { sgn, .. }) => sgn.clone(),
                        _ => return Err(ElabError::unbound(span, step, Namespace::Module)),
                    };
                    path.push(step);
                }
                if sgn.is_error() {
                    return Ok((Idx::ERROR, KindIdx::ERROR));
                }
                let kind = match sgn.item(item, Namespace::Con) {
                    Some(SgnItem::Con { kind, .. } | SgnItem::Class { kind, .. }) => *kind,
                    _ => return Err(ElabError::unbound(span, item, Namespace::Con)),
                };
                let index = self.sgn_level - level;
                Ok((self.pool.mod_rel(index, path, item), kind))
            }
            Some(_) => {
                let module = self.module_path(modules, span)?;
                self.module_con(&module, item, span)
            }
            None => Err(ElabError::unbound(span, first, Namespace::Module)),
        }
    }
}
