//! Expressions.
//!
//! `infer_expr` synthesizes a type; `check_expr` checks against one and
//! is where implicit abstractions are inserted: an expected type that
//! quantifies implicitly, assumes a disjointness, or takes a dictionary
//! gets the matching binder wrapped around the term. Using a variable
//! does the converse in [`Elaborator::instantiate`].

use urd_ir::{
    ast::{ExprNode, Lit, RawExpr, RawLocal},
    Name, Span,
};
use urd_stack::ensure_sufficient_stack;
use urd_types::{
    hnorm, is_class_goal, ConData, Def, ElabError, ElabErrorKind, Idx, KindIdx,
    MismatchReason, ModItem, Namespace,
};

use crate::driver::Elaborator;
use crate::env::Binding;
use crate::tree::{Arm, Binding as LetBinding, Expr, RecFun};

pub(crate) fn lit_type(lit: &Lit) -> Idx {
    match lit {
        Lit::Int(_) => Idx::INT,
        Lit::Float(_) => Idx::FLOAT,
        Lit::String(_) => Idx::STRING,
        Lit::Char(_) => Idx::CHAR,
        Lit::Bool(_) => Idx::BOOL,
    }
}

impl Elaborator<'_> {
    // ========================================
    // Checking
    // ========================================

    pub(crate) fn check_expr(&mut self, e: &RawExpr, expected: Idx) -> Result<Expr, ElabError> {
        ensure_sufficient_stack(|| self.check_expr_inner(e, expected))
    }

    fn check_expr_inner(&mut self, e: &RawExpr, expected: Idx) -> Result<Expr, ElabError> {
        let span = e.span;
        let ty = hnorm(&mut self.pool, &self.globals, expected);
        match self.pool.data(ty).clone() {
            ConData::Poly {
                name,
                implicit: true,
                kind,
                body,
            } if !matches!(e.node, ExprNode::CAbs { implicit: true, .. }) => {
                let mark = self.env.mark();
                self.env.push_con(name, kind);
                let inner = self.check_expr(e, body);
                self.env.reset(mark);
                return Ok(Expr::CAbs {
                    name,
                    kind,
                    body: Box::new(inner?),
                });
            }
            ConData::KPoly { name, body } if !matches!(e.node, ExprNode::KAbs(..)) => {
                let mark = self.env.mark();
                self.env.push_kind(name);
                let inner = self.check_expr(e, body);
                self.env.reset(mark);
                return Ok(Expr::KAbs {
                    name,
                    body: Box::new(inner?),
                });
            }
            ConData::Disjoint { left, right, body }
                if !matches!(e.node, ExprNode::DisjointAbs(..)) =>
            {
                let mark = self.env.mark();
                self.env.push_fact(left, right);
                let inner = self.check_expr(e, body);
                self.env.reset(mark);
                return Ok(Expr::DisjointAbs {
                    left,
                    right,
                    body: Box::new(inner?),
                });
            }
            ConData::Fun(dom, cod)
                if !matches!(e.node, ExprNode::Lam(..))
                    && is_class_goal(&mut self.pool, &self.globals, dom) =>
            {
                let name = self.intern("dict");
                let mark = self.env.mark();
                self.env.push_val(name, dom, true);
                let inner = self.check_expr(e, cod);
                self.env.reset(mark);
                return Ok(Expr::Abs {
                    name,
                    ty: dom,
                    body: Box::new(inner?),
                });
            }
            _ => {}
        }

        match (&e.node, self.pool.data(ty).clone()) {
            (ExprNode::Lam(name, ann, body), ConData::Fun(dom, cod)) => {
                if let Some(ann) = ann {
                    let ann = self.check_con(ann, KindIdx::TYPE)?;
                    self.unify(dom, ann, ann_span(e))?;
                }
                let dict = is_class_goal(&mut self.pool, &self.globals, dom);
                let mark = self.env.mark();
                self.env.push_val(*name, dom, dict);
                let body = self.check_expr(body, cod);
                self.env.reset(mark);
                Ok(Expr::Abs {
                    name: *name,
                    ty: dom,
                    body: Box::new(body?),
                })
            }
            (
                ExprNode::CAbs {
                    name,
                    implicit,
                    kind,
                    body,
                },
                ConData::Poly {
                    implicit: expected_implicit,
                    kind: expected_kind,
                    body: expected_body,
                    ..
                },
            ) if *implicit == expected_implicit => {
                if let Some(kind) = kind {
                    let kind = self.elab_kind(kind)?;
                    self.unify_kind(expected_kind, kind, None, span)?;
                }
                let mark = self.env.mark();
                self.env.push_con(*name, expected_kind);
                let body = self.check_expr(body, expected_body);
                self.env.reset(mark);
                Ok(Expr::CAbs {
                    name: *name,
                    kind: expected_kind,
                    body: Box::new(body?),
                })
            }
            (ExprNode::If(cond, then, els), _) => {
                let cond = self.check_expr(cond, Idx::BOOL)?;
                let then = self.check_expr(then, expected)?;
                let els = self.check_expr(els, expected)?;
                Ok(Expr::If {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    els: Box::new(els),
                })
            }
            (ExprNode::Let(locals, body), _) => {
                let (expr, _) = self.elab_let(locals, body, Some(expected))?;
                Ok(expr)
            }
            (ExprNode::Case(scrutinee, arms), _) => {
                let (expr, _) = self.elab_case(scrutinee, arms, Some(expected), span)?;
                Ok(expr)
            }
            _ => {
                let (expr, found) = self.infer_expr(e)?;
                self.unify(expected, found, span)?;
                Ok(expr)
            }
        }
    }

    // ========================================
    // Inference
    // ========================================

    pub(crate) fn infer_expr(&mut self, e: &RawExpr) -> Result<(Expr, Idx), ElabError> {
        ensure_sufficient_stack(|| self.infer_expr_inner(e))
    }

    fn infer_expr_inner(&mut self, e: &RawExpr) -> Result<(Expr, Idx), ElabError> {
        let span = e.span;
        match &e.node {
            ExprNode::Lit(lit) => Ok((Expr::Lit(lit.clone()), lit_type(lit))),
            ExprNode::Var(_) | ExprNode::Path(..) => {
                let (expr, ty) = self.infer_head(e)?;
                self.instantiate(expr, ty, span)
            }
            ExprNode::App(func, arg) => {
                let (func, fty) = self.infer_expr(func)?;
                let fty = hnorm(&mut self.pool, &self.globals, fty);
                let (dom, cod) = match *self.pool.data(fty) {
                    ConData::Fun(dom, cod) => (dom, cod),
                    _ => {
                        let dom = self.fresh_type(span);
                        let cod = self.fresh_type(span);
                        let fun = self.pool.fun(dom, cod);
                        self.unify(fun, fty, span)?;
                        (dom, cod)
                    }
                };
                let arg = self.check_expr(arg, dom)?;
                Ok((Expr::app(func, arg), cod))
            }
            ExprNode::Lam(name, ann, body) => {
                let dom = match ann {
                    Some(ann) => self.check_con(ann, KindIdx::TYPE)?,
                    None => self.fresh_type(span),
                };
                let dict = is_class_goal(&mut self.pool, &self.globals, dom);
                let mark = self.env.mark();
                self.env.push_val(*name, dom, dict);
                let body = self.infer_expr(body);
                self.env.reset(mark);
                let (body, cod) = body?;
                Ok((
                    Expr::Abs {
                        name: *name,
                        ty: dom,
                        body: Box::new(body),
                    },
                    self.pool.fun(dom, cod),
                ))
            }
            ExprNode::CApp(func, arg) => {
                let (func, fty) = self.infer_expr(func)?;
                let fty = hnorm(&mut self.pool, &self.globals, fty);
                let (kind, body) = match *self.pool.data(fty) {
                    ConData::Poly { kind, body, .. } => (kind, body),
                    _ => {
                        let kind = self.fresh_kind(span);
                        let depth = self.env.con_depth() + 1;
                        let body = self.pool.fresh_meta(KindIdx::TYPE, span, depth);
                        let poly = self.pool.poly(Name::EMPTY, false, kind, body);
                        self.unify(poly, fty, span)?;
                        (kind, body)
                    }
                };
                let arg = self.check_con(arg, kind)?;
                let ty = self.pool.subst(body, arg);
                self.instantiate(Expr::CApp(Box::new(func), arg), ty, span)
            }
            ExprNode::CAbs {
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
                let body = self.infer_expr(body);
                self.env.reset(mark);
                let (body, ty) = body?;
                Ok((
                    Expr::CAbs {
                        name: *name,
                        kind,
                        body: Box::new(body),
                    },
                    self.pool.poly(*name, *implicit, kind, ty),
                ))
            }
            ExprNode::KAbs(name, body) => {
                let mark = self.env.mark();
                self.env.push_kind(*name);
                let body = self.infer_expr(body);
                self.env.reset(mark);
                let (body, ty) = body?;
                Ok((
                    Expr::KAbs {
                        name: *name,
                        body: Box::new(body),
                    },
                    self.pool.kpoly(*name, ty),
                ))
            }
            ExprNode::KApp(func, arg) => {
                let (func, fty) = match &func.node {
                    ExprNode::Var(_) | ExprNode::Path(..) => self.infer_head(func)?,
                    _ => self.infer_expr(func)?,
                };
                let fty = hnorm(&mut self.pool, &self.globals, fty);
                let ConData::KPoly { body, .. } = *self.pool.data(fty) else {
                    let inner = self.fresh_type(span);
                    let expected = self.pool.kpoly(Name::EMPTY, inner);
                    return Err(ElabError::new(
                        span,
                        ElabErrorKind::TypeMismatch {
                            expected,
                            found: fty,
                            reason: MismatchReason::Structural,
                        },
                    ));
                };
                let arg = self.elab_kind(arg)?;
                let ty = self.pool.subst_kind(body, arg);
                self.instantiate(Expr::KApp(Box::new(func), arg), ty, span)
            }
            ExprNode::DisjointAbs(left, right, body) => {
                let left = self.infer_row_con(left)?;
                let right = self.infer_row_con(right)?;
                let mark = self.env.mark();
                self.env.push_fact(left, right);
                let body = self.infer_expr(body);
                self.env.reset(mark);
                let (body, ty) = body?;
                Ok((
                    Expr::DisjointAbs {
                        left,
                        right,
                        body: Box::new(body),
                    },
                    self.pool.disjoint(left, right, ty),
                ))
            }
            ExprNode::Record(fields) => {
                let mut exprs = Vec::with_capacity(fields.len());
                let mut row = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    let name = self.check_con(name, KindIdx::NAME)?;
                    let (value, ty) = self.infer_expr(value)?;
                    exprs.push((name, value));
                    row.push((name, ty));
                }
                self.check_literal_fields(KindIdx::TYPE, &row, span)?;
                let row = self.pool.row(KindIdx::TYPE, row);
                Ok((Expr::Record(exprs), self.pool.record(row)))
            }
            ExprNode::Field(record, field) => {
                let (record, rty) = self.infer_expr(record)?;
                let field = self.check_con(field, KindIdx::NAME)?;
                let ty = self.fresh_type(span);
                let rest = self.split_record(field, ty, rty, span)?;
                Ok((
                    Expr::Field {
                        record: Box::new(record),
                        field,
                        rest,
                    },
                    ty,
                ))
            }
            ExprNode::Concat(left, right) => {
                let (left, lty) = self.infer_expr(left)?;
                let (right, rty) = self.infer_expr(right)?;
                let left_row = self.fresh_row(KindIdx::TYPE, span);
                let right_row = self.fresh_row(KindIdx::TYPE, span);
                let lrec = self.pool.record(left_row);
                let rrec = self.pool.record(right_row);
                self.unify(lrec, lty, span)?;
                self.unify(rrec, rty, span)?;
                self.require_disjoint(left_row, right_row, span)?;
                let both = self.pool.concat(left_row, right_row);
                Ok((
                    Expr::Concat {
                        left: Box::new(left),
                        right: Box::new(right),
                        left_row,
                        right_row,
                    },
                    self.pool.record(both),
                ))
            }
            ExprNode::Cut(record, field) => {
                let (record, rty) = self.infer_expr(record)?;
                let field = self.check_con(field, KindIdx::NAME)?;
                let ty = self.fresh_type(span);
                let rest = self.split_record(field, ty, rty, span)?;
                Ok((
                    Expr::Cut {
                        record: Box::new(record),
                        field,
                        rest,
                    },
                    self.pool.record(rest),
                ))
            }
            ExprNode::CutMulti(record, row) => {
                let (record, rty) = self.infer_expr(record)?;
                let row = self.check_con(row, KindIdx::ROW_TYPE)?;
                let rest = self.fresh_row(KindIdx::TYPE, span);
                let whole = self.pool.concat(row, rest);
                let whole = self.pool.record(whole);
                self.unify(whole, rty, span)?;
                self.require_disjoint(row, rest, span)?;
                Ok((
                    Expr::CutMulti {
                        record: Box::new(record),
                        row,
                        rest,
                    },
                    self.pool.record(rest),
                ))
            }
            ExprNode::Inject(field, value) => {
                let field = self.check_con(field, KindIdx::NAME)?;
                let (value, ty) = self.infer_expr(value)?;
                let single = self.pool.row(KindIdx::TYPE, vec![(field, ty)]);
                let rest = self.fresh_row(KindIdx::TYPE, span);
                self.require_disjoint(single, rest, span)?;
                let row = self.pool.concat(single, rest);
                Ok((
                    Expr::Inject {
                        field,
                        value: Box::new(value),
                        row,
                    },
                    self.pool.variant(row),
                ))
            }
            ExprNode::Case(scrutinee, arms) => self.elab_case(scrutinee, arms, None, span),
            ExprNode::Let(locals, body) => self.elab_let(locals, body, None),
            ExprNode::If(cond, then, els) => {
                let cond = self.check_expr(cond, Idx::BOOL)?;
                let (then, ty) = self.infer_expr(then)?;
                let els = self.check_expr(els, ty)?;
                Ok((
                    Expr::If {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        els: Box::new(els),
                    },
                    ty,
                ))
            }
            ExprNode::Annot(expr, ty) => {
                let ty = self.check_con(ty, KindIdx::TYPE)?;
                let expr = self.check_expr(expr, ty)?;
                Ok((expr, ty))
            }
        }
    }

    /// `record = $([field = ty] ++ rest)`, with `field` absent from
    /// `rest`. Returns `rest`.
    fn split_record(
        &mut self,
        field: Idx,
        ty: Idx,
        record: Idx,
        span: Span,
    ) -> Result<Idx, ElabError> {
        let single = self.pool.row(KindIdx::TYPE, vec![(field, ty)]);
        let rest = self.fresh_row(KindIdx::TYPE, span);
        let whole = self.pool.concat(single, rest);
        let whole = self.pool.record(whole);
        self.unify(whole, record, span)?;
        self.require_disjoint(single, rest, span)?;
        Ok(rest)
    }

    fn infer_row_con(&mut self, c: &urd_ir::ast::RawCon) -> Result<Idx, ElabError> {
        let elem = self.fresh_kind(c.span);
        let kind = self.pool.kinds_mut().record(elem);
        self.check_con(c, kind)
    }

    // ========================================
    // Variables
    // ========================================

    /// A variable or path with its declared type, not instantiated.
    fn infer_head(&mut self, e: &RawExpr) -> Result<(Expr, Idx), ElabError> {
        let span = e.span;
        match &e.node {
            ExprNode::Var(name) => {
                if let Some((index, ty)) = self.env.lookup_val(&mut self.pool, *name) {
                    return Ok((Expr::Rel(index), ty));
                }
                match self.env.resolve(*name, Namespace::Val).cloned() {
                    Some(Binding::Def(def)) => match self.globals.def(def).def {
                        Def::Val { ty } => Ok((Expr::Named(def), ty)),
                        _ => Err(ElabError::unbound(span, *name, Namespace::Val)),
                    },
                    Some(Binding::Opened(module)) => self.module_val(&module, *name, span),
                    _ => Err(ElabError::unbound(span, *name, Namespace::Val)),
                }
            }
            ExprNode::Path(modules, item) => {
                let module = self.module_path(modules, span)?;
                self.module_val(&module, *item, span)
            }
            _ => self.infer_expr(e),
        }
    }

    fn module_val(
        &mut self,
        module: &urd_types::ModRef,
        item: Name,
        span: Span,
    ) -> Result<(Expr, Idx), ElabError> {
        match self
            .globals
            .module_item(&mut self.pool, module, item, Namespace::Val)
        {
            Some(ModItem::Val { ty }) => {
                let canonical = self.globals.canonical(module);
                Ok((
                    Expr::ModProj {
                        module: canonical.module,
                        path: canonical.path,
                        item,
                    },
                    ty,
                ))
            }
            _ => Err(ElabError::unbound(span, item, Namespace::Val)),
        }
    }

    /// Fill in everything a use of `expr : ty` leaves implicit: implicit
    /// constructor and kind arguments get fresh metavariables, disjointness
    /// preconditions become obligations, and dictionary arguments become
    /// class obligations.
    pub(crate) fn instantiate(
        &mut self,
        mut expr: Expr,
        mut ty: Idx,
        span: Span,
    ) -> Result<(Expr, Idx), ElabError> {
        loop {
            let head = hnorm(&mut self.pool, &self.globals, ty);
            match self.pool.data(head).clone() {
                ConData::Poly {
                    implicit: true,
                    kind,
                    body,
                    ..
                } => {
                    let arg = self.fresh_meta(kind, span);
                    expr = Expr::CApp(Box::new(expr), arg);
                    ty = self.pool.subst(body, arg);
                }
                ConData::KPoly { body, .. } => {
                    let arg = self.fresh_kind(span);
                    expr = Expr::KApp(Box::new(expr), arg);
                    ty = self.pool.subst_kind(body, arg);
                }
                ConData::Disjoint { left, right, body } => {
                    self.require_disjoint(left, right, span)?;
                    expr = Expr::DisjointApp(Box::new(expr));
                    ty = body;
                }
                ConData::Fun(dom, cod) if is_class_goal(&mut self.pool, &self.globals, dom) => {
                    let slot = self.require_class(dom, span)?;
                    expr = Expr::app(expr, Expr::Slot(slot));
                    ty = cod;
                }
                _ => return Ok((expr, head)),
            }
        }
    }

    // ========================================
    // Case and let
    // ========================================

    pub(crate) fn elab_case(
        &mut self,
        scrutinee: &RawExpr,
        arms: &[(urd_ir::ast::RawPat, RawExpr)],
        expected: Option<Idx>,
        span: Span,
    ) -> Result<(Expr, Idx), ElabError> {
        let (scrutinee, sty) = self.infer_expr(scrutinee)?;
        if let Some(names) = variant_arms(arms) {
            let mut fields = Vec::with_capacity(names.len());
            for name in names {
                let field = self.pool.field_name(name);
                let ty = self.fresh_type(span);
                fields.push((field, ty));
            }
            let row = self.pool.row(KindIdx::TYPE, fields);
            let closed = self.pool.variant(row);
            self.unify(closed, sty, span)?;
        }
        let result = match expected {
            Some(ty) => ty,
            None => self.fresh_type(span),
        };
        let mut out = Vec::with_capacity(arms.len());
        for (pat, body) in arms {
            let mark = self.env.mark();
            let mut binds = Vec::new();
            let arm = self.check_pat(pat, sty, &mut binds).and_then(|pat| {
                for (name, ty) in binds {
                    let dict = is_class_goal(&mut self.pool, &self.globals, ty);
                    self.env.push_val(name, ty, dict);
                }
                let body = self.check_expr(body, result)?;
                Ok(Arm { pat, body })
            });
            self.env.reset(mark);
            out.push(arm?);
        }
        Ok((
            Expr::Case {
                scrutinee: Box::new(scrutinee),
                arms: out,
                ty: result,
            },
            result,
        ))
    }

    pub(crate) fn elab_let(
        &mut self,
        locals: &[RawLocal],
        body: &RawExpr,
        expected: Option<Idx>,
    ) -> Result<(Expr, Idx), ElabError> {
        let mark = self.env.mark();
        let result = self.elab_let_scoped(locals, body, expected);
        self.env.reset(mark);
        let (bindings, body, ty) = result?;
        let expr = bindings
            .into_iter()
            .rev()
            .fold(body, |body, binding| Expr::Let {
                binding,
                body: Box::new(body),
            });
        Ok((expr, ty))
    }

    fn elab_let_scoped(
        &mut self,
        locals: &[RawLocal],
        body: &RawExpr,
        expected: Option<Idx>,
    ) -> Result<(Vec<LetBinding>, Expr, Idx), ElabError> {
        let mut bindings = Vec::with_capacity(locals.len());
        for local in locals {
            bindings.push(self.elab_local(local)?);
        }
        let (body, ty) = match expected {
            Some(ty) => (self.check_expr(body, ty)?, ty),
            None => self.infer_expr(body)?,
        };
        Ok((bindings, body, ty))
    }

    /// One local declaration; its names stay bound for the rest of the
    /// `let`. Local bindings are not generalized.
    fn elab_local(&mut self, local: &RawLocal) -> Result<LetBinding, ElabError> {
        match local {
            RawLocal::Val {
                name,
                ty,
                body,
                span,
            } => {
                let ty = match ty {
                    Some(ty) => self.check_con(ty, KindIdx::TYPE)?,
                    None => self.fresh_type(*span),
                };
                let value = self.check_expr(body, ty)?;
                self.wake_and_run()?;
                let dict = is_class_goal(&mut self.pool, &self.globals, ty);
                self.env.push_val(*name, ty, dict);
                Ok(LetBinding::Val {
                    name: *name,
                    ty,
                    value: Box::new(value),
                })
            }
            RawLocal::Fun(funs) => {
                let headers = funs
                    .iter()
                    .map(|fun| self.elab_header(fun))
                    .collect::<Result<Vec<_>, _>>()?;
                for (fun, header) in funs.iter().zip(&headers) {
                    self.env.push_val(fun.name, header.ty, false);
                }
                let mut out = Vec::with_capacity(funs.len());
                for (fun, header) in funs.iter().zip(&headers) {
                    let body = self.elab_fun_body(fun, header)?;
                    out.push(RecFun {
                        name: fun.name,
                        ty: header.ty,
                        body,
                    });
                }
                Ok(LetBinding::Rec(out))
            }
        }
    }
}

/// Names of the variant cases when every arm is a variant pattern, so the
/// scrutinee's row is exactly those cases.
fn variant_arms(arms: &[(urd_ir::ast::RawPat, RawExpr)]) -> Option<Vec<Name>> {
    use urd_ir::ast::PatNode;
    if arms.is_empty() {
        return None;
    }
    let mut names: Vec<Name> = Vec::new();
    for (pat, _) in arms {
        let PatNode::Variant(name, _) = pat.node else {
            return None;
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Some(names)
}

fn ann_span(e: &RawExpr) -> Span {
    match &e.node {
        ExprNode::Lam(_, Some(ann), _) => ann.span,
        _ => e.span,
    }
}
