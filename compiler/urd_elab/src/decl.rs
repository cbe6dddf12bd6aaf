//! Core declarations: `con`, `class`, `val` and `fun` groups.

use urd_ir::{
    ast::{RawCon, RawExpr, RawFun, RawKind, RawParam},
    Name, Span,
};
use urd_types::{is_class_goal, Def, ElabError, Idx, KindIdx, Namespace};

use crate::driver::Elaborator;
use crate::env::Binding;
use crate::finish::Member;
use crate::tree::{Decl, Expr, FunDecl};

/// One parameter of a function header.
#[derive(Clone, Debug)]
pub(crate) enum HeaderParam {
    Con {
        name: Name,
        implicit: bool,
        kind: KindIdx,
    },
    Disjoint {
        left: Idx,
        right: Idx,
    },
    Val {
        name: Name,
        ty: Idx,
    },
}

/// An elaborated `fun` header. Classifiers live in the context of the
/// parameters before them, so the header can be replayed to check the
/// body.
#[derive(Clone, Debug)]
pub(crate) struct Header {
    pub(crate) params: Vec<HeaderParam>,
    pub(crate) ret: Idx,
    /// The whole function type.
    pub(crate) ty: Idx,
}

impl Elaborator<'_> {
    // ========================================
    // Constructors and classes
    // ========================================

    pub(crate) fn elab_con_decl(
        &mut self,
        name: Name,
        kind: Option<&RawKind>,
        def: &RawCon,
        span: Span,
    ) -> Result<Decl, ElabError> {
        self.begin_group();
        let (con, kind) = match kind {
            Some(kind) => {
                let kind = self.elab_kind(kind)?;
                (self.check_con(def, kind)?, kind)
            }
            None => self.infer_con(def)?,
        };
        let con = self.close_con(con, span)?;
        let kind = self.close_kind(kind);
        let id = self.add_def(name, Def::Con { kind, def: con }, span);
        self.env.bind(name, Namespace::Con, Binding::Def(id));
        tracing::debug!(?id, "declared constructor");
        Ok(Decl::Con {
            def: id,
            kind,
            con,
        })
    }

    pub(crate) fn elab_class_decl(
        &mut self,
        name: Name,
        kind: Option<&RawKind>,
        def: Option<&RawCon>,
        span: Span,
    ) -> Result<Decl, ElabError> {
        self.begin_group();
        let (con, kind) = match (kind, def) {
            (Some(kind), Some(def)) => {
                let kind = self.elab_kind(kind)?;
                (Some(self.check_con(def, kind)?), kind)
            }
            (None, Some(def)) => {
                let (con, kind) = self.infer_con(def)?;
                (Some(con), kind)
            }
            (Some(kind), None) => (None, self.elab_kind(kind)?),
            (None, None) => (
                None,
                self.pool.kinds_mut().arrow(KindIdx::TYPE, KindIdx::TYPE),
            ),
        };
        let con = match con {
            Some(con) => Some(self.close_con(con, span)?),
            None => None,
        };
        let kind = self.close_kind(kind);
        let id = self.add_def(name, Def::Class { kind, def: con }, span);
        self.env.bind(name, Namespace::Con, Binding::Def(id));
        tracing::debug!(?id, abstract_class = con.is_none(), "declared class");
        Ok(Decl::Class {
            def: id,
            kind,
            con,
        })
    }

    // ========================================
    // Values
    // ========================================

    pub(crate) fn elab_val_decl(
        &mut self,
        name: Name,
        ty: Option<&RawCon>,
        body: &RawExpr,
        span: Span,
    ) -> Result<Decl, ElabError> {
        self.begin_group();
        let ty = match ty {
            Some(ty) => self.check_con(ty, KindIdx::TYPE)?,
            None => self.fresh_type(span),
        };
        let body = self.check_expr(body, ty)?;
        let finished = self.finish_group(
            vec![Member {
                def: None,
                ty,
                body,
                span,
            }])?;
        let Some(member) = finished.into_iter().next() else {
            return Err(ElabError::unbound(span, name, Namespace::Val));
        };
        let id = self.add_def(name, Def::Val { ty: member.ty }, span);
        self.env.bind(name, Namespace::Val, Binding::Def(id));
        self.register_if_instance(id, member.ty);
        Ok(Decl::Val {
            def: id,
            ty: member.ty,
            body: member.body,
        })
    }

    /// A group of mutually recursive functions. Every name is bound to its
    /// provisional header type while the bodies are checked.
    pub(crate) fn elab_fun_decl(&mut self, funs: &[RawFun]) -> Result<Decl, ElabError> {
        self.begin_group();
        let headers = funs
            .iter()
            .map(|fun| self.elab_header(fun))
            .collect::<Result<Vec<_>, _>>()?;
        for (fun, header) in funs.iter().zip(&headers) {
            let id = self.add_def(fun.name, Def::Val { ty: header.ty }, fun.span);
            self.group_defs.push(id);
            self.env.bind(fun.name, Namespace::Val, Binding::Def(id));
        }
        let mut members = Vec::with_capacity(funs.len());
        for ((fun, header), &def) in funs.iter().zip(&headers).zip(&self.group_defs.clone()) {
            let body = self.elab_fun_body(fun, header)?;
            members.push(Member {
                def: Some(def),
                ty: header.ty,
                body,
                span: fun.span,
            });
        }
        let finished = self.finish_group(members)?;
        let defs = std::mem::take(&mut self.group_defs);
        let mut out = Vec::with_capacity(finished.len());
        for (def, member) in defs.into_iter().zip(finished) {
            self.globals.set_def(def, Def::Val { ty: member.ty });
            self.register_if_instance(def, member.ty);
            out.push(FunDecl {
                def,
                ty: member.ty,
                body: member.body,
            });
        }
        Ok(Decl::Fun(out))
    }

    // ========================================
    // Function headers
    // ========================================

    pub(crate) fn elab_header(&mut self, fun: &RawFun) -> Result<Header, ElabError> {
        let mark = self.env.mark();
        let header = self.elab_header_scoped(fun);
        self.env.reset(mark);
        header
    }

    fn elab_header_scoped(&mut self, fun: &RawFun) -> Result<Header, ElabError> {
        let mut params = Vec::with_capacity(fun.params.len());
        for param in &fun.params {
            match param {
                RawParam::Con {
                    name,
                    implicit,
                    kind,
                } => {
                    let kind = match kind {
                        Some(kind) => self.elab_kind(kind)?,
                        None => self.fresh_kind(fun.span),
                    };
                    self.env.push_con(*name, kind);
                    params.push(HeaderParam::Con {
                        name: *name,
                        implicit: *implicit,
                        kind,
                    });
                }
                RawParam::Disjoint(left, right) => {
                    let left = self.infer_header_row(left)?;
                    let right = self.infer_header_row(right)?;
                    self.env.push_fact(left, right);
                    params.push(HeaderParam::Disjoint { left, right });
                }
                RawParam::Val { name, ty } => {
                    let ty = match ty {
                        Some(ty) => self.check_con(ty, KindIdx::TYPE)?,
                        None => self.fresh_type(fun.span),
                    };
                    let dict = is_class_goal(&mut self.pool, &self.globals, ty);
                    self.env.push_val(*name, ty, dict);
                    params.push(HeaderParam::Val { name: *name, ty });
                }
            }
        }
        let ret = match &fun.ret {
            Some(ret) => self.check_con(ret, KindIdx::TYPE)?,
            None => self.fresh_type(fun.span),
        };
        let mut ty = ret;
        for param in params.iter().rev() {
            ty = match *param {
                HeaderParam::Con {
                    name,
                    implicit,
                    kind,
                } => self.pool.poly(name, implicit, kind, ty),
                HeaderParam::Disjoint { left, right } => self.pool.disjoint(left, right, ty),
                HeaderParam::Val { ty: dom, .. } => self.pool.fun(dom, ty),
            };
        }
        Ok(Header { params, ret, ty })
    }

    fn infer_header_row(&mut self, c: &RawCon) -> Result<Idx, ElabError> {
        let elem = self.fresh_kind(c.span);
        let kind = self.pool.kinds_mut().record(elem);
        self.check_con(c, kind)
    }

    /// Check a function body under its replayed header, and wrap it in the
    /// header's abstractions.
    pub(crate) fn elab_fun_body(
        &mut self,
        fun: &RawFun,
        header: &Header,
    ) -> Result<Expr, ElabError> {
        let mark = self.env.mark();
        for param in &header.params {
            match *param {
                HeaderParam::Con { name, kind, .. } => self.env.push_con(name, kind),
                HeaderParam::Disjoint { left, right } => self.env.push_fact(left, right),
                HeaderParam::Val { name, ty } => {
                    let dict = is_class_goal(&mut self.pool, &self.globals, ty);
                    self.env.push_val(name, ty, dict);
                }
            }
        }
        let body = self.check_expr(&fun.body, header.ret);
        self.env.reset(mark);
        let mut body = body?;
        for param in header.params.iter().rev() {
            body = match *param {
                HeaderParam::Con { name, kind, .. } => Expr::CAbs {
                    name,
                    kind,
                    body: Box::new(body),
                },
                HeaderParam::Disjoint { left, right } => Expr::DisjointAbs {
                    left,
                    right,
                    body: Box::new(body),
                },
                HeaderParam::Val { name, ty } => Expr::Abs {
                    name,
                    ty,
                    body: Box::new(body),
                },
            };
        }
        Ok(body)
    }
}
