//! Programmatic construction of raw trees.
//!
//! The parser lives outside this workspace, so tests and tooling synthesize
//! raw trees directly. Every node built here gets its own span (a running
//! counter), which keeps error sites distinguishable in assertions.

use std::cell::Cell;

use super::{
    ConNode, DeclNode, ExprNode, KindNode, Lit, PatNode, RawCon, RawDecl, RawExpr, RawFile,
    RawFun, RawKind, RawLocal, RawParam, RawPat, RawSgn, RawSgnItem, RawStr, SgnItemNode, SgnNode,
    StrNode,
};
use crate::{Name, Span, StringInterner};

/// Raw-tree builder bound to an interner.
pub struct Builder<'a> {
    interner: &'a StringInterner,
    next: Cell<u32>,
}

impl<'a> Builder<'a> {
    pub fn new(interner: &'a StringInterner) -> Self {
        Self {
            interner,
            next: Cell::new(1),
        }
    }

    /// Intern an identifier.
    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// A fresh, distinct span.
    pub fn span(&self) -> Span {
        let n = self.next.get();
        self.next.set(n + 1);
        Span::new(n * 16, n * 16 + 8)
    }

    fn path(&self, segments: &[&str]) -> Vec<Name> {
        segments.iter().map(|s| self.name(s)).collect()
    }

    // === Kinds ===

    fn kind(&self, node: KindNode) -> RawKind {
        RawKind {
            node,
            span: self.span(),
        }
    }

    pub fn k_type(&self) -> RawKind {
        self.kind(KindNode::Type)
    }

    pub fn k_unit(&self) -> RawKind {
        self.kind(KindNode::Unit)
    }

    pub fn k_name(&self) -> RawKind {
        self.kind(KindNode::Name)
    }

    pub fn k_arrow(&self, dom: RawKind, cod: RawKind) -> RawKind {
        self.kind(KindNode::Arrow(Box::new(dom), Box::new(cod)))
    }

    pub fn k_record(&self, k: RawKind) -> RawKind {
        self.kind(KindNode::Record(Box::new(k)))
    }

    /// `{Type}`, the kind of ordinary record rows.
    pub fn k_row(&self) -> RawKind {
        let t = self.k_type();
        self.k_record(t)
    }

    pub fn k_tuple(&self, ks: Vec<RawKind>) -> RawKind {
        self.kind(KindNode::Tuple(ks))
    }

    pub fn k_var(&self, name: &str) -> RawKind {
        self.kind(KindNode::Var(self.name(name)))
    }

    pub fn k_poly(&self, name: &str, body: RawKind) -> RawKind {
        self.kind(KindNode::Poly(self.name(name), Box::new(body)))
    }

    pub fn k_wild(&self) -> RawKind {
        self.kind(KindNode::Wild)
    }

    // === Constructors ===

    fn con(&self, node: ConNode) -> RawCon {
        RawCon {
            node,
            span: self.span(),
        }
    }

    pub fn c_var(&self, name: &str) -> RawCon {
        self.con(ConNode::Var(self.name(name)))
    }

    pub fn c_path(&self, modules: &[&str], item: &str) -> RawCon {
        self.con(ConNode::Path(self.path(modules), self.name(item)))
    }

    pub fn c_app(&self, f: RawCon, a: RawCon) -> RawCon {
        self.con(ConNode::App(Box::new(f), Box::new(a)))
    }

    pub fn c_abs(&self, name: &str, kind: Option<RawKind>, body: RawCon) -> RawCon {
        self.con(ConNode::Abs(self.name(name), kind.map(Box::new), Box::new(body)))
    }

    pub fn c_fun(&self, dom: RawCon, cod: RawCon) -> RawCon {
        self.con(ConNode::Fun(Box::new(dom), Box::new(cod)))
    }

    /// `name :: kind -> body`
    pub fn c_poly(&self, name: &str, kind: Option<RawKind>, body: RawCon) -> RawCon {
        self.con(ConNode::Poly {
            name: self.name(name),
            implicit: false,
            kind: kind.map(Box::new),
            body: Box::new(body),
        })
    }

    /// `name ::: kind -> body`
    pub fn c_poly_implicit(&self, name: &str, kind: Option<RawKind>, body: RawCon) -> RawCon {
        self.con(ConNode::Poly {
            name: self.name(name),
            implicit: true,
            kind: kind.map(Box::new),
            body: Box::new(body),
        })
    }

    pub fn c_kpoly(&self, name: &str, body: RawCon) -> RawCon {
        self.con(ConNode::KPoly(self.name(name), Box::new(body)))
    }

    pub fn c_disjoint(&self, l: RawCon, r: RawCon, body: RawCon) -> RawCon {
        self.con(ConNode::Disjoint(Box::new(l), Box::new(r), Box::new(body)))
    }

    pub fn c_record(&self, row: RawCon) -> RawCon {
        self.con(ConNode::Record(Box::new(row)))
    }

    pub fn c_variant(&self, row: RawCon) -> RawCon {
        self.con(ConNode::Variant(Box::new(row)))
    }

    /// Row literal with constant field names.
    pub fn c_row(&self, fields: Vec<(&str, RawCon)>) -> RawCon {
        let fields = fields
            .into_iter()
            .map(|(n, c)| (self.c_field(n), c))
            .collect();
        self.con(ConNode::Row(fields))
    }

    /// Row literal with arbitrary field-name constructors.
    pub fn c_row_with(&self, fields: Vec<(RawCon, RawCon)>) -> RawCon {
        self.con(ConNode::Row(fields))
    }

    /// `$[A = t, ...]`
    pub fn c_record_of(&self, fields: Vec<(&str, RawCon)>) -> RawCon {
        let row = self.c_row(fields);
        self.c_record(row)
    }

    pub fn c_field(&self, name: &str) -> RawCon {
        self.con(ConNode::FieldName(self.name(name)))
    }

    pub fn c_concat(&self, l: RawCon, r: RawCon) -> RawCon {
        self.con(ConNode::Concat(Box::new(l), Box::new(r)))
    }

    pub fn c_map(&self, f: RawCon, row: RawCon) -> RawCon {
        self.con(ConNode::Map(Box::new(f), Box::new(row)))
    }

    pub fn c_proj(&self, row: RawCon, field: RawCon) -> RawCon {
        self.con(ConNode::Proj(Box::new(row), Box::new(field)))
    }

    pub fn c_unit(&self) -> RawCon {
        self.con(ConNode::Unit)
    }

    pub fn c_tuple(&self, cs: Vec<RawCon>) -> RawCon {
        self.con(ConNode::Tuple(cs))
    }

    pub fn c_tuple_proj(&self, c: RawCon, index: u32) -> RawCon {
        self.con(ConNode::TupleProj(Box::new(c), index))
    }

    pub fn c_kabs(&self, name: &str, body: RawCon) -> RawCon {
        self.con(ConNode::KAbs(self.name(name), Box::new(body)))
    }

    pub fn c_kapp(&self, c: RawCon, k: RawKind) -> RawCon {
        self.con(ConNode::KApp(Box::new(c), Box::new(k)))
    }

    pub fn c_annot(&self, c: RawCon, k: RawKind) -> RawCon {
        self.con(ConNode::Annot(Box::new(c), Box::new(k)))
    }

    pub fn c_wild(&self) -> RawCon {
        self.con(ConNode::Wild)
    }

    // === Expressions ===

    fn expr(&self, node: ExprNode) -> RawExpr {
        RawExpr {
            node,
            span: self.span(),
        }
    }

    pub fn e_int(&self, n: i64) -> RawExpr {
        self.expr(ExprNode::Lit(Lit::Int(n)))
    }

    pub fn e_float(&self, f: f64) -> RawExpr {
        self.expr(ExprNode::Lit(Lit::Float(f.to_bits())))
    }

    pub fn e_string(&self, s: &str) -> RawExpr {
        self.expr(ExprNode::Lit(Lit::String(self.name(s))))
    }

    pub fn e_bool(&self, b: bool) -> RawExpr {
        self.expr(ExprNode::Lit(Lit::Bool(b)))
    }

    pub fn e_var(&self, name: &str) -> RawExpr {
        self.expr(ExprNode::Var(self.name(name)))
    }

    pub fn e_path(&self, modules: &[&str], item: &str) -> RawExpr {
        self.expr(ExprNode::Path(self.path(modules), self.name(item)))
    }

    pub fn e_app(&self, f: RawExpr, a: RawExpr) -> RawExpr {
        self.expr(ExprNode::App(Box::new(f), Box::new(a)))
    }

    /// Left-nested application `f a1 a2 ...`.
    pub fn e_apps(&self, f: RawExpr, args: Vec<RawExpr>) -> RawExpr {
        args.into_iter().fold(f, |acc, a| self.e_app(acc, a))
    }

    pub fn e_lam(&self, name: &str, ty: Option<RawCon>, body: RawExpr) -> RawExpr {
        self.expr(ExprNode::Lam(self.name(name), ty.map(Box::new), Box::new(body)))
    }

    pub fn e_capp(&self, e: RawExpr, c: RawCon) -> RawExpr {
        self.expr(ExprNode::CApp(Box::new(e), Box::new(c)))
    }

    pub fn e_cabs(&self, name: &str, kind: Option<RawKind>, body: RawExpr) -> RawExpr {
        self.expr(ExprNode::CAbs {
            name: self.name(name),
            implicit: false,
            kind: kind.map(Box::new),
            body: Box::new(body),
        })
    }

    pub fn e_kabs(&self, name: &str, body: RawExpr) -> RawExpr {
        self.expr(ExprNode::KAbs(self.name(name), Box::new(body)))
    }

    pub fn e_kapp(&self, e: RawExpr, k: RawKind) -> RawExpr {
        self.expr(ExprNode::KApp(Box::new(e), Box::new(k)))
    }

    pub fn e_disjoint(&self, l: RawCon, r: RawCon, body: RawExpr) -> RawExpr {
        self.expr(ExprNode::DisjointAbs(Box::new(l), Box::new(r), Box::new(body)))
    }

    /// Record literal with constant field names.
    pub fn e_record(&self, fields: Vec<(&str, RawExpr)>) -> RawExpr {
        let fields = fields
            .into_iter()
            .map(|(n, e)| (self.c_field(n), e))
            .collect();
        self.expr(ExprNode::Record(fields))
    }

    pub fn e_record_with(&self, fields: Vec<(RawCon, RawExpr)>) -> RawExpr {
        self.expr(ExprNode::Record(fields))
    }

    pub fn e_field(&self, e: RawExpr, field: &str) -> RawExpr {
        let f = self.c_field(field);
        self.expr(ExprNode::Field(Box::new(e), Box::new(f)))
    }

    pub fn e_concat(&self, l: RawExpr, r: RawExpr) -> RawExpr {
        self.expr(ExprNode::Concat(Box::new(l), Box::new(r)))
    }

    pub fn e_cut(&self, e: RawExpr, field: &str) -> RawExpr {
        let f = self.c_field(field);
        self.expr(ExprNode::Cut(Box::new(e), Box::new(f)))
    }

    pub fn e_cut_multi(&self, e: RawExpr, row: RawCon) -> RawExpr {
        self.expr(ExprNode::CutMulti(Box::new(e), Box::new(row)))
    }

    pub fn e_inject(&self, field: &str, e: RawExpr) -> RawExpr {
        let f = self.c_field(field);
        self.expr(ExprNode::Inject(Box::new(f), Box::new(e)))
    }

    pub fn e_case(&self, scrutinee: RawExpr, arms: Vec<(RawPat, RawExpr)>) -> RawExpr {
        self.expr(ExprNode::Case(Box::new(scrutinee), arms))
    }

    pub fn e_let(&self, locals: Vec<RawLocal>, body: RawExpr) -> RawExpr {
        self.expr(ExprNode::Let(locals, Box::new(body)))
    }

    pub fn e_if(&self, c: RawExpr, t: RawExpr, e: RawExpr) -> RawExpr {
        self.expr(ExprNode::If(Box::new(c), Box::new(t), Box::new(e)))
    }

    pub fn e_annot(&self, e: RawExpr, ty: RawCon) -> RawExpr {
        self.expr(ExprNode::Annot(Box::new(e), Box::new(ty)))
    }

    pub fn local_val(&self, name: &str, ty: Option<RawCon>, body: RawExpr) -> RawLocal {
        RawLocal::Val {
            name: self.name(name),
            ty,
            body,
            span: self.span(),
        }
    }

    // === Patterns ===

    fn pat(&self, node: PatNode) -> RawPat {
        RawPat {
            node,
            span: self.span(),
        }
    }

    pub fn p_wild(&self) -> RawPat {
        self.pat(PatNode::Wild)
    }

    pub fn p_var(&self, name: &str) -> RawPat {
        self.pat(PatNode::Var(self.name(name)))
    }

    pub fn p_lit(&self, lit: Lit) -> RawPat {
        self.pat(PatNode::Lit(lit))
    }

    pub fn p_variant(&self, field: &str, payload: Option<RawPat>) -> RawPat {
        self.pat(PatNode::Variant(self.name(field), payload.map(Box::new)))
    }

    pub fn p_record(&self, fields: Vec<(&str, RawPat)>, open: bool) -> RawPat {
        let fields = fields.into_iter().map(|(n, p)| (self.name(n), p)).collect();
        self.pat(PatNode::Record { fields, open })
    }

    // === Declarations ===

    fn decl(&self, node: DeclNode) -> RawDecl {
        RawDecl {
            node,
            span: self.span(),
        }
    }

    pub fn d_con(&self, name: &str, kind: Option<RawKind>, def: RawCon) -> RawDecl {
        self.decl(DeclNode::Con {
            name: self.name(name),
            kind,
            def,
        })
    }

    pub fn d_val(&self, name: &str, ty: Option<RawCon>, body: RawExpr) -> RawDecl {
        self.decl(DeclNode::Val {
            name: self.name(name),
            ty,
            body,
        })
    }

    pub fn fun(
        &self,
        name: &str,
        params: Vec<RawParam>,
        ret: Option<RawCon>,
        body: RawExpr,
    ) -> RawFun {
        RawFun {
            name: self.name(name),
            params,
            ret,
            body,
            span: self.span(),
        }
    }

    pub fn d_fun(&self, funs: Vec<RawFun>) -> RawDecl {
        self.decl(DeclNode::Fun(funs))
    }

    pub fn param_con(&self, name: &str, implicit: bool, kind: Option<RawKind>) -> RawParam {
        RawParam::Con {
            name: self.name(name),
            implicit,
            kind,
        }
    }

    pub fn param_disjoint(&self, l: RawCon, r: RawCon) -> RawParam {
        RawParam::Disjoint(l, r)
    }

    pub fn param_val(&self, name: &str, ty: Option<RawCon>) -> RawParam {
        RawParam::Val {
            name: self.name(name),
            ty,
        }
    }

    pub fn d_class(&self, name: &str, kind: Option<RawKind>, def: Option<RawCon>) -> RawDecl {
        self.decl(DeclNode::Class {
            name: self.name(name),
            kind,
            def,
        })
    }

    pub fn d_sgn(&self, name: &str, sgn: RawSgn) -> RawDecl {
        self.decl(DeclNode::Sgn {
            name: self.name(name),
            sgn,
        })
    }

    pub fn d_str(&self, name: &str, sgn: Option<RawSgn>, body: RawStr) -> RawDecl {
        self.decl(DeclNode::Str {
            name: self.name(name),
            sgn,
            body,
        })
    }

    pub fn d_open(&self, path: &[&str]) -> RawDecl {
        self.decl(DeclNode::Open(self.path(path)))
    }

    // === Signatures ===

    fn sgn(&self, node: SgnNode) -> RawSgn {
        RawSgn {
            node,
            span: self.span(),
        }
    }

    fn sgn_item(&self, node: SgnItemNode) -> RawSgnItem {
        RawSgnItem {
            node,
            span: self.span(),
        }
    }

    pub fn s_const(&self, items: Vec<RawSgnItem>) -> RawSgn {
        self.sgn(SgnNode::Const(items))
    }

    pub fn s_path(&self, modules: &[&str], name: &str) -> RawSgn {
        self.sgn(SgnNode::Path(self.path(modules), self.name(name)))
    }

    pub fn s_functor(&self, param: &str, param_sgn: RawSgn, result: RawSgn) -> RawSgn {
        self.sgn(SgnNode::Functor {
            param: self.name(param),
            param_sgn: Box::new(param_sgn),
            result: Box::new(result),
        })
    }

    pub fn s_where(&self, sgn: RawSgn, path: &[&str], con: RawCon) -> RawSgn {
        self.sgn(SgnNode::Where {
            sgn: Box::new(sgn),
            path: self.path(path),
            con,
        })
    }

    pub fn si_con(&self, name: &str, kind: Option<RawKind>, def: Option<RawCon>) -> RawSgnItem {
        self.sgn_item(SgnItemNode::Con {
            name: self.name(name),
            kind,
            def,
        })
    }

    pub fn si_val(&self, name: &str, ty: RawCon) -> RawSgnItem {
        self.sgn_item(SgnItemNode::Val {
            name: self.name(name),
            ty,
        })
    }

    pub fn si_str(&self, name: &str, sgn: RawSgn) -> RawSgnItem {
        self.sgn_item(SgnItemNode::Str {
            name: self.name(name),
            sgn,
        })
    }

    pub fn si_class(&self, name: &str, kind: Option<RawKind>, def: Option<RawCon>) -> RawSgnItem {
        self.sgn_item(SgnItemNode::Class {
            name: self.name(name),
            kind,
            def,
        })
    }

    // === Structures ===

    fn strct(&self, node: StrNode) -> RawStr {
        RawStr {
            node,
            span: self.span(),
        }
    }

    pub fn st_const(&self, decls: Vec<RawDecl>) -> RawStr {
        self.strct(StrNode::Const(decls))
    }

    pub fn st_path(&self, path: &[&str]) -> RawStr {
        self.strct(StrNode::Path(self.path(path)))
    }

    pub fn st_functor(
        &self,
        param: &str,
        param_sgn: RawSgn,
        result: Option<RawSgn>,
        body: RawStr,
    ) -> RawStr {
        self.strct(StrNode::Functor {
            param: self.name(param),
            param_sgn: Box::new(param_sgn),
            result: result.map(Box::new),
            body: Box::new(body),
        })
    }

    pub fn st_app(&self, functor: &[&str], arg: RawStr) -> RawStr {
        self.strct(StrNode::App(self.path(functor), Box::new(arg)))
    }

    pub fn st_seal(&self, body: RawStr, sgn: RawSgn) -> RawStr {
        self.strct(StrNode::Seal(Box::new(body), Box::new(sgn)))
    }

    pub fn file(&self, decls: Vec<RawDecl>) -> RawFile {
        RawFile { decls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_are_distinct() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let x = b.c_var("x");
        let y = b.c_var("x");
        assert_ne!(x.span, y.span);
        assert_eq!(x.node, y.node);
    }

    #[test]
    fn record_type_helper_builds_row() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let ty = b.c_record_of(vec![("A", b.c_var("int"))]);
        let ConNode::Record(row) = ty.node else {
            panic!("expected record type");
        };
        let ConNode::Row(fields) = row.node else {
            panic!("expected row literal");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0.node, ConNode::FieldName(interner.intern("A")));
    }
}
