//! Raw, unannotated syntax tree.
//!
//! This is what a parser hands to the elaborator: names are interned but
//! unresolved, binders carry no de Bruijn indices, and every kind, type and
//! class argument that the programmer left implicit is simply absent.
//! Nodes own their children (`Box`/`Vec`); the elaborator walks a tree once,
//! bottom-up, and never keeps raw nodes around afterwards.
//!
//! Every node is a `{ node, span }` pair so errors can always point at the
//! construct that produced them.

pub mod build;

use crate::{Name, Span};

/// A literal primitive.
///
/// Floats are stored as raw bits so the tree stays `Eq + Hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Lit {
    Int(i64),
    Float(u64),
    String(Name),
    Char(char),
    Bool(bool),
}

// Kinds

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawKind {
    pub node: KindNode,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KindNode {
    /// `Type`
    Type,
    /// `Unit`
    Unit,
    /// `Name`, the kind of field names.
    Name,
    /// `k1 -> k2`
    Arrow(Box<RawKind>, Box<RawKind>),
    /// `{k}`, rows whose fields have kind `k`.
    Record(Box<RawKind>),
    /// `(k1 * k2 * ...)`
    Tuple(Vec<RawKind>),
    /// Kind variable bound by an enclosing kind binder.
    Var(Name),
    /// `x --> k`, a kind quantified over kinds.
    Poly(Name, Box<RawKind>),
    /// `_`, ask the elaborator to infer the kind.
    Wild,
}

// Constructors

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawCon {
    pub node: ConNode,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConNode {
    /// Unqualified constructor name (local binder, global, or builtin).
    Var(Name),
    /// `M.N.t`
    Path(Vec<Name>, Name),
    /// `c1 c2`
    App(Box<RawCon>, Box<RawCon>),
    /// `fn x :: k => c`
    Abs(Name, Option<Box<RawKind>>, Box<RawCon>),
    /// `c1 -> c2`
    Fun(Box<RawCon>, Box<RawCon>),
    /// `x :: k -> c` (explicit) or `x ::: k -> c` (implicit).
    Poly {
        name: Name,
        implicit: bool,
        kind: Option<Box<RawKind>>,
        body: Box<RawCon>,
    },
    /// `x --> c`, a type quantified over kinds.
    KPoly(Name, Box<RawCon>),
    /// `[c1 ~ c2] => c`
    Disjoint(Box<RawCon>, Box<RawCon>, Box<RawCon>),
    /// `$c`, the record type over row `c`.
    Record(Box<RawCon>),
    /// `variant c`, the variant type over row `c`.
    Variant(Box<RawCon>),
    /// `[n1 = c1, n2 = c2]`, a row literal.
    Row(Vec<(RawCon, RawCon)>),
    /// `#A`, a field-name constant.
    FieldName(Name),
    /// `c1 ++ c2`
    Concat(Box<RawCon>, Box<RawCon>),
    /// `map f r`
    Map(Box<RawCon>, Box<RawCon>),
    /// `r[n]`, the constructor stored at field `n` of row `r`.
    Proj(Box<RawCon>, Box<RawCon>),
    /// `()`
    Unit,
    /// `(c1, c2, ...)`
    Tuple(Vec<RawCon>),
    /// `c.1`, one-based like the surface syntax.
    TupleProj(Box<RawCon>, u32),
    /// `fn [[k]] => c`
    KAbs(Name, Box<RawCon>),
    /// `c [[k]]`
    KApp(Box<RawCon>, Box<RawKind>),
    /// `(c :: k)`
    Annot(Box<RawCon>, Box<RawKind>),
    /// `_`
    Wild,
}

// Expressions

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawExpr {
    pub node: ExprNode,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprNode {
    Lit(Lit),
    /// Unqualified value name.
    Var(Name),
    /// `M.N.x`
    Path(Vec<Name>, Name),
    /// `e1 e2`
    App(Box<RawExpr>, Box<RawExpr>),
    /// `fn x : t => e`
    Lam(Name, Option<Box<RawCon>>, Box<RawExpr>),
    /// `e [c]`, explicit constructor application.
    CApp(Box<RawExpr>, Box<RawCon>),
    /// `fn [x :: k] => e`
    CAbs {
        name: Name,
        implicit: bool,
        kind: Option<Box<RawKind>>,
        body: Box<RawExpr>,
    },
    /// `fn [[k]] => e`
    KAbs(Name, Box<RawExpr>),
    /// `e [[k]]`
    KApp(Box<RawExpr>, Box<RawKind>),
    /// `fn [c1 ~ c2] => e`
    DisjointAbs(Box<RawCon>, Box<RawCon>, Box<RawExpr>),
    /// `{n1 = e1, n2 = e2}`
    Record(Vec<(RawCon, RawExpr)>),
    /// `e.n`
    Field(Box<RawExpr>, Box<RawCon>),
    /// `e1 ++ e2`
    Concat(Box<RawExpr>, Box<RawExpr>),
    /// `e -- n`
    Cut(Box<RawExpr>, Box<RawCon>),
    /// `e --- r`
    CutMulti(Box<RawExpr>, Box<RawCon>),
    /// `make [#A] e`, injection into a variant.
    Inject(Box<RawCon>, Box<RawExpr>),
    /// `case e of p1 => e1 | ...`
    Case(Box<RawExpr>, Vec<(RawPat, RawExpr)>),
    /// `let d1 d2 ... in e end`
    Let(Vec<RawLocal>, Box<RawExpr>),
    /// `if c then a else b`
    If(Box<RawExpr>, Box<RawExpr>, Box<RawExpr>),
    /// `(e : t)`
    Annot(Box<RawExpr>, Box<RawCon>),
}

/// Local declaration inside a `let`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawLocal {
    Val {
        name: Name,
        ty: Option<RawCon>,
        body: RawExpr,
        span: Span,
    },
    /// A group of mutually recursive local functions.
    Fun(Vec<RawFun>),
}

// Patterns

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPat {
    pub node: PatNode,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatNode {
    Wild,
    Var(Name),
    Lit(Lit),
    /// `#A p` matches the `A` case of a variant.
    Variant(Name, Option<Box<RawPat>>),
    /// `{A = p, ...}`; `open` allows fields not listed.
    Record { fields: Vec<(Name, RawPat)>, open: bool },
    Annot(Box<RawPat>, Box<RawCon>),
}

// Declarations

/// One parameter of a `fun` declaration header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawParam {
    /// `[x :: k]` or `[x ::: k]`
    Con {
        name: Name,
        implicit: bool,
        kind: Option<RawKind>,
    },
    /// `[c1 ~ c2]`
    Disjoint(RawCon, RawCon),
    /// `(x : t)`
    Val { name: Name, ty: Option<RawCon> },
}

/// `fun f params : ret = body`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFun {
    pub name: Name,
    pub params: Vec<RawParam>,
    pub ret: Option<RawCon>,
    pub body: RawExpr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawDecl {
    pub node: DeclNode,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclNode {
    /// `con t :: k = c`
    Con {
        name: Name,
        kind: Option<RawKind>,
        def: RawCon,
    },
    /// `val x : t = e`
    Val {
        name: Name,
        ty: Option<RawCon>,
        body: RawExpr,
    },
    /// `fun f ... and g ...`, one recursive group.
    Fun(Vec<RawFun>),
    /// `class c :: k` or `class c :: k = c'`
    Class {
        name: Name,
        kind: Option<RawKind>,
        def: Option<RawCon>,
    },
    /// `signature S = sig`
    Sgn { name: Name, sgn: RawSgn },
    /// `structure M : S = str`
    Str {
        name: Name,
        sgn: Option<RawSgn>,
        body: RawStr,
    },
    /// `open M.N`
    Open(Vec<Name>),
}

// Signatures

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSgn {
    pub node: SgnNode,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SgnNode {
    /// `sig items end`
    Const(Vec<RawSgnItem>),
    /// A named signature, possibly inside a structure: `M.S`.
    Path(Vec<Name>, Name),
    /// `functor (X : S1) : S2`
    Functor {
        param: Name,
        param_sgn: Box<RawSgn>,
        result: Box<RawSgn>,
    },
    /// `S where con M.t = c`; the last path element names the item.
    Where {
        sgn: Box<RawSgn>,
        path: Vec<Name>,
        con: RawCon,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSgnItem {
    pub node: SgnItemNode,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SgnItemNode {
    /// `con t :: k` (abstract) or `con t :: k = c` (manifest)
    Con {
        name: Name,
        kind: Option<RawKind>,
        def: Option<RawCon>,
    },
    Val { name: Name, ty: RawCon },
    Str { name: Name, sgn: RawSgn },
    Class {
        name: Name,
        kind: Option<RawKind>,
        def: Option<RawCon>,
    },
}

// Structures

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawStr {
    pub node: StrNode,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrNode {
    /// `struct decls end`
    Const(Vec<RawDecl>),
    /// Reference to an existing structure.
    Path(Vec<Name>),
    /// `functor (X : S) : S' => str`
    Functor {
        param: Name,
        param_sgn: Box<RawSgn>,
        result: Option<Box<RawSgn>>,
        body: Box<RawStr>,
    },
    /// `F(str)`
    App(Vec<Name>, Box<RawStr>),
    /// `(str : S)`
    Seal(Box<RawStr>, Box<RawSgn>),
}

/// A whole compilation unit.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RawFile {
    pub decls: Vec<RawDecl>,
}
