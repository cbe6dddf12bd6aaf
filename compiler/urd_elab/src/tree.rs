//! The elaborated program.
//!
//! Every binder carries its classifier, every implicit argument is
//! explicit, and every class use has been replaced by its dictionary.
//! Term variables are de Bruijn indices over term binders only; constructor
//! and kind binders have their own index spaces inside [`Idx`] and
//! [`KindIdx`].

use urd_ir::{ast::Lit, Name};
use urd_types::{DefId, Dict, Idx, KindIdx, ModId, ModRef, SgnId, SlotId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expr {
    Lit(Lit),
    /// Bound term variable.
    Rel(u32),
    /// Global value.
    Named(DefId),
    /// Value item of a module.
    ModProj {
        module: ModId,
        path: Vec<Name>,
        item: Name,
    },
    App(Box<Expr>, Box<Expr>),
    Abs {
        name: Name,
        ty: Idx,
        body: Box<Expr>,
    },
    /// Constructor application.
    CApp(Box<Expr>, Idx),
    CAbs {
        name: Name,
        kind: KindIdx,
        body: Box<Expr>,
    },
    KApp(Box<Expr>, KindIdx),
    KAbs {
        name: Name,
        body: Box<Expr>,
    },
    /// Abstraction over a disjointness proof.
    DisjointAbs {
        left: Idx,
        right: Idx,
        body: Box<Expr>,
    },
    /// Discharge of a disjointness precondition.
    DisjointApp(Box<Expr>),
    Record(Vec<(Idx, Expr)>),
    Field {
        record: Box<Expr>,
        field: Idx,
        /// The fields not projected.
        rest: Idx,
    },
    Concat {
        left: Box<Expr>,
        right: Box<Expr>,
        left_row: Idx,
        right_row: Idx,
    },
    Cut {
        record: Box<Expr>,
        field: Idx,
        rest: Idx,
    },
    CutMulti {
        record: Box<Expr>,
        row: Idx,
        rest: Idx,
    },
    Inject {
        field: Idx,
        value: Box<Expr>,
        /// The whole variant row.
        row: Idx,
    },
    Case {
        scrutinee: Box<Expr>,
        arms: Vec<Arm>,
        /// Type of every arm.
        ty: Idx,
    },
    Let {
        binding: Binding,
        body: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    /// Evidence for a class use.
    Dict(Dict),
    /// A class use whose dictionary is not known yet. None survive a
    /// finished declaration.
    Slot(SlotId),
}

impl Expr {
    pub(crate) fn app(func: Expr, arg: Expr) -> Self {
        Expr::App(Box::new(func), Box::new(arg))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Arm {
    pub pat: Pat,
    pub body: Expr,
}

/// Patterns bind term variables left to right.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Pat {
    Wild,
    Var { name: Name, ty: Idx },
    Lit(Lit),
    Variant { field: Idx, payload: Box<Pat> },
    Record {
        fields: Vec<(Idx, Pat)>,
        /// The unlisted fields of an open pattern.
        rest: Option<Idx>,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Binding {
    Val { name: Name, ty: Idx, value: Box<Expr> },
    /// Mutually recursive functions, all in scope in every body.
    Rec(Vec<RecFun>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecFun {
    pub name: Name,
    pub ty: Idx,
    pub body: Expr,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decl {
    Con {
        def: DefId,
        kind: KindIdx,
        con: Idx,
    },
    Class {
        def: DefId,
        kind: KindIdx,
        con: Option<Idx>,
    },
    Val {
        def: DefId,
        ty: Idx,
        body: Expr,
    },
    /// One recursive group.
    Fun(Vec<FunDecl>),
    Sgn {
        name: Name,
        id: SgnId,
    },
    Str {
        name: Name,
        module: ModRef,
        decls: Vec<Decl>,
    },
    Open {
        module: ModRef,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FunDecl {
    pub def: DefId,
    pub ty: Idx,
    pub body: Expr,
}
