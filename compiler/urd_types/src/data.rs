//! Constructor structure.
//!
//! `ConData` is what an [`Idx`] points at. Bound variables are de Bruijn
//! indices (`Rel(0)` is the innermost constructor binder); kind binders have
//! their own index space inside [`KindData`](crate::KindData).
//!
//! Metavariables are closed: a metavariable created under `n` constructor
//! binders is a cell whose solution lives in a context of exactly those `n`
//! binders, and every occurrence applies it to a spine of `n` constructors
//! (initially the bound variables themselves, outermost first). Lifting and
//! substitution therefore never need to look inside a cell; they act on the
//! spine like on any other child.

use urd_ir::Name;

use crate::{DefId, Idx, KindIdx, MetaId, ModId, SkolemId};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ConData {
    // === Primitives ===
    Int,
    Float,
    String,
    Char,
    Bool,
    /// `()`, the only constructor of kind `Unit`.
    Unit,
    /// Poison. Unifies with everything so one error does not cascade.
    Error,

    // === Variables and references ===
    /// Bound constructor variable.
    Rel(u32),
    /// Global constructor or class.
    Named(DefId),
    /// Item of a module: `M.N.t` is `{ module: M, path: [N], item: t }`.
    ModProj {
        module: ModId,
        path: Vec<Name>,
        item: Name,
    },
    /// Item of an enclosing module, relative to a stored signature:
    /// index 0 is the signature being described, 1 the one around it.
    ModRel {
        index: u32,
        path: Vec<Name>,
        item: Name,
    },
    /// Rigid variable standing for a quantifier being introduced by
    /// generalization.
    Skolem(SkolemId),
    /// Metavariable occurrence.
    Meta {
        var: MetaId,
        spine: Vec<Idx>,
    },

    // === Type-level functions ===
    App(Idx, Idx),
    Abs {
        name: Name,
        kind: KindIdx,
        body: Idx,
    },
    KAbs {
        name: Name,
        body: Idx,
    },
    KApp(Idx, KindIdx),

    // === Types ===
    Fun(Idx, Idx),
    /// `x :: k -> t`, or `x ::: k -> t` when `implicit`.
    Poly {
        name: Name,
        implicit: bool,
        kind: KindIdx,
        body: Idx,
    },
    /// `x --> t`
    KPoly {
        name: Name,
        body: Idx,
    },
    /// `[left ~ right] => body`
    Disjoint {
        left: Idx,
        right: Idx,
        body: Idx,
    },
    /// `$row`
    Record(Idx),
    /// `variant row`
    Variant(Idx),

    // === Rows ===
    /// Row literal. `kind` is the kind of the field values.
    Row {
        kind: KindIdx,
        fields: Vec<(Idx, Idx)>,
    },
    FieldName(Name),
    Concat(Idx, Idx),
    /// `map func row`, where `func : dom -> cod`.
    Map {
        dom: KindIdx,
        cod: KindIdx,
        func: Idx,
        row: Idx,
    },
    /// `row[field]`
    Proj {
        row: Idx,
        field: Idx,
    },

    // === Tuples ===
    Tuple(Vec<Idx>),
    /// Zero-based tuple projection.
    TupleProj(Idx, u32),
}

impl ConData {
    /// Whether this node binds a constructor variable for `body`-like
    /// children.
    pub fn binds_con(&self) -> bool {
        matches!(self, Self::Abs { .. } | Self::Poly { .. })
    }

    /// Whether this is a row-shaped node (literal, concat or map).
    pub fn is_row_op(&self) -> bool {
        matches!(self, Self::Row { .. } | Self::Concat(..) | Self::Map { .. })
    }
}
