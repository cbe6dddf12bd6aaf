//! Generic constructor traversals.
//!
//! `ConFolder` rebuilds a constructor bottom-up, re-interning each node, so
//! untouched subtrees come back with their original `Idx`. Every operation
//! that rewrites constructors (lifting, substitution, zonking, module
//! re-anchoring, skolem abstraction) is a small folder that intercepts the
//! nodes it cares about and lets [`super_fold`] handle the rest.
//!
//! `ConVisitor` is the read-only counterpart used for collection passes.

use crate::{ConData, Idx, KindIdx, Pool};

/// Binder depths at the current position, relative to where the traversal
/// started.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Binders {
    /// Constructor binders (`Abs`, `Poly`) crossed.
    pub con: u32,
    /// Kind binders (`KAbs`, `KPoly`) crossed.
    pub kind: u32,
}

impl Binders {
    #[inline]
    fn under_con(self) -> Self {
        Self {
            con: self.con + 1,
            ..self
        }
    }

    #[inline]
    fn under_kind(self) -> Self {
        Self {
            kind: self.kind + 1,
            ..self
        }
    }
}

/// Structural constructor rewriting.
pub trait ConFolder {
    fn pool(&mut self) -> &mut Pool;

    /// Replace `idx` outright, or return `None` to rebuild it from its
    /// folded children.
    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx>;

    /// Rewrite a kind annotation found inside a constructor.
    fn fold_kind(&mut self, kind: KindIdx, at: Binders) -> KindIdx {
        let _ = at;
        kind
    }
}

/// Fold `idx` with `folder`.
pub fn fold_con<F: ConFolder + ?Sized>(folder: &mut F, idx: Idx, at: Binders) -> Idx {
    urd_stack::ensure_sufficient_stack(|| match folder.fold_node(idx, at) {
        Some(replaced) => replaced,
        None => super_fold(folder, idx, at),
    })
}

/// Rebuild `idx` from its folded children.
pub fn super_fold<F: ConFolder + ?Sized>(folder: &mut F, idx: Idx, at: Binders) -> Idx {
    let data = folder.pool().data(idx).clone();
    let rebuilt = match data {
        ConData::Int
        | ConData::Float
        | ConData::String
        | ConData::Char
        | ConData::Bool
        | ConData::Unit
        | ConData::Error
        | ConData::Rel(_)
        | ConData::Named(_)
        | ConData::ModProj { .. }
        | ConData::ModRel { .. }
        | ConData::Skolem(_)
        | ConData::FieldName(_) => return idx,
        ConData::Meta { var, spine } => ConData::Meta {
            var,
            spine: spine.into_iter().map(|c| fold_con(folder, c, at)).collect(),
        },
        ConData::App(f, a) => ConData::App(fold_con(folder, f, at), fold_con(folder, a, at)),
        ConData::Abs { name, kind, body } => ConData::Abs {
            name,
            kind: folder.fold_kind(kind, at),
            body: fold_con(folder, body, at.under_con()),
        },
        ConData::KAbs { name, body } => ConData::KAbs {
            name,
            body: fold_con(folder, body, at.under_kind()),
        },
        ConData::KApp(c, k) => ConData::KApp(fold_con(folder, c, at), folder.fold_kind(k, at)),
        ConData::Fun(a, b) => ConData::Fun(fold_con(folder, a, at), fold_con(folder, b, at)),
        ConData::Poly {
            name,
            implicit,
            kind,
            body,
        } => ConData::Poly {
            name,
            implicit,
            kind: folder.fold_kind(kind, at),
            body: fold_con(folder, body, at.under_con()),
        },
        ConData::KPoly { name, body } => ConData::KPoly {
            name,
            body: fold_con(folder, body, at.under_kind()),
        },
        ConData::Disjoint { left, right, body } => ConData::Disjoint {
            left: fold_con(folder, left, at),
            right: fold_con(folder, right, at),
            body: fold_con(folder, body, at),
        },
        ConData::Record(r) => ConData::Record(fold_con(folder, r, at)),
        ConData::Variant(r) => ConData::Variant(fold_con(folder, r, at)),
        ConData::Row { kind, fields } => ConData::Row {
            kind: folder.fold_kind(kind, at),
            fields: fields
                .into_iter()
                .map(|(n, v)| (fold_con(folder, n, at), fold_con(folder, v, at)))
                .collect(),
        },
        ConData::Concat(l, r) => ConData::Concat(fold_con(folder, l, at), fold_con(folder, r, at)),
        ConData::Map {
            dom,
            cod,
            func,
            row,
        } => ConData::Map {
            dom: folder.fold_kind(dom, at),
            cod: folder.fold_kind(cod, at),
            func: fold_con(folder, func, at),
            row: fold_con(folder, row, at),
        },
        ConData::Proj { row, field } => ConData::Proj {
            row: fold_con(folder, row, at),
            field: fold_con(folder, field, at),
        },
        ConData::Tuple(cs) => {
            ConData::Tuple(cs.into_iter().map(|c| fold_con(folder, c, at)).collect())
        }
        ConData::TupleProj(c, i) => ConData::TupleProj(fold_con(folder, c, at), i),
    };
    folder.pool().intern(rebuilt)
}

/// Read-only structural traversal.
pub trait ConVisitor {
    /// Inspect `idx`; return `false` to skip its children.
    fn visit_node(&mut self, pool: &Pool, idx: Idx, at: Binders) -> bool;

    fn visit_kind(&mut self, pool: &Pool, kind: KindIdx) {
        let _ = (pool, kind);
    }
}

/// Visit `idx` and, unless the visitor declines, its children.
pub fn visit_con<V: ConVisitor + ?Sized>(pool: &Pool, visitor: &mut V, idx: Idx, at: Binders) {
    urd_stack::ensure_sufficient_stack(|| {
        if !visitor.visit_node(pool, idx, at) {
            return;
        }
        match pool.data(idx) {
            ConData::Int
            | ConData::Float
            | ConData::String
            | ConData::Char
            | ConData::Bool
            | ConData::Unit
            | ConData::Error
            | ConData::Rel(_)
            | ConData::Named(_)
            | ConData::ModProj { .. }
            | ConData::ModRel { .. }
            | ConData::Skolem(_)
            | ConData::FieldName(_) => {}
            ConData::Meta { spine, .. } => {
                for &c in spine {
                    visit_con(pool, visitor, c, at);
                }
            }
            ConData::App(a, b) | ConData::Fun(a, b) | ConData::Concat(a, b) => {
                visit_con(pool, visitor, *a, at);
                visit_con(pool, visitor, *b, at);
            }
            ConData::Abs { kind, body, .. } | ConData::Poly { kind, body, .. } => {
                visitor.visit_kind(pool, *kind);
                visit_con(pool, visitor, *body, at.under_con());
            }
            ConData::KAbs { body, .. } | ConData::KPoly { body, .. } => {
                visit_con(pool, visitor, *body, at.under_kind());
            }
            ConData::KApp(c, k) => {
                visit_con(pool, visitor, *c, at);
                visitor.visit_kind(pool, *k);
            }
            ConData::Disjoint { left, right, body } => {
                visit_con(pool, visitor, *left, at);
                visit_con(pool, visitor, *right, at);
                visit_con(pool, visitor, *body, at);
            }
            ConData::Record(r) | ConData::Variant(r) => visit_con(pool, visitor, *r, at),
            ConData::Row { kind, fields } => {
                visitor.visit_kind(pool, *kind);
                for &(n, v) in fields {
                    visit_con(pool, visitor, n, at);
                    visit_con(pool, visitor, v, at);
                }
            }
            ConData::Map {
                dom,
                cod,
                func,
                row,
            } => {
                visitor.visit_kind(pool, *dom);
                visitor.visit_kind(pool, *cod);
                visit_con(pool, visitor, *func, at);
                visit_con(pool, visitor, *row, at);
            }
            ConData::Proj { row, field } => {
                visit_con(pool, visitor, *row, at);
                visit_con(pool, visitor, *field, at);
            }
            ConData::Tuple(cs) => {
                for &c in cs {
                    visit_con(pool, visitor, c, at);
                }
            }
            ConData::TupleProj(c, _) => visit_con(pool, visitor, *c, at),
        }
    });
}
