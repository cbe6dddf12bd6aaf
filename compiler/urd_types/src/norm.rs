//! Head normalization.
//!
//! Constructors are stored as written and reduced on demand. [`hnorm`]
//! reduces just enough to expose the outermost constructor: it follows
//! solved metavariables, unfolds global and module-level definitions,
//! performs beta reduction for constructor and kind functions, and
//! computes the row operators as far as their arguments allow. Anything
//! blocked on an unsolved metavariable or a rigid variable is left in
//! place for the caller to postpone.

use crate::global::{Def, ModItem, ModRef, Namespace};
use crate::traverse::{fold_con, super_fold, Binders, ConFolder};
use crate::{ConData, GlobalTable, Idx, Pool};

/// Reduce `c` to head normal form.
pub fn hnorm(pool: &mut Pool, globals: &GlobalTable, c: Idx) -> Idx {
    urd_stack::ensure_sufficient_stack(|| hnorm_step(pool, globals, c))
}

fn hnorm_step(pool: &mut Pool, globals: &GlobalTable, c: Idx) -> Idx {
    let c = pool.resolve(c);
    match pool.data(c).clone() {
        ConData::Named(def) => match globals.def(def).def {
            Def::Con { def, .. } => hnorm(pool, globals, def),
            Def::Class { def: Some(def), .. } => hnorm(pool, globals, def),
            Def::Class { def: None, .. } | Def::Val { .. } => c,
        },
        ConData::ModProj { module, path, item } => {
            let r = globals.canonical(&ModRef { module, path });
            match globals.module_item(pool, &r, item, Namespace::Con) {
                Some(ModItem::Con { def: Some(def), .. } | ModItem::Class { def: Some(def), .. }) => {
                    hnorm(pool, globals, def)
                }
                _ => pool.mod_proj(r.module, r.path, item),
            }
        }
        ConData::App(f, arg) => {
            let f = hnorm(pool, globals, f);
            match *pool.data(f) {
                ConData::Abs { body, .. } => {
                    let reduced = pool.subst(body, arg);
                    hnorm(pool, globals, reduced)
                }
                ConData::Error => Idx::ERROR,
                _ => pool.app(f, arg),
            }
        }
        ConData::KApp(inner, k) => {
            let inner = hnorm(pool, globals, inner);
            match *pool.data(inner) {
                ConData::KAbs { body, .. } => {
                    let reduced = pool.subst_kind(body, k);
                    hnorm(pool, globals, reduced)
                }
                ConData::Error => Idx::ERROR,
                _ => pool.kapp(inner, k),
            }
        }
        ConData::Concat(l, r) => {
            let l = hnorm(pool, globals, l);
            let r = hnorm(pool, globals, r);
            concat_heads(pool, l, r)
        }
        ConData::Map {
            dom,
            cod,
            func,
            row,
        } => {
            let func = hnorm(pool, globals, func);
            let row = hnorm(pool, globals, row);
            map_head(pool, globals, dom, cod, func, row)
        }
        ConData::Proj { row, field } => {
            let row = hnorm(pool, globals, row);
            let field = hnorm(pool, globals, field);
            proj_head(pool, globals, row, field)
        }
        ConData::TupleProj(tuple, index) => {
            let tuple = hnorm(pool, globals, tuple);
            let component = match pool.data(tuple) {
                ConData::Tuple(cs) => cs.get(index as usize).copied(),
                ConData::Error => None,
                _ => return pool.tuple_proj(tuple, index),
            };
            match component {
                Some(c) => hnorm(pool, globals, c),
                None => Idx::ERROR,
            }
        }
        _ => c,
    }
}

fn concat_heads(pool: &mut Pool, l: Idx, r: Idx) -> Idx {
    if l.is_error() || r.is_error() {
        return Idx::ERROR;
    }
    match (pool.data(l), pool.data(r)) {
        (ConData::Row { fields, .. }, _) if fields.is_empty() => r,
        (_, ConData::Row { fields, .. }) if fields.is_empty() => l,
        (ConData::Row { kind, fields: a }, ConData::Row { fields: b, .. }) => {
            let kind = *kind;
            let fields = a.iter().chain(b).copied().collect();
            pool.row(kind, fields)
        }
        _ => pool.concat(l, r),
    }
}

fn map_head(
    pool: &mut Pool,
    globals: &GlobalTable,
    dom: crate::KindIdx,
    cod: crate::KindIdx,
    func: Idx,
    row: Idx,
) -> Idx {
    if row.is_error() || func.is_error() {
        return Idx::ERROR;
    }
    if is_identity(pool, func) {
        return row;
    }
    match pool.data(row).clone() {
        ConData::Row { fields, .. } => {
            let fields = fields
                .into_iter()
                .map(|(n, v)| (n, pool.app(func, v)))
                .collect();
            pool.row(cod, fields)
        }
        ConData::Concat(a, b) => {
            let a = map_head(pool, globals, dom, cod, func, a);
            let b = map_head(pool, globals, dom, cod, func, b);
            concat_heads(pool, a, b)
        }
        ConData::Map {
            dom: inner_dom,
            func: inner,
            row: base,
            ..
        } => {
            // map f (map g r) = map (fn x => f (g x)) r
            let f = pool.lift(func, 1);
            let g = pool.lift(inner, 1);
            let x = pool.rel(0);
            let gx = pool.app(g, x);
            let body = pool.app(f, gx);
            let composed = pool.abs(urd_ir::Name::EMPTY, inner_dom, body);
            pool.map(inner_dom, cod, composed, base)
        }
        _ => pool.map(dom, cod, func, row),
    }
}

fn is_identity(pool: &Pool, func: Idx) -> bool {
    matches!(pool.data(func), ConData::Abs { body, .. } if matches!(pool.data(*body), ConData::Rel(0)))
}

fn proj_head(pool: &mut Pool, globals: &GlobalTable, row: Idx, field: Idx) -> Idx {
    if row.is_error() || field.is_error() {
        return Idx::ERROR;
    }
    if let Some(value) = find_field(pool, globals, row, field) {
        return hnorm(pool, globals, value);
    }
    match pool.data(row).clone() {
        ConData::Map { func, row: base, .. } => {
            // (map f r)[n] = f r[n]
            let inner = pool.proj(base, field);
            let applied = pool.app(func, inner);
            hnorm(pool, globals, applied)
        }
        _ => pool.proj(row, field),
    }
}

/// The value stored at `field` in one of the literal pieces of `row`.
fn find_field(pool: &mut Pool, globals: &GlobalTable, row: Idx, field: Idx) -> Option<Idx> {
    match pool.data(row).clone() {
        ConData::Row { fields, .. } => fields.iter().find(|(n, _)| *n == field).map(|&(_, v)| v),
        ConData::Concat(a, b) => {
            let a = hnorm(pool, globals, a);
            if let Some(v) = find_field(pool, globals, a, field) {
                return Some(v);
            }
            let b = hnorm(pool, globals, b);
            find_field(pool, globals, b, field)
        }
        _ => None,
    }
}

struct Normalize<'p, 'g> {
    pool: &'p mut Pool,
    globals: &'g GlobalTable,
}

impl ConFolder for Normalize<'_, '_> {
    fn pool(&mut self) -> &mut Pool {
        self.pool
    }

    fn fold_node(&mut self, idx: Idx, at: Binders) -> Option<Idx> {
        let head = hnorm(self.pool, self.globals, idx);
        let rebuilt = super_fold(self, head, at);
        if rebuilt == head {
            return Some(head);
        }
        Some(fold_con(self, rebuilt, at))
    }

    fn fold_kind(&mut self, kind: crate::KindIdx, _at: Binders) -> crate::KindIdx {
        self.pool.kinds_mut().zonk(kind)
    }
}

/// Full normal form: [`hnorm`] everywhere.
pub fn normalize(pool: &mut Pool, globals: &GlobalTable, c: Idx) -> Idx {
    fold_con(&mut Normalize { pool, globals }, c, Binders::default())
}

#[cfg(test)]
mod tests;
