//! Scopes.
//!
//! Two stacks make up the elaboration environment:
//!
//! - **Locals**: binders introduced inside one declaration (constructor,
//!   kind and term variables, and disjointness facts). Indices are counted
//!   per binder class, so the de Bruijn index of a constructor variable
//!   only counts constructor binders.
//! - **Names**: what declarations bound (definitions, modules, signatures,
//!   opened structures, and the items of a signature being elaborated).
//!
//! Classifiers are stored in the context they were created in and lifted
//! on lookup. Both stacks are truncated together with [`Mark`].

use std::rc::Rc;

use urd_ir::Name;
use urd_types::{
    ClassScope, DefId, Fact, Idx, KindIdx, LocalDict, ModRef, Namespace, Pool, Sgn, SgnId,
};

#[derive(Clone, Debug)]
pub(crate) enum Classifier {
    /// A constructor variable of this kind.
    Con(KindIdx),
    /// A term variable; `dict` when its type is a class, so instance
    /// search may use it.
    Val { ty: Idx, dict: bool },
    /// A kind variable.
    KindVar,
    /// A disjointness assumption.
    Fact { left: Idx, right: Idx },
}

#[derive(Clone, Debug)]
struct Local {
    name: Name,
    classifier: Classifier,
    /// Constructor and kind binders below this one.
    con_depth: u32,
    kind_depth: u32,
}

/// What a declaration-level name stands for.
#[derive(Clone, Debug)]
pub(crate) enum Binding {
    Def(DefId),
    Module(ModRef),
    Sgn(SgnId),
    /// Brought into scope by `open`: the item of that name in the module.
    Opened(ModRef),
    /// A constructor item of a signature being elaborated, declared at
    /// signature level `level` and reached by `path` from there.
    SgnCon {
        level: u32,
        path: Vec<Name>,
        kind: KindIdx,
    },
    /// A structure item (or functor parameter) of a signature being
    /// elaborated.
    SgnStr { level: u32, path: Vec<Name>, sgn: Sgn },
}

#[derive(Clone, Debug)]
struct NameEntry {
    name: Name,
    ns: Namespace,
    binding: Binding,
}

/// A point to truncate the environment back to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Mark {
    locals: usize,
    names: usize,
}

#[derive(Default)]
pub(crate) struct Env {
    locals: Vec<Local>,
    names: Vec<NameEntry>,
    con_depth: u32,
    kind_depth: u32,
    val_depth: u32,
}

impl Env {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            locals: self.locals.len(),
            names: self.names.len(),
        }
    }

    pub(crate) fn reset(&mut self, mark: Mark) {
        for local in self.locals.drain(mark.locals..) {
            match local.classifier {
                Classifier::Con(_) => self.con_depth -= 1,
                Classifier::KindVar => self.kind_depth -= 1,
                Classifier::Val { .. } => self.val_depth -= 1,
                Classifier::Fact { .. } => {}
            }
        }
        self.names.truncate(mark.names);
    }

    pub(crate) fn con_depth(&self) -> u32 {
        self.con_depth
    }

    pub(crate) fn kind_depth(&self) -> u32 {
        self.kind_depth
    }

    pub(crate) fn val_depth(&self) -> u32 {
        self.val_depth
    }

    // === Locals ===

    fn push(&mut self, name: Name, classifier: Classifier) {
        self.locals.push(Local {
            name,
            classifier,
            con_depth: self.con_depth,
            kind_depth: self.kind_depth,
        });
    }

    pub(crate) fn push_con(&mut self, name: Name, kind: KindIdx) {
        self.push(name, Classifier::Con(kind));
        self.con_depth += 1;
    }

    pub(crate) fn push_kind(&mut self, name: Name) {
        self.push(name, Classifier::KindVar);
        self.kind_depth += 1;
    }

    pub(crate) fn push_val(&mut self, name: Name, ty: Idx, dict: bool) {
        self.push(name, Classifier::Val { ty, dict });
        self.val_depth += 1;
    }

    pub(crate) fn push_fact(&mut self, left: Idx, right: Idx) {
        self.push(Name::EMPTY, Classifier::Fact { left, right });
    }

    /// Index and kind of the innermost constructor variable `name`.
    pub(crate) fn lookup_con(&self, pool: &mut Pool, name: Name) -> Option<(u32, KindIdx)> {
        let mut index = 0;
        for local in self.locals.iter().rev() {
            let Classifier::Con(kind) = local.classifier else {
                continue;
            };
            if local.name == name {
                let by = self.kind_depth - local.kind_depth;
                return Some((index, pool.kinds_mut().lift(kind, by, 0)));
            }
            index += 1;
        }
        None
    }

    /// Index of the innermost kind variable `name`.
    pub(crate) fn lookup_kind(&self, name: Name) -> Option<u32> {
        self.locals
            .iter()
            .rev()
            .filter(|local| matches!(local.classifier, Classifier::KindVar))
            .position(|local| local.name == name)
            .and_then(|pos| u32::try_from(pos).ok())
    }

    /// Index and type of the innermost term variable `name`.
    pub(crate) fn lookup_val(&self, pool: &mut Pool, name: Name) -> Option<(u32, Idx)> {
        let mut index = 0;
        for local in self.locals.iter().rev() {
            let Classifier::Val { ty, .. } = local.classifier else {
                continue;
            };
            if local.name == name {
                let ty = pool.lift(ty, self.con_depth - local.con_depth);
                let ty = pool.lift_kinds(ty, self.kind_depth - local.kind_depth);
                return Some((index, ty));
            }
            index += 1;
        }
        None
    }

    /// Every disjointness assumption in scope, at the current depth.
    pub(crate) fn facts(&self, pool: &mut Pool) -> Rc<[Fact]> {
        self.locals
            .iter()
            .filter_map(|local| match local.classifier {
                Classifier::Fact { left, right } => {
                    let by = self.con_depth - local.con_depth;
                    Some(Fact {
                        left: pool.lift(left, by),
                        right: pool.lift(right, by),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// The class-typed term variables in scope.
    pub(crate) fn class_scope(&self) -> ClassScope {
        let mut level = 0;
        let mut locals = Vec::new();
        for local in &self.locals {
            if let Classifier::Val { ty, dict } = local.classifier {
                if dict {
                    locals.push(LocalDict {
                        level,
                        ty,
                        depth: local.con_depth,
                    });
                }
                level += 1;
            }
        }
        ClassScope { locals }
    }

    // === Names ===

    pub(crate) fn bind(&mut self, name: Name, ns: Namespace, binding: Binding) {
        self.names.push(NameEntry { name, ns, binding });
    }

    pub(crate) fn resolve(&self, name: Name, ns: Namespace) -> Option<&Binding> {
        self.names
            .iter()
            .rev()
            .find(|entry| entry.name == name && entry.ns == ns)
            .map(|entry| &entry.binding)
    }
}

#[cfg(test)]
mod tests;
