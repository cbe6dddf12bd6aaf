//! The global table: definitions, modules, signatures and instances.
//!
//! Everything a declaration group exports ends up here. Entries are
//! append-only and addressed by write-once ids.
//!
//! # Signatures
//!
//! A [`Sgn`] is stored relative to itself. A `ModRel { index, .. }` inside
//! it counts signature levels outwards from where the reference sits:
//! entering a nested structure item adds one level, a functor's parameter
//! signature sits one level below the functor's enclosing signature and its
//! result two levels below (so index 1 from the result root is the
//! parameter). Looking an item up through a module substitutes the module
//! for those indices; see [`GlobalTable::module_item`].

use rustc_hash::FxHashMap;
use urd_ir::{Name, Span};

use crate::pool::GlobalNames;
use crate::subst::{Abstraction, Anchor};
use crate::{DefId, Idx, KindIdx, ModId, Pool, SgnId};

/// Which kind of name something is, for lookup and error reporting.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Namespace {
    /// Constructors and classes.
    Con,
    Val,
    Module,
    Sgn,
}

impl Namespace {
    pub fn describe(self) -> &'static str {
        match self {
            Namespace::Con => "constructor",
            Namespace::Val => "value",
            Namespace::Module => "structure",
            Namespace::Sgn => "signature",
        }
    }
}

/// A module, or a structure nested inside one.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ModRef {
    pub module: ModId,
    pub path: Vec<Name>,
}

impl ModRef {
    pub fn root(module: ModId) -> Self {
        Self {
            module,
            path: Vec::new(),
        }
    }

    #[must_use]
    pub fn child(&self, name: Name) -> Self {
        let mut path = self.path.clone();
        path.push(name);
        Self {
            module: self.module,
            path,
        }
    }
}

// === Definitions ===

#[derive(Clone, Debug)]
pub enum Def {
    /// `con t :: k = c`
    Con { kind: KindIdx, def: Idx },
    /// A class. Without a definition it is an opaque constructor that
    /// instance search keys on.
    Class { kind: KindIdx, def: Option<Idx> },
    Val { ty: Idx },
}

#[derive(Clone, Debug)]
pub struct DefEntry {
    pub name: Name,
    /// Enclosing structure names followed by `name`.
    pub qualified: Vec<Name>,
    pub def: Def,
    pub span: Span,
}

// === Signatures ===

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Sgn {
    Const(Vec<SgnItem>),
    Functor {
        param: Name,
        param_sgn: Box<Sgn>,
        result: Box<Sgn>,
    },
    /// Poison, matches everything.
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SgnItem {
    /// Abstract when `def` is `None`.
    Con {
        name: Name,
        kind: KindIdx,
        def: Option<Idx>,
    },
    Class {
        name: Name,
        kind: KindIdx,
        def: Option<Idx>,
    },
    Val {
        name: Name,
        ty: Idx,
    },
    Str {
        name: Name,
        sgn: Sgn,
    },
    Sgn {
        name: Name,
        sgn: Sgn,
    },
}

impl SgnItem {
    pub fn name(&self) -> Name {
        match self {
            SgnItem::Con { name, .. }
            | SgnItem::Class { name, .. }
            | SgnItem::Val { name, .. }
            | SgnItem::Str { name, .. }
            | SgnItem::Sgn { name, .. } => *name,
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            SgnItem::Con { .. } | SgnItem::Class { .. } => Namespace::Con,
            SgnItem::Val { .. } => Namespace::Val,
            SgnItem::Str { .. } => Namespace::Module,
            SgnItem::Sgn { .. } => Namespace::Sgn,
        }
    }
}

impl Sgn {
    /// The last item called `name` in `ns`. Later items shadow earlier ones.
    pub fn item(&self, name: Name, ns: Namespace) -> Option<&SgnItem> {
        match self {
            Sgn::Const(items) => items
                .iter()
                .rev()
                .find(|it| it.name() == name && it.namespace() == ns),
            Sgn::Functor { .. } | Sgn::Error => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Sgn::Error)
    }

    /// Rewrite every constructor in the signature. `f` receives the number
    /// of signature levels between the constructor and the root this call
    /// started from (`depth` at the root).
    #[must_use]
    pub fn map_cons(&self, depth: u32, f: &mut dyn FnMut(Idx, u32) -> Idx) -> Sgn {
        match self {
            Sgn::Error => Sgn::Error,
            Sgn::Functor {
                param,
                param_sgn,
                result,
            } => Sgn::Functor {
                param: *param,
                param_sgn: Box::new(param_sgn.map_cons(depth + 1, f)),
                result: Box::new(result.map_cons(depth + 2, f)),
            },
            Sgn::Const(items) => Sgn::Const(
                items
                    .iter()
                    .map(|item| match item {
                        SgnItem::Con { name, kind, def } => SgnItem::Con {
                            name: *name,
                            kind: *kind,
                            def: def.map(|c| f(c, depth)),
                        },
                        SgnItem::Class { name, kind, def } => SgnItem::Class {
                            name: *name,
                            kind: *kind,
                            def: def.map(|c| f(c, depth)),
                        },
                        SgnItem::Val { name, ty } => SgnItem::Val {
                            name: *name,
                            ty: f(*ty, depth),
                        },
                        SgnItem::Str { name, sgn } => SgnItem::Str {
                            name: *name,
                            sgn: sgn.map_cons(depth + 1, f),
                        },
                        SgnItem::Sgn { name, sgn } => SgnItem::Sgn {
                            name: *name,
                            sgn: sgn.map_cons(depth + 1, f),
                        },
                    })
                    .collect(),
            ),
        }
    }

    /// Read the signature as seen through `at`: references to its own root
    /// become projections from `at`.
    #[must_use]
    pub fn instantiate(&self, pool: &mut Pool, at: &ModRef) -> Sgn {
        let refs = [at.clone()];
        self.map_cons(0, &mut |c, depth| pool.subst_modules(c, depth, &refs))
    }

    /// Replace the levels around the signature's root by `outer`
    /// (`outer[0]` directly around it), keeping references to the root
    /// itself relative. Pulls a nested signature out of its parent.
    #[must_use]
    pub fn rebase(&self, pool: &mut Pool, outer: &[ModRef]) -> Sgn {
        self.map_cons(0, &mut |c, depth| pool.subst_modules(c, depth + 1, outer))
    }

    /// Abstract references described by `map`.
    #[must_use]
    pub fn abstract_over(&self, pool: &mut Pool, map: &Abstraction) -> Sgn {
        self.map_cons(0, &mut |c, depth| pool.abstract_modules(c, depth, map))
    }
}

// === Modules ===

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ModOrigin {
    /// `struct ... end`, transparent.
    Struct,
    /// `(M : S)`, a fresh identity.
    Sealed { inner: ModId },
    /// Functor parameter placeholder.
    Param,
    Applied { functor: ModId, arg: ModId },
    /// Stands in for a structure that failed to elaborate.
    Poison,
}

#[derive(Clone, Debug)]
pub struct ModEntry {
    pub name: Name,
    pub qualified: Vec<Name>,
    pub sgn: Sgn,
    pub origin: ModOrigin,
    /// Nested structures that have their own identity.
    pub members: FxHashMap<Name, ModId>,
}

#[derive(Clone, Debug)]
pub struct SgnEntry {
    pub name: Name,
    pub qualified: Vec<Name>,
    pub sgn: Sgn,
}

// === Instances ===

/// Where an instance dictionary comes from.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum InstanceRef {
    Def(DefId),
    Mod {
        module: ModId,
        path: Vec<Name>,
        item: Name,
    },
}

/// A value registered for instance search. `ty` may quantify implicitly,
/// carry disjointness preconditions and take dictionary arguments before
/// reaching the class application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    pub source: InstanceRef,
    pub ty: Idx,
}

/// An item found through a module projection, already instantiated at the
/// module it was read from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ModItem {
    Con { kind: KindIdx, def: Option<Idx> },
    Class { kind: KindIdx, def: Option<Idx> },
    Val { ty: Idx },
}

#[derive(Default)]
pub struct GlobalTable {
    defs: Vec<DefEntry>,
    modules: Vec<ModEntry>,
    sgns: Vec<SgnEntry>,
    instances: Vec<Instance>,
    app_memo: FxHashMap<(ModId, ModId), ModId>,
    def_paths: FxHashMap<Vec<Name>, DefId>,
    module_paths: FxHashMap<Vec<Name>, ModId>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self::default()
    }

    // === Definitions ===

    pub fn add_def(&mut self, entry: DefEntry) -> DefId {
        let id = DefId::from_raw(u32::try_from(self.defs.len()).unwrap_or(u32::MAX));
        tracing::trace!(?id, qualified = ?entry.qualified, "register definition");
        self.def_paths.insert(entry.qualified.clone(), id);
        self.defs.push(entry);
        id
    }

    #[inline]
    pub fn def(&self, id: DefId) -> &DefEntry {
        &self.defs[id.index()]
    }

    /// Give a recursive group member its final type.
    pub fn set_def(&mut self, id: DefId, def: Def) {
        self.defs[id.index()].def = def;
    }

    pub fn def_count(&self) -> usize {
        self.defs.len()
    }

    /// The most recent definition with this qualified path.
    pub fn lookup_def(&self, qualified: &[Name]) -> Option<DefId> {
        self.def_paths.get(qualified).copied()
    }

    pub fn is_class_def(&self, id: DefId) -> bool {
        matches!(self.def(id).def, Def::Class { def: None, .. })
    }

    // === Modules ===

    pub fn add_module(&mut self, entry: ModEntry) -> ModId {
        let id = ModId::from_raw(u32::try_from(self.modules.len()).unwrap_or(u32::MAX));
        tracing::trace!(?id, qualified = ?entry.qualified, origin = ?entry.origin, "register module");
        if !entry.qualified.is_empty() {
            self.module_paths.insert(entry.qualified.clone(), id);
        }
        self.modules.push(entry);
        id
    }

    #[inline]
    pub fn module(&self, id: ModId) -> &ModEntry {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModId) -> &mut ModEntry {
        &mut self.modules[id.index()]
    }

    pub fn lookup_module(&self, qualified: &[Name]) -> Option<ModId> {
        self.module_paths.get(qualified).copied()
    }

    /// Follow nested structures with their own identity as far as possible,
    /// so one item has one spelling.
    pub fn canonical(&self, r: &ModRef) -> ModRef {
        let mut module = r.module;
        let mut rest = r.path.as_slice();
        while let Some((first, tail)) = rest.split_first() {
            match self.module(module).members.get(first) {
                Some(&inner) => {
                    module = inner;
                    rest = tail;
                }
                None => break,
            }
        }
        ModRef {
            module,
            path: rest.to_vec(),
        }
    }

    /// Signature of a (possibly nested) module, relative to itself.
    pub fn module_sgn(&self, pool: &mut Pool, r: &ModRef) -> Option<Sgn> {
        let r = self.canonical(r);
        let mut sgn = self.module(r.module).sgn.clone();
        let mut outer = vec![ModRef::root(r.module)];
        for (i, &step) in r.path.iter().enumerate() {
            let nested = match sgn.item(step, Namespace::Module) {
                Some(SgnItem::Str { sgn, .. }) => sgn.clone(),
                _ => return None,
            };
            // `nested` is one level below `sgn`; its level 1 is `sgn`'s root.
            sgn = nested.rebase(pool, &outer);
            outer.insert(
                0,
                ModRef {
                    module: r.module,
                    path: r.path[..=i].to_vec(),
                },
            );
        }
        Some(sgn)
    }

    /// Look up `item` of the structure `r` in namespace `ns`.
    pub fn module_item(
        &self,
        pool: &mut Pool,
        r: &ModRef,
        item: Name,
        ns: Namespace,
    ) -> Option<ModItem> {
        let r = self.canonical(r);
        let sgn = self.module_sgn(pool, &r)?;
        if sgn.is_error() {
            return Some(match ns {
                Namespace::Val => ModItem::Val { ty: Idx::ERROR },
                _ => ModItem::Con {
                    kind: KindIdx::ERROR,
                    def: Some(Idx::ERROR),
                },
            });
        }
        let found = sgn.item(item, ns)?.clone();
        let refs = [r];
        let mut inst = |c: Idx| pool.subst_modules(c, 0, &refs);
        Some(match found {
            SgnItem::Con { kind, def, .. } => ModItem::Con {
                kind,
                def: def.map(&mut inst),
            },
            SgnItem::Class { kind, def, .. } => ModItem::Class {
                kind,
                def: def.map(&mut inst),
            },
            SgnItem::Val { ty, .. } => ModItem::Val { ty: inst(ty) },
            SgnItem::Str { .. } | SgnItem::Sgn { .. } => return None,
        })
    }

    /// Whether the constructor `idx` (a head, already normalized) is a
    /// class.
    pub fn is_class_head(&self, pool: &mut Pool, idx: Idx) -> bool {
        match pool.data(idx).clone() {
            crate::ConData::Named(def) => self.is_class_def(def),
            crate::ConData::ModProj { module, path, item } => matches!(
                self.module_item(pool, &ModRef { module, path }, item, Namespace::Con),
                Some(ModItem::Class { def: None, .. })
            ),
            _ => false,
        }
    }

    /// Apply the functor `functor` to `arg`. Applications are memoised, so
    /// applying the same functor to the same structure twice yields the
    /// same module.
    pub fn apply_functor(
        &mut self,
        pool: &mut Pool,
        functor: ModId,
        arg: ModId,
        name: Name,
    ) -> Option<ModId> {
        if let Some(&known) = self.app_memo.get(&(functor, arg)) {
            tracing::debug!(?functor, ?arg, result = ?known, "functor application memo hit");
            return Some(known);
        }
        let Sgn::Functor { result, .. } = self.module(functor).sgn.clone() else {
            return None;
        };
        let refs = [ModRef::root(arg)];
        let sgn = result.map_cons(0, &mut |c, depth| pool.subst_modules(c, depth + 1, &refs));
        let id = self.add_module(ModEntry {
            name,
            qualified: Vec::new(),
            sgn,
            origin: ModOrigin::Applied { functor, arg },
            members: FxHashMap::default(),
        });
        self.app_memo.insert((functor, arg), id);
        tracing::debug!(?functor, ?arg, result = ?id, "applied functor");
        Some(id)
    }

    /// Replace the manifest definitions of a transparent signature that
    /// point at `owned` definitions by those definitions' bodies, then
    /// abstract every reference described by `map`. This detaches a functor
    /// body's signature from the definitions made while elaborating it.
    pub fn detach(&self, pool: &mut Pool, sgn: &Sgn, map: &Abstraction) -> Sgn {
        let exposed = self.expose(pool, sgn, map);
        exposed.abstract_over(pool, map)
    }

    fn expose(&self, pool: &mut Pool, sgn: &Sgn, map: &Abstraction) -> Sgn {
        let owned_body = |pool: &mut Pool, def: Option<Idx>| -> Option<Option<Idx>> {
            let crate::ConData::Named(id) = *pool.data(def?) else {
                return None;
            };
            if !map.defs.contains_key(&id) {
                return None;
            }
            Some(match self.def(id).def {
                Def::Con { def, .. } => Some(def),
                Def::Class { def, .. } => def,
                Def::Val { .. } => None,
            })
        };
        match sgn {
            Sgn::Error => Sgn::Error,
            Sgn::Functor {
                param,
                param_sgn,
                result,
            } => Sgn::Functor {
                param: *param,
                param_sgn: Box::new(self.expose(pool, param_sgn, map)),
                result: Box::new(self.expose(pool, result, map)),
            },
            Sgn::Const(items) => Sgn::Const(
                items
                    .iter()
                    .map(|item| match item {
                        SgnItem::Con { name, kind, def } => SgnItem::Con {
                            name: *name,
                            kind: *kind,
                            def: owned_body(pool, *def).unwrap_or(*def),
                        },
                        SgnItem::Class { name, kind, def } => SgnItem::Class {
                            name: *name,
                            kind: *kind,
                            def: owned_body(pool, *def).unwrap_or(*def),
                        },
                        SgnItem::Str { name, sgn } => SgnItem::Str {
                            name: *name,
                            sgn: self.expose(pool, sgn, map),
                        },
                        SgnItem::Sgn { name, sgn } => SgnItem::Sgn {
                            name: *name,
                            sgn: self.expose(pool, sgn, map),
                        },
                        other @ SgnItem::Val { .. } => other.clone(),
                    })
                    .collect(),
            ),
        }
    }

    // === Signatures ===

    pub fn add_sgn(&mut self, entry: SgnEntry) -> SgnId {
        let id = SgnId::from_raw(u32::try_from(self.sgns.len()).unwrap_or(u32::MAX));
        self.sgns.push(entry);
        id
    }

    #[inline]
    pub fn sgn(&self, id: SgnId) -> &SgnEntry {
        &self.sgns[id.index()]
    }

    // === Instances ===

    pub fn add_instance(&mut self, instance: Instance) {
        tracing::debug!(source = ?instance.source, ty = ?instance.ty, "register instance");
        self.instances.push(instance);
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Forget the instances registered after the first `len`. Instances
    /// declared inside a functor body are only visible there; each
    /// application registers its own.
    pub fn retract_instances(&mut self, len: usize) {
        if self.instances.len() > len {
            tracing::debug!(dropped = self.instances.len() - len, "retract scoped instances");
            self.instances.truncate(len);
        }
    }

    /// Build the abstraction anchoring `defs` and `modules` at the root of
    /// a structure, each at the path where it was declared.
    pub fn anchor_all(
        &self,
        defs: impl IntoIterator<Item = (DefId, Vec<Name>)>,
        modules: impl IntoIterator<Item = (ModId, Vec<Name>)>,
    ) -> Abstraction {
        let mut map = Abstraction::default();
        for (def, path) in defs {
            let item = self.def(def).name;
            map.defs.insert(def, (Anchor { up: 0, path }, item));
        }
        for (module, path) in modules {
            map.modules.insert(module, Anchor { up: 0, path });
        }
        map
    }
}

/// Renders names through an interner.
pub struct NamedGlobals<'a> {
    pub globals: &'a GlobalTable,
    pub interner: &'a urd_ir::StringInterner,
}

impl GlobalNames for NamedGlobals<'_> {
    fn def_name(&self, def: DefId) -> Option<String> {
        let entry = self.globals.defs.get(def.index())?;
        Some(join(self.interner, &entry.qualified))
    }

    fn module_name(&self, module: ModId) -> Option<String> {
        let entry = self.globals.modules.get(module.index())?;
        if entry.qualified.is_empty() {
            return match entry.origin {
                ModOrigin::Applied { functor, arg } => Some(format!(
                    "{}({})",
                    self.module_name(functor)?,
                    self.module_name(arg)?
                )),
                _ => Some(self.interner.lookup(entry.name).to_owned()),
            };
        }
        Some(join(self.interner, &entry.qualified))
    }
}

fn join(interner: &urd_ir::StringInterner, names: &[Name]) -> String {
    names
        .iter()
        .map(|n| interner.lookup(*n))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests;
