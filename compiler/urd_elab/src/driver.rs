//! The elaborator and its declaration loop.

use rustc_hash::FxHashMap;
use urd_ir::{
    ast::{DeclNode, RawDecl},
    Name, Span, StringInterner,
};
use urd_types::{
    is_class_type, Def, DefEntry, DefId, ElabError, GlobalTable, Idx, Instance, InstanceRef,
    KindIdx, ModEntry, ModId, ModOrigin, ModRef, Namespace, Pool, PostponeQueue, Sgn, SgnEntry,
    SgnItem,
};

use crate::env::{Binding, Env, Mark};
use crate::tree::Decl;
use crate::{ElabConfig, ElabOutput};

/// The declarations of one structure (or file), with what they export.
#[derive(Default)]
pub(crate) struct Block {
    pub(crate) decls: Vec<Decl>,
    /// Transparent signature items, in declaration order.
    pub(crate) items: Vec<SgnItem>,
    /// Nested structures with their own identity.
    pub(crate) members: FxHashMap<Name, ModId>,
}

/// Everything a failed declaration must undo.
struct Saved {
    env: Mark,
    prefix: usize,
    sgn_level: u32,
    functor_depth: u32,
    declared: usize,
}

/// Declaration-level elaborator.
///
/// Each declaration is one group: its obligations share one queue, are
/// forced at its end, and its leftover metavariables are generalized or
/// reported there.
///
/// # Component Structure
///
/// ```text
/// Elaborator
/// ├── Immutable Context
/// │   ├── interner: &StringInterner
/// │   └── config: &ElabConfig
/// │
/// ├── Type Storage
/// │   ├── pool: Pool           (constructors, kinds, metavariables)
/// │   └── globals: GlobalTable (definitions, modules, instances)
/// │
/// ├── Scope Context
/// │   ├── env: Env             (local binders and declared names)
/// │   ├── prefix               (qualified path of the current structure)
/// │   ├── sgn_level            (nesting of the signature being elaborated)
/// │   ├── declared             (structures declared inside functor bodies)
/// │   └── aliases              (identities of nested functor arguments)
/// │
/// ├── Group State
/// │   ├── queue: PostponeQueue (undecided obligations and dictionary slots)
/// │   └── group_defs           (provisional definitions of a `fun` group)
/// │
/// └── Diagnostics
///     └── errors: Vec<ElabError>
/// ```
pub(crate) struct Elaborator<'a> {
    // === Immutable Context ===
    pub(crate) interner: &'a StringInterner,
    pub(crate) config: &'a ElabConfig,

    // === Type Storage ===
    pub(crate) pool: Pool,
    pub(crate) globals: GlobalTable,

    // === Scope Context ===
    pub(crate) env: Env,
    pub(crate) prefix: Vec<Name>,
    pub(crate) sgn_level: u32,
    /// Number of functor bodies being elaborated.
    pub(crate) functor_depth: u32,
    /// Structures declared by name, with their qualified paths, so functor
    /// results can refer back to them.
    pub(crate) declared: Vec<(ModId, Vec<Name>)>,
    /// Modules standing for nested structure paths passed to functors.
    pub(crate) aliases: FxHashMap<ModRef, ModId>,
    builtins: FxHashMap<Name, Idx>,

    // === Group State ===
    pub(crate) queue: PostponeQueue,
    pub(crate) group_defs: Vec<DefId>,

    // === Diagnostics ===
    pub(crate) errors: Vec<ElabError>,
}

impl<'a> Elaborator<'a> {
    pub(crate) fn new(interner: &'a StringInterner, config: &'a ElabConfig) -> Self {
        let builtins = [
            ("int", Idx::INT),
            ("float", Idx::FLOAT),
            ("string", Idx::STRING),
            ("char", Idx::CHAR),
            ("bool", Idx::BOOL),
        ]
        .into_iter()
        .map(|(name, idx)| (interner.intern(name), idx))
        .collect();
        Self {
            interner,
            config,
            pool: Pool::new(),
            globals: GlobalTable::new(),
            env: Env::new(),
            prefix: Vec::new(),
            sgn_level: 0,
            functor_depth: 0,
            declared: Vec::new(),
            aliases: FxHashMap::default(),
            builtins,
            queue: PostponeQueue::new(),
            group_defs: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn into_output(self, decls: Vec<Decl>) -> ElabOutput {
        tracing::debug!(errors = self.errors.len(), "elaboration finished");
        ElabOutput {
            decls,
            errors: self.errors,
            pool: self.pool,
            globals: self.globals,
        }
    }

    pub(crate) fn builtin(&self, name: Name) -> Option<Idx> {
        self.builtins.get(&name).copied()
    }

    pub(crate) fn intern(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    // ========================================
    // Declaration loop
    // ========================================

    /// Elaborate `decls` in order. A failing declaration is reported and
    /// its names are bound to poison.
    pub(crate) fn elab_decls(&mut self, decls: &[RawDecl]) -> Block {
        let mut block = Block::default();
        for decl in decls {
            let saved = self.save();
            match self.elab_decl(decl) {
                Ok(out) => {
                    self.export(&out, &mut block);
                    block.decls.push(out);
                }
                Err(err) => {
                    tracing::debug!(code = %err.code(), "declaration failed");
                    self.errors.push(err);
                    self.restore(saved);
                    self.poison(decl, &mut block);
                }
            }
        }
        block
    }

    fn elab_decl(&mut self, decl: &RawDecl) -> Result<Decl, ElabError> {
        let span = decl.span;
        match &decl.node {
            DeclNode::Con { name, kind, def } => {
                self.elab_con_decl(*name, kind.as_ref(), def, span)
            }
            DeclNode::Class { name, kind, def } => {
                self.elab_class_decl(*name, kind.as_ref(), def.as_ref(), span)
            }
            DeclNode::Val { name, ty, body } => self.elab_val_decl(*name, ty.as_ref(), body, span),
            DeclNode::Fun(funs) => self.elab_fun_decl(funs),
            DeclNode::Sgn { name, sgn } => self.elab_sgn_decl(*name, sgn, span),
            DeclNode::Str { name, sgn, body } => {
                self.elab_str_decl(*name, sgn.as_ref(), body, span)
            }
            DeclNode::Open(path) => self.elab_open(path, span),
        }
    }

    fn save(&self) -> Saved {
        Saved {
            env: self.env.mark(),
            prefix: self.prefix.len(),
            sgn_level: self.sgn_level,
            functor_depth: self.functor_depth,
            declared: self.declared.len(),
        }
    }

    fn restore(&mut self, saved: Saved) {
        self.env.reset(saved.env);
        self.prefix.truncate(saved.prefix);
        self.sgn_level = saved.sgn_level;
        self.functor_depth = saved.functor_depth;
        self.declared.truncate(saved.declared);
        self.queue = PostponeQueue::new();
        for def in std::mem::take(&mut self.group_defs) {
            self.globals.set_def(def, Def::Val { ty: Idx::ERROR });
        }
    }

    /// Start a declaration group with an empty queue.
    pub(crate) fn begin_group(&mut self) {
        if self.queue.pending() > 0 {
            tracing::warn!(pending = self.queue.pending(), "obligations left from previous group");
        }
        self.queue = PostponeQueue::new();
    }

    // ========================================
    // Definitions and exports
    // ========================================

    pub(crate) fn qualify(&self, name: Name) -> Vec<Name> {
        let mut qualified = self.prefix.clone();
        qualified.push(name);
        qualified
    }

    pub(crate) fn add_def(&mut self, name: Name, def: Def, span: Span) -> DefId {
        let qualified = self.qualify(name);
        self.globals.add_def(DefEntry {
            name,
            qualified,
            def,
            span,
        })
    }

    /// Register the value `def` as an instance if its type is a class.
    pub(crate) fn register_if_instance(&mut self, def: DefId, ty: Idx) {
        if is_class_type(&mut self.pool, &self.globals, ty) {
            tracing::debug!(?def, "register instance");
            self.globals.add_instance(Instance {
                source: InstanceRef::Def(def),
                ty,
            });
        }
    }

    fn export(&mut self, decl: &Decl, block: &mut Block) {
        match decl {
            Decl::Con { def, kind, .. } => {
                let name = self.globals.def(*def).name;
                let con = self.pool.named(*def);
                block.items.push(SgnItem::Con {
                    name,
                    kind: *kind,
                    def: Some(con),
                });
            }
            Decl::Class { def, kind, .. } => {
                let name = self.globals.def(*def).name;
                let con = self.pool.named(*def);
                block.items.push(SgnItem::Class {
                    name,
                    kind: *kind,
                    def: Some(con),
                });
            }
            Decl::Val { def, ty, .. } => {
                let name = self.globals.def(*def).name;
                block.items.push(SgnItem::Val { name, ty: *ty });
            }
            Decl::Fun(funs) => {
                for fun in funs {
                    let name = self.globals.def(fun.def).name;
                    block.items.push(SgnItem::Val { name, ty: fun.ty });
                }
            }
            Decl::Sgn { name, id } => {
                let sgn = self.globals.sgn(*id).sgn.clone();
                block.items.push(SgnItem::Sgn { name: *name, sgn });
            }
            Decl::Str { name, module, .. } => {
                let sgn = self.item_sgn(module);
                block.items.push(SgnItem::Str { name: *name, sgn });
                if module.path.is_empty() {
                    block.members.insert(*name, module.module);
                }
            }
            Decl::Open { .. } => {}
        }
    }

    // ========================================
    // Poison
    // ========================================

    /// Bind the names `decl` would have declared to poison.
    fn poison(&mut self, decl: &RawDecl, block: &mut Block) {
        let span = decl.span;
        match &decl.node {
            DeclNode::Con { name, .. } => {
                let def = Def::Con {
                    kind: KindIdx::ERROR,
                    def: Idx::ERROR,
                };
                let id = self.add_def(*name, def, span);
                self.env.bind(*name, Namespace::Con, Binding::Def(id));
                block.items.push(SgnItem::Con {
                    name: *name,
                    kind: KindIdx::ERROR,
                    def: Some(Idx::ERROR),
                });
            }
            DeclNode::Class { name, .. } => {
                let def = Def::Class {
                    kind: KindIdx::ERROR,
                    def: Some(Idx::ERROR),
                };
                let id = self.add_def(*name, def, span);
                self.env.bind(*name, Namespace::Con, Binding::Def(id));
                block.items.push(SgnItem::Class {
                    name: *name,
                    kind: KindIdx::ERROR,
                    def: Some(Idx::ERROR),
                });
            }
            DeclNode::Val { name, .. } => self.poison_val(*name, span, block),
            DeclNode::Fun(funs) => {
                for fun in funs {
                    self.poison_val(fun.name, fun.span, block);
                }
            }
            DeclNode::Sgn { name, .. } => {
                let id = self.globals.add_sgn(SgnEntry {
                    name: *name,
                    qualified: self.qualify(*name),
                    sgn: Sgn::Error,
                });
                self.env.bind(*name, Namespace::Sgn, Binding::Sgn(id));
                block.items.push(SgnItem::Sgn {
                    name: *name,
                    sgn: Sgn::Error,
                });
            }
            DeclNode::Str { name, .. } => {
                let id = self.globals.add_module(ModEntry {
                    name: *name,
                    qualified: self.qualify(*name),
                    sgn: Sgn::Error,
                    origin: ModOrigin::Poison,
                    members: FxHashMap::default(),
                });
                self.env
                    .bind(*name, Namespace::Module, Binding::Module(ModRef::root(id)));
                block.items.push(SgnItem::Str {
                    name: *name,
                    sgn: Sgn::Error,
                });
                block.members.insert(*name, id);
            }
            DeclNode::Open(_) => {}
        }
    }

    fn poison_val(&mut self, name: Name, span: Span, block: &mut Block) {
        let id = self.add_def(name, Def::Val { ty: Idx::ERROR }, span);
        self.env.bind(name, Namespace::Val, Binding::Def(id));
        block.items.push(SgnItem::Val {
            name,
            ty: Idx::ERROR,
        });
    }
}
