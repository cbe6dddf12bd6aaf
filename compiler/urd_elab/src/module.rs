//! Structures, signatures and functors.
//!
//! # Signature levels
//!
//! A signature refers to its own items with `ModRel` references that count
//! signature levels outwards (see [`urd_types::global`]). While a
//! signature is elaborated `sgn_level` is the level of the innermost
//! signature being built; its items are bound as [`Binding::SgnCon`] and
//! [`Binding::SgnStr`] at that level, so a reference from `n` levels
//! further in becomes `ModRel(n, ..)`.
//!
//! # Functors
//!
//! The body of a functor is elaborated once, against a placeholder module
//! standing for the parameter. Its signature is then detached from the
//! definitions and modules made while elaborating it: they become
//! references relative to the result, and the placeholder becomes level 1.
//! Application substitutes the argument for that level and is memoised on
//! the identities of functor and argument.

use rustc_hash::FxHashMap;
use urd_ir::{
    ast::{RawCon, RawDecl, RawKind, RawSgn, RawSgnItem, RawStr, SgnItemNode, SgnNode, StrNode},
    Name, Span,
};
use urd_types::{
    is_class_type, Abstraction, Anchor, DefId, ElabError, ElabErrorKind, Idx, Instance,
    InstanceRef, ItemMismatch, KindIdx, MismatchReason, ModEntry, ModId, ModItem, ModOrigin,
    ModRef, Namespace, Sgn, SgnEntry, SgnItem,
};

use crate::driver::Elaborator;
use crate::env::Binding;
use crate::finish::residual_error;
use crate::tree::Decl;

impl Elaborator<'_> {
    // ========================================
    // Module paths
    // ========================================

    /// Resolve `M.N...` to a structure.
    pub(crate) fn module_path(&mut self, path: &[Name], span: Span) -> Result<ModRef, ElabError> {
        let module = self.module_path_any(path, span)?;
        match self.globals.module_sgn(&mut self.pool, &module) {
            Some(Sgn::Functor { .. }) => Err(ElabError::new(
                span,
                ElabErrorKind::NotAStructure {
                    path: path.to_vec(),
                },
            )),
            _ => Ok(module),
        }
    }

    /// Resolve `M.N...` to a structure or a functor.
    fn module_path_any(&mut self, path: &[Name], span: Span) -> Result<ModRef, ElabError> {
        let Some((&first, rest)) = path.split_first() else {
            return Err(ElabError::new(
                span,
                ElabErrorKind::NotAStructure { path: Vec::new() },
            ));
        };
        let mut module = match self.env.resolve(first, Namespace::Module).cloned() {
            Some(Binding::Module(module)) => module,
            Some(Binding::Opened(outer)) => outer.child(first),
            _ => return Err(ElabError::unbound(span, first, Namespace::Module)),
        };
        for (i, &step) in rest.iter().enumerate() {
            match self.globals.module_sgn(&mut self.pool, &module) {
                Some(Sgn::Error) => return Ok(module),
                Some(Sgn::Const(_)) => {}
                Some(Sgn::Functor { .. }) | None => {
                    return Err(ElabError::new(
                        span,
                        ElabErrorKind::NotAStructure {
                            path: path[..=i].to_vec(),
                        },
                    ))
                }
            }
            module = module.child(step);
            if self.globals.module_sgn(&mut self.pool, &module).is_none() {
                return Err(ElabError::unbound(span, step, Namespace::Module));
            }
        }
        Ok(self.globals.canonical(&module))
    }

    /// The signature a structure item exports for `module`. Abstract items
    /// are made manifest as projections from the module, so the item keeps
    /// its identity when seen through the enclosing structure.
    pub(crate) fn item_sgn(&mut self, module: &ModRef) -> Sgn {
        let Some(sgn) = self.globals.module_sgn(&mut self.pool, module) else {
            return Sgn::Error;
        };
        let canonical = self.globals.canonical(module);
        if self.functor_depth > 0 && !self.anchorable(canonical.module) {
            return sgn;
        }
        self.selfify(&sgn, &canonical)
    }

    fn anchorable(&self, id: ModId) -> bool {
        matches!(self.globals.module(id).origin, ModOrigin::Param)
            || self.declared.iter().any(|(module, _)| *module == id)
    }

    fn selfify(&mut self, sgn: &Sgn, at: &ModRef) -> Sgn {
        let Sgn::Const(items) = sgn else {
            return sgn.clone();
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(match item {
                SgnItem::Con {
                    name,
                    kind,
                    def: None,
                } => SgnItem::Con {
                    name: *name,
                    kind: *kind,
                    def: Some(self.pool.mod_proj(at.module, at.path.clone(), *name)),
                },
                SgnItem::Class {
                    name,
                    kind,
                    def: None,
                } => SgnItem::Class {
                    name: *name,
                    kind: *kind,
                    def: Some(self.pool.mod_proj(at.module, at.path.clone(), *name)),
                },
                SgnItem::Str { name, sgn } => {
                    let child = self.globals.canonical(&at.child(*name));
                    SgnItem::Str {
                        name: *name,
                        sgn: self.selfify(sgn, &child),
                    }
                }
                other => other.clone(),
            });
        }
        Sgn::Const(out)
    }

    /// A module with its own identity for `module`, which may be a nested
    /// structure reached through a signature.
    fn alias_of(&mut self, module: &ModRef) -> ModId {
        let module = self.globals.canonical(module);
        if module.path.is_empty() {
            return module.module;
        }
        if let Some(&id) = self.aliases.get(&module) {
            return id;
        }
        let sgn = self.item_sgn(&module);
        let name = module.path.last().copied().unwrap_or(Name::EMPTY);
        let id = self.globals.add_module(ModEntry {
            name,
            qualified: Vec::new(),
            sgn,
            origin: ModOrigin::Struct,
            members: FxHashMap::default(),
        });
        self.aliases.insert(module, id);
        id
    }

    // ========================================
    // Structures
    // ========================================

    pub(crate) fn elab_str_decl(
        &mut self,
        name: Name,
        sgn: Option<&RawSgn>,
        body: &RawStr,
        span: Span,
    ) -> Result<Decl, ElabError> {
        self.begin_group();
        let instances = self.globals.instance_count();
        let (module, decls) = self.elab_str(name, body)?;
        let module = match sgn {
            Some(sgn) => {
                let sgn = self.elab_sgn(sgn)?;
                self.seal(name, &module, sgn, instances, span)?
            }
            None => module,
        };
        self.env
            .bind(name, Namespace::Module, Binding::Module(module.clone()));
        tracing::debug!(?module, "declared structure");
        Ok(Decl::Str {
            name,
            module,
            decls,
        })
    }

    fn elab_str(&mut self, name: Name, body: &RawStr) -> Result<(ModRef, Vec<Decl>), ElabError> {
        let span = body.span;
        match &body.node {
            StrNode::Const(decls) => Ok(self.elab_struct(name, decls)),
            StrNode::Path(path) => Ok((self.module_path(path, span)?, Vec::new())),
            StrNode::Functor {
                param,
                param_sgn,
                result,
                body,
            } => self.elab_functor(name, *param, param_sgn, result.as_deref(), body, span),
            StrNode::App(path, arg) => self.elab_app(name, path, arg, span),
            StrNode::Seal(inner, sgn) => {
                let instances = self.globals.instance_count();
                let (module, decls) = self.elab_str(name, inner)?;
                let sgn = self.elab_sgn(sgn)?;
                let sealed = self.seal(name, &module, sgn, instances, span)?;
                Ok((sealed, decls))
            }
        }
    }

    fn elab_struct(&mut self, name: Name, decls: &[RawDecl]) -> (ModRef, Vec<Decl>) {
        let qualified = self.qualify(name);
        self.prefix.push(name);
        let mark = self.env.mark();
        let block = self.elab_decls(decls);
        self.env.reset(mark);
        self.prefix.pop();
        let id = self.globals.add_module(ModEntry {
            name,
            qualified: qualified.clone(),
            sgn: Sgn::Const(block.items),
            origin: ModOrigin::Struct,
            members: block.members,
        });
        if self.functor_depth > 0 {
            self.declared.push((id, qualified));
        }
        (ModRef::root(id), block.decls)
    }

    /// Give `inner` a fresh identity with signature `sgn`. The instances
    /// registered while elaborating `inner` are replaced by those `sgn`
    /// exposes.
    fn seal(
        &mut self,
        name: Name,
        inner: &ModRef,
        sgn: Sgn,
        instances: usize,
        span: Span,
    ) -> Result<ModRef, ElabError> {
        self.match_sgn(inner, &sgn, span)?;
        self.globals.retract_instances(instances);
        let qualified = self.qualify(name);
        let id = self.globals.add_module(ModEntry {
            name,
            qualified: qualified.clone(),
            sgn: sgn.clone(),
            origin: ModOrigin::Sealed {
                inner: inner.module,
            },
            members: FxHashMap::default(),
        });
        if self.functor_depth > 0 {
            self.declared.push((id, qualified));
        }
        let sealed = ModRef::root(id);
        self.register_instances(&sealed, &sgn);
        tracing::debug!(?id, inner = ?inner.module, "sealed structure");
        Ok(sealed)
    }

    /// Register the class-typed values `sgn` exposes through `module`.
    /// A type already registered is skipped, so an alias does not make its
    /// instances ambiguous.
    fn register_instances(&mut self, module: &ModRef, sgn: &Sgn) {
        let Sgn::Const(items) = sgn else {
            return;
        };
        for item in items {
            match item {
                SgnItem::Val { name, .. } => {
                    let Some(ModItem::Val { ty }) =
                        self.globals
                            .module_item(&mut self.pool, module, *name, Namespace::Val)
                    else {
                        continue;
                    };
                    if !is_class_type(&mut self.pool, &self.globals, ty)
                        || self.globals.instances().iter().any(|i| i.ty == ty)
                    {
                        continue;
                    }
                    let canonical = self.globals.canonical(module);
                    self.globals.add_instance(Instance {
                        source: InstanceRef::Mod {
                            module: canonical.module,
                            path: canonical.path,
                            item: *name,
                        },
                        ty,
                    });
                }
                SgnItem::Str { name, sgn } => self.register_instances(&module.child(*name), sgn),
                _ => {}
            }
        }
    }

    // ========================================
    // Functors
    // ========================================

    fn elab_functor(
        &mut self,
        name: Name,
        param: Name,
        param_sgn: &RawSgn,
        result: Option<&RawSgn>,
        body: &RawStr,
        span: Span,
    ) -> Result<(ModRef, Vec<Decl>), ElabError> {
        let psgn = self.elab_sgn(param_sgn)?;
        let pid = self.globals.add_module(ModEntry {
            name: param,
            qualified: Vec::new(),
            sgn: psgn.clone(),
            origin: ModOrigin::Param,
            members: FxHashMap::default(),
        });
        let instances = self.globals.instance_count();
        let defs = self.globals.def_count();
        let declared = self.declared.len();
        let mark = self.env.mark();
        self.env
            .bind(param, Namespace::Module, Binding::Module(ModRef::root(pid)));
        self.register_instances(&ModRef::root(pid), &psgn);

        self.functor_depth += 1;
        let inner = self.elab_functor_body(name, result, body, span);
        self.functor_depth -= 1;
        self.env.reset(mark);
        self.globals.retract_instances(instances);

        let (result, decls) = match inner {
            Ok(inner) => inner,
            Err(err) => {
                self.declared.truncate(declared);
                return Err(err);
            }
        };
        let map = self.functor_abstraction(name, pid, defs, declared);
        self.declared.truncate(declared);
        let result = self.globals.detach(&mut self.pool, &result, &map);

        let qualified = self.qualify(name);
        let id = self.globals.add_module(ModEntry {
            name,
            qualified: qualified.clone(),
            sgn: Sgn::Functor {
                param,
                param_sgn: Box::new(psgn),
                result: Box::new(result),
            },
            origin: ModOrigin::Struct,
            members: FxHashMap::default(),
        });
        if self.functor_depth > 0 {
            self.declared.push((id, qualified));
        }
        tracing::debug!(?id, "declared functor");
        Ok((ModRef::root(id), decls))
    }

    /// Elaborate the body and return the signature its applications get.
    fn elab_functor_body(
        &mut self,
        name: Name,
        result: Option<&RawSgn>,
        body: &RawStr,
        span: Span,
    ) -> Result<(Sgn, Vec<Decl>), ElabError> {
        let (module, decls) = self.elab_str(name, body)?;
        let sgn = match result {
            Some(result) => {
                let sgn = self.elab_sgn(result)?;
                self.match_sgn(&module, &sgn, span)?;
                sgn
            }
            None => self.item_sgn(&module),
        };
        Ok((sgn, decls))
    }

    /// Everything a functor body declared, anchored at the body's root, and
    /// the parameter one level up.
    fn functor_abstraction(
        &self,
        name: Name,
        param: ModId,
        defs_from: usize,
        declared_from: usize,
    ) -> Abstraction {
        let mut root = self.prefix.clone();
        root.push(name);
        let base = root.len();
        let defs = (defs_from..self.globals.def_count()).filter_map(|i| {
            let id = DefId::from_raw(u32::try_from(i).ok()?);
            let qualified = &self.globals.def(id).qualified;
            (qualified.len() > base && qualified.starts_with(&root))
                .then(|| (id, qualified[base..qualified.len() - 1].to_vec()))
        });
        let modules = self.declared[declared_from..]
            .iter()
            .filter(|(_, qualified)| qualified.starts_with(&root))
            .map(|(module, qualified)| (*module, qualified[base..].to_vec()));
        let mut map = self.globals.anchor_all(defs, modules);
        map.modules.insert(
            param,
            Anchor {
                up: 1,
                path: Vec::new(),
            },
        );
        map
    }

    fn elab_app(
        &mut self,
        name: Name,
        path: &[Name],
        arg: &RawStr,
        span: Span,
    ) -> Result<(ModRef, Vec<Decl>), ElabError> {
        let functor = self.module_path_any(path, span)?;
        let param_sgn = match self.globals.module_sgn(&mut self.pool, &functor) {
            Some(Sgn::Functor { param_sgn, .. }) => *param_sgn,
            Some(Sgn::Error) => return Ok((functor, Vec::new())),
            _ => {
                return Err(ElabError::new(
                    span,
                    ElabErrorKind::NotAFunctor {
                        path: path.to_vec(),
                    },
                ))
            }
        };
        let fid = self.alias_of(&functor);
        let (arg_ref, decls) = match &arg.node {
            StrNode::Path(arg_path) => (self.module_path(arg_path, arg.span)?, Vec::new()),
            _ => {
                let arg_name = self.intern("arg");
                self.elab_str(arg_name, arg)?
            }
        };
        let expected = param_sgn.rebase(&mut self.pool, &[ModRef::root(fid)]);
        self.match_sgn(&arg_ref, &expected, arg.span)?;
        let aid = self.alias_of(&arg_ref);
        let Some(id) = self.globals.apply_functor(&mut self.pool, fid, aid, name) else {
            return Err(ElabError::new(
                span,
                ElabErrorKind::NotAFunctor {
                    path: path.to_vec(),
                },
            ));
        };
        if self.functor_depth > 0 {
            let qualified = self.qualify(name);
            self.declared.push((id, qualified));
        }
        let applied = ModRef::root(id);
        let sgn = self.globals.module(id).sgn.clone();
        self.register_instances(&applied, &sgn);
        Ok((applied, decls))
    }

    // ========================================
    // Signatures
    // ========================================

    pub(crate) fn elab_sgn_decl(
        &mut self,
        name: Name,
        sgn: &RawSgn,
        span: Span,
    ) -> Result<Decl, ElabError> {
        self.begin_group();
        let sgn = self.elab_sgn(sgn)?;
        let id = self.globals.add_sgn(SgnEntry {
            name,
            qualified: self.qualify(name),
            sgn,
        });
        self.env.bind(name, Namespace::Sgn, Binding::Sgn(id));
        tracing::debug!(?id, ?span, "declared signature");
        Ok(Decl::Sgn { name, id })
    }

    /// Elaborate a signature one level below the current one.
    pub(crate) fn elab_sgn(&mut self, sgn: &RawSgn) -> Result<Sgn, ElabError> {
        self.sgn_level += 1;
        let mark = self.env.mark();
        let out = self.elab_sgn_root(sgn);
        self.env.reset(mark);
        self.sgn_level -= 1;
        out
    }

    fn elab_sgn_root(&mut self, sgn: &RawSgn) -> Result<Sgn, ElabError> {
        let span = sgn.span;
        match &sgn.node {
            SgnNode::Const(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.elab_sgn_item(item)?);
                }
                Ok(Sgn::Const(out))
            }
            SgnNode::Path(modules, name) => self.named_sgn(modules, *name, span),
            SgnNode::Functor {
                param,
                param_sgn,
                result,
            } => {
                let psgn = self.elab_sgn(param_sgn)?;
                self.env.bind(
                    *param,
                    Namespace::Module,
                    Binding::SgnStr {
                        level: self.sgn_level + 1,
                        path: Vec::new(),
                        sgn: psgn.clone(),
                    },
                );
                self.sgn_level += 1;
                let result = self.elab_sgn(result);
                self.sgn_level -= 1;
                Ok(Sgn::Functor {
                    param: *param,
                    param_sgn: Box::new(psgn),
                    result: Box::new(result?),
                })
            }
            SgnNode::Where { sgn, path, con } => {
                let mark = self.env.mark();
                let base = self.elab_sgn_root(sgn);
                self.env.reset(mark);
                self.where_con(base?, path, con, span)
            }
        }
    }

    fn elab_sgn_item(&mut self, item: &RawSgnItem) -> Result<SgnItem, ElabError> {
        let span = item.span;
        let level = self.sgn_level;
        match &item.node {
            SgnItemNode::Con { name, kind, def } => {
                let (kind, def) =
                    self.sgn_con(kind.as_ref(), def.as_ref(), KindIdx::TYPE, span)?;
                self.env.bind(
                    *name,
                    Namespace::Con,
                    Binding::SgnCon {
                        level,
                        path: Vec::new(),
                        kind,
                    },
                );
                Ok(SgnItem::Con {
                    name: *name,
                    kind,
                    def,
                })
            }
            SgnItemNode::Class { name, kind, def } => {
                let default = self.pool.kinds_mut().arrow(KindIdx::TYPE, KindIdx::TYPE);
                let (kind, def) = self.sgn_con(kind.as_ref(), def.as_ref(), default, span)?;
                self.env.bind(
                    *name,
                    Namespace::Con,
                    Binding::SgnCon {
                        level,
                        path: Vec::new(),
                        kind,
                    },
                );
                Ok(SgnItem::Class {
                    name: *name,
                    kind,
                    def,
                })
            }
            SgnItemNode::Val { name, ty } => {
                self.begin_group();
                let ty = self.check_con(ty, KindIdx::TYPE)?;
                let ty = self.close_con(ty, span)?;
                Ok(SgnItem::Val { name: *name, ty })
            }
            SgnItemNode::Str { name, sgn } => {
                let sgn = self.elab_sgn(sgn)?;
                self.env.bind(
                    *name,
                    Namespace::Module,
                    Binding::SgnStr {
                        level,
                        path: vec![*name],
                        sgn: sgn.clone(),
                    },
                );
                Ok(SgnItem::Str { name: *name, sgn })
            }
        }
    }

    /// Kind and optional definition of a constructor or class item.
    fn sgn_con(
        &mut self,
        kind: Option<&RawKind>,
        def: Option<&RawCon>,
        default: KindIdx,
        span: Span,
    ) -> Result<(KindIdx, Option<Idx>), ElabError> {
        self.begin_group();
        let (kind, def) = match (kind, def) {
            (Some(kind), Some(def)) => {
                let kind = self.elab_kind(kind)?;
                (kind, Some(self.check_con(def, kind)?))
            }
            (None, Some(def)) => {
                let (def, kind) = self.infer_con(def)?;
                (kind, Some(def))
            }
            (Some(kind), None) => (self.elab_kind(kind)?, None),
            (None, None) => (default, None),
        };
        let def = match def {
            Some(def) => Some(self.close_con(def, span)?),
            None => None,
        };
        Ok((self.close_kind(kind), def))
    }

    fn named_sgn(&mut self, modules: &[Name], name: Name, span: Span) -> Result<Sgn, ElabError> {
        if modules.is_empty() {
            return match self.env.resolve(name, Namespace::Sgn).cloned() {
                Some(Binding::Sgn(id)) => Ok(self.globals.sgn(id).sgn.clone()),
                Some(Binding::Opened(module)) => self.module_sgn_item(&module, name, span),
                _ => Err(ElabError::unbound(span, name, Namespace::Sgn)),
            };
        }
        let module = self.module_path(modules, span)?;
        self.module_sgn_item(&module, name, span)
    }

    fn module_sgn_item(
        &mut self,
        module: &ModRef,
        name: Name,
        span: Span,
    ) -> Result<Sgn, ElabError> {
        let Some(sgn) = self.globals.module_sgn(&mut self.pool, module) else {
            return Err(ElabError::unbound(span, name, Namespace::Sgn));
        };
        if sgn.is_error() {
            return Ok(Sgn::Error);
        }
        let Some(SgnItem::Sgn { sgn: inner, .. }) = sgn.item(name, Namespace::Sgn) else {
            return Err(ElabError::unbound(span, name, Namespace::Sgn));
        };
        let inner = inner.clone();
        Ok(inner.rebase(&mut self.pool, &[module.clone()]))
    }

    /// `sgn where con M.t = c`. An abstract item becomes manifest; a
    /// manifest one must agree with `c`.
    fn where_con(
        &mut self,
        sgn: Sgn,
        path: &[Name],
        con: &RawCon,
        span: Span,
    ) -> Result<Sgn, ElabError> {
        let Some((&item, nested)) = path.split_last() else {
            return Err(ElabError::unbound(span, Name::EMPTY, Namespace::Con));
        };
        let mut target = &sgn;
        for &step in nested {
            target = match target.item(step, Namespace::Module) {
                Some(SgnItem::Str { sgn, .. }) => sgn,
                _ => return Err(ElabError::unbound(span, step, Namespace::Module)),
            };
        }
        if target.is_error() {
            return Ok(sgn);
        }
        let (kind, existing) = match target.item(item, Namespace::Con) {
            Some(SgnItem::Con { kind, def, .. } | SgnItem::Class { kind, def, .. }) => {
                (*kind, *def)
            }
            _ => return Err(ElabError::unbound(span, item, Namespace::Con)),
        };
        self.begin_group();
        let c = self.check_con(con, kind)?;
        let c = self.close_con(c, span)?;
        if let Some(existing) = existing {
            self.unify(existing, c, span)?;
            return Ok(sgn);
        }
        Ok(with_manifest(&sgn, nested, item, c))
    }

    // ========================================
    // Signature matching
    // ========================================

    /// Check that the structure `actual` has every item of `expected`.
    pub(crate) fn match_sgn(
        &mut self,
        actual: &ModRef,
        expected: &Sgn,
        span: Span,
    ) -> Result<(), ElabError> {
        self.match_sgn_inner(actual, expected, span)?;
        let residue = self.force()?;
        if let Some((obligation, blockers)) = residue.into_iter().next() {
            return Err(residual_error(&mut self.pool, obligation, &blockers));
        }
        Ok(())
    }

    fn match_sgn_inner(
        &mut self,
        actual: &ModRef,
        expected: &Sgn,
        span: Span,
    ) -> Result<(), ElabError> {
        let actual = self.globals.canonical(actual);
        let Some(found) = self.globals.module_sgn(&mut self.pool, &actual) else {
            return Err(ElabError::new(
                span,
                ElabErrorKind::NotAStructure {
                    path: actual.path.clone(),
                },
            ));
        };
        if found.is_error() || expected.is_error() {
            return Ok(());
        }
        match (expected, &found) {
            (Sgn::Const(_), Sgn::Const(_)) => {
                let Sgn::Const(items) = expected.instantiate(&mut self.pool, &actual) else {
                    return Ok(());
                };
                for item in &items {
                    self.match_item(&actual, item, span)?;
                }
                Ok(())
            }
            (
                Sgn::Functor {
                    param,
                    param_sgn,
                    result,
                },
                Sgn::Functor {
                    param_sgn: found_param,
                    ..
                },
            ) => self.match_functor(&actual, *param, param_sgn, result, found_param, span),
            _ => {
                let label = self.module_label(&actual);
                Err(signature_mismatch(
                    span,
                    label,
                    Namespace::Module,
                    ItemMismatch::Shape,
                ))
            }
        }
    }

    fn match_item(&mut self, actual: &ModRef, item: &SgnItem, span: Span) -> Result<(), ElabError> {
        let mismatch = |m| signature_mismatch(span, item.name(), item.namespace(), m);
        match item {
            SgnItem::Con { name, kind, def } | SgnItem::Class { name, kind, def } => {
                let expects_class = matches!(item, SgnItem::Class { .. });
                let (found_kind, is_class) =
                    match self
                        .globals
                        .module_item(&mut self.pool, actual, *name, Namespace::Con)
                    {
                        Some(ModItem::Con { kind, .. }) => (kind, false),
                        Some(ModItem::Class { kind, .. }) => (kind, true),
                        _ => return Err(mismatch(ItemMismatch::Missing)),
                    };
                // A constructor may implement an abstract class item.
                if (is_class && !expects_class) || (expects_class && !is_class && def.is_some()) {
                    return Err(mismatch(ItemMismatch::Namespace {
                        expected: Namespace::Con,
                    }));
                }
                if self.pool.kinds_mut().unify(*kind, found_kind).is_err() {
                    return Err(mismatch(ItemMismatch::Kind {
                        expected: *kind,
                        found: found_kind,
                    }));
                }
                if let Some(def) = def {
                    let found = self.pool.mod_proj(actual.module, actual.path.clone(), *name);
                    if self.unify(*def, found, span).is_err() {
                        return Err(mismatch(ItemMismatch::Definition {
                            expected: *def,
                            found,
                        }));
                    }
                }
                Ok(())
            }
            SgnItem::Val { name, ty } => {
                let Some(ModItem::Val { ty: found }) =
                    self.globals
                        .module_item(&mut self.pool, actual, *name, Namespace::Val)
                else {
                    return Err(mismatch(ItemMismatch::Missing));
                };
                match self.unify(*ty, found, span) {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        let reason = match err.kind {
                            ElabErrorKind::TypeMismatch { reason, .. } => reason,
                            _ => MismatchReason::Structural,
                        };
                        Err(mismatch(ItemMismatch::Type {
                            expected: *ty,
                            found,
                            reason,
                        }))
                    }
                }
            }
            SgnItem::Str { name, sgn } => {
                let child = actual.child(*name);
                if self.globals.module_sgn(&mut self.pool, &child).is_none() {
                    return Err(mismatch(ItemMismatch::Missing));
                }
                self.match_sgn_inner(&child, sgn, span).map_err(|err| match err.kind {
                    ElabErrorKind::SignatureMismatch {
                        item, mismatch: inner, ..
                    } => mismatch(ItemMismatch::Nested {
                        item,
                        inner: Box::new(inner),
                    }),
                    _ => err,
                })
            }
            SgnItem::Sgn { .. } => Ok(()),
        }
    }

    /// Functors match contravariantly in the parameter: a placeholder for
    /// the expected parameter must satisfy the actual one, and the actual
    /// functor applied to it must satisfy the expected result.
    fn match_functor(
        &mut self,
        actual: &ModRef,
        param: Name,
        expected_param: &Sgn,
        expected_result: &Sgn,
        found_param: &Sgn,
        span: Span,
    ) -> Result<(), ElabError> {
        let fid = self.alias_of(actual);
        let outer = [ModRef::root(fid)];
        let expected_param = expected_param.rebase(&mut self.pool, &outer);
        let found_param = found_param.rebase(&mut self.pool, &outer);
        let pid = self.globals.add_module(ModEntry {
            name: param,
            qualified: Vec::new(),
            sgn: expected_param,
            origin: ModOrigin::Param,
            members: FxHashMap::default(),
        });
        let placeholder = ModRef::root(pid);
        self.match_sgn_inner(&placeholder, &found_param, span)?;
        let name = self.globals.module(fid).name;
        let Some(applied) = self.globals.apply_functor(&mut self.pool, fid, pid, name) else {
            return Err(signature_mismatch(
                span,
                name,
                Namespace::Module,
                ItemMismatch::Shape,
            ));
        };
        let refs = [placeholder, ModRef::root(fid)];
        let pool = &mut self.pool;
        let expected_result =
            expected_result.map_cons(0, &mut |c, depth| pool.subst_modules(c, depth + 1, &refs));
        self.match_sgn_inner(&ModRef::root(applied), &expected_result, span)
    }

    fn module_label(&self, module: &ModRef) -> Name {
        module
            .path
            .last()
            .copied()
            .unwrap_or_else(|| self.globals.module(module.module).name)
    }

    // ========================================
    // Open
    // ========================================

    pub(crate) fn elab_open(&mut self, path: &[Name], span: Span) -> Result<Decl, ElabError> {
        let module = self.module_path(path, span)?;
        if let Some(Sgn::Const(items)) = self.globals.module_sgn(&mut self.pool, &module) {
            for item in &items {
                self.env
                    .bind(item.name(), item.namespace(), Binding::Opened(module.clone()));
            }
        }
        Ok(Decl::Open { module })
    }
}

fn signature_mismatch(
    span: Span,
    item: Name,
    namespace: Namespace,
    mismatch: ItemMismatch,
) -> ElabError {
    ElabError::new(
        span,
        ElabErrorKind::SignatureMismatch {
            item,
            namespace,
            mismatch,
        },
    )
}

/// `sgn` with the constructor item `item` under `nested` made manifest.
fn with_manifest(sgn: &Sgn, nested: &[Name], item: Name, def: Idx) -> Sgn {
    let Sgn::Const(items) = sgn else {
        return sgn.clone();
    };
    let target = nested.first().copied();
    let position = items.iter().rposition(|it| match target {
        Some(first) => it.name() == first && it.namespace() == Namespace::Module,
        None => it.name() == item && it.namespace() == Namespace::Con,
    });
    let mut items = items.clone();
    if let Some(i) = position {
        items[i] = match &items[i] {
            SgnItem::Str { name, sgn } => SgnItem::Str {
                name: *name,
                sgn: with_manifest(sgn, &nested[1..], item, def),
            },
            SgnItem::Con { name, kind, .. } => SgnItem::Con {
                name: *name,
                kind: *kind,
                def: Some(def),
            },
            SgnItem::Class { name, kind, .. } => SgnItem::Class {
                name: *name,
                kind: *kind,
                def: Some(def),
            },
            other => other.clone(),
        };
    }
    Sgn::Const(items)
}

#[cfg(test)]
mod tests;
