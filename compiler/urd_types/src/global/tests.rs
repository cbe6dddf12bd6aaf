use super::*;
use crate::GlobalNames;
use pretty_assertions::assert_eq;
use urd_ir::{Span, StringInterner};

fn module(globals: &mut GlobalTable, name: Name, qualified: Vec<Name>, sgn: Sgn) -> ModId {
    globals.add_module(ModEntry {
        name,
        qualified,
        sgn,
        origin: ModOrigin::Struct,
        members: FxHashMap::default(),
    })
}

#[test]
fn module_items_are_read_at_the_module() {
    let interner = StringInterner::new();
    let (m, t, x) = (
        interner.intern("M"),
        interner.intern("t"),
        interner.intern("x"),
    );
    let mut pool = Pool::new();
    let mut globals = GlobalTable::new();
    let own_t = pool.mod_rel(0, vec![], t);
    let id = module(
        &mut globals,
        m,
        vec![m],
        Sgn::Const(vec![
            SgnItem::Con {
                name: t,
                kind: KindIdx::TYPE,
                def: None,
            },
            SgnItem::Val { name: x, ty: own_t },
        ]),
    );

    let at = ModRef::root(id);
    let proj = pool.mod_proj(id, vec![], t);
    assert_eq!(
        globals.module_item(&mut pool, &at, x, Namespace::Val),
        Some(ModItem::Val { ty: proj })
    );
    assert_eq!(
        globals.module_item(&mut pool, &at, t, Namespace::Con),
        Some(ModItem::Con {
            kind: KindIdx::TYPE,
            def: None
        })
    );
    assert_eq!(globals.module_item(&mut pool, &at, x, Namespace::Con), None);
}

#[test]
fn nested_signatures_are_rebased() {
    let interner = StringInterner::new();
    let (m, n, t, u, y) = (
        interner.intern("M"),
        interner.intern("N"),
        interner.intern("t"),
        interner.intern("u"),
        interner.intern("y"),
    );
    let mut pool = Pool::new();
    let mut globals = GlobalTable::new();
    // `N.y : M.t -> N.u`, written from inside `N`.
    let outer_t = pool.mod_rel(1, vec![], t);
    let own_u = pool.mod_rel(0, vec![], u);
    let ty = pool.fun(outer_t, own_u);
    let inner = Sgn::Const(vec![
        SgnItem::Con {
            name: u,
            kind: KindIdx::TYPE,
            def: None,
        },
        SgnItem::Val { name: y, ty },
    ]);
    let id = module(
        &mut globals,
        m,
        vec![m],
        Sgn::Const(vec![
            SgnItem::Con {
                name: t,
                kind: KindIdx::TYPE,
                def: None,
            },
            SgnItem::Str {
                name: n,
                sgn: inner,
            },
        ]),
    );

    let at = ModRef::root(id).child(n);
    let mt = pool.mod_proj(id, vec![], t);
    let nu = pool.mod_proj(id, vec![n], u);
    let expected = pool.fun(mt, nu);
    assert_eq!(
        globals.module_item(&mut pool, &at, y, Namespace::Val),
        Some(ModItem::Val { ty: expected })
    );
    assert_eq!(globals.module_sgn(&mut pool, &at.child(y)), None);
}

#[test]
fn canonical_follows_members() {
    let interner = StringInterner::new();
    let (m, n, x) = (
        interner.intern("M"),
        interner.intern("N"),
        interner.intern("x"),
    );
    let mut globals = GlobalTable::new();
    let inner = module(&mut globals, n, vec![m, n], Sgn::Const(vec![]));
    let outer = module(&mut globals, m, vec![m], Sgn::Const(vec![]));
    globals.module_mut(outer).members.insert(n, inner);

    let r = ModRef::root(outer).child(n).child(x);
    assert_eq!(globals.canonical(&r), ModRef::root(inner).child(x));
    assert_eq!(globals.lookup_module(&[m, n]), Some(inner));
}

#[test]
fn poisoned_module_answers_everything() {
    let interner = StringInterner::new();
    let (m, x) = (interner.intern("M"), interner.intern("x"));
    let mut pool = Pool::new();
    let mut globals = GlobalTable::new();
    let id = module(&mut globals, m, vec![m], Sgn::Error);
    let at = ModRef::root(id);
    assert_eq!(
        globals.module_item(&mut pool, &at, x, Namespace::Val),
        Some(ModItem::Val { ty: Idx::ERROR })
    );
}

#[test]
fn functor_application_is_memoised() {
    let interner = StringInterner::new();
    let (f, a, x, t, v) = (
        interner.intern("F"),
        interner.intern("A"),
        interner.intern("X"),
        interner.intern("t"),
        interner.intern("v"),
    );
    let mut pool = Pool::new();
    let mut globals = GlobalTable::new();
    let param_sgn = Sgn::Const(vec![SgnItem::Con {
        name: t,
        kind: KindIdx::TYPE,
        def: None,
    }]);
    let param_t = pool.mod_rel(1, vec![], t);
    let result = Sgn::Const(vec![SgnItem::Val {
        name: v,
        ty: param_t,
    }]);
    let functor = module(
        &mut globals,
        f,
        vec![f],
        Sgn::Functor {
            param: x,
            param_sgn: Box::new(param_sgn.clone()),
            result: Box::new(result),
        },
    );
    let arg = module(&mut globals, a, vec![a], param_sgn);

    let first = globals
        .apply_functor(&mut pool, functor, arg, Name::EMPTY)
        .unwrap_or_else(|| panic!("a functor"));
    let second = globals.apply_functor(&mut pool, functor, arg, Name::EMPTY);
    assert_eq!(second, Some(first));

    let at = pool.mod_proj(arg, vec![], t);
    assert_eq!(
        globals.module(first).sgn,
        Sgn::Const(vec![SgnItem::Val { name: v, ty: at }])
    );
    assert_eq!(globals.apply_functor(&mut pool, arg, functor, Name::EMPTY), None);

    let names = NamedGlobals {
        globals: &globals,
        interner: &interner,
    };
    assert_eq!(names.module_name(first).as_deref(), Some("F(A)"));
}

#[test]
fn instances_can_be_retracted() {
    let mut globals = GlobalTable::new();
    let def = DefId::from_raw(0);
    globals.add_instance(Instance {
        source: InstanceRef::Def(def),
        ty: Idx::INT,
    });
    let mark = globals.instance_count();
    globals.add_instance(Instance {
        source: InstanceRef::Def(def),
        ty: Idx::BOOL,
    });
    assert_eq!(globals.instance_count(), 2);
    globals.retract_instances(mark);
    assert_eq!(globals.instances().len(), 1);
    assert_eq!(globals.instances()[0].ty, Idx::INT);
}

#[test]
fn detach_exposes_owned_definitions() {
    let interner = StringInterner::new();
    let (f, t, u) = (
        interner.intern("F"),
        interner.intern("t"),
        interner.intern("u"),
    );
    let mut pool = Pool::new();
    let mut globals = GlobalTable::new();
    let owned = globals.add_def(DefEntry {
        name: t,
        qualified: vec![f, t],
        def: Def::Con {
            kind: KindIdx::TYPE,
            def: Idx::INT,
        },
        span: Span::DUMMY,
    });
    let named = pool.named(owned);
    let list = pool.tuple(vec![named, named]);
    let sgn = Sgn::Const(vec![
        SgnItem::Con {
            name: t,
            kind: KindIdx::TYPE,
            def: Some(named),
        },
        SgnItem::Con {
            name: u,
            kind: KindIdx::TYPE,
            def: Some(list),
        },
    ]);
    let map = globals.anchor_all([(owned, vec![])], Vec::<(ModId, Vec<Name>)>::new());

    let detached = globals.detach(&mut pool, &sgn, &map);
    let rel_t = pool.mod_rel(0, vec![], t);
    let rel_list = pool.tuple(vec![rel_t, rel_t]);
    assert_eq!(
        detached,
        Sgn::Const(vec![
            SgnItem::Con {
                name: t,
                kind: KindIdx::TYPE,
                def: Some(Idx::INT),
            },
            SgnItem::Con {
                name: u,
                kind: KindIdx::TYPE,
                def: Some(rel_list),
            },
        ])
    );
}

#[test]
fn later_items_shadow_earlier_ones() {
    let interner = StringInterner::new();
    let x = interner.intern("x");
    let sgn = Sgn::Const(vec![
        SgnItem::Val {
            name: x,
            ty: Idx::INT,
        },
        SgnItem::Val {
            name: x,
            ty: Idx::BOOL,
        },
    ]);
    assert_eq!(
        sgn.item(x, Namespace::Val),
        Some(&SgnItem::Val {
            name: x,
            ty: Idx::BOOL
        })
    );
}
