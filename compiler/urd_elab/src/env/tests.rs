use pretty_assertions::assert_eq;
use urd_ir::StringInterner;
use urd_types::{Fact, ModId};

use super::*;

#[test]
fn constructor_indices_skip_other_binders() {
    let interner = StringInterner::new();
    let (a, x, b) = (
        interner.intern("a"),
        interner.intern("x"),
        interner.intern("b"),
    );
    let mut pool = Pool::new();
    let mut env = Env::new();
    env.push_con(a, KindIdx::TYPE);
    env.push_val(x, Idx::INT, false);
    env.push_con(b, KindIdx::NAME);

    assert_eq!(env.lookup_con(&mut pool, b), Some((0, KindIdx::NAME)));
    assert_eq!(env.lookup_con(&mut pool, a), Some((1, KindIdx::TYPE)));
    assert_eq!(env.lookup_con(&mut pool, x), None);
    assert_eq!(env.lookup_val(&mut pool, x), Some((0, Idx::INT)));
    assert_eq!((env.con_depth(), env.val_depth()), (2, 1));
}

#[test]
fn inner_binders_shadow_outer_ones() {
    let interner = StringInterner::new();
    let a = interner.intern("a");
    let mut pool = Pool::new();
    let mut env = Env::new();
    env.push_con(a, KindIdx::TYPE);
    env.push_con(a, KindIdx::NAME);
    assert_eq!(env.lookup_con(&mut pool, a), Some((0, KindIdx::NAME)));
}

#[test]
fn value_types_are_lifted_past_later_binders() {
    let interner = StringInterner::new();
    let (a, x, b) = (
        interner.intern("a"),
        interner.intern("x"),
        interner.intern("b"),
    );
    let mut pool = Pool::new();
    let mut env = Env::new();
    env.push_con(a, KindIdx::TYPE);
    let a_ty = pool.rel(0);
    env.push_val(x, a_ty, false);
    env.push_con(b, KindIdx::TYPE);

    let lifted = pool.rel(1);
    assert_eq!(env.lookup_val(&mut pool, x), Some((0, lifted)));
}

#[test]
fn kind_variables_have_their_own_indices() {
    let interner = StringInterner::new();
    let (k, a, j) = (
        interner.intern("k"),
        interner.intern("a"),
        interner.intern("j"),
    );
    let mut env = Env::new();
    env.push_kind(k);
    env.push_con(a, KindIdx::TYPE);
    env.push_kind(j);
    assert_eq!(env.lookup_kind(j), Some(0));
    assert_eq!(env.lookup_kind(k), Some(1));
    assert_eq!(env.lookup_kind(a), None);
    assert_eq!(env.kind_depth(), 2);
}

#[test]
fn reset_restores_depths_and_names() {
    let interner = StringInterner::new();
    let (a, x, m) = (
        interner.intern("a"),
        interner.intern("x"),
        interner.intern("M"),
    );
    let mut pool = Pool::new();
    let mut env = Env::new();
    env.push_con(a, KindIdx::TYPE);
    let mark = env.mark();

    env.push_val(x, Idx::INT, false);
    env.push_kind(a);
    env.push_fact(Idx::EMPTY_ROW, Idx::EMPTY_ROW);
    env.bind(m, Namespace::Module, Binding::Module(ModRef::root(ModId::from_raw(0))));
    env.reset(mark);

    assert_eq!(env.mark(), mark);
    assert_eq!(
        (env.con_depth(), env.kind_depth(), env.val_depth()),
        (1, 0, 0)
    );
    assert_eq!(env.lookup_val(&mut pool, x), None);
    assert!(env.resolve(m, Namespace::Module).is_none());
    assert!(env.facts(&mut pool).is_empty());
}

#[test]
fn facts_are_read_at_the_current_depth() {
    let interner = StringInterner::new();
    let (r, s) = (interner.intern("r"), interner.intern("s"));
    let mut pool = Pool::new();
    let mut env = Env::new();
    env.push_con(r, KindIdx::TYPE);
    let r_row = pool.rel(0);
    env.push_fact(r_row, Idx::EMPTY_ROW);
    env.push_con(s, KindIdx::TYPE);

    let lifted = pool.rel(1);
    assert_eq!(
        env.facts(&mut pool).to_vec(),
        vec![Fact {
            left: lifted,
            right: Idx::EMPTY_ROW,
        }]
    );
}

#[test]
fn class_scope_lists_dictionary_variables() {
    let interner = StringInterner::new();
    let (x, d, a) = (
        interner.intern("x"),
        interner.intern("d"),
        interner.intern("a"),
    );
    let mut env = Env::new();
    env.push_val(x, Idx::INT, false);
    env.push_con(a, KindIdx::TYPE);
    env.push_val(d, Idx::BOOL, true);
    assert_eq!(
        env.class_scope(),
        ClassScope {
            locals: vec![LocalDict {
                level: 1,
                ty: Idx::BOOL,
                depth: 1,
            }],
        }
    );
}

#[test]
fn names_resolve_per_namespace() {
    let interner = StringInterner::new();
    let t = interner.intern("t");
    let mut env = Env::new();
    let first = ModRef::root(ModId::from_raw(0));
    let second = ModRef::root(ModId::from_raw(1));
    env.bind(t, Namespace::Module, Binding::Module(first));
    env.bind(t, Namespace::Con, Binding::Opened(second.clone()));

    assert!(matches!(
        env.resolve(t, Namespace::Module),
        Some(Binding::Module(m)) if m.module == ModId::from_raw(0)
    ));
    assert!(matches!(
        env.resolve(t, Namespace::Con),
        Some(Binding::Opened(m)) if *m == second
    ));
    assert!(env.resolve(t, Namespace::Val).is_none());
}
