#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use super::*;
use pretty_assertions::assert_eq;
use urd_ir::{Span, StringInterner};

#[test]
fn lift_skips_bound_variables() {
    let interner = StringInterner::new();
    let a = interner.intern("a");
    let mut pool = Pool::new();
    let r0 = pool.rel(0);
    let r1 = pool.rel(1);
    let body = pool.fun(r0, r1);
    let poly = pool.poly(a, false, KindIdx::TYPE, body);

    let lifted = pool.lift(poly, 2);
    let r3 = pool.rel(3);
    let expected_body = pool.fun(r0, r3);
    let expected = pool.poly(a, false, KindIdx::TYPE, expected_body);
    assert_eq!(lifted, expected);
}

#[test]
fn subst_replaces_innermost() {
    let mut pool = Pool::new();
    let r0 = pool.rel(0);
    let r1 = pool.rel(1);
    let body = pool.fun(r0, r1);

    let result = pool.subst(body, Idx::INT);
    let expected = pool.fun(Idx::INT, r0);
    assert_eq!(result, expected);
}

#[test]
fn subst_lifts_argument_under_binders() {
    let interner = StringInterner::new();
    let b = interner.intern("b");
    let mut pool = Pool::new();
    let r0 = pool.rel(0);
    let r1 = pool.rel(1);
    // `b :: Type -> _1 -> _0`, substituting `_5` for the outer variable.
    let inner = pool.fun(r1, r0);
    let body = pool.poly(b, false, KindIdx::TYPE, inner);
    let r5 = pool.rel(5);

    let result = pool.subst(body, r5);
    let r6 = pool.rel(6);
    let expected_inner = pool.fun(r6, r0);
    let expected = pool.poly(b, false, KindIdx::TYPE, expected_inner);
    assert_eq!(result, expected);
}

#[test]
fn zonk_replaces_solved_metas_deeply() {
    let mut pool = Pool::new();
    let m = pool.fresh_meta(KindIdx::TYPE, Span::DUMMY, 0);
    let var = pool.unresolved_head(m).unwrap();
    let list = pool.tuple(vec![m, Idx::INT]);
    let f = pool.fun(list, m);
    pool.resolve_var(var, Idx::BOOL).unwrap();

    let zonked = pool.zonk(f);
    let expected_list = pool.tuple(vec![Idx::BOOL, Idx::INT]);
    let expected = pool.fun(expected_list, Idx::BOOL);
    assert_eq!(zonked, expected);
    assert!(!pool.flags(zonked).contains(ConFlags::HAS_META));
}

#[test]
fn strengthen_fails_on_removed_binder() {
    let mut pool = Pool::new();
    let r0 = pool.rel(0);
    let r2 = pool.rel(2);
    let f = pool.fun(r2, Idx::INT);
    let g = pool.fun(r0, Idx::INT);

    let r1 = pool.rel(1);
    let expected = pool.fun(r1, Idx::INT);
    assert_eq!(pool.strengthen(f, 1), Some(expected));
    assert_eq!(pool.strengthen(g, 1), None);
    assert_eq!(pool.strengthen(Idx::INT, 3), Some(Idx::INT));
}

#[test]
fn unresolved_metas_in_order() {
    let mut pool = Pool::new();
    let a = pool.fresh_meta(KindIdx::TYPE, Span::DUMMY, 0);
    let b = pool.fresh_meta(KindIdx::TYPE, Span::DUMMY, 0);
    let va = pool.unresolved_head(a).unwrap();
    let vb = pool.unresolved_head(b).unwrap();
    let f = pool.fun(b, a);
    let g = pool.fun(f, b);
    assert_eq!(pool.unresolved_metas(g), vec![vb, va]);

    pool.resolve_var(vb, Idx::INT).unwrap();
    assert_eq!(pool.unresolved_metas(g), vec![va]);
}

#[test]
fn abstract_skolems_numbers_outermost_first() {
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let s1 = pool.fresh_skolem(interner.intern("t1"), KindIdx::TYPE);
    let s2 = pool.fresh_skolem(interner.intern("t2"), KindIdx::TYPE);
    let f = pool.fun(s1, s2);
    let ids = pool.skolems_of(f);
    assert_eq!(ids.len(), 2);

    let abstracted = pool.abstract_skolems(f, &ids, 0);
    // Two binders wrapped around: the first skolem is the outer one.
    let r1 = pool.rel(1);
    let r0 = pool.rel(0);
    let expected = pool.fun(r1, r0);
    assert_eq!(abstracted, expected);

    let shifted = pool.abstract_skolems(f, &ids, 1);
    let r2 = pool.rel(2);
    let expected = pool.fun(r2, r1);
    assert_eq!(shifted, expected);
}

#[test]
fn subst_modules_anchors_range() {
    let interner = StringInterner::new();
    let t = interner.intern("t");
    let n = interner.intern("N");
    let mut pool = Pool::new();
    let below = pool.mod_rel(0, vec![], t);
    let hit = pool.mod_rel(1, vec![n], t);
    let above = pool.mod_rel(3, vec![], t);
    let target = ModRef::root(ModId::from_raw(7));

    let refs = [target];
    assert_eq!(pool.subst_modules(below, 1, &refs), below);
    let expected = pool.mod_proj(ModId::from_raw(7), vec![n], t);
    assert_eq!(pool.subst_modules(hit, 1, &refs), expected);
    let lowered = pool.mod_rel(2, vec![], t);
    assert_eq!(pool.subst_modules(above, 1, &refs), lowered);
}

#[test]
fn abstract_modules_turns_projections_relative() {
    let interner = StringInterner::new();
    let t = interner.intern("t");
    let body = interner.intern("Body");
    let mut pool = Pool::new();
    let module = ModId::from_raw(3);
    let def = DefId::from_raw(4);

    let mut map = Abstraction::default();
    map.modules.insert(
        module,
        Anchor {
            up: 1,
            path: vec![],
        },
    );
    map.defs.insert(
        def,
        (
            Anchor {
                up: 0,
                path: vec![body],
            },
            t,
        ),
    );
    let proj = pool.mod_proj(module, vec![], t);
    let named = pool.named(def);
    let f = pool.fun(proj, named);

    let abstracted = pool.abstract_modules(f, 0, &map);
    let param = pool.mod_rel(1, vec![], t);
    let own = pool.mod_rel(0, vec![body], t);
    let expected = pool.fun(param, own);
    assert_eq!(abstracted, expected);

    let untouched = pool.named(DefId::from_raw(9));
    assert_eq!(pool.abstract_modules(untouched, 0, &map), untouched);
}
