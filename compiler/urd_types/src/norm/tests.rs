use super::*;
use crate::global::DefEntry;
use crate::KindIdx;
use pretty_assertions::assert_eq;
use urd_ir::{Span, StringInterner};

#[test]
fn beta_reduces_applications() {
    let interner = StringInterner::new();
    let a = interner.intern("a");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let r0 = pool.rel(0);
    let body = pool.fun(r0, r0);
    let abs = pool.abs(a, KindIdx::TYPE, body);
    let app = pool.app(abs, Idx::INT);

    let expected = pool.fun(Idx::INT, Idx::INT);
    assert_eq!(hnorm(&mut pool, &globals, app), expected);
}

#[test]
fn unfolds_constructor_definitions() {
    let interner = StringInterner::new();
    let pair = interner.intern("pair");
    let mut pool = Pool::new();
    let mut globals = GlobalTable::new();
    let tuple = pool.tuple(vec![Idx::INT, Idx::BOOL]);
    let id = globals.add_def(DefEntry {
        name: pair,
        qualified: vec![pair],
        def: Def::Con {
            kind: KindIdx::TYPE,
            def: tuple,
        },
        span: Span::DUMMY,
    });
    let named = pool.named(id);
    assert_eq!(hnorm(&mut pool, &globals, named), tuple);
}

#[test]
fn abstract_classes_stay_put() {
    let interner = StringInterner::new();
    let show = interner.intern("show");
    let mut pool = Pool::new();
    let mut globals = GlobalTable::new();
    let kind = pool.kinds_mut().arrow(KindIdx::TYPE, KindIdx::TYPE);
    let id = globals.add_def(DefEntry {
        name: show,
        qualified: vec![show],
        def: Def::Class { kind, def: None },
        span: Span::DUMMY,
    });
    let named = pool.named(id);
    let goal = pool.app(named, Idx::INT);
    assert_eq!(hnorm(&mut pool, &globals, goal), goal);
}

#[test]
fn concatenates_literal_rows() {
    let interner = StringInterner::new();
    let (a, b) = (interner.intern("A"), interner.intern("B"));
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let left = pool.row_of(KindIdx::TYPE, &[(a, Idx::INT)]);
    let right = pool.row_of(KindIdx::TYPE, &[(b, Idx::BOOL)]);
    let cat = pool.concat(left, right);

    let expected = pool.row_of(KindIdx::TYPE, &[(a, Idx::INT), (b, Idx::BOOL)]);
    assert_eq!(hnorm(&mut pool, &globals, cat), expected);

    let empty = pool.empty_row(KindIdx::TYPE);
    let r0 = pool.rel(0);
    let with_empty = pool.concat(empty, r0);
    assert_eq!(hnorm(&mut pool, &globals, with_empty), r0);
}

#[test]
fn projects_fields_through_concatenation() {
    let interner = StringInterner::new();
    let (a, b) = (interner.intern("A"), interner.intern("B"));
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let left = pool.row_of(KindIdx::TYPE, &[(a, Idx::INT)]);
    let r0 = pool.rel(0);
    let right = pool.row_of(KindIdx::TYPE, &[(b, Idx::BOOL)]);
    let inner = pool.concat(r0, right);
    let row = pool.concat(left, inner);

    // `A` is found before the rigid variable is reached.
    let field_a = pool.field_name(a);
    let proj = pool.proj(row, field_a);
    assert_eq!(hnorm(&mut pool, &globals, proj), Idx::INT);

    let field_b = pool.field_name(b);
    let proj = pool.proj(row, field_b);
    assert_eq!(hnorm(&mut pool, &globals, proj), Idx::BOOL);
}

#[test]
fn maps_over_literal_rows() {
    let interner = StringInterner::new();
    let (a, x) = (interner.intern("A"), interner.intern("x"));
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let r0 = pool.rel(0);
    let body = pool.fun(r0, Idx::STRING);
    let func = pool.abs(x, KindIdx::TYPE, body);
    let row = pool.row_of(KindIdx::TYPE, &[(a, Idx::INT)]);
    let mapped = pool.map(KindIdx::TYPE, KindIdx::TYPE, func, row);

    let normal = normalize(&mut pool, &globals, mapped);
    let to_string = pool.fun(Idx::INT, Idx::STRING);
    let expected = pool.row_of(KindIdx::TYPE, &[(a, to_string)]);
    assert_eq!(normal, expected);
}

#[test]
fn identity_map_disappears() {
    let interner = StringInterner::new();
    let x = interner.intern("x");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let r0 = pool.rel(0);
    let id = pool.abs(x, KindIdx::TYPE, r0);
    let row = pool.rel(3);
    let mapped = pool.map(KindIdx::TYPE, KindIdx::TYPE, id, row);
    assert_eq!(hnorm(&mut pool, &globals, mapped), row);
}

#[test]
fn tuple_projection_out_of_range_is_poison() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let tuple = pool.tuple(vec![Idx::INT, Idx::BOOL]);
    let second = pool.tuple_proj(tuple, 1);
    assert_eq!(hnorm(&mut pool, &globals, second), Idx::BOOL);
    let missing = pool.tuple_proj(tuple, 5);
    assert_eq!(hnorm(&mut pool, &globals, missing), Idx::ERROR);
}

#[test]
fn blocked_on_metavariable_stays() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let kind = pool.kinds_mut().arrow(KindIdx::TYPE, KindIdx::TYPE);
    let m = pool.fresh_meta(kind, Span::DUMMY, 0);
    let app = pool.app(m, Idx::INT);
    assert_eq!(hnorm(&mut pool, &globals, app), app);
}
