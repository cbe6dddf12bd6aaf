#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use crate::VarState;
use urd_ir::{Name, StringInterner};

fn meta(pool: &mut Pool, kind: KindIdx, depth: u32) -> (Idx, MetaId) {
    let m = pool.fresh_meta(kind, Span::DUMMY, depth);
    let var = pool.unresolved_head(m).unwrap();
    (m, var)
}

fn unify(pool: &mut Pool, globals: &GlobalTable, a: Idx, b: Idx) -> Result<(), UnifyError> {
    UnifyEngine::new(pool, globals, 0, Span::DUMMY).unify(a, b)
}

#[test]
fn solves_metavariable_inside_structure() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let (m, _) = meta(&mut pool, KindIdx::TYPE, 0);
    let a = pool.fun(m, Idx::INT);
    let b = pool.fun(Idx::BOOL, Idx::INT);
    unify(&mut pool, &globals, a, b).unwrap();
    assert_eq!(pool.resolve(m), Idx::BOOL);
}

#[test]
fn mismatch_reports_outer_constructors() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let a = pool.fun(Idx::INT, Idx::INT);
    let b = pool.fun(Idx::INT, Idx::STRING);
    assert_eq!(
        unify(&mut pool, &globals, a, b),
        Err(UnifyError::Mismatch {
            expected: a,
            found: b,
            reason: MismatchReason::Structural,
        })
    );
}

#[test]
fn occurs_check_fails() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let (m, _) = meta(&mut pool, KindIdx::TYPE, 0);
    let f = pool.fun(m, Idx::INT);
    assert!(matches!(
        unify(&mut pool, &globals, m, f),
        Err(UnifyError::Mismatch {
            reason: MismatchReason::Occurs,
            ..
        })
    ));
}

#[test]
fn bound_variable_cannot_escape() {
    let interner = StringInterner::new();
    let a = interner.intern("a");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    // Created outside the binder, so its context has no `a`.
    let (m, _) = meta(&mut pool, KindIdx::TYPE, 0);
    let left = pool.poly(a, false, KindIdx::TYPE, m);
    let r0 = pool.rel(0);
    let right = pool.poly(a, false, KindIdx::TYPE, r0);
    assert!(matches!(
        unify(&mut pool, &globals, left, right),
        Err(UnifyError::Mismatch {
            reason: MismatchReason::Escape,
            ..
        })
    ));
}

#[test]
fn pattern_spine_captures_bound_variable() {
    let interner = StringInterner::new();
    let a = interner.intern("a");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let (m, var) = meta(&mut pool, KindIdx::TYPE, 1);
    let left = pool.poly(a, false, KindIdx::TYPE, m);
    let r0 = pool.rel(0);
    let body = pool.fun(r0, Idx::INT);
    let right = pool.poly(a, false, KindIdx::TYPE, body);

    unify(&mut pool, &globals, left, right).unwrap();
    assert_eq!(pool.meta(var).state, VarState::Link { target: body });
    assert_eq!(pool.zonk(left), right);
}

#[test]
fn non_pattern_spine_postpones() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let m = pool.fresh_meta_with_spine(KindIdx::TYPE, Span::DUMMY, vec![Idx::INT]);
    let var = pool.unresolved_head(m).unwrap();

    let mut engine = UnifyEngine::new(&mut pool, &globals, 0, Span::DUMMY);
    engine.unify(m, Idx::BOOL).unwrap();
    let postponed = engine.take_postponed();
    assert_eq!(postponed.len(), 1);
    assert!(postponed[0].blockers.contains(&var));
    assert!(engine.take_postponed().is_empty());
}

#[test]
fn implicitness_must_agree() {
    let interner = StringInterner::new();
    let a = interner.intern("a");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let r0 = pool.rel(0);
    let explicit = pool.poly(a, false, KindIdx::TYPE, r0);
    let implicit = pool.poly(a, true, KindIdx::TYPE, r0);
    assert!(unify(&mut pool, &globals, explicit, implicit).is_err());
}

#[test]
fn tuple_widths_must_agree() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let two = pool.tuple(vec![Idx::INT, Idx::INT]);
    let three = pool.tuple(vec![Idx::INT, Idx::INT, Idx::INT]);
    assert!(matches!(
        unify(&mut pool, &globals, two, three),
        Err(UnifyError::Mismatch {
            reason: MismatchReason::Arity {
                expected: 2,
                found: 3
            },
            ..
        })
    ));
}

#[test]
fn rows_unify_regardless_of_order() {
    let interner = StringInterner::new();
    let (a, b) = (interner.intern("A"), interner.intern("B"));
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let ab = pool.record_of(&[(a, Idx::INT), (b, Idx::BOOL)]);
    let ba = pool.record_of(&[(b, Idx::BOOL), (a, Idx::INT)]);
    unify(&mut pool, &globals, ab, ba).unwrap();
}

#[test]
fn row_tail_absorbs_leftovers() {
    let interner = StringInterner::new();
    let (a, b) = (interner.intern("A"), interner.intern("B"));
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let (tail, _) = meta(&mut pool, KindIdx::ROW_TYPE, 0);
    let la = pool.row_of(KindIdx::TYPE, &[(a, Idx::INT)]);
    let open = pool.concat(la, tail);
    let left = pool.record(open);
    let right = pool.record_of(&[(a, Idx::INT), (b, Idx::BOOL)]);

    unify(&mut pool, &globals, left, right).unwrap();
    let expected = pool.row_of(KindIdx::TYPE, &[(b, Idx::BOOL)]);
    assert_eq!(pool.zonk(tail), expected);
}

#[test]
fn two_tails_share_a_fresh_rest() {
    let interner = StringInterner::new();
    let (a, b) = (interner.intern("A"), interner.intern("B"));
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let (t1, _) = meta(&mut pool, KindIdx::ROW_TYPE, 0);
    let (t2, _) = meta(&mut pool, KindIdx::ROW_TYPE, 0);
    let la = pool.row_of(KindIdx::TYPE, &[(a, Idx::INT)]);
    let lb = pool.row_of(KindIdx::TYPE, &[(b, Idx::BOOL)]);
    let left = pool.concat(la, t1);
    let right = pool.concat(lb, t2);
    let left = pool.record(left);
    let right = pool.record(right);

    unify(&mut pool, &globals, left, right).unwrap();
    let fa = pool.field_name(a);
    let fb = pool.field_name(b);
    let FieldSetView { fields, open } = view(&mut pool, &globals, t1);
    assert_eq!(fields, vec![fb]);
    assert!(open);
    let FieldSetView { fields, open } = view(&mut pool, &globals, t2);
    assert_eq!(fields, vec![fa]);
    assert!(open);
}

struct FieldSetView {
    fields: Vec<Idx>,
    open: bool,
}

fn view(pool: &mut Pool, globals: &GlobalTable, row: Idx) -> FieldSetView {
    let summary = crate::row::summarize(pool, globals, row);
    FieldSetView {
        fields: summary.fields().map(|(n, _)| n).collect(),
        open: summary.pieces.iter().any(|p| !matches!(p, crate::Piece::Field { .. })),
    }
}

#[test]
fn missing_field_is_reported() {
    let interner = StringInterner::new();
    let (a, b) = (interner.intern("A"), interner.intern("B"));
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let left = pool.record_of(&[(a, Idx::INT)]);
    let right = pool.record_of(&[(b, Idx::INT)]);
    let field = pool.field_name(a);
    assert!(matches!(
        unify(&mut pool, &globals, left, right),
        Err(UnifyError::Mismatch {
            reason: MismatchReason::MissingField { field: f },
            ..
        }) if f == field
    ));
}

#[test]
fn rigid_rows_need_same_pieces() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let r0 = pool.rel(0);
    let r1 = pool.rel(1);
    let left = pool.concat(r0, r1);
    let right = pool.concat(r1, r0);
    let lrec = pool.record(left);
    let rrec = pool.record(right);
    unify(&mut pool, &globals, lrec, rrec).unwrap();

    let only = pool.record(r0);
    assert!(unify(&mut pool, &globals, lrec, only).is_err());
}

#[test]
fn speculation_keeps_only_clean_successes() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let (m, var) = meta(&mut pool, KindIdx::TYPE, 0);
    assert_eq!(try_unify(&mut pool, &globals, 0, m, Idx::INT), TryResult::Yes);
    assert!(pool.is_resolved(var));
    assert_eq!(
        try_unify(&mut pool, &globals, 0, m, Idx::BOOL),
        TryResult::No
    );
    assert_eq!(pool.resolve(m), Idx::INT);
}

#[test]
fn speculation_reports_postponement_and_rolls_back() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let m = pool.fresh_meta_with_spine(KindIdx::TYPE, Span::DUMMY, vec![Idx::INT]);
    let var = pool.unresolved_head(m).unwrap_or_else(|| panic!("fresh meta"));
    assert_eq!(try_unify(&mut pool, &globals, 0, m, Idx::BOOL), TryResult::Maybe);
    assert!(!pool.is_resolved(var));
}

#[test]
fn poison_unifies_with_anything() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let f = pool.fun(Idx::INT, Idx::BOOL);
    unify(&mut pool, &globals, Idx::ERROR, f).unwrap();
    unify(&mut pool, &globals, f, Idx::ERROR).unwrap();
}

/// Small closed constructors over the primitives.
fn arb_con(names: Vec<Name>) -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::Prim(Idx::INT)),
        Just(Shape::Prim(Idx::BOOL)),
        Just(Shape::Prim(Idx::STRING)),
    ];
    leaf.prop_recursive(4, 24, 3, move |inner| {
        let names = names.clone();
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Shape::Fun(Box::new(a), Box::new(b))),
            proptest::collection::vec(inner.clone(), 0..3).prop_map(Shape::Tuple),
            proptest::collection::vec((0..names.len(), inner), 0..3).prop_map(move |fields| {
                let mut seen = Vec::new();
                let fields = fields
                    .into_iter()
                    .filter(|(i, _)| {
                        let fresh = !seen.contains(i);
                        seen.push(*i);
                        fresh
                    })
                    .map(|(i, s)| (names[i], s))
                    .collect();
                Shape::Record(fields)
            }),
        ]
    })
}

#[derive(Clone, Debug)]
enum Shape {
    Prim(Idx),
    Fun(Box<Shape>, Box<Shape>),
    Tuple(Vec<Shape>),
    Record(Vec<(Name, Shape)>),
}

fn build(pool: &mut Pool, shape: &Shape) -> Idx {
    match shape {
        Shape::Prim(idx) => *idx,
        Shape::Fun(a, b) => {
            let a = build(pool, a);
            let b = build(pool, b);
            pool.fun(a, b)
        }
        Shape::Tuple(elems) => {
            let elems = elems.iter().map(|s| build(pool, s)).collect();
            pool.tuple(elems)
        }
        Shape::Record(fields) => {
            let fields: Vec<_> = fields.iter().map(|(n, s)| (*n, build(pool, s))).collect();
            pool.record_of(&fields)
        }
    }
}

proptest! {
    #[test]
    fn unification_is_reflexive(shape in arb_con(
        (0..4).map(|i| Name::from_raw(100 + i)).collect()
    )) {
        let mut pool = Pool::new();
        let globals = GlobalTable::new();
        let c = build(&mut pool, &shape);
        let mut engine = UnifyEngine::new(&mut pool, &globals, 0, Span::DUMMY);
        prop_assert!(engine.unify(c, c).is_ok());
        prop_assert!(engine.take_postponed().is_empty());
    }

    #[test]
    fn occurs_check_rejects_any_wrapper(shape in arb_con(
        (0..4).map(|i| Name::from_raw(100 + i)).collect()
    )) {
        let mut pool = Pool::new();
        let globals = GlobalTable::new();
        let (m, _) = meta(&mut pool, KindIdx::TYPE, 0);
        let c = build(&mut pool, &shape);
        let wrapped = pool.fun(c, m);
        let result = unify(&mut pool, &globals, m, wrapped);
        prop_assert!(
            matches!(
                result,
                Err(UnifyError::Mismatch { reason: MismatchReason::Occurs, .. })
            ),
            "unexpected result"
        );
    }
}
