use super::*;
use crate::KindIdx;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use urd_ir::{Name, Span, StringInterner};

fn lit(pool: &mut Pool, names: &[Name]) -> Idx {
    let fields: Vec<_> = names.iter().map(|&n| (n, Idx::INT)).collect();
    pool.row_of(KindIdx::TYPE, &fields)
}

#[test]
fn distinct_literal_fields_are_disjoint() {
    let interner = StringInterner::new();
    let (a, b) = (interner.intern("A"), interner.intern("B"));
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let left = lit(&mut pool, &[a]);
    let right = lit(&mut pool, &[b]);
    assert_eq!(
        check_disjoint(&mut pool, &globals, left, right, &[]),
        Ok(Disjointness::Definite)
    );
}

#[test]
fn shared_field_overlaps() {
    let interner = StringInterner::new();
    let a = interner.intern("A");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let left = lit(&mut pool, &[a]);
    let right = pool.row_of(KindIdx::TYPE, &[(a, Idx::BOOL)]);
    let field = pool.field_name(a);
    assert_eq!(
        check_disjoint(&mut pool, &globals, left, right, &[]),
        Err(DisjointError::Overlap { field, left, right })
    );
}

#[test]
fn overlap_wins_over_unknowns() {
    let interner = StringInterner::new();
    let a = interner.intern("A");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let m = pool.fresh_meta(KindIdx::ROW_TYPE, Span::DUMMY, 0);
    let la = lit(&mut pool, &[a]);
    let left = pool.concat(la, m);
    let right = lit(&mut pool, &[a]);
    assert!(check_disjoint(&mut pool, &globals, left, right, &[]).is_err());
}

#[test]
fn rigid_rows_need_a_fact() {
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let r0 = pool.rel(0);
    let r1 = pool.rel(1);

    assert_eq!(
        check_disjoint(&mut pool, &globals, r0, r1, &[]),
        Ok(Disjointness::Deferred {
            blockers: SmallVec::new()
        })
    );

    let fact = Fact {
        left: r1,
        right: r0,
    };
    assert_eq!(
        check_disjoint(&mut pool, &globals, r0, r1, &[fact]),
        Ok(Disjointness::Definite)
    );
}

#[test]
fn facts_cover_concatenated_pieces() {
    let interner = StringInterner::new();
    let a = interner.intern("A");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let r0 = pool.rel(0);
    let r1 = pool.rel(1);
    let la = lit(&mut pool, &[a]);
    let fact = Fact {
        left: la,
        right: r0,
    };
    let fact2 = Fact {
        left: r1,
        right: r0,
    };
    // `[A] ++ _1` against `_0`: both pieces are covered.
    let left = pool.concat(la, r1);
    assert_eq!(
        check_disjoint(&mut pool, &globals, left, r0, &[fact, fact2]),
        Ok(Disjointness::Definite)
    );
    assert!(matches!(
        check_disjoint(&mut pool, &globals, left, r0, &[fact]),
        Ok(Disjointness::Deferred { .. })
    ));
}

#[test]
fn metavariables_block() {
    let interner = StringInterner::new();
    let a = interner.intern("A");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let m = pool.fresh_meta(KindIdx::ROW_TYPE, Span::DUMMY, 0);
    let var = pool.unresolved_head(m).unwrap_or_else(|| panic!("fresh meta"));
    let left = lit(&mut pool, &[a]);

    let Ok(Disjointness::Deferred { blockers }) =
        check_disjoint(&mut pool, &globals, left, m, &[])
    else {
        panic!("expected a deferred check");
    };
    assert_eq!(blockers.as_slice(), &[var]);
}

#[test]
fn poison_is_disjoint_from_anything() {
    let interner = StringInterner::new();
    let a = interner.intern("A");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let left = lit(&mut pool, &[a]);
    assert_eq!(
        check_disjoint(&mut pool, &globals, left, Idx::ERROR, &[]),
        Ok(Disjointness::Definite)
    );
}

#[test]
fn maps_share_fields_with_their_base() {
    let interner = StringInterner::new();
    let x = interner.intern("x");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let r0 = pool.rel(0);
    let r1 = pool.rel(1);
    let body = pool.fun(r0, Idx::INT);
    let func = pool.abs(x, KindIdx::TYPE, body);
    let mapped = pool.map(KindIdx::TYPE, KindIdx::TYPE, func, r1);
    let fact = Fact {
        left: r1,
        right: r0,
    };
    assert_eq!(
        check_disjoint(&mut pool, &globals, mapped, r0, &[fact]),
        Ok(Disjointness::Definite)
    );
}

proptest! {
    #[test]
    fn literal_rows_disjoint_iff_names_disjoint(
        left in proptest::collection::btree_set(0usize..8, 0..5),
        right in proptest::collection::btree_set(0usize..8, 0..5),
    ) {
        let interner = StringInterner::new();
        let names: Vec<Name> = (0..8).map(|i| interner.intern(&format!("F{i}"))).collect();
        let mut pool = Pool::new();
        let globals = GlobalTable::new();
        let l: Vec<Name> = left.iter().map(|&i| names[i]).collect();
        let r: Vec<Name> = right.iter().map(|&i| names[i]).collect();
        let lrow = lit(&mut pool, &l);
        let rrow = lit(&mut pool, &r);

        let result = check_disjoint(&mut pool, &globals, lrow, rrow, &[]);
        if left.is_disjoint(&right) {
            prop_assert_eq!(result, Ok(Disjointness::Definite));
        } else {
            prop_assert!(result.is_err());
        }
    }
}
