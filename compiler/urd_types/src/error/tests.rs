use super::*;
use crate::disjoint::DisjointError;
use crate::global::{Def, DefEntry};
use pretty_assertions::assert_eq;

#[test]
fn codes_follow_the_error_kind() {
    let span = Span::DUMMY;
    let cases = [
        (
            ElabError::from_unify(
                span,
                UnifyError::Mismatch {
                    expected: Idx::INT,
                    found: Idx::BOOL,
                    reason: MismatchReason::Structural,
                },
            ),
            ErrorCode::E2001,
        ),
        (
            ElabError::from_unify(
                span,
                UnifyError::Kind(KindError::Mismatch {
                    expected: KindIdx::TYPE,
                    found: KindIdx::NAME,
                }),
            ),
            ErrorCode::E2002,
        ),
        (
            ElabError::unbound(span, Name::EMPTY, Namespace::Val),
            ErrorCode::E2003,
        ),
        (
            ElabError::ambiguous_type(span, MetaId::from_raw(0)),
            ErrorCode::E2006,
        ),
        (
            ElabError::from_class(span, ClassError::DepthExceeded { goal: Idx::INT }),
            ErrorCode::E2007,
        ),
        (
            ElabError::from_class(
                span,
                ClassError::Ambiguous {
                    goal: Idx::INT,
                    candidates: vec![],
                },
            ),
            ErrorCode::E2008,
        ),
        (
            ElabError::from_class(span, ClassError::NotAClass { goal: Idx::INT }),
            ErrorCode::E2012,
        ),
    ];
    for (err, code) in cases {
        assert_eq!(err.code(), code, "{err:?}");
    }
}

#[test]
fn depth_exceeded_reads_as_missing_instance() {
    let err = ElabError::from_class(Span::DUMMY, ClassError::DepthExceeded { goal: Idx::BOOL });
    assert_eq!(err.kind, ElabErrorKind::NoInstance { goal: Idx::BOOL });
}

#[test]
fn renders_type_mismatch() {
    let interner = StringInterner::new();
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let fun = pool.fun(Idx::INT, Idx::BOOL);
    let err = ElabError::from_unify(
        Span::DUMMY,
        UnifyError::Mismatch {
            expected: fun,
            found: Idx::STRING,
            reason: MismatchReason::Structural,
        },
    );
    assert_eq!(
        err.render(&mut pool, &globals, &interner),
        "error[E2001]: type mismatch: expected `int -> bool`, found `string` (constructors differ)"
    );
    assert_eq!(err.to_string(), "[E2001] constructors differ");
}

#[test]
fn renders_field_overlap() {
    let interner = StringInterner::new();
    let a = interner.intern("A");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let left = pool.row_of(KindIdx::TYPE, &[(a, Idx::INT)]);
    let right = pool.row_of(KindIdx::TYPE, &[(a, Idx::BOOL)]);
    let field = pool.field_name(a);
    let err = ElabError::from_disjoint(Span::DUMMY, DisjointError::Overlap { field, left, right });
    assert_eq!(err.code(), ErrorCode::E2004);
    assert_eq!(
        err.render(&mut pool, &globals, &interner),
        "error[E2004]: rows `[A = int]` and `[A = bool]` both contain field `#A`"
    );
}

#[test]
fn renders_unbound_name_and_kind_mismatch() {
    let interner = StringInterner::new();
    let x = interner.intern("x");
    let mut pool = Pool::new();
    let globals = GlobalTable::new();

    let unbound = ElabError::unbound(Span::DUMMY, x, Namespace::Val);
    assert_eq!(
        unbound.render(&mut pool, &globals, &interner),
        "error[E2003]: unbound value `x`"
    );

    let arrow = pool.kinds_mut().arrow(KindIdx::TYPE, KindIdx::TYPE);
    let kind = ElabError::from_kind(
        Span::DUMMY,
        KindError::Mismatch {
            expected: KindIdx::TYPE,
            found: arrow,
        },
        Some(Idx::INT),
    );
    assert_eq!(
        kind.render(&mut pool, &globals, &interner),
        "error[E2002]: kind mismatch in `int`: expected kind `Type`, found `Type -> Type`"
    );
}

#[test]
fn renders_nested_signature_mismatch() {
    let interner = StringInterner::new();
    let (m, inner, t) = (
        interner.intern("M"),
        interner.intern("Inner"),
        interner.intern("t"),
    );
    let mut pool = Pool::new();
    let mut globals = GlobalTable::new();
    let def = globals.add_def(DefEntry {
        name: t,
        qualified: vec![m, t],
        def: Def::Con {
            kind: KindIdx::TYPE,
            def: Idx::INT,
        },
        span: Span::DUMMY,
    });
    let named = pool.named(def);
    let err = ElabError::new(
        Span::DUMMY,
        ElabErrorKind::SignatureMismatch {
            item: inner,
            namespace: Namespace::Module,
            mismatch: ItemMismatch::Nested {
                item: t,
                inner: Box::new(ItemMismatch::Definition {
                    expected: Idx::BOOL,
                    found: named,
                }),
            },
        },
    );
    assert_eq!(
        err.render(&mut pool, &globals, &interner),
        "error[E2009]: signature mismatch at structure `Inner`: \
         in `t`, defined as `M.t`, expected `bool`"
    );
}

#[test]
fn renders_module_paths() {
    let interner = StringInterner::new();
    let path = vec![interner.intern("A"), interner.intern("B")];
    let mut pool = Pool::new();
    let globals = GlobalTable::new();
    let err = ElabError::new(Span::DUMMY, ElabErrorKind::NotAFunctor { path });
    assert_eq!(err.code(), ErrorCode::E2011);
    assert_eq!(
        err.render(&mut pool, &globals, &interner),
        "error[E2011]: `A.B` is not a functor"
    );
}
