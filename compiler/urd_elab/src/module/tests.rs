use pretty_assertions::assert_eq;
use urd_ir::{
    ast::{build::Builder, RawDecl, RawSgn},
    StringInterner,
};
use urd_types::{Dict, ErrorCode};

use super::*;
use crate::{elaborate, tree::Expr, ElabConfig, ElabOutput};

fn run(interner: &StringInterner, decls: Vec<RawDecl>) -> ElabOutput {
    let b = Builder::new(interner);
    elaborate(&b.file(decls), interner, &ElabConfig::default())
}

fn codes(output: &ElabOutput) -> Vec<ErrorCode> {
    output.errors.iter().map(|e| e.code()).collect()
}

fn val_type(output: &mut ElabOutput, interner: &StringInterner, path: &[&str]) -> String {
    let qualified: Vec<Name> = path.iter().map(|p| interner.intern(p)).collect();
    let ty = output
        .val_type(&qualified)
        .unwrap_or_else(|| panic!("no value `{}`", path.join(".")));
    output.format_con(ty, interner)
}

/// `sig con t; val zero : t end`
fn ord_sgn(b: &Builder<'_>) -> RawSgn {
    b.s_const(vec![
        b.si_con("t", None, None),
        b.si_val("zero", b.c_var("t")),
    ])
}

/// `structure <name> = struct con t = <ty>; val zero = <zero> end`
fn ord_struct(b: &Builder<'_>, name: &str, ty: &str, zero: urd_ir::ast::RawExpr) -> RawDecl {
    b.d_str(
        name,
        None,
        b.st_const(vec![
            b.d_con("t", None, b.c_var(ty)),
            b.d_val("zero", None, zero),
        ]),
    )
}

#[test]
fn transparent_structure_exposes_definitions() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        ord_struct(&b, "A", "int", b.e_int(0)),
        b.d_val("n", Some(b.c_path(&["A"], "t")), b.e_int(3)),
        b.d_val("m", Some(b.c_var("int")), b.e_path(&["A"], "zero")),
    ];
    let mut output = run(&interner, decls);
    assert!(!output.has_errors(), "{:?}", output.render_errors(&interner));
    assert_eq!(val_type(&mut output, &interner, &["A", "zero"]), "int");
}

#[test]
fn sealing_hides_definitions() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        b.d_str(
            "M",
            Some(ord_sgn(&b)),
            b.st_const(vec![
                b.d_con("t", None, b.c_var("int")),
                b.d_val("zero", None, b.e_int(0)),
            ]),
        ),
        b.d_val("ok", Some(b.c_path(&["M"], "t")), b.e_path(&["M"], "zero")),
        b.d_val("leak", Some(b.c_var("int")), b.e_path(&["M"], "zero")),
    ];
    let mut output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2001]);
    assert_eq!(val_type(&mut output, &interner, &["ok"]), "M.t");
}

#[test]
fn mismatched_structure_is_poisoned_once() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        b.d_str(
            "M",
            Some(b.s_const(vec![b.si_val("x", b.c_var("bool"))])),
            b.st_const(vec![b.d_val("x", None, b.e_int(1))]),
        ),
        b.d_val("y", Some(b.c_var("int")), b.e_path(&["M"], "x")),
        b.d_val("z", Some(b.c_var("string")), b.e_path(&["M"], "x")),
    ];
    let output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2009]);
    let ElabErrorKind::SignatureMismatch {
        namespace,
        mismatch,
        ..
    } = &output.errors[0].kind
    else {
        panic!("expected a signature mismatch, got {:?}", output.errors[0]);
    };
    assert_eq!(*namespace, Namespace::Val);
    assert!(matches!(mismatch, ItemMismatch::Type { .. }));
}

#[test]
fn missing_item_is_reported() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![b.d_str(
        "M",
        Some(ord_sgn(&b)),
        b.st_const(vec![b.d_con("t", None, b.c_var("int"))]),
    )];
    let output = run(&interner, decls);
    assert_eq!(
        output.errors.iter().map(|e| &e.kind).collect::<Vec<_>>(),
        vec![&ElabErrorKind::SignatureMismatch {
            item: interner.intern("zero"),
            namespace: Namespace::Val,
            mismatch: ItemMismatch::Missing,
        }]
    );
}

#[test]
fn named_signature_with_where_is_manifest() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        b.d_sgn("ORD", ord_sgn(&b)),
        b.d_str(
            "W",
            Some(b.s_where(b.s_path(&[], "ORD"), &["t"], b.c_var("int"))),
            b.st_const(vec![
                b.d_con("t", None, b.c_var("int")),
                b.d_val("zero", None, b.e_int(0)),
            ]),
        ),
        b.d_val("n", Some(b.c_var("int")), b.e_path(&["W"], "zero")),
    ];
    let output = run(&interner, decls);
    assert!(output.errors.is_empty(), "{:?}", codes(&output));
}

#[test]
fn where_must_agree_with_the_structure() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        b.d_sgn("ORD", ord_sgn(&b)),
        b.d_str(
            "W",
            Some(b.s_where(b.s_path(&[], "ORD"), &["t"], b.c_var("bool"))),
            b.st_const(vec![
                b.d_con("t", None, b.c_var("int")),
                b.d_val("zero", None, b.e_int(0)),
            ]),
        ),
    ];
    let output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2009]);
}

/// `structure Box = functor (X : ORD) : sig con u; val wrap : X.t -> u end
///  = struct con u = X.t; val wrap = fn x => x end`
fn boxer(b: &Builder<'_>) -> RawDecl {
    let result = b.s_const(vec![
        b.si_con("u", None, None),
        b.si_val("wrap", b.c_fun(b.c_path(&["X"], "t"), b.c_var("u"))),
    ]);
    let body = b.st_const(vec![
        b.d_con("u", None, b.c_path(&["X"], "t")),
        b.d_val("wrap", None, b.e_lam("x", Some(b.c_path(&["X"], "t")), b.e_var("x"))),
    ]);
    b.d_str("Box", None, b.st_functor("X", ord_sgn(b), Some(result), body))
}

fn functor_program(b: &Builder<'_>) -> Vec<RawDecl> {
    vec![
        boxer(b),
        ord_struct(b, "A", "int", b.e_int(0)),
        ord_struct(b, "B", "bool", b.e_bool(false)),
        b.d_str("BA1", None, b.st_app(&["Box"], b.st_path(&["A"]))),
        b.d_str("BA2", None, b.st_app(&["Box"], b.st_path(&["A"]))),
        b.d_str("BB", None, b.st_app(&["Box"], b.st_path(&["B"]))),
    ]
}

#[test]
fn applying_a_functor_twice_gives_the_same_types() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let mut decls = functor_program(&b);
    decls.push(b.d_val(
        "boxed",
        Some(b.c_path(&["BA2"], "u")),
        b.e_app(b.e_path(&["BA1"], "wrap"), b.e_int(1)),
    ));
    let output = run(&interner, decls);
    assert!(output.errors.is_empty(), "{:?}", codes(&output));
}

#[test]
fn different_arguments_give_different_types() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let mut decls = functor_program(&b);
    decls.push(b.d_val(
        "boxed",
        Some(b.c_path(&["BB"], "u")),
        b.e_app(b.e_path(&["BA1"], "wrap"), b.e_int(1)),
    ));
    decls.push(b.d_val(
        "wrong",
        None,
        b.e_app(b.e_path(&["BB"], "wrap"), b.e_int(1)),
    ));
    let output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2001, ErrorCode::E2001]);
}

#[test]
fn functor_argument_must_match_the_parameter() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        boxer(&b),
        b.d_str(
            "C",
            None,
            b.st_const(vec![b.d_con("t", None, b.c_var("int"))]),
        ),
        b.d_str("BC", None, b.st_app(&["Box"], b.st_path(&["C"]))),
    ];
    let output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2009]);
}

#[test]
fn structures_and_functors_are_not_interchangeable() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        boxer(&b),
        ord_struct(&b, "A", "int", b.e_int(0)),
        b.d_str("Bad", None, b.st_app(&["A"], b.st_path(&["A"]))),
        b.d_val("v", None, b.e_path(&["Box"], "wrap")),
    ];
    let output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2011, ErrorCode::E2010]);
}

#[test]
fn open_brings_items_into_scope() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        ord_struct(&b, "A", "int", b.e_int(0)),
        b.d_open(&["A"]),
        b.d_val("n", Some(b.c_var("t")), b.e_var("zero")),
    ];
    let mut output = run(&interner, decls);
    assert!(!output.has_errors(), "{:?}", output.render_errors(&interner));
    assert_eq!(val_type(&mut output, &interner, &["n"]), "A.t");
}

#[test]
fn nested_structures_are_reached_by_path() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        b.d_str(
            "Outer",
            None,
            b.st_const(vec![ord_struct(&b, "Inner", "bool", b.e_bool(true))]),
        ),
        b.d_val("flag", Some(b.c_var("bool")), b.e_path(&["Outer", "Inner"], "zero")),
        b.d_val("missing", None, b.e_path(&["Outer", "Nope"], "zero")),
    ];
    let output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2003]);
}

/// A sealed structure with an abstract class `show`, its `int` instance,
/// optionally an overlapping catch-all instance, and the method.
fn show_struct(b: &Builder<'_>, overlapping: bool) -> RawDecl {
    let show_of = |a| b.c_app(b.c_var("show"), a);
    let method_ty = || {
        b.c_poly_implicit(
            "a",
            Some(b.k_type()),
            b.c_fun(
                show_of(b.c_var("a")),
                b.c_fun(b.c_var("a"), b.c_var("string")),
            ),
        )
    };
    let any_ty = || b.c_poly_implicit("a", Some(b.k_type()), show_of(b.c_var("a")));

    let mut items = vec![
        b.si_class("show", Some(b.k_arrow(b.k_type(), b.k_type())), None),
        b.si_val("showInt", show_of(b.c_var("int"))),
        b.si_val("show", method_ty()),
    ];
    let mut body = vec![
        b.d_class(
            "show",
            None,
            Some(b.c_abs(
                "a",
                Some(b.k_type()),
                b.c_fun(b.c_var("a"), b.c_var("string")),
            )),
        ),
        b.d_val(
            "showInt",
            Some(show_of(b.c_var("int"))),
            b.e_lam("x", None, b.e_string("int")),
        ),
        b.d_val(
            "show",
            Some(method_ty()),
            b.e_lam("d", None, b.e_var("d")),
        ),
    ];
    if overlapping {
        items.push(b.si_val("showAny", any_ty()));
        body.push(b.d_val(
            "showAny",
            Some(any_ty()),
            b.e_lam("x", None, b.e_string("any")),
        ));
    }
    b.d_str("S", Some(b.s_const(items)), b.st_const(body))
}

#[test]
fn sealed_instances_are_found() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        show_struct(&b, false),
        b.d_val("msg", None, b.e_app(b.e_path(&["S"], "show"), b.e_int(1))),
    ];
    let mut output = run(&interner, decls);
    assert!(!output.has_errors(), "{:?}", output.render_errors(&interner));
    assert_eq!(val_type(&mut output, &interner, &["msg"]), "string");
    assert_eq!(output.globals.instances().len(), 1);
}

#[test]
fn class_argument_is_passed_as_a_dictionary() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        show_struct(&b, false),
        b.d_val("msg", None, b.e_app(b.e_path(&["S"], "show"), b.e_int(1))),
    ];
    let output = run(&interner, decls);
    assert!(output.errors.is_empty(), "{:?}", output.errors);

    let Some(Decl::Val { body, .. }) = output.decls.last() else {
        panic!("expected `msg` last, got {:?}", output.decls);
    };
    // `S.show [int] <showInt> 1`
    let Expr::App(with_dict, _) = body else {
        panic!("expected an application, got {body:?}");
    };
    assert!(
        matches!(
            &**with_dict,
            Expr::App(_, dict) if matches!(&**dict, Expr::Dict(Dict::Instance { .. }))
        ),
        "{with_dict:?}"
    );
}

#[test]
fn missing_instance_is_reported() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        show_struct(&b, false),
        b.d_val("msg", None, b.e_app(b.e_path(&["S"], "show"), b.e_bool(true))),
    ];
    let output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2007]);
}

#[test]
fn overlapping_instances_are_ambiguous() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let decls = vec![
        show_struct(&b, true),
        b.d_val("msg", None, b.e_app(b.e_path(&["S"], "show"), b.e_int(1))),
    ];
    let output = run(&interner, decls);
    assert_eq!(codes(&output), vec![ErrorCode::E2008]);
}

#[test]
fn unsolved_class_goals_become_parameters() {
    let interner = StringInterner::new();
    let b = Builder::new(&interner);
    let describe = b.fun(
        "describe",
        vec![b.param_val("x", None)],
        None,
        b.e_app(b.e_path(&["S"], "show"), b.e_var("x")),
    );
    let decls = vec![
        show_struct(&b, false),
        b.d_fun(vec![describe]),
        b.d_val("msg", None, b.e_app(b.e_var("describe"), b.e_int(7))),
    ];
    let mut output = run(&interner, decls);
    assert!(!output.has_errors(), "{:?}", output.render_errors(&interner));
    assert_eq!(
        val_type(&mut output, &interner, &["describe"]),
        "t1 ::: Type -> S.show t1 -> t1 -> string"
    );
    assert_eq!(val_type(&mut output, &interner, &["msg"]), "string");
}
