//! End-to-end tests: raw trees built with `urd_ir::ast::build`, run through
//! the whole elaborator.

use urd_elab::{elaborate, init_tracing, ElabConfig, ElabOutput};
use urd_ir::{
    ast::{build::Builder, RawDecl, RawExpr},
    StringInterner,
};
use urd_types::ErrorCode;

fn run(interner: &StringInterner, decls: Vec<RawDecl>) -> ElabOutput {
    init_tracing();
    let b = Builder::new(interner);
    elaborate(&b.file(decls), interner, &ElabConfig::default())
}

fn codes(output: &ElabOutput) -> Vec<ErrorCode> {
    output.errors.iter().map(|e| e.code()).collect()
}

fn type_of(output: &mut ElabOutput, interner: &StringInterner, name: &str) -> String {
    let ty = output
        .val_type(&[interner.intern(name)])
        .unwrap_or_else(|| panic!("no value `{name}`"));
    output.format_con(ty, interner)
}

fn assert_clean(output: &mut ElabOutput, interner: &StringInterner) {
    let rendered = output.render_errors(interner);
    assert!(rendered.is_empty(), "unexpected errors: {rendered:#?}");
}

// =============================================================================
// Record concatenation
// =============================================================================

mod concat {
    use super::*;
    use pretty_assertions::assert_eq;

    /// `fun concat [r1 ::: {Type}] [r2 ::: {Type}] [r1 ~ r2] (a : $r1) (b : $r2)
    ///  : $(r1 ++ r2) = a ++ b`
    fn annotated(b: &Builder<'_>) -> RawDecl {
        b.d_fun(vec![b.fun(
            "concat",
            vec![
                b.param_con("r1", true, Some(b.k_row())),
                b.param_con("r2", true, Some(b.k_row())),
                b.param_disjoint(b.c_var("r1"), b.c_var("r2")),
                b.param_val("a", Some(b.c_record(b.c_var("r1")))),
                b.param_val("b", Some(b.c_record(b.c_var("r2")))),
            ],
            Some(b.c_record(b.c_concat(b.c_var("r1"), b.c_var("r2")))),
            b.e_concat(b.e_var("a"), b.e_var("b")),
        )])
    }

    /// `fun concat (a) (b) = a ++ b`
    fn inferred(b: &Builder<'_>) -> RawDecl {
        b.d_fun(vec![b.fun(
            "concat",
            vec![b.param_val("a", None), b.param_val("b", None)],
            None,
            b.e_concat(b.e_var("a"), b.e_var("b")),
        )])
    }

    const SIGNATURE: &str =
        "r1 ::: {Type} -> r2 ::: {Type} -> [r1 ~ r2] => $r1 -> $r2 -> $(r1 ++ r2)";

    #[test]
    fn annotated_signature_checks() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let mut output = run(&interner, vec![annotated(&b)]);
        assert_clean(&mut output, &interner);
        assert_eq!(type_of(&mut output, &interner, "concat"), SIGNATURE);
    }

    #[test]
    fn inferred_signature_has_disjointness_precondition() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let mut output = run(&interner, vec![inferred(&b)]);
        assert_clean(&mut output, &interner);
        assert_eq!(type_of(&mut output, &interner, "concat"), SIGNATURE);
    }

    #[test]
    fn projection_reads_the_side_that_has_the_field() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let both = || {
            b.e_apps(
                b.e_var("concat"),
                vec![
                    b.e_record(vec![("A", b.e_int(1))]),
                    b.e_record(vec![("B", b.e_bool(true))]),
                ],
            )
        };
        let decls = vec![
            annotated(&b),
            b.d_val("a", None, b.e_field(both(), "A")),
            b.d_val("b", None, b.e_field(both(), "B")),
        ];
        let mut output = run(&interner, decls);
        assert_clean(&mut output, &interner);
        assert_eq!(type_of(&mut output, &interner, "a"), "int");
        assert_eq!(type_of(&mut output, &interner, "b"), "bool");
    }

    #[test]
    fn shared_field_is_a_compile_time_overlap() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let decls = vec![
            inferred(&b),
            b.d_val(
                "bad",
                None,
                b.e_apps(
                    b.e_var("concat"),
                    vec![
                        b.e_record(vec![("A", b.e_int(1))]),
                        b.e_record(vec![("A", b.e_int(2))]),
                    ],
                ),
            ),
        ];
        let mut output = run(&interner, decls);
        assert_eq!(
            output.render_errors(&interner),
            vec!["error[E2004]: rows `[A = int]` and `[A = int]` both contain field `#A`"]
        );
    }

    #[test]
    fn missing_precondition_is_reported() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let glue = b.fun(
            "glue",
            vec![
                b.param_con("r1", false, Some(b.k_row())),
                b.param_con("r2", false, Some(b.k_row())),
                b.param_val("a", Some(b.c_record(b.c_var("r1")))),
                b.param_val("b", Some(b.c_record(b.c_var("r2")))),
            ],
            None,
            b.e_concat(b.e_var("a"), b.e_var("b")),
        );
        let output = run(&interner, vec![b.d_fun(vec![glue])]);
        assert_eq!(codes(&output), vec![ErrorCode::E2005]);
    }
}

// =============================================================================
// Poison and names
// =============================================================================

mod recovery {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn failed_declaration_does_not_cascade() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let decls = vec![
            b.d_val("x", Some(b.c_var("int")), b.e_bool(true)),
            b.d_val("y", Some(b.c_var("string")), b.e_var("x")),
            b.d_val("z", Some(b.c_var("bool")), b.e_app(b.e_var("x"), b.e_int(1))),
            b.d_val("ok", None, b.e_int(3)),
        ];
        let mut output = run(&interner, decls);
        assert_eq!(codes(&output), vec![ErrorCode::E2001]);
        assert_eq!(type_of(&mut output, &interner, "ok"), "int");
    }

    #[test]
    fn unbound_names_are_reported_by_namespace() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let decls = vec![
            b.d_val("v", None, b.e_var("nope")),
            b.d_val("w", Some(b.c_var("missing")), b.e_int(1)),
            b.d_val("m", None, b.e_path(&["Nowhere"], "x")),
        ];
        let mut output = run(&interner, decls);
        assert_eq!(
            output.render_errors(&interner),
            vec![
                "error[E2003]: unbound value `nope`",
                "error[E2003]: unbound constructor `missing`",
                "error[E2003]: unbound structure `Nowhere`",
            ]
        );
    }

    #[test]
    fn kind_errors_are_reported() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let decls = vec![b.d_con(
            "bad",
            Some(b.k_type()),
            b.c_app(b.c_var("int"), b.c_var("bool")),
        )];
        let output = run(&interner, decls);
        assert_eq!(codes(&output), vec![ErrorCode::E2002]);
    }
}

// =============================================================================
// Local definitions
// =============================================================================

mod locals {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn let_and_if_check_against_the_annotation() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let body = b.e_let(
            vec![b.local_val("g", None, b.e_lam("x", None, b.e_var("x")))],
            b.e_if(b.e_bool(true), b.e_app(b.e_var("g"), b.e_int(1)), b.e_int(2)),
        );
        let decls = vec![b.d_val("n", Some(b.c_var("int")), body)];
        let mut output = run(&interner, decls);
        assert_clean(&mut output, &interner);
    }

    #[test]
    fn if_branches_must_agree() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let decls = vec![b.d_val(
            "n",
            None,
            b.e_if(b.e_bool(true), b.e_int(1), b.e_string("one")),
        )];
        let output = run(&interner, decls);
        assert_eq!(codes(&output), vec![ErrorCode::E2001]);
    }
}

// =============================================================================
// Modules
// =============================================================================

mod modules {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ascription_names_the_mismatched_value() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let decls = vec![b.d_str(
            "M",
            Some(b.s_const(vec![b.si_val("x", b.c_var("bool"))])),
            b.st_const(vec![b.d_val("x", None, b.e_int(1))]),
        )];
        let mut output = run(&interner, decls);
        assert_eq!(
            output.render_errors(&interner),
            vec!["error[E2009]: signature mismatch at value `x`: expected `bool`, found `int`"]
        );
    }

    /// `functor (X : sig con t end) : sig con out end = struct con out = X.t end`
    fn wrapper(b: &Builder<'_>) -> RawDecl {
        b.d_str(
            "Wrap",
            None,
            b.st_functor(
                "X",
                b.s_const(vec![b.si_con("t", None, None)]),
                Some(b.s_const(vec![b.si_con("out", None, None)])),
                b.st_const(vec![b.d_con("out", None, b.c_path(&["X"], "t"))]),
            ),
        )
    }

    fn holder(b: &Builder<'_>, name: &str, ty: &str) -> RawDecl {
        b.d_str(
            name,
            None,
            b.st_const(vec![b.d_con("t", None, b.c_var(ty))]),
        )
    }

    /// `fun cast (x : <from>.out) : <to>.out = x`
    fn cast(b: &Builder<'_>, from: &str, to: &str) -> RawDecl {
        b.d_fun(vec![b.fun(
            "cast",
            vec![b.param_val("x", Some(b.c_path(&[from], "out")))],
            Some(b.c_path(&[to], "out")),
            b.e_var("x"),
        )])
    }

    fn program(b: &Builder<'_>) -> Vec<RawDecl> {
        vec![
            wrapper(b),
            holder(b, "I", "int"),
            holder(b, "J", "int"),
            b.d_str("WI", None, b.st_app(&["Wrap"], b.st_path(&["I"]))),
            b.d_str("WI2", None, b.st_app(&["Wrap"], b.st_path(&["I"]))),
            b.d_str("WJ", None, b.st_app(&["Wrap"], b.st_path(&["J"]))),
        ]
    }

    #[test]
    fn distinct_arguments_give_distinct_abstract_types() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let mut decls = program(&b);
        decls.push(cast(&b, "WI", "WJ"));
        let output = run(&interner, decls);
        assert_eq!(codes(&output), vec![ErrorCode::E2001]);
    }

    #[test]
    fn same_argument_gives_the_same_abstract_type() {
        let interner = StringInterner::new();
        let b = Builder::new(&interner);
        let mut decls = program(&b);
        decls.push(cast(&b, "WI", "WI2"));
        let mut output = run(&interner, decls);
        assert_clean(&mut output, &interner);
    }
}

// =============================================================================
// Properties
// =============================================================================

mod properties {
    use super::*;
    use proptest::collection::btree_set;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn label() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["A", "B", "C", "D", "E", "F"]).prop_map(str::to_owned)
    }

    fn record(b: &Builder<'_>, labels: &BTreeSet<String>) -> RawExpr {
        b.e_record(
            labels
                .iter()
                .zip(0..)
                .map(|(l, n)| (l.as_str(), b.e_int(n)))
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn literal_concat_fails_exactly_when_labels_overlap(
            left in btree_set(label(), 0..4),
            right in btree_set(label(), 0..4),
        ) {
            let interner = StringInterner::new();
            let b = Builder::new(&interner);
            let decls = vec![b.d_val(
                "joined",
                None,
                b.e_concat(record(&b, &left), record(&b, &right)),
            )];
            let output = run(&interner, decls);
            let expected = if left.is_disjoint(&right) {
                vec![]
            } else {
                vec![ErrorCode::E2004]
            };
            prop_assert_eq!(codes(&output), expected);
        }
    }
}
