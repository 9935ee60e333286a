use specattr_core::ast::{
    BoundVar, Expr, LocalDecl, MatchArm, QuantOp, QuantifiedExpr, ScopeSnapshot,
};
use specattr_core::{ClauseKind, DatatypeCtor, Modifiers, Program, Visibility};

use super::*;
use crate::rac::{evaluate_in, Domain, Value};

struct Harness {
    program: Program,
    class: DeclId,
    config: AttrConfig,
    groups: DataGroups,
    out: AttrOutput,
    diags: Diagnostics,
}

impl Harness {
    fn new() -> Self {
        let mut program = Program::new();
        let class = program.add_class("Account", &[], Modifiers::public()).unwrap();
        Harness {
            program,
            class,
            config: AttrConfig::default(),
            groups: DataGroups::new(),
            out: AttrOutput::default(),
            diags: Diagnostics::new(),
        }
    }

    fn attr(&mut self, expr: &ExprRef, cx: &AttrContext) -> SpecType {
        Attributor::new(
            &self.program,
            &self.config,
            &self.groups,
            &mut self.out,
            &mut self.diags,
            self.class,
        )
            .attr_expr(expr, cx, None)
            .unwrap()
    }

    /// Context of a `vis` clause of `kind` on method `m`, parameters bound.
    fn method_cx(&mut self, m: DeclId, kind: ClauseKind, vis: Visibility) -> AttrContext {
        let ret = self.program.decl(m).unwrap().as_method().unwrap().return_ty.clone();
        let params = Attributor::new(
            &self.program,
            &self.config,
            &self.groups,
            &mut self.out,
            &mut self.diags,
            self.class,
        )
            .param_bindings(m)
            .unwrap();
        AttrContext::for_class(self.class)
            .with_method(m, ret, false)
            .bind_all(params)
            .with_clause(kind, vis)
    }

    fn class_cx(&self, kind: ClauseKind, vis: Visibility) -> AttrContext {
        AttrContext::for_class(self.class).with_clause(kind, vis)
    }
}

fn bound_int(name: &str) -> BoundVar {
    BoundVar::new(name, TypeRef::int())
}

/// `\forall int i; 0 <= i && i < a.length; a[i] > 0`
fn all_positive() -> ExprRef {
    let i = || Expr::ident("i");
    Expr::quantified(
        QuantOp::Forall,
        vec![bound_int("i")],
        Some(Expr::and(
            Expr::binary(BinaryOp::Le, Expr::int(0), i()),
            Expr::binary(BinaryOp::Lt, i(), Expr::field(Expr::ident("a"), "length")),
        )),
        Expr::binary(BinaryOp::Gt, Expr::index(Expr::ident("a"), i()), Expr::int(0)),
    )
}

#[test]
fn result_is_only_legal_in_postconditions() {
    let mut h = Harness::new();
    let m = h.program.add_method(h.class, "get", SpecType::int(), Modifiers::public()).unwrap();

    let pre = h.method_cx(m, ClauseKind::Requires, Visibility::Public);
    assert_eq!(h.attr(&Expr::result(), &pre), SpecType::Error);
    assert_eq!(h.diags.count(codes::BAD_PSEUDO_IDENT), 1);

    let post = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);
    assert_eq!(h.attr(&Expr::result(), &post), SpecType::int());
    assert_eq!(h.diags.len(), 1);
}

#[test]
fn result_of_void_method_is_rejected() {
    let mut h = Harness::new();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    let post = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);
    assert_eq!(h.attr(&Expr::result(), &post), SpecType::Error);
    assert_eq!(h.diags.count(codes::BAD_PSEUDO_IDENT), 1);
}

#[test]
fn old_is_illegal_in_preconditions() {
    let mut h = Harness::new();
    h.program.add_field(h.class, "balance", SpecType::int(), Modifiers::public()).unwrap();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    let pre = h.method_cx(m, ClauseKind::Requires, Visibility::Public);
    h.attr(&Expr::old(Expr::ident("balance"), None), &pre);
    assert_eq!(h.diags.count(codes::BAD_PSEUDO_IDENT), 1);

    let post = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);
    assert_eq!(h.attr(&Expr::old(Expr::ident("balance"), None), &post), SpecType::int());
    assert_eq!(h.diags.len(), 1);
}

#[test]
fn public_field_in_private_invariant_mismatches() {
    let mut h = Harness::new();
    h.program.add_field(h.class, "balance", SpecType::int(), Modifiers::public()).unwrap();
    let positive = Expr::binary(BinaryOp::Ge, Expr::ident("balance"), Expr::int(0));

    let invariant = h.class_cx(ClauseKind::Invariant, Visibility::Private);
    h.attr(&positive, &invariant);
    assert_eq!(h.diags.count(codes::VISIBILITY_MISMATCH), 1);

    let mut h2 = Harness::new();
    let field = h2
        .program
        .add_field(h2.class, "balance", SpecType::int(), Modifiers::public())
        .unwrap();
    let m = h2.program.add_method(h2.class, "run", SpecType::Void, Modifiers::private()).unwrap();
    let ensures = h2.method_cx(m, ClauseKind::Ensures, Visibility::Private);
    let e = Expr::binary(BinaryOp::Ge, Expr::ident("balance"), Expr::int(0));
    h2.attr(&e, &ensures);
    assert!(h2.diags.is_empty(), "{:?}", h2.diags);
    let ExprKind::Binary { lhs, .. } = &e.kind else { unreachable!() };
    assert_eq!(h2.out.symbols.get(&lhs.id), Some(&field));
}

#[test]
fn final_fields_are_exempt_from_exact_match() {
    let mut h = Harness::new();
    h.program.add_field(h.class, "LIMIT", SpecType::int(), Modifiers::public().final_()).unwrap();
    let invariant = h.class_cx(ClauseKind::Invariant, Visibility::Private);
    h.attr(&Expr::binary(BinaryOp::Gt, Expr::ident("LIMIT"), Expr::int(0)), &invariant);
    assert!(h.diags.is_empty());
}

#[test]
fn private_field_in_public_postcondition_is_too_low() {
    let mut h = Harness::new();
    h.program.add_field(h.class, "secret", SpecType::int(), Modifiers::private()).unwrap();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    let post = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);
    h.attr(&Expr::binary(BinaryOp::Eq, Expr::ident("secret"), Expr::int(0)), &post);
    assert_eq!(h.diags.count(codes::VISIBILITY_TOO_LOW), 1);

    let mut spec_public = Harness::new();
    spec_public
        .program
        .add_field(spec_public.class, "secret", SpecType::int(), Modifiers::private().spec_public())
        .unwrap();
    let m = spec_public
        .program
        .add_method(spec_public.class, "run", SpecType::Void, Modifiers::public())
        .unwrap();
    let post = spec_public.method_cx(m, ClauseKind::Ensures, Visibility::Public);
    spec_public.attr(&Expr::binary(BinaryOp::Eq, Expr::ident("secret"), Expr::int(0)), &post);
    assert!(spec_public.diags.is_empty());
}

#[test]
fn impure_calls_warn_by_default() {
    let mut h = Harness::new();
    h.program.add_method(h.class, "compute", SpecType::int(), Modifiers::public()).unwrap();
    h.program.add_method(h.class, "peek", SpecType::int(), Modifiers::public().pure()).unwrap();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    let post = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);

    assert_eq!(h.attr(&Expr::call(None, "compute", vec![]), &post), SpecType::int());
    assert_eq!(h.diags.count(codes::IMPURE_CALL), 1);
    assert!(!h.diags.has_errors());

    h.attr(&Expr::call(None, "peek", vec![]), &post);
    assert_eq!(h.diags.count(codes::IMPURE_CALL), 1);
}

#[test]
fn impure_calls_are_errors_when_strict() {
    let mut h = Harness::new();
    h.config = AttrConfig::strict();
    h.program.add_method(h.class, "compute", SpecType::int(), Modifiers::public()).unwrap();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    let post = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);
    h.attr(&Expr::call(None, "compute", vec![]), &post);
    assert_eq!(h.diags.error_count(), 1);
}

#[test]
fn overloads_are_resolved_by_argument_types() {
    let mut h = Harness::new();
    let by_int = h
        .program
        .add_method(h.class, "f", SpecType::int(), Modifiers::public().pure())
        .unwrap();
    h.program.add_param(by_int, "x", SpecType::int(), Modifiers::default()).unwrap();
    let by_bool = h
        .program
        .add_method(h.class, "f", SpecType::Boolean, Modifiers::public().pure())
        .unwrap();
    h.program.add_param(by_bool, "b", SpecType::Boolean, Modifiers::default()).unwrap();
    let cx = h.class_cx(ClauseKind::Invariant, Visibility::Public);

    let call = Expr::call(None, "f", vec![Expr::bool(true)]);
    assert_eq!(h.attr(&call, &cx), SpecType::Boolean);
    assert_eq!(h.out.symbols.get(&call.id), Some(&by_bool));

    h.attr(&Expr::call(None, "f", vec![Expr::int(1), Expr::int(2)]), &cx);
    assert_eq!(h.diags.count(codes::UNRESOLVED), 1);
}

#[test]
fn labeled_old_reads_the_label_snapshot() {
    let mut h = Harness::new();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    h.program.add_param(m, "x", SpecType::int(), Modifiers::default()).unwrap();
    h.program
        .add_label(m, "L", ScopeSnapshot::default().with("tmp", SpecType::long()))
        .unwrap();

    let assert_cx = h.method_cx(m, ClauseKind::Assert, Visibility::Package);
    let at_label = Expr::old(
        Expr::binary(BinaryOp::Add, Expr::ident("tmp"), Expr::ident("x")),
        Some("L"),
    );
    assert_eq!(h.attr(&at_label, &assert_cx), SpecType::long());
    assert!(h.diags.is_empty());

    h.attr(&Expr::old(Expr::ident("tmp"), Some("M")), &assert_cx);
    assert_eq!(h.diags.count(codes::UNKNOWN_LABEL), 1);

    let post = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);
    h.attr(&Expr::old(Expr::ident("x"), Some("L")), &post);
    assert_eq!(h.diags.count(codes::BAD_PSEUDO_IDENT), 1);
}

#[test]
fn this_is_unavailable_in_static_contexts() {
    let mut h = Harness::new();
    let cx = h.class_cx(ClauseKind::Invariant, Visibility::Public).with_static(true);
    assert_eq!(h.attr(&Expr::this(), &cx), SpecType::Error);
    assert_eq!(h.diags.count(codes::BAD_PSEUDO_IDENT), 1);
}

#[test]
fn quantifiers_are_typed_by_operator() {
    let mut h = Harness::new();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    h.program.add_param(m, "a", SpecType::array_of(SpecType::int()), Modifiers::default()).unwrap();
    let cx = h.method_cx(m, ClauseKind::Requires, Visibility::Public);

    assert_eq!(h.attr(&all_positive(), &cx), SpecType::Boolean);

    let count = Expr::quantified(
        QuantOp::NumOf,
        vec![bound_int("i")],
        None,
        Expr::binary(BinaryOp::Gt, Expr::index(Expr::ident("a"), Expr::ident("i")), Expr::int(0)),
    );
    assert_eq!(h.attr(&count, &cx), SpecType::BigInt);

    let sum = Expr::quantified(
        QuantOp::Sum,
        vec![bound_int("i")],
        None,
        Expr::index(Expr::ident("a"), Expr::ident("i")),
    );
    assert_eq!(h.attr(&sum, &cx), SpecType::int());
    assert!(h.diags.is_empty());

    let bad_sum = Expr::quantified(QuantOp::Sum, vec![bound_int("i")], None, Expr::bool(true));
    assert_eq!(h.attr(&bad_sum, &cx), SpecType::Error);
    assert_eq!(h.diags.count(codes::BAD_OPERAND), 1);
}

#[test]
fn bound_variables_reject_host_modifiers() {
    let mut h = Harness::new();
    let cx = h.class_cx(ClauseKind::Invariant, Visibility::Public);
    let mut var = bound_int("i");
    var.modifiers = vec!["static".to_string()];
    let mut ok_var = bound_int("j");
    ok_var.modifiers = vec!["nullable".to_string()];
    let q = Expr::quantified(
        QuantOp::Exists,
        vec![var, ok_var],
        None,
        Expr::binary(BinaryOp::Eq, Expr::ident("i"), Expr::ident("j")),
    );
    h.attr(&q, &cx);
    assert_eq!(h.diags.count(codes::BAD_QUANT_MODIFIER), 1);
}

#[test]
fn triggers_are_ignored_outside_forall_and_exists() {
    let mut h = Harness::new();
    let cx = h.class_cx(ClauseKind::Invariant, Visibility::Public);
    let q = |op| {
        Expr::new(
            ExprKind::Quantified(QuantifiedExpr {
                op,
                decls: vec![bound_int("i")],
                range: Some(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(3))),
                value: Expr::binary(BinaryOp::Ge, Expr::ident("i"), Expr::int(0)),
                triggers: Some(vec![Expr::ident("i")]),
            }),
            Span::DUMMY,
        )
    };
    h.attr(&q(QuantOp::Forall), &cx);
    assert!(h.diags.is_empty());
    h.attr(&q(QuantOp::NumOf), &cx);
    assert_eq!(h.diags.count(codes::IGNORED_TRIGGERS), 1);
    assert!(!h.diags.has_errors());
}

#[test]
fn match_checks_constructors_and_coverage() {
    let mut h = Harness::new();
    let shape = h
        .program
        .add_datatype(
            "Shape",
            vec![
                DatatypeCtor {
                    name: "Dot".into(),
                    fields: vec![],
                },
                DatatypeCtor {
                    name: "Rect".into(),
                    fields: vec![SpecType::int(), SpecType::int()],
                },
            ],
        )
        .unwrap();
    let shape_ty = h.program.class_type(shape).unwrap();
    let m = h.program.add_method(h.class, "area", SpecType::int(), Modifiers::public()).unwrap();
    h.program.add_param(m, "s", shape_ty, Modifiers::default()).unwrap();
    let cx = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);

    let arm = |ctor: &str, bindings: &[&str], body: ExprRef| MatchArm {
        constructor: Some(ctor.to_string()),
        bindings: bindings.iter().map(|b| b.to_string()).collect(),
        body,
        span: Span::DUMMY,
    };
    let full = Expr::new(
        ExprKind::Match {
            scrutinee: Expr::ident("s"),
            arms: vec![
                arm("Dot", &[], Expr::int(0)),
                arm(
                    "Rect",
                    &["w", "h"],
                    Expr::binary(BinaryOp::Mul, Expr::ident("w"), Expr::ident("h")),
                ),
            ],
        },
        Span::DUMMY,
    );
    assert_eq!(h.attr(&full, &cx), SpecType::int());
    assert!(h.diags.is_empty());

    let partial = Expr::new(
        ExprKind::Match {
            scrutinee: Expr::ident("s"),
            arms: vec![arm("Dot", &[], Expr::int(0))],
        },
        Span::DUMMY,
    );
    assert_eq!(h.attr(&partial, &cx), SpecType::int());
    assert_eq!(h.diags.count(codes::NON_EXHAUSTIVE_MATCH), 1);

    let wrong_arity = Expr::new(
        ExprKind::Match {
            scrutinee: Expr::ident("s"),
            arms: vec![arm("Rect", &["w"], Expr::int(0))],
        },
        Span::DUMMY,
    );
    assert_eq!(h.attr(&wrong_arity, &cx), SpecType::Error);
    assert_eq!(h.diags.count(codes::BAD_MATCH), 1);
}

#[test]
fn runtime_form_evaluates_like_the_quantifier() {
    let mut h = Harness::new();
    h.config = AttrConfig::runtime_checking();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    h.program.add_param(m, "a", SpecType::array_of(SpecType::int()), Modifiers::default()).unwrap();
    let cx = h.method_cx(m, ClauseKind::Requires, Visibility::Public);

    let q = all_positive();
    assert_eq!(h.attr(&q, &cx), SpecType::Boolean);
    assert!(h.diags.is_empty(), "{:?}", h.diags);
    let form = h.out.rac_form(q.id).expect("runtime form");
    assert_eq!(form.loops.len(), 1);
    assert_eq!(form.loops[0].source_name, "i");
    assert_eq!(form.captures.len(), 2);

    let run = |values: &[i64]| {
        let vars = HashMap::from([("a".to_string(), Value::int_array(values))]);
        evaluate_in(form, &vars)
    };
    assert_eq!(run(&[1, 2, 0, 4]), Ok(Value::Bool(false)));
    assert_eq!(run(&[1, 2, 3]), Ok(Value::Bool(true)));
}

/// `lo <= name && name < hi`
fn between(lo: ExprRef, name: &str, hi: ExprRef) -> ExprRef {
    Expr::and(
        Expr::binary(BinaryOp::Le, lo, Expr::ident(name)),
        Expr::binary(BinaryOp::Lt, Expr::ident(name), hi),
    )
}

fn a_length() -> ExprRef {
    Expr::field(Expr::ident("a"), "length")
}

/// Harness with runtime forms on and a method `run(int[] a, boolean p, set<int> s)`.
fn rac_harness() -> (Harness, AttrContext) {
    let mut h = Harness::new();
    h.config = AttrConfig::runtime_checking();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    h.program.add_param(m, "a", SpecType::array_of(SpecType::int()), Modifiers::default()).unwrap();
    h.program.add_param(m, "p", SpecType::Boolean, Modifiers::default()).unwrap();
    h.program.add_param(m, "s", SpecType::set_of(SpecType::int()), Modifiers::default()).unwrap();
    let cx = h.method_cx(m, ClauseKind::Requires, Visibility::Public);
    (h, cx)
}

#[test]
fn two_variable_loops_nest_in_declaration_order() {
    let (mut h, cx) = rac_harness();
    let guard = || {
        Expr::and(
            between(Expr::int(0), "i", a_length()),
            Expr::and(
                Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::ident("j")),
                Expr::binary(BinaryOp::Lt, Expr::ident("j"), a_length()),
            ),
        )
    };
    // \forall int i, j; 0 <= i && i < a.length && i < j && j < a.length; a[i] < a[j]
    let sorted = Expr::quantified(
        QuantOp::Forall,
        vec![bound_int("i"), bound_int("j")],
        Some(guard()),
        Expr::binary(
            BinaryOp::Lt,
            Expr::index(Expr::ident("a"), Expr::ident("i")),
            Expr::index(Expr::ident("a"), Expr::ident("j")),
        ),
    );
    assert_eq!(h.attr(&sorted, &cx), SpecType::Boolean);
    assert!(h.diags.is_empty(), "{:?}", h.diags);
    let form = h.out.rac_form(sorted.id).expect("runtime form");
    let names: Vec<&str> = form.loops.iter().map(|l| l.source_name.as_str()).collect();
    assert_eq!(names, ["i", "j"]);
    match &form.loops[1].domain {
        Domain::Interval { lo, lo_inclusive, .. } => {
            assert_eq!(lo.as_ident(), Some(form.loops[0].var.as_str()));
            assert!(!lo_inclusive);
        }
        other => panic!("expected an interval, found {other}"),
    }

    let run = |form: &RacForm, values: &[i64]| {
        let vars = HashMap::from([("a".to_string(), Value::int_array(values))]);
        evaluate_in(form, &vars)
    };
    assert_eq!(run(form, &[1, 2, 3]), Ok(Value::Bool(true)));
    assert_eq!(run(form, &[1, 3, 2]), Ok(Value::Bool(false)));
    assert_eq!(run(form, &[]), Ok(Value::Bool(true)));

    let pairs = Expr::quantified(
        QuantOp::NumOf,
        vec![bound_int("i"), bound_int("j")],
        Some(guard()),
        Expr::bool(true),
    );
    h.attr(&pairs, &cx);
    let count = h.out.rac_form(pairs.id).expect("runtime form");
    assert_eq!(run(count, &[5, 5, 5]), Ok(Value::int(3)));
    assert_eq!(run(count, &[5, 5, 5, 5]), Ok(Value::int(6)));
}

#[test]
fn outer_variable_needs_a_bound_of_its_own() {
    let (mut h, cx) = rac_harness();
    // \forall int i, j; 0 <= i && i < j && j < 3; true
    let q = Expr::quantified(
        QuantOp::Forall,
        vec![bound_int("i"), bound_int("j")],
        Some(Expr::and(
            Expr::binary(BinaryOp::Le, Expr::int(0), Expr::ident("i")),
            Expr::and(
                Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::ident("j")),
                Expr::binary(BinaryOp::Lt, Expr::ident("j"), Expr::int(3)),
            ),
        )),
        Expr::bool(true),
    );
    assert_eq!(h.attr(&q, &cx), SpecType::Boolean);
    assert!(h.out.rac_form(q.id).is_none());
    assert!(h.diags.is_empty());
}

#[test]
fn boolean_quantifier_runs_over_both_values() {
    let (mut h, cx) = rac_harness();
    // \forall boolean b; b || p
    let q = Expr::quantified(
        QuantOp::Forall,
        vec![BoundVar::new("b", TypeRef::boolean())],
        None,
        Expr::or(Expr::ident("b"), Expr::ident("p")),
    );
    assert_eq!(h.attr(&q, &cx), SpecType::Boolean);
    let form = h.out.rac_form(q.id).expect("runtime form");
    assert!(matches!(form.loops[0].domain, Domain::Booleans));
    let run = |p: bool| evaluate_in(form, &HashMap::from([("p".to_string(), Value::Bool(p))]));
    assert_eq!(run(true), Ok(Value::Bool(true)));
    assert_eq!(run(false), Ok(Value::Bool(false)));
}

#[test]
fn membership_quantifier_runs_over_the_elements() {
    let (mut h, cx) = rac_harness();
    // \sum int x; x \in s; x
    let q = Expr::quantified(
        QuantOp::Sum,
        vec![bound_int("x")],
        Some(Expr::member(Expr::ident("x"), Expr::ident("s"))),
        Expr::ident("x"),
    );
    assert_eq!(h.attr(&q, &cx), SpecType::int());
    let form = h.out.rac_form(q.id).expect("runtime form");
    assert!(matches!(form.loops[0].domain, Domain::Elements(_)));
    let set = Value::Set(vec![Value::int(4), Value::int(-1), Value::int(7)]);
    assert_eq!(evaluate_in(form, &HashMap::from([("s".to_string(), set)])), Ok(Value::int(10)));
}

#[test]
fn nested_quantifier_runs_through_its_own_form() {
    let (mut h, cx) = rac_harness();
    let within = |hi: i64| {
        // \forall int i; 0 <= i && i < 3; (\exists int j; 0 <= j && j < hi; j == i)
        Expr::quantified(
            QuantOp::Forall,
            vec![bound_int("i")],
            Some(between(Expr::int(0), "i", Expr::int(3))),
            Expr::quantified(
                QuantOp::Exists,
                vec![bound_int("j")],
                Some(between(Expr::int(0), "j", Expr::int(hi))),
                Expr::binary(BinaryOp::Eq, Expr::ident("j"), Expr::ident("i")),
            ),
        )
    };
    let covered = within(3);
    let short = within(2);
    h.attr(&covered, &cx);
    h.attr(&short, &cx);
    assert!(h.diags.is_empty(), "{:?}", h.diags);

    let form = h.out.rac_form(covered.id).expect("runtime form");
    assert_eq!(form.nested.len(), 1);
    assert_eq!(evaluate_in(form, &HashMap::new()), Ok(Value::Bool(true)));
    let form = h.out.rac_form(short.id).expect("runtime form");
    assert_eq!(evaluate_in(form, &HashMap::new()), Ok(Value::Bool(false)));
}

#[test]
fn let_over_a_bound_variable_stays_inside_the_loop() {
    let (mut h, cx) = rac_harness();
    let shifted = |offset: i64| {
        // \forall int i; 0 <= i && i < 3; (\let int i = i + offset; i > 0)
        Expr::quantified(
            QuantOp::Forall,
            vec![bound_int("i")],
            Some(between(Expr::int(0), "i", Expr::int(3))),
            Expr::new(
                ExprKind::Let {
                    decls: vec![LocalDecl::new(
                        "i",
                        TypeRef::int(),
                        Some(Expr::binary(BinaryOp::Add, Expr::ident("i"), Expr::int(offset))),
                    )],
                    body: Expr::binary(BinaryOp::Gt, Expr::ident("i"), Expr::int(0)),
                },
                Span::DUMMY,
            ),
        )
    };
    let plus_one = shifted(1);
    let plus_zero = shifted(0);
    h.attr(&plus_one, &cx);
    h.attr(&plus_zero, &cx);
    assert!(h.diags.is_empty(), "{:?}", h.diags);

    let form = h.out.rac_form(plus_one.id).expect("runtime form");
    assert!(form.captures.is_empty(), "{form}");
    assert_eq!(evaluate_in(form, &HashMap::new()), Ok(Value::Bool(true)));
    let form = h.out.rac_form(plus_zero.id).expect("runtime form");
    assert_eq!(evaluate_in(form, &HashMap::new()), Ok(Value::Bool(false)));
}

#[test]
fn shift_in_a_runtime_form_wraps_to_int() {
    let (mut h, cx) = rac_harness();
    // \sum int i; 0 <= i && i < 1; 1 << 33
    let q = Expr::quantified(
        QuantOp::Sum,
        vec![bound_int("i")],
        Some(between(Expr::int(0), "i", Expr::int(1))),
        Expr::binary(
            BinaryOp::Shl,
            Expr::int(1),
            Expr::binary(BinaryOp::Add, Expr::ident("i"), Expr::int(33)),
        ),
    );
    assert_eq!(h.attr(&q, &cx), SpecType::int());
    let form = h.out.rac_form(q.id).expect("runtime form");
    assert_eq!(evaluate_in(form, &HashMap::new()), Ok(Value::int(2)));
}

#[test]
fn unrunnable_template_has_no_runtime_form() {
    let (mut h, cx) = rac_harness();
    let cx = cx.with_clause(ClauseKind::Ensures, Visibility::Public);
    // \forall int i; 0 <= i && i < a.length; \old(a[i]) == a[i]
    let q = Expr::quantified(
        QuantOp::Forall,
        vec![bound_int("i")],
        Some(between(Expr::int(0), "i", a_length())),
        Expr::binary(
            BinaryOp::Eq,
            Expr::old(Expr::index(Expr::ident("a"), Expr::ident("i")), None),
            Expr::index(Expr::ident("a"), Expr::ident("i")),
        ),
    );
    assert_eq!(h.attr(&q, &cx), SpecType::Boolean);
    assert!(h.diags.is_empty(), "{:?}", h.diags);
    assert!(h.out.rac_form(q.id).is_none());
}

#[test]
fn unbounded_quantifier_has_no_runtime_form() {
    let mut h = Harness::new();
    h.config = AttrConfig::runtime_checking();
    let cx = h.class_cx(ClauseKind::Invariant, Visibility::Public);
    let q = Expr::quantified(
        QuantOp::Forall,
        vec![bound_int("i")],
        Some(Expr::binary(BinaryOp::Gt, Expr::ident("i"), Expr::int(0))),
        Expr::binary(BinaryOp::Ne, Expr::ident("i"), Expr::int(0)),
    );
    assert_eq!(h.attr(&q, &cx), SpecType::Boolean);
    assert!(h.out.rac_form(q.id).is_none());
    assert!(h.diags.is_empty());
}

#[test]
fn runtime_forms_are_off_by_default() {
    let mut h = Harness::new();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    h.program.add_param(m, "a", SpecType::array_of(SpecType::int()), Modifiers::default()).unwrap();
    let cx = h.method_cx(m, ClauseKind::Requires, Visibility::Public);
    let q = all_positive();
    h.attr(&q, &cx);
    assert!(h.out.rac_forms.is_empty());
}

#[test]
fn shared_clause_is_rechecked_under_a_different_scope() {
    let mut h = Harness::new();
    let m = h.program.add_method(h.class, "run", SpecType::Void, Modifiers::public()).unwrap();
    let cx = h.method_cx(m, ClauseKind::Ensures, Visibility::Public);
    let shared = Clause::ensures(Expr::binary(BinaryOp::Gt, Expr::ident("x"), Expr::int(0)));
    let old_x = |ty| cx.bind("x", Binding::new(ty, BindingKind::ClauseDecl));
    let (as_int, as_bool) = (old_x(SpecType::int()), old_x(SpecType::Boolean));

    let mut a = Attributor::new(
        &h.program,
        &h.config,
        &h.groups,
        &mut h.out,
        &mut h.diags,
        h.class,
    );
    a.attr_clause(&shared, &as_int).unwrap();
    a.attr_clause(&shared, &as_int).unwrap();
    a.attr_clause(&shared, &as_bool).unwrap();
    a.attr_clause(&shared, &as_bool).unwrap();
    drop(a);
    assert_eq!(h.diags.error_count(), 1, "{:?}", h.diags);
}
