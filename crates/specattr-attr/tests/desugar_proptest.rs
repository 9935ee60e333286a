//! Generated specifications: desugaring reaches a fixed point in one pass
//! and never lets a pure method assign anything.

use std::rc::Rc;

use proptest::prelude::*;
use specattr_attr::desugar::defaults::pure_frame_allowed;
use specattr_attr::{is_flat, AttrConfig, DesugarCache, Desugarer};
use specattr_core::ast::{Behavior, Clause, Expr, Frame, MethodSpec, SpecCase};
use specattr_core::{
    ClauseKind, DeclId, Diagnostics, Modifiers, Program, SpecType, TypeRef, Visibility,
};

/// Clause shapes a generated case is built from.
#[derive(Debug, Clone)]
enum Shape {
    Requires(bool),
    Ensures(bool),
    Assignable { nothing: bool },
    SignalsOnly,
    SignalsFalse,
    Recommends,
    Group(Vec<Vec<Shape>>),
}

fn leaf() -> impl Strategy<Value = Shape> {
    prop_oneof![
        any::<bool>().prop_map(Shape::Requires),
        any::<bool>().prop_map(Shape::Ensures),
        any::<bool>().prop_map(|nothing| Shape::Assignable { nothing }),
        Just(Shape::SignalsOnly),
        Just(Shape::SignalsFalse),
        Just(Shape::Recommends),
    ]
}

fn shape() -> impl Strategy<Value = Shape> {
    prop_oneof![
        4 => leaf(),
        1 => {
            prop::collection::vec(prop::collection::vec(leaf(), 0..4), 1..3).prop_map(Shape::Group)
        }
    ]
}

fn spec_strategy() -> impl Strategy<Value = Vec<(u8, Vec<Shape>)>> {
    prop::collection::vec((0u8..3, prop::collection::vec(shape(), 0..6)), 0..4)
}

fn build_clause(shape: &Shape) -> Rc<Clause> {
    match shape {
        Shape::Requires(b) => Clause::requires(Expr::bool(*b)),
        Shape::Ensures(b) => Clause::ensures(Expr::bool(*b)),
        Shape::Assignable { nothing: true } => Clause::assignable(Frame::Nothing),
        Shape::Assignable { nothing: false } => Clause::assignable(Frame::Everything),
        Shape::SignalsOnly => Clause::signals_only(vec![TypeRef::named("RuntimeException")]),
        Shape::SignalsFalse => {
            Clause::signals(TypeRef::named("Exception"), None, Some(Expr::bool(false)))
        }
        Shape::Recommends => {
            Clause::recommends(Expr::ident("p"), TypeRef::named("RuntimeException"))
        }
        Shape::Group(cases) => Clause::group(
            cases
                .iter()
                .map(|c| SpecCase::lightweight(c.iter().map(build_clause).collect()))
                .collect(),
        ),
    }
}

fn build_spec(cases: &[(u8, Vec<Shape>)]) -> MethodSpec {
    MethodSpec::new(
        cases
            .iter()
            .map(|(behavior, shapes)| {
                let behavior = match behavior {
                    0 => Behavior::Lightweight,
                    1 => Behavior::Normal,
                    _ => Behavior::Exceptional,
                };
                SpecCase::new(
                    behavior,
                    Visibility::Public,
                    shapes.iter().map(build_clause).collect(),
                )
            })
            .collect(),
    )
}

struct Fixture {
    program: Program,
    update: DeclId,
    check: DeclId,
}

fn fixture() -> Fixture {
    let mut program = Program::new();
    let class = program.add_class("Account", &[], Modifiers::public()).unwrap();
    let update = program.add_method(class, "update", SpecType::Void, Modifiers::public()).unwrap();
    program.add_param(update, "p", SpecType::Boolean, Modifiers::default()).unwrap();
    let check = program
        .add_method(class, "check", SpecType::Boolean, Modifiers::public().pure())
        .unwrap();
    program.add_param(check, "p", SpecType::Boolean, Modifiers::default()).unwrap();
    Fixture { program, update, check }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn desugaring_is_idempotent(cases in spec_strategy()) {
        let f = fixture();
        let config = AttrConfig::default();
        let desugarer = Desugarer::new(&f.program, &config);
        let raw = build_spec(&cases);
        for method in [f.update, f.check] {
            let mut diags = Diagnostics::new();
            let once = desugarer.desugar(method, &raw, &mut diags).unwrap();
            prop_assert!(is_flat(&once));
            let mut again_diags = Diagnostics::new();
            let twice = desugarer.desugar(method, &once, &mut again_diags).unwrap();
            prop_assert_eq!(&twice, &once);
            prop_assert!(again_diags.is_empty());
        }
    }

    #[test]
    fn pure_methods_never_assign(cases in spec_strategy()) {
        let f = fixture();
        let config = AttrConfig::default();
        let desugarer = Desugarer::new(&f.program, &config);
        let mut diags = Diagnostics::new();
        let spec = desugarer.desugar(f.check, &build_spec(&cases), &mut diags).unwrap();
        for case in &spec.cases {
            prop_assert!(case.has_kind(ClauseKind::Assignable));
            for clause in case.clauses_of(ClauseKind::Assignable) {
                let frame = clause.as_frame().unwrap();
                prop_assert!(pure_frame_allowed(frame, false), "{:?}", frame);
            }
        }
    }

    #[test]
    fn memoized_desugaring_hits_on_resubmission(cases in spec_strategy()) {
        let f = fixture();
        let config = AttrConfig::default();
        let desugarer = Desugarer::new(&f.program, &config);
        let raw = build_spec(&cases);
        let mut cache = DesugarCache::new();
        let mut diags = Diagnostics::new();
        let first = desugarer.desugar_memoized(&mut cache, f.update, &raw, &mut diags).unwrap();
        let second = desugarer.desugar_memoized(&mut cache, f.update, &raw, &mut diags).unwrap();
        prop_assert!(is_flat(&first));
        prop_assert_eq!(&second, &first);
        prop_assert_eq!(cache.statistics().hits, 1);
    }
}
