use std::rc::Rc;

use specattr_core::ast::{
    Behavior, Clause, Expr, Frame, MethodSpec, SpecCase, Specification, StoreRef,
};
use specattr_core::{
    content_hash, ClauseKind, Modifiers, Program, SpecRepository, SpecType, SymbolTable, TypeRef,
    Visibility,
};

fn sample_spec() -> MethodSpec {
    let inner = vec![
        SpecCase::lightweight(vec![Clause::ensures(Expr::bool(true))]),
        SpecCase::lightweight(vec![Clause::assignable(Frame::Targets(vec![
            StoreRef::this_field("count"),
        ]))]),
    ];
    MethodSpec::new(vec![
        SpecCase::normal(
            Visibility::Public,
            vec![Clause::requires(Expr::ident("ok")), Clause::group(inner)],
        ),
        SpecCase::exceptional(
            Visibility::Public,
            vec![Clause::signals_only(vec![TypeRef::named("RuntimeException")])],
        ),
    ])
}

#[test]
fn normalized_specs_survive_json() {
    let spec = sample_spec();
    let json = serde_json::to_string(&spec).unwrap();
    let back: MethodSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
    assert_eq!(content_hash(&back).unwrap(), content_hash(&spec).unwrap());
}

#[test]
fn shared_prefix_serializes_per_case() {
    let prefix = Rc::new(vec![Clause::requires(Expr::ident("p"))]);
    let mut a = SpecCase::lightweight(vec![Clause::ensures(Expr::bool(true))]);
    let mut b = SpecCase::lightweight(vec![Clause::ensures(Expr::bool(false))]);
    a.prefix = Rc::clone(&prefix);
    b.prefix = Rc::clone(&prefix);
    assert!(Rc::ptr_eq(&a.prefix, &b.prefix));
    let json = serde_json::to_value(MethodSpec::new(vec![a, b])).unwrap();
    assert_eq!(json["cases"][0]["prefix"], json["cases"][1]["prefix"]);
}

#[test]
fn program_stores_and_returns_specs() {
    let mut p = Program::new();
    let c = p.add_class("Counter", &[], Modifiers::public()).unwrap();
    let m = p.add_method(c, "inc", SpecType::Void, Modifiers::public()).unwrap();
    p.set_spec(m, Specification::Method(sample_spec())).unwrap();

    let stored = p.specification(m).and_then(Specification::as_method).unwrap();
    assert_eq!(stored.cases.len(), 2);
    assert_eq!(stored.cases[0].behavior, Behavior::Normal);
    assert!(stored.cases[0].has_kind(ClauseKind::SpecGroup));
    assert_eq!(p.lookup_type("Counter").unwrap(), Some(c));
    assert_eq!(p.lookup_methods(c, "inc").unwrap(), vec![m]);
}
