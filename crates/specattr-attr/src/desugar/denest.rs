//! Behavior boilerplate and nested-group expansion.

use std::rc::Rc;

use specattr_core::ast::{Behavior, Clause, ClauseBody, Expr, SpecCase};
use specattr_core::{ClauseKind, TypeRef};

/// Append the clauses a behavior keyword implies: `normal_behavior` forbids
/// exceptions, `exceptional_behavior` forbids normal return. Applied to
/// nested cases too, before any expansion.
pub fn inject_boilerplate(case: &SpecCase) -> SpecCase {
    let mut out = case.clone();
    out.clauses = case.clauses.iter().map(inject_into_groups).collect();
    match case.behavior {
        Behavior::Normal => out.clauses.push(Clause::synth_signals(
            TypeRef::named("Exception"),
            Expr::bool(false),
        )),
        Behavior::Exceptional => out
            .clauses
            .push(Clause::synth_expr(ClauseKind::Ensures, Expr::bool(false))),
        Behavior::Lightweight | Behavior::Heavyweight => {}
    }
    out
}

fn inject_into_groups(clause: &Rc<Clause>) -> Rc<Clause> {
    match &clause.body {
        ClauseBody::Group(cases) => {
            let mut rebuilt = Clause::clone(clause);
            rebuilt.body = ClauseBody::Group(cases.iter().map(inject_boilerplate).collect());
            Rc::new(rebuilt)
        }
        _ => Rc::clone(clause),
    }
}

/// One flat branch produced by expanding nested groups.
#[derive(Debug, Clone)]
pub struct Branch {
    pub behavior: Behavior,
    pub clauses: Vec<Rc<Clause>>,
}

/// Expand every nested group into sibling branches. Each branch gets the
/// clauses before the group, the nested case's clauses, then the clauses
/// after the group. Clause objects are shared between branches; only the
/// containing vectors are copied.
pub fn expand(behavior: Behavior, clauses: &[Rc<Clause>]) -> Vec<Branch> {
    let group_at = clauses
        .iter()
        .position(|c| matches!(c.body, ClauseBody::Group(_)));
    let Some(i) = group_at else {
        return vec![Branch {
            behavior,
            clauses: clauses.to_vec(),
        }];
    };
    let ClauseBody::Group(cases) = &clauses[i].body else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for inner in cases {
        let mut branch = Vec::with_capacity(clauses.len() + inner.clauses.len());
        branch.extend(clauses[..i].iter().cloned());
        branch.extend(inner.clauses.iter().cloned());
        branch.extend(clauses[i + 1..].iter().cloned());
        let inner_behavior = match behavior {
            Behavior::Lightweight | Behavior::Heavyweight => inner.behavior,
            outer => outer,
        };
        out.extend(expand(inner_behavior, &branch));
    }
    out
}

#[cfg(test)]
mod tests {
    use specattr_core::Visibility;

    use super::*;

    fn kinds(clauses: &[Rc<Clause>]) -> Vec<ClauseKind> {
        clauses.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn normal_behavior_gets_signals_false() {
        let case = SpecCase::normal(Visibility::Public, vec![Clause::ensures(Expr::bool(true))]);
        let out = inject_boilerplate(&case);
        assert_eq!(kinds(&out.clauses), vec![ClauseKind::Ensures, ClauseKind::Signals]);
        assert!(out.clauses[1].is_synthesized());
        assert!(out.clauses[1].as_signals_false().is_some());
    }

    #[test]
    fn exceptional_behavior_gets_ensures_false() {
        let case = SpecCase::exceptional(Visibility::Public, Vec::new());
        let out = inject_boilerplate(&case);
        assert_eq!(out.clauses.len(), 1);
        assert_eq!(out.clauses[0].as_expr().and_then(|e| e.as_bool_literal()), Some(false));
    }

    #[test]
    fn nested_cases_receive_boilerplate() {
        let inner = SpecCase::exceptional(Visibility::Public, Vec::new());
        let case = SpecCase::lightweight(vec![Clause::group(vec![inner])]);
        let out = inject_boilerplate(&case);
        let ClauseBody::Group(cases) = &out.clauses[0].body else {
            panic!("expected group");
        };
        assert_eq!(kinds(&cases[0].clauses), vec![ClauseKind::Ensures]);
    }

    #[test]
    fn groups_fan_out_with_shared_clauses() {
        let pre = Clause::requires(Expr::ident("p"));
        let a = SpecCase::lightweight(vec![Clause::ensures(Expr::ident("a"))]);
        let b = SpecCase::lightweight(vec![Clause::ensures(Expr::ident("b"))]);
        let clauses = vec![Rc::clone(&pre), Clause::group(vec![a, b])];
        let branches = expand(Behavior::Lightweight, &clauses);
        assert_eq!(branches.len(), 2);
        for branch in &branches {
            assert_eq!(kinds(&branch.clauses), vec![ClauseKind::Requires, ClauseKind::Ensures]);
            assert!(Rc::ptr_eq(&branch.clauses[0], &pre));
        }
    }

    #[test]
    fn nested_groups_multiply() {
        let leaf = |n: &str| SpecCase::lightweight(vec![Clause::ensures(Expr::ident(n))]);
        let inner = SpecCase::lightweight(vec![Clause::group(vec![leaf("x"), leaf("y")])]);
        let clauses = vec![Clause::group(vec![inner, leaf("z")])];
        let branches = expand(Behavior::Lightweight, &clauses);
        assert_eq!(branches.len(), 3);
    }

    #[test]
    fn inner_behavior_applies_under_lightweight_outer() {
        let inner = SpecCase::exceptional(Visibility::Public, Vec::new());
        let branches = expand(Behavior::Lightweight, &[Clause::group(vec![inner])]);
        assert_eq!(branches[0].behavior, Behavior::Exceptional);
        let normal = SpecCase::lightweight(Vec::new());
        let branches = expand(Behavior::Normal, &[Clause::group(vec![normal])]);
        assert_eq!(branches[0].behavior, Behavior::Normal);
    }
}
