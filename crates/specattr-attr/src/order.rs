//! Clause order validation within a specification case.
//!
//! A case starts in [`OrderState::Start`], where preconditions and clause
//! declarations are legal. The first postcondition-like clause or nested
//! group moves it to [`OrderState::Postcondition`]; a precondition after
//! that point is out of order. Checking of a case stops at its first
//! violation. Kinds with no order role pass through unchecked.

use std::fmt;
use std::rc::Rc;

use specattr_core::ast::{Clause, ClauseBody};
use specattr_core::{codes, Category, ClauseKind, Diagnostic, Diagnostics, OrderRole, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Start,
    Postcondition,
    Error,
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderState::Start => "start",
            OrderState::Postcondition => "postcondition",
            OrderState::Error => "error",
        })
    }
}

/// A clause that appeared where its kind is not legal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderViolation {
    pub kind: ClauseKind,
    pub span: Span,
    /// State the case was in when the clause was seen.
    pub state: OrderState,
}

impl OrderViolation {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = match self.kind {
            ClauseKind::SpecGroup => {
                "nested specification group must precede all postcondition clauses".to_string()
            }
            kind => {
                format!("{kind} clause is out of order: it must precede all postcondition clauses")
            }
        };
        Diagnostic::error(Category::Order, codes::OUT_OF_ORDER, message).at(self.span)
    }
}

/// One transition of the order state machine.
pub fn step(state: OrderState, kind: ClauseKind) -> OrderState {
    match (state, kind.info().order) {
        (OrderState::Error, _) => OrderState::Error,
        (state, OrderRole::Unclassified) => state,
        (OrderState::Start, OrderRole::Precondition) => OrderState::Start,
        (OrderState::Postcondition, OrderRole::Precondition) => OrderState::Error,
        (_, OrderRole::Postcondition) => OrderState::Postcondition,
        (OrderState::Start, OrderRole::GroupStart) => OrderState::Postcondition,
        (OrderState::Postcondition, OrderRole::GroupStart) => OrderState::Error,
    }
}

/// Check one case's clauses, recursing into nested groups.
pub fn validate_case(clauses: &[Rc<Clause>]) -> Vec<OrderViolation> {
    let mut violations = Vec::new();
    validate_from(OrderState::Start, clauses, &mut violations);
    violations
}

fn validate_from(
    mut state: OrderState,
    clauses: &[Rc<Clause>],
    out: &mut Vec<OrderViolation>,
) -> OrderState {
    for clause in clauses {
        let next = step(state, clause.kind);
        if next == OrderState::Error {
            out.push(OrderViolation {
                kind: clause.kind,
                span: clause.span,
                state,
            });
            return OrderState::Error;
        }
        if let ClauseBody::Group(cases) = &clause.body {
            for case in cases {
                validate_from(state, &case.clauses, out);
            }
        }
        state = next;
    }
    state
}

/// Validate and record every violation as a diagnostic. Returns whether the
/// case was in order.
pub fn check_case(clauses: &[Rc<Clause>], diags: &mut Diagnostics) -> bool {
    let violations = validate_case(clauses);
    let ok = violations.is_empty();
    for v in violations {
        diags.push(v.to_diagnostic());
    }
    ok
}

#[cfg(test)]
mod tests {
    use specattr_core::ast::{Expr, Frame, SpecCase};

    use super::*;

    fn requires() -> Rc<Clause> {
        Clause::requires(Expr::bool(true))
    }

    fn ensures() -> Rc<Clause> {
        Clause::ensures(Expr::bool(true))
    }

    #[test]
    fn ensures_then_requires_is_out_of_order() {
        let v = validate_case(&[ensures(), requires()]);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].kind, ClauseKind::Requires);
        assert_eq!(v[0].state, OrderState::Postcondition);
    }

    #[test]
    fn requires_ensures_assignable_is_fine() {
        let clauses = [requires(), ensures(), Clause::assignable(Frame::Nothing)];
        assert!(validate_case(&clauses).is_empty());
    }

    #[test]
    fn stops_after_first_violation() {
        let v = validate_case(&[ensures(), requires(), requires()]);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn unclassified_kinds_pass_through() {
        let diverges = Clause::expr(ClauseKind::Diverges, Expr::bool(false));
        let frame = Clause::accessible(Frame::Nothing);
        assert!(validate_case(&[ensures(), diverges, frame]).is_empty());
        assert_eq!(step(OrderState::Postcondition, ClauseKind::When), OrderState::Postcondition);
    }

    #[test]
    fn group_after_postcondition_is_rejected() {
        let group = Clause::group(vec![SpecCase::lightweight(vec![ensures()])]);
        let v = validate_case(&[ensures(), group]);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].kind, ClauseKind::SpecGroup);
    }

    #[test]
    fn nested_cases_checked_from_entry_state() {
        let bad_inner = SpecCase::lightweight(vec![ensures(), requires()]);
        let good_inner = SpecCase::lightweight(vec![requires(), ensures()]);
        let group = Clause::group(vec![good_inner, bad_inner]);
        let v = validate_case(&[requires(), group]);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].kind, ClauseKind::Requires);

        let mut diags = Diagnostics::new();
        assert!(!check_case(&[ensures(), requires()], &mut diags));
        assert_eq!(diags.count(codes::OUT_OF_ORDER), 1);
    }
}
