//! Recovering a finite iteration domain from a range predicate.

use std::collections::HashSet;
use std::fmt;

use specattr_core::ast::{BinaryOp, ExprKind, ExprRef};
use specattr_core::SpecType;

#[derive(Debug, Clone)]
pub enum Domain {
    /// `{false, true}` for a boolean variable.
    Booleans,
    /// Every element of a set, sequence, or array.
    Elements(ExprRef),
    /// Consecutive integers between two bounds.
    Interval {
        lo: ExprRef,
        hi: ExprRef,
        lo_inclusive: bool,
        hi_inclusive: bool,
    },
}

impl Domain {
    /// Expressions evaluated to produce the domain.
    pub(super) fn exprs(&self) -> Vec<&ExprRef> {
        match self {
            Domain::Booleans => Vec::new(),
            Domain::Elements(c) => vec![c],
            Domain::Interval { lo, hi, .. } => vec![lo, hi],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Booleans => write!(f, "{{false, true}}"),
            Domain::Elements(c) => write!(f, "{c}"),
            Domain::Interval {
                lo,
                hi,
                lo_inclusive,
                hi_inclusive,
            } => {
                let open = if *lo_inclusive { '[' } else { '(' };
                let close = if *hi_inclusive { ']' } else { ')' };
                write!(f, "{open}{lo}, {hi}{close}")
            }
        }
    }
}

/// Find the domain of loop variable `var` of type `ty` in `guard`. Bound
/// expressions may not mention any name in `blocked`: the variable itself
/// and those declared after it.
pub(super) fn find(
    var: &str,
    ty: &SpecType,
    guard: Option<&ExprRef>,
    blocked: &HashSet<String>,
) -> Option<Domain> {
    if ty.is_boolean() {
        return Some(Domain::Booleans);
    }
    let mut conjuncts = Vec::new();
    if let Some(g) = guard {
        flatten(g, &mut conjuncts);
    }
    let is_var = |e: &ExprRef| e.as_ident() == Some(var);
    let usable = |e: &ExprRef| !e.mentions_any(blocked);

    for c in &conjuncts {
        match &c.kind {
            ExprKind::Member { element, collection } if is_var(element) && usable(collection) => {
                return Some(Domain::Elements(collection.clone()));
            }
            ExprKind::Call {
                target: Some(coll),
                method,
                args,
            } if method == "contains" && args.len() == 1 && is_var(&args[0]) && usable(coll) => {
                return Some(Domain::Elements(coll.clone()));
            }
            _ => {}
        }
    }

    if !ty.is_integral() {
        return None;
    }
    let mut lower: Option<(ExprRef, bool)> = None;
    let mut upper: Option<(ExprRef, bool)> = None;
    for c in &conjuncts {
        let ExprKind::Binary { op, lhs, rhs } = &c.kind else {
            continue;
        };
        let (lo, hi) = match (op, is_var(lhs), is_var(rhs)) {
            (BinaryOp::Le, false, true) => (Some((lhs, true)), None),
            (BinaryOp::Lt, false, true) => (Some((lhs, false)), None),
            (BinaryOp::Ge, true, false) => (Some((rhs, true)), None),
            (BinaryOp::Gt, true, false) => (Some((rhs, false)), None),
            (BinaryOp::Lt, true, false) => (None, Some((rhs, false))),
            (BinaryOp::Le, true, false) => (None, Some((rhs, true))),
            (BinaryOp::Gt, false, true) => (None, Some((lhs, false))),
            (BinaryOp::Ge, false, true) => (None, Some((lhs, true))),
            _ => (None, None),
        };
        if lower.is_none() {
            lower = lo.filter(|(e, _)| usable(e)).map(|(e, inclusive)| (e.clone(), inclusive));
        }
        if upper.is_none() {
            upper = hi.filter(|(e, _)| usable(e)).map(|(e, inclusive)| (e.clone(), inclusive));
        }
    }
    let ((lo, lo_inclusive), (hi, hi_inclusive)) = (lower?, upper?);
    Some(Domain::Interval {
        lo,
        hi,
        lo_inclusive,
        hi_inclusive,
    })
}

fn flatten<'e>(e: &'e ExprRef, out: &mut Vec<&'e ExprRef>) {
    match &e.kind {
        ExprKind::Binary {
            op: BinaryOp::And,
            lhs,
            rhs,
        } => {
            flatten(lhs, out);
            flatten(rhs, out);
        }
        _ => out.push(e),
    }
}
