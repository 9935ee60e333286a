//! Expansion of `recommends P else E` clauses.
//!
//! In the branch itself each recommends becomes `requires P`. All
//! recommends of a branch together produce one auxiliary exceptional case:
//! when some recommended condition fails the method must throw one of the
//! named exceptions, and each exception implies its condition failed.

use std::rc::Rc;

use specattr_core::ast::{Clause, ClauseBody, Expr, ExprRef, Frame};
use specattr_core::{ClauseKind, TypeRef};

#[derive(Debug, Clone)]
pub struct RecommendsExpansion {
    /// Branch clauses with every recommends replaced by a requires.
    pub clauses: Vec<Rc<Clause>>,
    /// Clauses of the auxiliary exceptional case, if there were recommends.
    pub aux: Option<Vec<Rc<Clause>>>,
}

pub fn expand_recommends(clauses: &[Rc<Clause>]) -> RecommendsExpansion {
    let mut out = Vec::with_capacity(clauses.len());
    let mut preceding: Vec<Rc<Clause>> = Vec::new();
    let mut recommended: Vec<(ExprRef, TypeRef)> = Vec::new();

    for clause in clauses {
        match &clause.body {
            ClauseBody::Recommends { pred, exception } => {
                let requires = Clause::synth_expr(ClauseKind::Requires, Rc::clone(pred));
                out.push(requires.at(clause.span));
                recommended.push((Rc::clone(pred), exception.clone()));
            }
            _ => {
                if clause.kind == ClauseKind::Requires && recommended.is_empty() {
                    preceding.push(Rc::clone(clause));
                }
                out.push(Rc::clone(clause));
            }
        }
    }

    if recommended.is_empty() {
        return RecommendsExpansion {
            clauses: out,
            aux: None,
        };
    }

    let violated = recommended
        .iter()
        .map(|(pred, _)| Expr::not(Rc::clone(pred)))
        .reduce(Expr::or)
        .unwrap_or_else(|| Expr::bool(false));

    let mut exceptions: Vec<TypeRef> = Vec::new();
    for (_, exception) in &recommended {
        if !exceptions.contains(exception) {
            exceptions.push(exception.clone());
        }
    }

    let mut aux = preceding;
    aux.push(Clause::synth_expr(ClauseKind::Requires, violated));
    aux.push(Clause::synth_frame(ClauseKind::Assignable, Frame::Nothing));
    aux.push(Clause::synth_expr(ClauseKind::Ensures, Expr::bool(false)));
    aux.push(Clause::synth_signals_only(exceptions));
    for (pred, exception) in recommended {
        aux.push(Clause::synth_signals(exception, Expr::not(pred)));
    }

    RecommendsExpansion {
        clauses: out,
        aux: Some(aux),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(clauses: &[Rc<Clause>]) -> Vec<ClauseKind> {
        clauses.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn no_recommends_no_aux() {
        let clauses = vec![Clause::requires(Expr::ident("p")), Clause::ensures(Expr::bool(true))];
        let out = expand_recommends(&clauses);
        assert!(out.aux.is_none());
        assert_eq!(out.clauses.len(), 2);
        assert!(Rc::ptr_eq(&out.clauses[0], &clauses[0]));
    }

    #[test]
    fn recommends_become_requires_plus_aux_case() {
        let clauses = vec![
            Clause::requires(Expr::ident("ready")),
            Clause::recommends(Expr::ident("a"), TypeRef::named("IllegalArgumentException")),
            Clause::recommends(Expr::ident("b"), TypeRef::named("IllegalStateException")),
            Clause::ensures(Expr::bool(true)),
        ];
        let out = expand_recommends(&clauses);
        assert_eq!(
            kinds(&out.clauses),
            vec![
                ClauseKind::Requires,
                ClauseKind::Requires,
                ClauseKind::Requires,
                ClauseKind::Ensures
            ]
        );

        let aux = out.aux.unwrap();
        assert_eq!(
            kinds(&aux),
            vec![
                ClauseKind::Requires,
                ClauseKind::Requires,
                ClauseKind::Assignable,
                ClauseKind::Ensures,
                ClauseKind::SignalsOnly,
                ClauseKind::Signals,
                ClauseKind::Signals,
            ]
        );
        assert!(Rc::ptr_eq(&aux[0], &clauses[0]));
        assert_eq!(aux[1].as_expr().unwrap().to_string(), "(!a || !b)");
        let ClauseBody::SignalsOnly(types) = &aux[4].body else {
            panic!("expected signals_only");
        };
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn repeated_exception_listed_once() {
        let e = TypeRef::named("IllegalArgumentException");
        let clauses = vec![
            Clause::recommends(Expr::ident("a"), e.clone()),
            Clause::recommends(Expr::ident("b"), e),
        ];
        let aux = expand_recommends(&clauses).aux.unwrap();
        let ClauseBody::SignalsOnly(types) = &aux[3].body else {
            panic!("expected signals_only");
        };
        assert_eq!(types.len(), 1);
    }
}
