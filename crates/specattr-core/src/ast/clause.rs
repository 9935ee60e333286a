//! Clauses: the atomic elements of a specification.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::ast::expr::{Expr, ExprRef, LocalDecl};
use crate::ast::spec::SpecCase;
use crate::clause_kind::ClauseKind;
use crate::span::Span;
use crate::types::TypeRef;

/// Who wrote a clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    #[default]
    User,
    /// Produced by desugaring: defaults, shorthand boilerplate, expansions.
    Synthesized,
}

/// A location named in a frame clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreRef {
    /// `e.f`, or a bare `f` when `target` is `None`.
    Field {
        target: Option<ExprRef>,
        name: String,
    },
    /// `e.*`; `None` means `this.*`.
    AllFields(Option<ExprRef>),
    /// `a[i]`
    Element { array: ExprRef, index: ExprRef },
    /// `a[lo..hi]`
    Range {
        array: ExprRef,
        lo: ExprRef,
        hi: ExprRef,
    },
    /// `a[*]`
    AllElements(ExprRef),
}

impl StoreRef {
    pub fn field(name: impl Into<String>) -> Self {
        StoreRef::Field {
            target: None,
            name: name.into(),
        }
    }

    pub fn this_field(name: impl Into<String>) -> Self {
        StoreRef::Field {
            target: Some(Expr::this()),
            name: name.into(),
        }
    }

    /// Whether this location is a field of `this` (written `f`, `this.f`, or `this.*`).
    pub fn is_direct_this_field(&self) -> bool {
        match self {
            StoreRef::Field { target: None, .. } | StoreRef::AllFields(None) => true,
            StoreRef::Field {
                target: Some(t), ..
            }
            | StoreRef::AllFields(Some(t)) => matches!(t.kind, crate::ast::expr::ExprKind::This),
            _ => false,
        }
    }
}

/// Body of an `assignable` or `accessible` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Nothing,
    Everything,
    NotSpecified,
    Targets(Vec<StoreRef>),
}

impl Frame {
    /// Whether the frame permits no effects at all.
    pub fn is_nothing(&self) -> bool {
        match self {
            Frame::Nothing => true,
            Frame::Targets(t) => t.is_empty(),
            _ => false,
        }
    }
}

/// A method named in a `callable` clause, with optional arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    pub arity: Option<usize>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallableTargets {
    Nothing,
    Everything,
    Methods(Vec<MethodSig>),
}

/// A datagroup named by `in` or `maps`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    pub name: String,
    pub span: Span,
}

impl GroupRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::DUMMY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClauseBody {
    /// Predicates and integral measures.
    Expr(ExprRef),
    /// `recommends pred else exception`
    Recommends { pred: ExprRef, exception: TypeRef },
    /// `signals (exception var) pred`; a missing predicate means `true`.
    Signals {
        exception: TypeRef,
        var: Option<String>,
        pred: Option<ExprRef>,
    },
    SignalsOnly(Vec<TypeRef>),
    Frame(Frame),
    Callable(CallableTargets),
    /// `old` and `forall` declarations.
    Decls(Vec<LocalDecl>),
    /// `{| case also case |}`
    Group(Vec<SpecCase>),
    Represents { field: String, value: ExprRef },
    InGroups(Vec<GroupRef>),
    Maps {
        member: StoreRef,
        groups: Vec<GroupRef>,
    },
}

/// One clause with its kind, body, and position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub kind: ClauseKind,
    pub body: ClauseBody,
    pub span: Span,
    pub origin: Origin,
}

impl Clause {
    pub fn new(kind: ClauseKind, body: ClauseBody) -> Rc<Clause> {
        Rc::new(Clause {
            kind,
            body,
            span: Span::DUMMY,
            origin: Origin::User,
        })
    }

    fn synthesized(kind: ClauseKind, body: ClauseBody) -> Rc<Clause> {
        Rc::new(Clause {
            kind,
            body,
            span: Span::DUMMY,
            origin: Origin::Synthesized,
        })
    }

    pub fn expr(kind: ClauseKind, e: ExprRef) -> Rc<Clause> {
        Clause::new(kind, ClauseBody::Expr(e))
    }

    pub fn requires(e: ExprRef) -> Rc<Clause> {
        Clause::expr(ClauseKind::Requires, e)
    }

    pub fn ensures(e: ExprRef) -> Rc<Clause> {
        Clause::expr(ClauseKind::Ensures, e)
    }

    pub fn recommends(pred: ExprRef, exception: TypeRef) -> Rc<Clause> {
        Clause::new(ClauseKind::Recommends, ClauseBody::Recommends { pred, exception })
    }

    pub fn signals(exception: TypeRef, var: Option<&str>, pred: Option<ExprRef>) -> Rc<Clause> {
        Clause::new(
            ClauseKind::Signals,
            ClauseBody::Signals {
                exception,
                var: var.map(str::to_string),
                pred,
            },
        )
    }

    pub fn signals_only(types: Vec<TypeRef>) -> Rc<Clause> {
        Clause::new(ClauseKind::SignalsOnly, ClauseBody::SignalsOnly(types))
    }

    pub fn assignable(frame: Frame) -> Rc<Clause> {
        Clause::new(ClauseKind::Assignable, ClauseBody::Frame(frame))
    }

    pub fn accessible(frame: Frame) -> Rc<Clause> {
        Clause::new(ClauseKind::Accessible, ClauseBody::Frame(frame))
    }

    pub fn group(cases: Vec<SpecCase>) -> Rc<Clause> {
        Clause::new(ClauseKind::SpecGroup, ClauseBody::Group(cases))
    }

    pub fn in_groups(groups: &[&str]) -> Rc<Clause> {
        Clause::new(
            ClauseKind::In,
            ClauseBody::InGroups(groups.iter().map(|g| GroupRef::new(*g)).collect()),
        )
    }

    /// Same clause at a source position.
    pub fn at(self: Rc<Self>, span: Span) -> Rc<Clause> {
        let mut clause = Rc::unwrap_or_clone(self);
        clause.span = span;
        Rc::new(clause)
    }

    /// Same clause marked as produced by desugaring.
    pub fn into_synthesized(self: Rc<Self>) -> Rc<Clause> {
        let mut clause = Rc::unwrap_or_clone(self);
        clause.origin = Origin::Synthesized;
        Rc::new(clause)
    }

    pub fn synth_expr(kind: ClauseKind, e: ExprRef) -> Rc<Clause> {
        Clause::synthesized(kind, ClauseBody::Expr(e))
    }

    pub fn synth_frame(kind: ClauseKind, frame: Frame) -> Rc<Clause> {
        Clause::synthesized(kind, ClauseBody::Frame(frame))
    }

    pub fn synth_signals(exception: TypeRef, pred: ExprRef) -> Rc<Clause> {
        Clause::synthesized(
            ClauseKind::Signals,
            ClauseBody::Signals {
                exception,
                var: None,
                pred: Some(pred),
            },
        )
    }

    pub fn synth_signals_only(types: Vec<TypeRef>) -> Rc<Clause> {
        Clause::synthesized(ClauseKind::SignalsOnly, ClauseBody::SignalsOnly(types))
    }

    pub fn is_synthesized(&self) -> bool {
        self.origin == Origin::Synthesized
    }

    pub fn as_expr(&self) -> Option<&ExprRef> {
        match &self.body {
            ClauseBody::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match &self.body {
            ClauseBody::Frame(f) => Some(f),
            _ => None,
        }
    }

    /// `signals (T) false`, returning `T`.
    pub fn as_signals_false(&self) -> Option<&TypeRef> {
        match &self.body {
            ClauseBody::Signals {
                exception,
                pred: Some(p),
                ..
            } if p.as_bool_literal() == Some(false) => Some(exception),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_this_fields() {
        assert!(StoreRef::field("x").is_direct_this_field());
        assert!(StoreRef::this_field("x").is_direct_this_field());
        assert!(StoreRef::AllFields(None).is_direct_this_field());
        let other = StoreRef::Field {
            target: Some(Expr::ident("o")),
            name: "x".into(),
        };
        assert!(!other.is_direct_this_field());
        assert!(!StoreRef::AllElements(Expr::ident("a")).is_direct_this_field());
    }

    #[test]
    fn empty_target_list_is_nothing() {
        assert!(Frame::Nothing.is_nothing());
        assert!(Frame::Targets(Vec::new()).is_nothing());
        assert!(!Frame::Everything.is_nothing());
    }

    #[test]
    fn signals_false_detection() {
        let c = Clause::signals(TypeRef::named("Exception"), None, Some(Expr::bool(false)));
        assert_eq!(c.as_signals_false(), Some(&TypeRef::named("Exception")));
        let open = Clause::signals(TypeRef::named("Exception"), Some("e"), None);
        assert_eq!(open.as_signals_false(), None);
    }

    #[test]
    fn synthesized_marker_survives_respan() {
        let c = Clause::requires(Expr::bool(true)).into_synthesized();
        let moved = c.at(Span::new(3, 8));
        assert!(moved.is_synthesized());
        assert_eq!(moved.span, Span::new(3, 8));
    }
}
