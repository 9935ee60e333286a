//! Specification abstract syntax, as produced by the external parser.

pub mod clause;
pub mod expr;
pub mod spec;

pub use clause::{CallableTargets, Clause, ClauseBody, Frame, GroupRef, MethodSig, Origin, StoreRef};
pub use expr::{
    BinaryOp, BoundVar, Expr, ExprId, ExprKind, ExprRef, Literal, LocalDecl, MatchArm, QuantOp,
    QuantifiedExpr, UnaryOp,
};
pub use spec::{
    Behavior, ClausePrefix, FieldSpec, MethodSpec, ScopeSnapshot, SpecCase, Specification,
    StatementSpec, TypeClause, TypeSpec,
};
