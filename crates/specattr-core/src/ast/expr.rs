//! Specification expressions.
//!
//! Expression nodes are immutable once built and shared through [`ExprRef`];
//! passes that need to rewrite an expression build new nodes around the
//! existing ones instead of editing them.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::types::TypeRef;

/// Shared handle to an expression node.
pub type ExprRef = Rc<Expr>;

/// Unique identity of an expression node; keys attribution side tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExprId(pub u32);

static NEXT_EXPR_ID: AtomicU32 = AtomicU32::new(1);

impl ExprId {
    /// Allocate an id no other node in this process carries.
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    /// Integral literal; `long` marks an `L` suffix.
    Int { value: i64, long: bool },
    Real(f64),
    Char(char),
    Str(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    /// `==>`
    Implies,
    /// `<==`
    RevImplies,
    /// `<==>`
    Equiv,
    /// `<=!=>`
    Inequiv,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    /// `<:` over `\TYPE` values.
    Subtype,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Implies => "==>",
            BinaryOp::RevImplies => "<==",
            BinaryOp::Equiv => "<==>",
            BinaryOp::Inequiv => "<=!=>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Subtype => "<:",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(
            self,
            BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Implies
                | BinaryOp::RevImplies
                | BinaryOp::Equiv
                | BinaryOp::Inequiv
        )
    }
}

/// Quantifier and generalized-quantifier operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantOp {
    Forall,
    Exists,
    NumOf,
    Sum,
    Product,
    Max,
    Min,
}

impl QuantOp {
    pub fn keyword(self) -> &'static str {
        match self {
            QuantOp::Forall => "\\forall",
            QuantOp::Exists => "\\exists",
            QuantOp::NumOf => "\\num_of",
            QuantOp::Sum => "\\sum",
            QuantOp::Product => "\\product",
            QuantOp::Max => "\\max",
            QuantOp::Min => "\\min",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<QuantOp> {
        [
            QuantOp::Forall,
            QuantOp::Exists,
            QuantOp::NumOf,
            QuantOp::Sum,
            QuantOp::Product,
            QuantOp::Max,
            QuantOp::Min,
        ]
        .into_iter()
        .find(|op| op.keyword() == keyword)
    }
}

/// A variable bound by a quantifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundVar {
    pub name: String,
    pub ty: TypeRef,
    /// Modifier keywords written before the type.
    pub modifiers: Vec<String>,
    pub span: Span,
}

impl BoundVar {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            modifiers: Vec::new(),
            span: Span::DUMMY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantifiedExpr {
    pub op: QuantOp,
    pub decls: Vec<BoundVar>,
    pub range: Option<ExprRef>,
    pub value: ExprRef,
    pub triggers: Option<Vec<ExprRef>>,
}

/// A `\let` binding or an `old`/`forall` clause declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    pub ty: TypeRef,
    pub init: Option<ExprRef>,
    pub span: Span,
}

impl LocalDecl {
    pub fn new(name: impl Into<String>, ty: TypeRef, init: Option<ExprRef>) -> Self {
        Self {
            name: name.into(),
            ty,
            init,
            span: Span::DUMMY,
        }
    }
}

/// One arm of a datatype `match`; `constructor: None` is the wildcard arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub constructor: Option<String>,
    pub bindings: Vec<String>,
    pub body: ExprRef,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    This,
    Field {
        target: ExprRef,
        name: String,
    },
    Index {
        target: ExprRef,
        index: ExprRef,
    },
    Unary {
        op: UnaryOp,
        operand: ExprRef,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },
    Conditional {
        cond: ExprRef,
        then_expr: ExprRef,
        else_expr: ExprRef,
    },
    Call {
        target: Option<ExprRef>,
        method: String,
        args: Vec<ExprRef>,
    },
    /// `\result`
    Result,
    /// `\old(e)` or `\old(e, L)`
    Old {
        expr: ExprRef,
        label: Option<String>,
    },
    /// `\pre(e)`
    Pre(ExprRef),
    /// `\fresh(e)`
    Fresh(ExprRef),
    /// `\typeof(e)`
    TypeOf(ExprRef),
    /// `\elemtype(e)`
    ElemType(ExprRef),
    /// `\type(T)`
    TypeLit(TypeRef),
    InstanceOf {
        expr: ExprRef,
        ty: TypeRef,
    },
    Cast {
        ty: TypeRef,
        expr: ExprRef,
    },
    /// `x \in s`
    Member {
        element: ExprRef,
        collection: ExprRef,
    },
    Quantified(QuantifiedExpr),
    Let {
        decls: Vec<LocalDecl>,
        body: ExprRef,
    },
    Match {
        scrutinee: ExprRef,
        arms: Vec<MatchArm>,
    },
    /// Slot `k` of a runtime form's argument array.
    Capture(usize),
}

/// A specification expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: ExprId,
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> ExprRef {
        Rc::new(Expr {
            id: ExprId::fresh(),
            span,
            kind,
        })
    }

    fn synth(kind: ExprKind) -> ExprRef {
        Expr::new(kind, Span::DUMMY)
    }

    pub fn bool(value: bool) -> ExprRef {
        Expr::synth(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn int(value: i64) -> ExprRef {
        Expr::synth(ExprKind::Literal(Literal::Int { value, long: false }))
    }

    pub fn real(value: f64) -> ExprRef {
        Expr::synth(ExprKind::Literal(Literal::Real(value)))
    }

    pub fn null() -> ExprRef {
        Expr::synth(ExprKind::Literal(Literal::Null))
    }

    pub fn ident(name: impl Into<String>) -> ExprRef {
        Expr::synth(ExprKind::Ident(name.into()))
    }

    pub fn this() -> ExprRef {
        Expr::synth(ExprKind::This)
    }

    pub fn result() -> ExprRef {
        Expr::synth(ExprKind::Result)
    }

    pub fn field(target: ExprRef, name: impl Into<String>) -> ExprRef {
        Expr::synth(ExprKind::Field {
            target,
            name: name.into(),
        })
    }

    pub fn index(target: ExprRef, index: ExprRef) -> ExprRef {
        Expr::synth(ExprKind::Index { target, index })
    }

    pub fn unary(op: UnaryOp, operand: ExprRef) -> ExprRef {
        Expr::synth(ExprKind::Unary { op, operand })
    }

    pub fn not(operand: ExprRef) -> ExprRef {
        Expr::unary(UnaryOp::Not, operand)
    }

    pub fn binary(op: BinaryOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Expr::synth(ExprKind::Binary { op, lhs, rhs })
    }

    pub fn and(lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Expr::binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Expr::binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn call(target: Option<ExprRef>, method: impl Into<String>, args: Vec<ExprRef>) -> ExprRef {
        Expr::synth(ExprKind::Call {
            target,
            method: method.into(),
            args,
        })
    }

    pub fn old(expr: ExprRef, label: Option<&str>) -> ExprRef {
        Expr::synth(ExprKind::Old {
            expr,
            label: label.map(str::to_string),
        })
    }

    pub fn quantified(
        op: QuantOp,
        decls: Vec<BoundVar>,
        range: Option<ExprRef>,
        value: ExprRef,
    ) -> ExprRef {
        Expr::synth(ExprKind::Quantified(QuantifiedExpr {
            op,
            decls,
            range,
            value,
            triggers: None,
        }))
    }

    pub fn member(element: ExprRef, collection: ExprRef) -> ExprRef {
        Expr::synth(ExprKind::Member {
            element,
            collection,
        })
    }

    pub fn capture(slot: usize) -> ExprRef {
        Expr::synth(ExprKind::Capture(slot))
    }

    /// Same node with a new position.
    pub fn at(self: &Rc<Self>, span: Span) -> ExprRef {
        Rc::new(Expr {
            id: self.id,
            span,
            kind: self.kind.clone(),
        })
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_bool_literal(&self) -> Option<bool> {
        match self.kind {
            ExprKind::Literal(Literal::Bool(b)) => Some(b),
            _ => None,
        }
    }

    /// Direct subexpressions, in evaluation order.
    pub fn children(&self) -> Vec<&ExprRef> {
        match &self.kind {
            ExprKind::Literal(_)
            | ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::Result
            | ExprKind::TypeLit(_)
            | ExprKind::Capture(_) => Vec::new(),
            ExprKind::Field { target, .. } => vec![target],
            ExprKind::Index { target, index } => vec![target, index],
            ExprKind::Unary { operand, .. } => vec![operand],
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => vec![cond, then_expr, else_expr],
            ExprKind::Call { target, args, .. } => target.iter().chain(args.iter()).collect(),
            ExprKind::Old { expr, .. }
            | ExprKind::Pre(expr)
            | ExprKind::Fresh(expr)
            | ExprKind::TypeOf(expr)
            | ExprKind::ElemType(expr)
            | ExprKind::InstanceOf { expr, .. }
            | ExprKind::Cast { expr, .. } => vec![expr],
            ExprKind::Member {
                element,
                collection,
            } => vec![element, collection],
            ExprKind::Quantified(q) => {
                let mut out: Vec<&ExprRef> = q.range.iter().collect();
                out.push(&q.value);
                if let Some(triggers) = &q.triggers {
                    out.extend(triggers.iter());
                }
                out
            }
            ExprKind::Let { decls, body } => {
                let mut out: Vec<&ExprRef> = decls.iter().filter_map(|d| d.init.as_ref()).collect();
                out.push(body);
                out
            }
            ExprKind::Match { scrutinee, arms } => {
                let mut out = vec![scrutinee];
                out.extend(arms.iter().map(|a| &a.body));
                out
            }
        }
    }

    /// Whether any identifier in `names` occurs free in this expression.
    ///
    /// `\let` initializers and a `match` scrutinee are outside the scope of
    /// the names they bind; only the let body and each arm body are inside.
    pub fn mentions_any(&self, names: &HashSet<String>) -> bool {
        if names.is_empty() {
            return false;
        }
        match &self.kind {
            ExprKind::Ident(name) => names.contains(name),
            ExprKind::Quantified(q) => {
                let inner = without(names, q.decls.iter().map(|d| d.name.as_str()));
                self.children().into_iter().any(|c| c.mentions_any(&inner))
            }
            ExprKind::Let { decls, body } => {
                decls
                    .iter()
                    .filter_map(|d| d.init.as_ref())
                    .any(|init| init.mentions_any(names))
                    || body.mentions_any(&without(names, decls.iter().map(|d| d.name.as_str())))
            }
            ExprKind::Match { scrutinee, arms } => {
                scrutinee.mentions_any(names)
                    || arms.iter().any(|arm| {
                        let inner = without(names, arm.bindings.iter().map(String::as_str));
                        arm.body.mentions_any(&inner)
                    })
            }
            _ => self.children().into_iter().any(|c| c.mentions_any(names)),
        }
    }

    /// Pre-order traversal over this node and all descendants.
    pub fn walk(&self, visit: &mut dyn FnMut(&Expr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

fn without<'a>(names: &HashSet<String>, bound: impl Iterator<Item = &'a str>) -> HashSet<String> {
    let mut narrowed = names.clone();
    for name in bound {
        narrowed.remove(name);
    }
    narrowed
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int { value, long: true } => write!(f, "{value}L"),
            Literal::Int { value, .. } => write!(f, "{value}"),
            Literal::Real(r) => write!(f, "{r:?}"),
            Literal::Char(c) => write!(f, "'{c}'"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Null => write!(f, "null"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(l) => write!(f, "{l}"),
            ExprKind::Ident(n) => write!(f, "{n}"),
            ExprKind::This => write!(f, "this"),
            ExprKind::Field { target, name } => write!(f, "{target}.{name}"),
            ExprKind::Index { target, index } => write!(f, "{target}[{index}]"),
            ExprKind::Unary { op, operand } => {
                let sym = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::BitNot => "~",
                };
                write!(f, "{sym}{operand}")
            }
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => write!(f, "({cond} ? {then_expr} : {else_expr})"),
            ExprKind::Call {
                target,
                method,
                args,
            } => {
                if let Some(t) = target {
                    write!(f, "{t}.")?;
                }
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{method}({})", args.join(", "))
            }
            ExprKind::Result => write!(f, "\\result"),
            ExprKind::Old { expr, label: None } => write!(f, "\\old({expr})"),
            ExprKind::Old {
                expr,
                label: Some(l),
            } => write!(f, "\\old({expr}, {l})"),
            ExprKind::Pre(e) => write!(f, "\\pre({e})"),
            ExprKind::Fresh(e) => write!(f, "\\fresh({e})"),
            ExprKind::TypeOf(e) => write!(f, "\\typeof({e})"),
            ExprKind::ElemType(e) => write!(f, "\\elemtype({e})"),
            ExprKind::TypeLit(t) => write!(f, "\\type({t})"),
            ExprKind::InstanceOf { expr, ty } => write!(f, "({expr} instanceof {ty})"),
            ExprKind::Cast { ty, expr } => write!(f, "(({ty}) {expr})"),
            ExprKind::Member {
                element,
                collection,
            } => write!(f, "({element} \\in {collection})"),
            ExprKind::Quantified(q) => {
                let decls: Vec<String> =
                    q.decls.iter().map(|d| format!("{} {}", d.ty, d.name)).collect();
                write!(f, "({} {}; ", q.op.keyword(), decls.join(", "))?;
                if let Some(r) = &q.range {
                    write!(f, "{r}; ")?;
                }
                write!(f, "{})", q.value)
            }
            ExprKind::Let { decls, body } => {
                let decls: Vec<String> = decls
                    .iter()
                    .map(|d| match &d.init {
                        Some(init) => format!("{} {} = {init}", d.ty, d.name),
                        None => format!("{} {}", d.ty, d.name),
                    })
                    .collect();
                write!(f, "(\\let {}; {body})", decls.join(", "))
            }
            ExprKind::Match { scrutinee, arms } => {
                write!(f, "match {scrutinee} {{")?;
                for arm in arms {
                    match &arm.constructor {
                        Some(c) => write!(f, " {c}({}) -> {};", arm.bindings.join(", "), arm.body)?,
                        None => write!(f, " _ -> {};", arm.body)?,
                    }
                }
                write!(f, " }}")
            }
            ExprKind::Capture(k) => write!(f, "$arg{k}"),
        }
    }
}
