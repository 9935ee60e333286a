//! Runtime forms of quantified expressions.
//!
//! A quantifier is executable when every bound variable ranges over a
//! finite domain recoverable from the range predicate. Synthesis is a
//! two-phase build: first a template is made in which each maximal
//! subexpression free of bound variables becomes a `Capture(k)` slot and
//! each bound variable becomes a fresh loop-local name; then the template
//! is attributed on its own, with the capture slots typed from the
//! already-attributed originals. The originals are kept by reference as
//! the form's argument list and evaluated once, outside the loops.
//!
//! A form carries the forms of quantifiers nested in its template and the
//! operand width of every shift it contains, so it can be run without the
//! attribution side tables. A template the interpreter cannot run (a
//! `match`, `\old`, or an ordinary method call over a bound variable)
//! yields no form.
//!
//! Any failure yields no form; callers treat that as "not executable".

mod bounds;
pub mod eval;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use specattr_core::ast::{
    BinaryOp, Expr, ExprId, ExprKind, ExprRef, LocalDecl, MatchArm, QuantOp, QuantifiedExpr,
};
use specattr_core::{IntKind, SpecType};

use crate::context::{AttrContext, Binding, BindingKind};
use crate::expr::Attributor;

pub use bounds::Domain;
pub use eval::{evaluate, evaluate_in, EvalError, Value};

/// One loop of a runtime form.
#[derive(Debug, Clone)]
pub struct RacLoop {
    /// Loop-local name substituted for the bound variable.
    pub var: String,
    /// The bound variable as written.
    pub source_name: String,
    pub ty: SpecType,
    pub domain: Domain,
}

/// How the loop body combines element results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Stop at the first element whose value equals `stop_on`.
    TruthSearch { stop_on: bool },
    Accumulate,
    Extremum,
}

#[derive(Debug, Clone)]
pub struct RacForm {
    pub op: QuantOp,
    /// Already-attributed free subexpressions; slot `k` is `Capture(k)`.
    pub captures: Vec<ExprRef>,
    /// Outermost first.
    pub loops: Vec<RacLoop>,
    /// Range predicate over loop variables and captures.
    pub guard: Option<ExprRef>,
    pub value: ExprRef,
    pub ty: SpecType,
    /// Forms of the quantifiers inside the template and the captures.
    pub nested: HashMap<ExprId, RacForm>,
    /// Bit width of each fixed-width shift; absent means `\bigint`.
    pub shift_widths: HashMap<ExprId, u32>,
}

impl RacForm {
    pub fn strategy(&self) -> Strategy {
        match self.op {
            QuantOp::Forall => Strategy::TruthSearch { stop_on: false },
            QuantOp::Exists => Strategy::TruthSearch { stop_on: true },
            QuantOp::NumOf | QuantOp::Sum | QuantOp::Product => Strategy::Accumulate,
            QuantOp::Max | QuantOp::Min => Strategy::Extremum,
        }
    }
}

impl fmt::Display for RacForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.captures.iter().map(ToString::to_string).collect();
        write!(f, "{} args[{}]", self.op.keyword(), args.join(", "))?;
        for l in &self.loops {
            write!(f, " for {} in {}", l.var, l.domain)?;
        }
        if let Some(guard) = &self.guard {
            write!(f, " if {guard}")?;
        }
        write!(f, " => {}", self.value)
    }
}

/// Build the runtime form of `q`, whose value has type `ty`. `cx` is the
/// quantifier's inner context, with its bound variables in scope.
pub fn synthesize(
    attr: &mut Attributor<'_>,
    q: &QuantifiedExpr,
    ty: &SpecType,
    cx: &AttrContext,
) -> Option<RacForm> {
    match try_synthesize(attr, q, ty, cx) {
        Ok(form) => {
            tracing::trace!(form = %form, "synthesized runtime form");
            Some(form)
        }
        Err(reason) => {
            tracing::debug!(op = q.op.keyword(), %reason, "quantifier has no runtime form");
            None
        }
    }
}

fn try_synthesize(
    attr: &mut Attributor<'_>,
    q: &QuantifiedExpr,
    ty: &SpecType,
    cx: &AttrContext,
) -> Result<RacForm, String> {
    let mut renames = HashMap::new();
    let mut loop_bindings = Vec::with_capacity(q.decls.len());
    for decl in &q.decls {
        let bound_ty = cx
            .lookup(&decl.name)
            .map(|b| b.ty.clone())
            .ok_or_else(|| format!("bound variable {} is not in scope", decl.name))?;
        let fresh = format!("{}${}", decl.name, ExprId::fresh().0);
        renames.insert(decl.name.clone(), fresh.clone());
        loop_bindings.push((fresh, Binding::new(bound_ty, BindingKind::Bound)));
    }

    let blocking: HashSet<String> = q.decls.iter().map(|d| d.name.clone()).collect();
    let mut templater = Templater::default();
    let guard = q.range.as_ref().map(|r| templater.go(r, &blocking, &renames));
    let value = templater.go(&q.value, &blocking, &renames);

    let loop_vars: Vec<String> = loop_bindings.iter().map(|(n, _)| n.clone()).collect();
    let mut domains = Vec::with_capacity(loop_vars.len());
    for (k, (var, binding)) in loop_bindings.iter().enumerate() {
        let inner: HashSet<String> = loop_vars[k..].iter().cloned().collect();
        let domain = bounds::find(var, &binding.ty, guard.as_ref(), &inner)
            .ok_or_else(|| format!("no finite domain for {}", q.decls[k].name))?;
        domains.push(domain);
    }

    let mut capture_types = Vec::with_capacity(templater.captures.len());
    for capture in &templater.captures {
        let t = attr
            .output()
            .type_of(capture.id)
            .cloned()
            .ok_or_else(|| format!("capture {capture} was not attributed"))?;
        capture_types.push(t);
    }
    let template_cx = cx.with_fresh_scope(loop_bindings.clone()).with_captures(capture_types);

    let check = |attr: &mut Attributor<'_>, e: &ExprRef, expected: Option<&SpecType>| {
        attr.attr_isolated(e, &template_cx, expected)
            .map_err(|err| err.to_string())
            .and_then(|ty| ty.ok_or_else(|| format!("template {e} does not attribute")))
    };
    if let Some(g) = &guard {
        check(attr, g, Some(&SpecType::Boolean))?;
    }
    check(attr, &value, None)?;
    for domain in &domains {
        match domain {
            Domain::Booleans => {}
            Domain::Elements(coll) => {
                check(attr, coll, None)?;
            }
            Domain::Interval { lo, hi, .. } => {
                for bound in [lo, hi] {
                    let t = check(attr, bound, None)?;
                    if !t.is_integral() {
                        return Err(format!("bound {bound} is not integral"));
                    }
                }
            }
        }
    }

    let templates: Vec<&ExprRef> = guard
        .iter()
        .chain(std::iter::once(&value))
        .chain(domains.iter().flat_map(Domain::exprs))
        .collect();
    for t in &templates {
        if let Some(bad) = eval::first_unsupported(t) {
            return Err(format!("{bad} cannot run at runtime"));
        }
    }
    let mut nested = HashMap::new();
    let mut shift_widths = HashMap::new();
    for t in &templates {
        collect_tables(attr, t, true, &mut nested, &mut shift_widths)?;
    }
    for c in &templater.captures {
        collect_tables(attr, c, false, &mut nested, &mut shift_widths)?;
    }

    // Built innermost first, from the last-declared variable outward.
    let mut loops = Vec::with_capacity(domains.len());
    for ((decl, (var, binding)), domain) in q.decls.iter().zip(loop_bindings).zip(domains).rev() {
        loops.insert(
            0,
            RacLoop {
                var,
                source_name: decl.name.clone(),
                ty: binding.ty,
                domain,
            },
        );
    }

    Ok(RacForm {
        op: q.op,
        captures: templater.captures,
        loops,
        guard,
        value,
        ty: ty.clone(),
        nested,
        shift_widths,
    })
}

/// Record the runtime forms of quantifiers and the widths of shifts under
/// `e`. A quantifier inside a template must have a form; one inside a
/// capture may not, since captures are normally supplied by the caller.
fn collect_tables(
    attr: &Attributor<'_>,
    e: &ExprRef,
    in_template: bool,
    nested: &mut HashMap<ExprId, RacForm>,
    shift_widths: &mut HashMap<ExprId, u32>,
) -> Result<(), String> {
    let mut missing = None;
    e.walk(&mut |node: &Expr| match &node.kind {
        ExprKind::Quantified(_) => match attr.output().rac_form(node.id) {
            Some(form) => {
                nested.insert(node.id, form.clone());
            }
            None if in_template && missing.is_none() => missing = Some(node.to_string()),
            None => {}
        },
        ExprKind::Binary {
            op: BinaryOp::Shl | BinaryOp::Shr,
            ..
        } => {
            let width = match attr.output().type_of(node.id) {
                Some(SpecType::Int(IntKind::Long)) => Some(64),
                Some(SpecType::Int(_)) => Some(32),
                _ => None,
            };
            if let Some(bits) = width {
                shift_widths.insert(node.id, bits);
            }
        }
        _ => {}
    });
    match missing {
        Some(q) => Err(format!("nested quantifier {q} has no runtime form")),
        None => Ok(()),
    }
}

/// Rewrites an expression into a template: bound variables renamed,
/// maximal bound-free subexpressions replaced by capture slots.
#[derive(Default)]
struct Templater {
    captures: Vec<ExprRef>,
}

impl Templater {
    fn capture(&mut self, e: &ExprRef) -> ExprRef {
        let slot = match self.captures.iter().position(|c| c.id == e.id) {
            Some(slot) => slot,
            None => {
                self.captures.push(Rc::clone(e));
                self.captures.len() - 1
            }
        };
        Expr::new(ExprKind::Capture(slot), e.span)
    }

    /// `blocking` holds every name bound between the quantifier and `e`;
    /// `renames` maps the quantifier's own variables not yet shadowed.
    fn go(
        &mut self,
        e: &ExprRef,
        blocking: &HashSet<String>,
        renames: &HashMap<String, String>,
    ) -> ExprRef {
        if !e.mentions_any(blocking) {
            return match e.kind {
                ExprKind::Literal(_) => Rc::clone(e),
                _ => self.capture(e),
            };
        }
        let kind = match &e.kind {
            ExprKind::Ident(name) => {
                ExprKind::Ident(renames.get(name).cloned().unwrap_or_else(|| name.clone()))
            }
            ExprKind::Field { target, name } => ExprKind::Field {
                target: self.go(target, blocking, renames),
                name: name.clone(),
            },
            ExprKind::Index { target, index } => ExprKind::Index {
                target: self.go(target, blocking, renames),
                index: self.go(index, blocking, renames),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: self.go(operand, blocking, renames),
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: self.go(lhs, blocking, renames),
                rhs: self.go(rhs, blocking, renames),
            },
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => ExprKind::Conditional {
                cond: self.go(cond, blocking, renames),
                then_expr: self.go(then_expr, blocking, renames),
                else_expr: self.go(else_expr, blocking, renames),
            },
            ExprKind::Call { target, method, args } => ExprKind::Call {
                target: target.as_ref().map(|t| self.go(t, blocking, renames)),
                method: method.clone(),
                args: args.iter().map(|a| self.go(a, blocking, renames)).collect(),
            },
            ExprKind::Old { expr, label } => ExprKind::Old {
                expr: self.go(expr, blocking, renames),
                label: label.clone(),
            },
            ExprKind::Pre(inner) => ExprKind::Pre(self.go(inner, blocking, renames)),
            ExprKind::Fresh(inner) => ExprKind::Fresh(self.go(inner, blocking, renames)),
            ExprKind::TypeOf(inner) => ExprKind::TypeOf(self.go(inner, blocking, renames)),
            ExprKind::ElemType(inner) => ExprKind::ElemType(self.go(inner, blocking, renames)),
            ExprKind::InstanceOf { expr, ty } => ExprKind::InstanceOf {
                expr: self.go(expr, blocking, renames),
                ty: ty.clone(),
            },
            ExprKind::Cast { ty, expr } => ExprKind::Cast {
                ty: ty.clone(),
                expr: self.go(expr, blocking, renames),
            },
            ExprKind::Member { element, collection } => ExprKind::Member {
                element: self.go(element, blocking, renames),
                collection: self.go(collection, blocking, renames),
            },
            ExprKind::Quantified(q) => {
                let names: Vec<&str> = q.decls.iter().map(|d| d.name.as_str()).collect();
                let (blocking, renames) = shadow(blocking, renames, &names);
                ExprKind::Quantified(QuantifiedExpr {
                    op: q.op,
                    decls: q.decls.clone(),
                    range: q.range.as_ref().map(|r| self.go(r, &blocking, &renames)),
                    value: self.go(&q.value, &blocking, &renames),
                    triggers: q
                        .triggers
                        .as_ref()
                        .map(|ts| ts.iter().map(|t| self.go(t, &blocking, &renames)).collect()),
                })
            }
            ExprKind::Let { decls, body } => {
                let decls: Vec<LocalDecl> = decls
                    .iter()
                    .map(|d| LocalDecl {
                        init: d.init.as_ref().map(|i| self.go(i, blocking, renames)),
                        ..d.clone()
                    })
                    .collect();
                let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
                let (inner_blocking, inner_renames) = shadow(blocking, renames, &names);
                let body = self.go(body, &inner_blocking, &inner_renames);
                ExprKind::Let { decls, body }
            }
            ExprKind::Match { scrutinee, arms } => {
                let scrutinee = self.go(scrutinee, blocking, renames);
                let arms = arms
                    .iter()
                    .map(|arm| {
                        let names: Vec<&str> = arm.bindings.iter().map(String::as_str).collect();
                        let (b, r) = shadow(blocking, renames, &names);
                        MatchArm {
                            body: self.go(&arm.body, &b, &r),
                            ..arm.clone()
                        }
                    })
                    .collect();
                ExprKind::Match { scrutinee, arms }
            }
            ExprKind::Literal(_)
            | ExprKind::This
            | ExprKind::Result
            | ExprKind::TypeLit(_)
            | ExprKind::Capture(_) => e.kind.clone(),
        };
        Expr::new(kind, e.span)
    }
}

fn shadow(
    blocking: &HashSet<String>,
    renames: &HashMap<String, String>,
    names: &[&str],
) -> (HashSet<String>, HashMap<String, String>) {
    let mut blocking = blocking.clone();
    let mut renames = renames.clone();
    for name in names {
        blocking.insert((*name).to_string());
        renames.remove(*name);
    }
    (blocking, renames)
}
