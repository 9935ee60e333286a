//! Reference interpreter for runtime forms.
//!
//! Integral values are mathematical integers (`num::BigInt`), so `\sum`,
//! `\product`, and `\num_of` never overflow; floating-point and `\real`
//! values are `f64`. Shifts are the exception: an `int` or `long` shift
//! masks its count and wraps its result to the operand width.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::ControlFlow;

use num::bigint::BigInt;
use num::traits::{One, ToPrimitive, Zero};
use num::Integer;
use thiserror::Error;

use specattr_core::ast::{BinaryOp, ExprId, ExprKind, ExprRef, Literal, QuantOp, UnaryOp};

use super::{Domain, RacForm, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(BigInt),
    Real(f64),
    Str(String),
    Null,
    Array(Vec<Value>),
    Set(Vec<Value>),
    Seq(Vec<Value>),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Int(BigInt::from(v))
    }

    pub fn int_array(values: &[i64]) -> Self {
        Value::Array(values.iter().map(|v| Value::int(*v)).collect())
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Set(_) => "set",
            Value::Seq(_) => "sequence",
        }
    }

    fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::type_error("boolean", other)),
        }
    }

    fn as_int(&self) -> Result<&BigInt, EvalError> {
        match self {
            Value::Int(n) => Ok(n),
            other => Err(EvalError::type_error("integer", other)),
        }
    }

    fn as_f64(&self) -> Result<f64, EvalError> {
        match self {
            Value::Int(n) => n.to_f64().ok_or_else(|| EvalError::type_error("finite number", self)),
            Value::Real(r) => Ok(*r),
            other => Err(EvalError::type_error("number", other)),
        }
    }

    fn elements(&self) -> Result<&[Value], EvalError> {
        match self {
            Value::Array(v) | Value::Set(v) | Value::Seq(v) => Ok(v),
            other => Err(EvalError::type_error("collection", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("not executable at runtime: {0}")]
    Unsupported(String),

    #[error("expected {expected}, found {found}")]
    Type { expected: &'static str, found: &'static str },

    #[error("unbound variable {0}")]
    Unbound(String),

    #[error("no argument for capture slot {0}")]
    MissingCapture(usize),

    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: BigInt, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0} over an empty range has no value")]
    Empty(&'static str),

    #[error("shift count {0} is out of range for \\bigint")]
    ShiftRange(BigInt),
}

/// Largest shift count accepted for an unbounded integer.
const MAX_BIGINT_SHIFT: usize = 1 << 16;

impl EvalError {
    fn type_error(expected: &'static str, found: &Value) -> Self {
        EvalError::Type {
            expected,
            found: found.kind(),
        }
    }
}

/// Evaluate `form` with `args[k]` bound to capture slot `k`.
pub fn evaluate(form: &RacForm, args: &[Value]) -> Result<Value, EvalError> {
    let mut run = Run {
        form,
        env: Env {
            base: None,
            locals: Vec::new(),
            args,
            form: Some(form),
        },
        acc: Acc::start(form),
    };
    run.loop_at(0)?;
    run.acc.finish(form.op)
}

/// Evaluate the captures of `form` against `vars`, then the form itself.
pub fn evaluate_in(form: &RacForm, vars: &HashMap<String, Value>) -> Result<Value, EvalError> {
    let outer = Env {
        base: Some(vars),
        locals: Vec::new(),
        args: &[],
        form: Some(form),
    };
    let args = form
        .captures
        .iter()
        .map(|c| eval_expr(c, &outer))
        .collect::<Result<Vec<_>, _>>()?;
    evaluate(form, &args)
}

struct Env<'v> {
    base: Option<&'v HashMap<String, Value>>,
    locals: Vec<(String, Value)>,
    args: &'v [Value],
    /// Form whose nested forms and shift widths apply.
    form: Option<&'v RacForm>,
}

impl<'v> Env<'v> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.base.and_then(|b| b.get(name)))
    }

    fn extended(&self, bindings: Vec<(String, Value)>) -> Env<'v> {
        let mut locals = self.locals.clone();
        locals.extend(bindings);
        Env {
            base: self.base,
            locals,
            args: self.args,
            form: self.form,
        }
    }

    fn nested(&self, id: ExprId) -> Option<&'v RacForm> {
        self.form.and_then(|f| f.nested.get(&id))
    }

    fn shift_width(&self, id: ExprId) -> Option<u32> {
        self.form.and_then(|f| f.shift_widths.get(&id).copied())
    }
}

enum Acc {
    Search { stop_on: bool, found: bool },
    Count(BigInt),
    Sum(Value),
    Product(Value),
    Extremum { max: bool, best: Option<Value> },
}

impl Acc {
    fn start(form: &RacForm) -> Self {
        let integral = form.ty.is_integral();
        let unit = |n: i64| {
            if integral {
                Value::int(n)
            } else {
                Value::Real(n as f64)
            }
        };
        match (form.strategy(), form.op) {
            (Strategy::TruthSearch { stop_on }, _) => Acc::Search { stop_on, found: false },
            (_, QuantOp::NumOf) => Acc::Count(BigInt::zero()),
            (_, QuantOp::Product) => Acc::Product(unit(1)),
            (_, QuantOp::Max) => Acc::Extremum { max: true, best: None },
            (_, QuantOp::Min) => Acc::Extremum { max: false, best: None },
            _ => Acc::Sum(unit(0)),
        }
    }

    fn step(&mut self, value: Value) -> Result<ControlFlow<()>, EvalError> {
        match self {
            Acc::Search { stop_on, found } => {
                if value.as_bool()? == *stop_on {
                    *found = true;
                    return Ok(ControlFlow::Break(()));
                }
            }
            Acc::Count(n) => {
                if value.as_bool()? {
                    *n += BigInt::one();
                }
            }
            Acc::Sum(total) => *total = arith(BinaryOp::Add, total, &value)?,
            Acc::Product(total) => *total = arith(BinaryOp::Mul, total, &value)?,
            Acc::Extremum { max, best } => {
                let replace = match best {
                    None => true,
                    Some(b) => {
                        let ord = compare(&value, b)?;
                        if *max {
                            ord == Ordering::Greater
                        } else {
                            ord == Ordering::Less
                        }
                    }
                };
                if replace {
                    *best = Some(value);
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn finish(self, op: QuantOp) -> Result<Value, EvalError> {
        match self {
            Acc::Search { stop_on, found } => {
                Ok(Value::Bool(if found { stop_on } else { !stop_on }))
            }
            Acc::Count(n) => Ok(Value::Int(n)),
            Acc::Sum(v) | Acc::Product(v) => Ok(v),
            Acc::Extremum { best, .. } => best.ok_or(EvalError::Empty(op.keyword())),
        }
    }
}

struct Run<'v> {
    form: &'v RacForm,
    env: Env<'v>,
    acc: Acc,
}

impl Run<'_> {
    fn loop_at(&mut self, depth: usize) -> Result<ControlFlow<()>, EvalError> {
        let Some(l) = self.form.loops.get(depth) else {
            return self.body();
        };
        match &l.domain {
            Domain::Booleans => {
                for b in [false, true] {
                    if self.visit(depth, &l.var, Value::Bool(b))?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
            Domain::Elements(coll) => {
                let items = eval_expr(coll, &self.env)?.elements()?.to_vec();
                for item in items {
                    if self.visit(depth, &l.var, item)?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
            Domain::Interval {
                lo,
                hi,
                lo_inclusive,
                hi_inclusive,
            } => {
                let mut i = eval_expr(lo, &self.env)?.as_int()?.clone();
                if !lo_inclusive {
                    i += BigInt::one();
                }
                let mut end = eval_expr(hi, &self.env)?.as_int()?.clone();
                if *hi_inclusive {
                    end += BigInt::one();
                }
                while i < end {
                    if self.visit(depth, &l.var, Value::Int(i.clone()))?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                    i += BigInt::one();
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn visit(
        &mut self,
        depth: usize,
        var: &str,
        value: Value,
    ) -> Result<ControlFlow<()>, EvalError> {
        self.env.locals.push((var.to_string(), value));
        let flow = self.loop_at(depth + 1);
        self.env.locals.pop();
        flow
    }

    fn body(&mut self) -> Result<ControlFlow<()>, EvalError> {
        if let Some(guard) = &self.form.guard {
            if !eval_expr(guard, &self.env)?.as_bool()? {
                return Ok(ControlFlow::Continue(()));
            }
        }
        let value = eval_expr(&self.form.value, &self.env)?;
        self.acc.step(value)
    }
}

fn eval_expr(e: &ExprRef, env: &Env<'_>) -> Result<Value, EvalError> {
    match &e.kind {
        ExprKind::Literal(lit) => Ok(match lit {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int { value, .. } => Value::int(*value),
            Literal::Real(r) => Value::Real(*r),
            Literal::Char(c) => Value::Int(BigInt::from(u32::from(*c))),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Null => Value::Null,
        }),
        ExprKind::Ident(name) => {
            env.lookup(name).cloned().ok_or_else(|| EvalError::Unbound(name.clone()))
        }
        ExprKind::Capture(k) => env.args.get(*k).cloned().ok_or(EvalError::MissingCapture(*k)),
        ExprKind::Unary { op, operand } => {
            let v = eval_expr(operand, env)?;
            match (op, v) {
                (UnaryOp::Not, v) => Ok(Value::Bool(!v.as_bool()?)),
                (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
                (UnaryOp::Neg, Value::Real(r)) => Ok(Value::Real(-r)),
                (UnaryOp::BitNot, Value::Int(n)) => Ok(Value::Int(!n)),
                (_, other) => Err(EvalError::type_error("number", &other)),
            }
        }
        ExprKind::Binary { op, lhs, rhs } => eval_binary(e.id, *op, lhs, rhs, env),
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            if eval_expr(cond, env)?.as_bool()? {
                eval_expr(then_expr, env)
            } else {
                eval_expr(else_expr, env)
            }
        }
        ExprKind::Index { target, index } => {
            let container = eval_expr(target, env)?;
            let index = eval_expr(index, env)?.as_int()?.clone();
            let items = match &container {
                Value::Array(v) | Value::Seq(v) => v,
                other => return Err(EvalError::type_error("array or sequence", other)),
            };
            index
                .to_usize()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(EvalError::OutOfBounds {
                    index,
                    len: items.len(),
                })
        }
        ExprKind::Field { target, name } if name == "length" => match eval_expr(target, env)? {
            Value::Array(v) => Ok(Value::Int(BigInt::from(v.len()))),
            other => Err(EvalError::type_error("array", &other)),
        },
        ExprKind::Member { element, collection } => contains(collection, element, env),
        ExprKind::Call {
            target: Some(coll),
            method,
            args,
        } if method == "contains" && args.len() == 1 => contains(coll, &args[0], env),
        ExprKind::Let { decls, body } => {
            let mut bindings = Vec::with_capacity(decls.len());
            for d in decls {
                let init = d
                    .init
                    .as_ref()
                    .ok_or_else(|| {
                        EvalError::Unsupported(format!("\\let {} without a value", d.name))
                    })?;
                bindings.push((d.name.clone(), eval_expr(init, env)?));
            }
            eval_expr(body, &env.extended(bindings))
        }
        ExprKind::Quantified(_) => {
            let form = env
                .nested(e.id)
                .ok_or_else(|| EvalError::Unsupported(e.to_string()))?;
            let args = form
                .captures
                .iter()
                .map(|c| eval_expr(c, env))
                .collect::<Result<Vec<_>, _>>()?;
            evaluate(form, &args)
        }
        _ => Err(EvalError::Unsupported(e.to_string())),
    }
}

/// First node under `e` that [`eval_expr`] cannot run. Nested quantifiers
/// are not entered; they run through their own forms.
pub(super) fn first_unsupported(e: &ExprRef) -> Option<&ExprRef> {
    let runnable = match &e.kind {
        ExprKind::Literal(_)
        | ExprKind::Ident(_)
        | ExprKind::Capture(_)
        | ExprKind::Quantified(_) => return None,
        ExprKind::Unary { .. }
        | ExprKind::Conditional { .. }
        | ExprKind::Index { .. }
        | ExprKind::Member { .. } => true,
        ExprKind::Binary { op, .. } => *op != BinaryOp::Subtype,
        ExprKind::Field { name, .. } => name == "length",
        ExprKind::Call {
            target: Some(_),
            method,
            args,
        } => method == "contains" && args.len() == 1,
        ExprKind::Let { decls, .. } => decls.iter().all(|d| d.init.is_some()),
        _ => false,
    };
    if !runnable {
        return Some(e);
    }
    e.children().into_iter().find_map(first_unsupported)
}

fn contains(collection: &ExprRef, element: &ExprRef, env: &Env<'_>) -> Result<Value, EvalError> {
    let coll = eval_expr(collection, env)?;
    let x = eval_expr(element, env)?;
    let mut found = false;
    for item in coll.elements()? {
        if equal(item, &x)? {
            found = true;
            break;
        }
    }
    Ok(Value::Bool(found))
}

fn eval_binary(
    id: ExprId,
    op: BinaryOp,
    lhs: &ExprRef,
    rhs: &ExprRef,
    env: &Env<'_>,
) -> Result<Value, EvalError> {
    let boolean = |e: &ExprRef| eval_expr(e, env)?.as_bool();
    match op {
        BinaryOp::And => return Ok(Value::Bool(boolean(lhs)? && boolean(rhs)?)),
        BinaryOp::Or => return Ok(Value::Bool(boolean(lhs)? || boolean(rhs)?)),
        BinaryOp::Implies => return Ok(Value::Bool(!boolean(lhs)? || boolean(rhs)?)),
        BinaryOp::RevImplies => return Ok(Value::Bool(boolean(lhs)? || !boolean(rhs)?)),
        _ => {}
    }
    let a = eval_expr(lhs, env)?;
    let b = eval_expr(rhs, env)?;
    match op {
        BinaryOp::Equiv => Ok(Value::Bool(a.as_bool()? == b.as_bool()?)),
        BinaryOp::Inequiv => Ok(Value::Bool(a.as_bool()? != b.as_bool()?)),
        BinaryOp::Eq => Ok(Value::Bool(equal(&a, &b)?)),
        BinaryOp::Ne => Ok(Value::Bool(!equal(&a, &b)?)),
        BinaryOp::Lt => Ok(Value::Bool(compare(&a, &b)? == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(&a, &b)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(&a, &b)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(&a, &b)? != Ordering::Less)),
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => match (&a, &b) {
            (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(match op {
                BinaryOp::BitAnd => x & y,
                BinaryOp::BitOr => x | y,
                _ => x ^ y,
            })),
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(match op {
                BinaryOp::BitAnd => x & y,
                BinaryOp::BitOr => x | y,
                _ => x ^ y,
            })),
            _ => Err(EvalError::type_error("integers or booleans", &a)),
        },
        BinaryOp::Shl | BinaryOp::Shr => {
            shift(op, a.as_int()?, b.as_int()?, env.shift_width(id)).map(Value::Int)
        }
        BinaryOp::Subtype => Err(EvalError::Unsupported("<: at runtime".to_string())),
        _ => arith(op, &a, &b),
    }
}

/// `x << count` or `x >> count`. With a width, the count is masked to
/// `width - 1` and the result wrapped to a two's-complement value of that
/// width; without one, the count must be a modest non-negative integer.
fn shift(
    op: BinaryOp,
    x: &BigInt,
    count: &BigInt,
    width: Option<u32>,
) -> Result<BigInt, EvalError> {
    let (x, count) = match width {
        Some(bits) => {
            let mask = BigInt::from(bits - 1);
            let count = (count & &mask).to_usize().unwrap_or_default();
            (wrap(x.clone(), bits), count)
        }
        None => {
            let count = count
                .to_usize()
                .filter(|c| *c <= MAX_BIGINT_SHIFT)
                .ok_or_else(|| EvalError::ShiftRange(count.clone()))?;
            (x.clone(), count)
        }
    };
    let shifted = if op == BinaryOp::Shl { x << count } else { x >> count };
    Ok(match width {
        Some(bits) => wrap(shifted, bits),
        None => shifted,
    })
}

fn wrap(v: BigInt, bits: u32) -> BigInt {
    let modulus = BigInt::one() << bits as usize;
    let v = v.mod_floor(&modulus);
    if v >= (&modulus >> 1usize) {
        v - modulus
    } else {
        v
    }
}

fn arith(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Str(x), y) if op == BinaryOp::Add => Ok(Value::Str(format!("{x}{}", display(y)))),
        (x, Value::Str(y)) if op == BinaryOp::Add => Ok(Value::Str(format!("{}{y}", display(x)))),
        (Value::Int(x), Value::Int(y)) => {
            if matches!(op, BinaryOp::Div | BinaryOp::Rem) && y.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Int(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                BinaryOp::Rem => x % y,
                other => return Err(EvalError::Unsupported(other.symbol().to_string())),
            }))
        }
        _ => {
            let (x, y) = (a.as_f64()?, b.as_f64()?);
            Ok(Value::Real(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                BinaryOp::Rem => x % y,
                other => return Err(EvalError::Unsupported(other.symbol().to_string())),
            }))
        }
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Str(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.kind().to_string(),
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, EvalError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        _ => {
            let (x, y) = (a.as_f64()?, b.as_f64()?);
            x.partial_cmp(&y)
                .ok_or_else(|| EvalError::Unsupported("comparison with NaN".to_string()))
        }
    }
}

fn equal(a: &Value, b: &Value) -> Result<bool, EvalError> {
    match (a, b) {
        (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
            Ok(compare(a, b)? == Ordering::Equal)
        }
        _ => Ok(a == b),
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use specattr_core::ast::{Expr, LocalDecl};
    use specattr_core::{Span, SpecType, TypeRef};

    use super::*;
    use crate::rac::RacLoop;

    fn interval(lo: i64, hi: i64, hi_inclusive: bool) -> Domain {
        Domain::Interval {
            lo: Expr::int(lo),
            hi: Expr::int(hi),
            lo_inclusive: true,
            hi_inclusive,
        }
    }

    fn form(op: QuantOp, domain: Domain, value: ExprRef, ty: SpecType) -> RacForm {
        RacForm {
            op,
            captures: vec![Expr::ident("a")],
            loops: vec![RacLoop {
                var: "i".into(),
                source_name: "i".into(),
                ty: SpecType::int(),
                domain,
            }],
            guard: None,
            value,
            ty,
            nested: HashMap::new(),
            shift_widths: HashMap::new(),
        }
    }

    fn positive_at_i() -> ExprRef {
        Expr::binary(BinaryOp::Gt, Expr::index(Expr::capture(0), Expr::ident("i")), Expr::int(0))
    }

    #[test]
    fn forall_stops_at_first_counterexample() {
        let f = form(QuantOp::Forall, interval(0, 10, false), positive_at_i(), SpecType::Boolean);
        // Index 4 would be out of bounds; the search must stop at index 2.
        assert_eq!(evaluate(&f, &[Value::int_array(&[1, 2, 0, 4])]), Ok(Value::Bool(false)));
    }

    #[test]
    fn forall_holds_when_no_counterexample() {
        let f = form(QuantOp::Forall, interval(0, 2, true), positive_at_i(), SpecType::Boolean);
        assert_eq!(evaluate(&f, &[Value::int_array(&[1, 2, 3])]), Ok(Value::Bool(true)));
    }

    #[test]
    fn exists_finds_witness() {
        let f = form(QuantOp::Exists, interval(0, 3, false), positive_at_i(), SpecType::Boolean);
        assert_eq!(evaluate(&f, &[Value::int_array(&[0, 0, 5])]), Ok(Value::Bool(true)));
        assert_eq!(evaluate(&f, &[Value::int_array(&[0, 0, 0])]), Ok(Value::Bool(false)));
    }

    #[test]
    fn sum_and_num_of_accumulate() {
        let square = Expr::binary(BinaryOp::Mul, Expr::ident("i"), Expr::ident("i"));
        let sum = form(QuantOp::Sum, interval(1, 4, true), square, SpecType::int());
        assert_eq!(evaluate(&sum, &[Value::Null]), Ok(Value::int(30)));

        let count = form(QuantOp::NumOf, interval(0, 4, false), positive_at_i(), SpecType::BigInt);
        assert_eq!(evaluate(&count, &[Value::int_array(&[3, 0, 1, 0])]), Ok(Value::int(2)));
    }

    #[test]
    fn product_does_not_overflow() {
        let f = form(QuantOp::Product, interval(1, 30, true), Expr::ident("i"), SpecType::long());
        let Ok(Value::Int(n)) = evaluate(&f, &[Value::Null]) else {
            panic!("expected an integer");
        };
        assert_eq!(n.to_string(), "265252859812191058636308480000000");
    }

    #[test]
    fn extremum_of_empty_range_is_an_error() {
        let f = form(QuantOp::Max, interval(5, 5, false), Expr::ident("i"), SpecType::int());
        assert_eq!(evaluate(&f, &[Value::Null]), Err(EvalError::Empty("\\max")));
        let g = form(QuantOp::Min, interval(2, 5, false), Expr::ident("i"), SpecType::int());
        assert_eq!(evaluate(&g, &[Value::Null]), Ok(Value::int(2)));
    }

    #[test]
    fn int_shifts_mask_the_count_and_wrap() {
        let one_shl = |count: i64| {
            Expr::binary(BinaryOp::Shl, Expr::int(1), Expr::int(count))
        };
        let run = |e: ExprRef, bits: Option<u32>| {
            let mut f = form(QuantOp::Sum, interval(0, 0, true), e.clone(), SpecType::int());
            if let Some(bits) = bits {
                f.shift_widths.insert(e.id, bits);
            }
            evaluate(&f, &[Value::Null])
        };
        assert_eq!(run(one_shl(33), Some(32)), Ok(Value::int(2)));
        assert_eq!(run(one_shl(31), Some(32)), Ok(Value::int(i64::from(i32::MIN))));
        // -1 & 31 == 31
        assert_eq!(run(one_shl(-1), Some(32)), Ok(Value::int(i64::from(i32::MIN))));
        assert_eq!(run(one_shl(65), Some(64)), Ok(Value::int(2)));
        assert_eq!(run(one_shl(33), None), Ok(Value::int(1 << 33)));

        let neg_shr = Expr::binary(BinaryOp::Shr, Expr::int(-8), Expr::int(34));
        assert_eq!(run(neg_shr, Some(32)), Ok(Value::int(-2)));
    }

    #[test]
    fn unbounded_shift_rejects_huge_or_negative_counts() {
        let shl = |count: Value| {
            let e = Expr::binary(BinaryOp::Shl, Expr::int(1), Expr::capture(0));
            let f = form(QuantOp::Sum, interval(0, 0, true), e, SpecType::BigInt);
            evaluate(&f, &[count])
        };
        assert_eq!(
            shl(Value::int(i64::from(i32::MAX))),
            Err(EvalError::ShiftRange(BigInt::from(i32::MAX)))
        );
        assert_eq!(shl(Value::int(-1)), Err(EvalError::ShiftRange(BigInt::from(-1))));
    }

    #[test]
    fn let_binds_over_its_body() {
        // (\let int k = i - 1; k >= 0) over i in [0, 3)
        let body = Expr::new(
            ExprKind::Let {
                decls: vec![LocalDecl::new(
                    "k",
                    TypeRef::int(),
                    Some(Expr::binary(BinaryOp::Sub, Expr::ident("i"), Expr::int(1))),
                )],
                body: Expr::binary(BinaryOp::Ge, Expr::ident("k"), Expr::int(0)),
            },
            Span::DUMMY,
        );
        let f = form(QuantOp::NumOf, interval(0, 3, false), body, SpecType::BigInt);
        assert_eq!(evaluate(&f, &[Value::Null]), Ok(Value::int(2)));
    }

    #[test]
    fn unrunnable_nodes_are_found() {
        let old = Expr::old(Expr::ident("i"), None);
        let e = Expr::and(Expr::bool(true), old.clone());
        assert!(first_unsupported(&e).is_some_and(|bad| Rc::ptr_eq(bad, &old)));
        assert!(first_unsupported(&Expr::field(Expr::ident("a"), "length")).is_none());
        assert!(first_unsupported(&Expr::field(Expr::ident("a"), "size")).is_some());
        let call = Expr::call(Some(Expr::ident("s")), "contains", vec![Expr::ident("i")]);
        assert!(first_unsupported(&call).is_none());
    }

    #[test]
    fn captures_are_evaluated_from_vars() {
        let f = form(QuantOp::Forall, interval(0, 3, false), positive_at_i(), SpecType::Boolean);
        let vars = HashMap::from([("a".to_string(), Value::int_array(&[4, 5, 6]))]);
        assert_eq!(evaluate_in(&f, &vars), Ok(Value::Bool(true)));
        assert_eq!(evaluate(&f, &[]), Err(EvalError::MissingCapture(0)));
    }
}
