//! Attribution of specification expressions.
//!
//! [`Attributor`] type-checks expressions over the specification type
//! lattice, resolves names through the host's [`SymbolTable`], and checks
//! the specification-only rules: pseudo-identifier legality per clause
//! kind, visibility against the clause, datagroup secrecy, and purity of
//! calls. Types and resolved symbols land in an [`AttrOutput`] keyed by
//! expression id; user defects become diagnostics and attribution carries
//! on with [`SpecType::Error`]. Only collaborator failures are returned as
//! `Err`.

mod clauses;
mod quantified;

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use specattr_core::ast::{BinaryOp, Clause, ExprId, ExprKind, ExprRef, Literal, MatchArm, UnaryOp};
use specattr_core::{
    codes, Category, Decl, DeclId, Diagnostic, Diagnostics, HostError, Span, SpecType, SymbolTable,
    TypeRef, TypeRefKind, Visibility,
};

use crate::config::{AttrConfig, PurityCheck};
use crate::context::{AttrContext, Binding, BindingKind};
use crate::datagroup::{Access, DataGroups};
use crate::lattice;
use crate::rac::RacForm;

/// Side tables produced by attribution.
#[derive(Debug, Clone, Default)]
pub struct AttrOutput {
    pub types: HashMap<ExprId, SpecType>,
    /// Declarations that identifiers, field accesses, and calls resolved to.
    pub symbols: HashMap<ExprId, DeclId>,
    /// Runtime forms of quantified expressions, when synthesized.
    pub rac_forms: HashMap<ExprId, RacForm>,
}

impl AttrOutput {
    pub fn type_of(&self, id: ExprId) -> Option<&SpecType> {
        self.types.get(&id)
    }

    pub fn rac_form(&self, id: ExprId) -> Option<&RacForm> {
        self.rac_forms.get(&id)
    }
}

pub struct Attributor<'a> {
    symbols: &'a dyn SymbolTable,
    config: &'a AttrConfig,
    groups: &'a DataGroups,
    out: &'a mut AttrOutput,
    diags: &'a mut Diagnostics,
    /// Declaration whose specifications are being attributed.
    owner: DeclId,
    /// Clauses already attributed, per scope they were attributed under.
    seen: HashMap<*const Clause, Vec<SeenClause>>,
}

/// A clause attributed under one scope, with the bindings it introduced.
struct SeenClause {
    visibility: Visibility,
    locals: IndexMap<String, Binding>,
    introduced: Vec<(String, Binding)>,
}

impl<'a> Attributor<'a> {
    pub fn new(
        symbols: &'a dyn SymbolTable,
        config: &'a AttrConfig,
        groups: &'a DataGroups,
        out: &'a mut AttrOutput,
        diags: &'a mut Diagnostics,
        owner: DeclId,
    ) -> Self {
        Self {
            symbols,
            config,
            groups,
            out,
            diags,
            owner,
            seen: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AttrConfig {
        self.config
    }

    pub(crate) fn symbols(&self) -> &'a dyn SymbolTable {
        self.symbols
    }

    pub(crate) fn output(&self) -> &AttrOutput {
        self.out
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diags.push(diagnostic.in_decl(self.owner));
    }

    fn type_error(&mut self, code: &'static str, span: Span, message: impl Into<String>) {
        self.report(Diagnostic::error(Category::Type, code, message).at(span));
    }

    fn decl_name(&self, id: DeclId) -> String {
        self.symbols
            .decl(id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Attribute `expr` and check it against `expected`.
    pub fn attr_expr(
        &mut self,
        expr: &ExprRef,
        cx: &AttrContext,
        expected: Option<&SpecType>,
    ) -> Result<SpecType, HostError> {
        let ty = self.attr_kind(expr, cx)?;
        if let Some(want) = expected {
            if !self.assignable(&ty, want) {
                self.type_error(
                    codes::TYPE_MISMATCH,
                    expr.span,
                    format!("expected {want}, found {ty} in {expr}"),
                );
                self.out.types.insert(expr.id, SpecType::Error);
                return Ok(SpecType::Error);
            }
        }
        self.out.types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    /// Attribute `expr` against scratch diagnostics, keeping none of them.
    /// Returns `None` if any error was found.
    pub(crate) fn attr_isolated(
        &mut self,
        expr: &ExprRef,
        cx: &AttrContext,
        expected: Option<&SpecType>,
    ) -> Result<Option<SpecType>, HostError> {
        let saved = std::mem::take(self.diags);
        let result = self.attr_expr(expr, cx, expected);
        let scratch = std::mem::replace(self.diags, saved);
        let ty = result?;
        if scratch.has_errors() || ty.is_error() {
            Ok(None)
        } else {
            Ok(Some(ty))
        }
    }

    fn attr_kind(&mut self, expr: &ExprRef, cx: &AttrContext) -> Result<SpecType, HostError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(lit) => self.attr_literal(lit, span),
            ExprKind::Ident(name) => self.attr_ident(expr.id, name, span, cx),
            ExprKind::This => {
                if cx.is_static {
                    self.type_error(
                        codes::BAD_PSEUDO_IDENT,
                        span,
                        "this is not available in a static context",
                    );
                    return Ok(SpecType::Error);
                }
                self.type_of_decl(cx.class)
            }
            ExprKind::Field { target, name } => self.attr_field(expr.id, target, name, span, cx),
            ExprKind::Index { target, index } => {
                let container = self.attr_expr(target, cx, None)?;
                let index_ty = self.attr_expr(index, cx, None)?;
                if !index_ty.is_error() && !index_ty.is_integral() {
                    self.type_error(
                        codes::BAD_OPERAND,
                        index.span,
                        format!("index must be integral, found {index_ty}"),
                    );
                }
                match &container {
                    SpecType::Array(e) | SpecType::Seq(e) => Ok((**e).clone()),
                    SpecType::Error => Ok(SpecType::Error),
                    other => {
                        self.type_error(
                            codes::BAD_OPERAND,
                            span,
                            format!("cannot index a value of type {other}"),
                        );
                        Ok(SpecType::Error)
                    }
                }
            }
            ExprKind::Unary { op, operand } => self.attr_unary(*op, operand, span, cx),
            ExprKind::Binary { op, lhs, rhs } => self.attr_binary(*op, lhs, rhs, span, cx),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.attr_expr(cond, cx, Some(&SpecType::Boolean))?;
                let a = self.attr_expr(then_expr, cx, None)?;
                let b = self.attr_expr(else_expr, cx, None)?;
                match self.unify(&a, &b) {
                    Some(t) => Ok(t),
                    None => {
                        self.type_error(
                            codes::TYPE_MISMATCH,
                            span,
                            format!("conditional branches have incompatible types {a} and {b}"),
                        );
                        Ok(SpecType::Error)
                    }
                }
            }
            ExprKind::Call { target, method, args } => {
                self.attr_call(expr.id, target.as_ref(), method, args, span, cx)
            }
            ExprKind::Result => self.attr_result(span, cx),
            ExprKind::Old { expr: inner, label } => {
                self.attr_old(inner, label.as_deref(), span, cx)
            }
            ExprKind::Pre(inner) => {
                if !self.old_allowed(cx) {
                    self.pseudo_error("\\pre", span, cx);
                    return Ok(SpecType::Error);
                }
                self.attr_expr(inner, cx, None)
            }
            ExprKind::Fresh(inner) => {
                if !self.old_allowed(cx) {
                    self.pseudo_error("\\fresh", span, cx);
                    return Ok(SpecType::Error);
                }
                let ty = self.attr_expr(inner, cx, None)?;
                if !ty.is_error() && !ty.is_reference() {
                    self.type_error(
                        codes::BAD_OPERAND,
                        inner.span,
                        format!("\\fresh needs a reference, found {ty}"),
                    );
                }
                Ok(SpecType::Boolean)
            }
            ExprKind::TypeOf(inner) => {
                self.attr_expr(inner, cx, None)?;
                Ok(SpecType::TypeOfType)
            }
            ExprKind::ElemType(inner) => {
                self.attr_expr(inner, cx, Some(&SpecType::TypeOfType))?;
                Ok(SpecType::TypeOfType)
            }
            ExprKind::TypeLit(ty) => {
                self.resolve_type(ty)?;
                Ok(SpecType::TypeOfType)
            }
            ExprKind::InstanceOf { expr: inner, ty } => {
                let value = self.attr_expr(inner, cx, None)?;
                let target = self.resolve_type(ty)?;
                if !value.is_error() && !value.is_reference() {
                    self.type_error(
                        codes::BAD_OPERAND,
                        inner.span,
                        format!("instanceof needs a reference, found {value}"),
                    );
                }
                if !target.is_error() && !target.is_reference() {
                    self.type_error(
                        codes::BAD_OPERAND,
                        ty.span,
                        format!("instanceof needs a reference type, found {target}"),
                    );
                }
                Ok(SpecType::Boolean)
            }
            ExprKind::Cast { ty, expr: inner } => {
                let target = self.resolve_type(ty)?;
                let value = self.attr_expr(inner, cx, None)?;
                if target.is_error() || value.is_error() {
                    return Ok(target);
                }
                let ok = (target.is_numeric() && value.is_numeric())
                    || (target.is_object_like() && value.is_object_like())
                    || target == value;
                if !ok {
                    self.type_error(
                        codes::TYPE_MISMATCH,
                        span,
                        format!("cannot cast {value} to {target}"),
                    );
                    return Ok(SpecType::Error);
                }
                Ok(target)
            }
            ExprKind::Member { element, collection } => {
                self.attr_member(element, collection, span, cx)
            }
            ExprKind::Quantified(q) => self.attr_quantified(expr, q, cx),
            ExprKind::Let { decls, body } => {
                let mut bindings = Vec::with_capacity(decls.len());
                for decl in decls {
                    let ty = self.resolve_type(&decl.ty)?;
                    if let Some(init) = &decl.init {
                        self.attr_expr(init, cx, Some(&ty))?;
                    }
                    bindings.push((decl.name.clone(), Binding::new(ty, BindingKind::Let)));
                }
                let inner = cx.bind_all(bindings);
                self.attr_expr(body, &inner, None)
            }
            ExprKind::Match { scrutinee, arms } => self.attr_match(scrutinee, arms, span, cx),
            ExprKind::Capture(slot) => match cx.captures.get(*slot) {
                Some(ty) => Ok(ty.clone()),
                None => {
                    let message = format!("capture slot {slot} has no recorded type");
                    self.report(Diagnostic::internal(message).at(span));
                    Ok(SpecType::Error)
                }
            },
        }
    }

    fn attr_literal(&mut self, lit: &Literal, span: Span) -> Result<SpecType, HostError> {
        Ok(match lit {
            Literal::Bool(_) => SpecType::Boolean,
            Literal::Int { long: true, .. } => SpecType::long(),
            Literal::Int { .. } => SpecType::int(),
            Literal::Real(_) => SpecType::Double,
            Literal::Char(_) => SpecType::Int(specattr_core::IntKind::Char),
            Literal::Null => SpecType::Null,
            Literal::Str(_) => match self.symbols.lookup_type("String")? {
                Some(id) => self.type_of_decl(id)?,
                None => {
                    self.type_error(codes::UNRESOLVED, span, "type String is not available");
                    SpecType::Error
                }
            },
        })
    }

    /// Resolve a bare identifier: locals and bound variables first, then
    /// fields of the enclosing type.
    fn attr_ident(
        &mut self,
        id: ExprId,
        name: &str,
        span: Span,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        if let Some(binding) = cx.lookup(name) {
            if let Some(decl) = binding.decl {
                self.out.symbols.insert(id, decl);
            }
            return Ok(binding.ty.clone());
        }
        match self.symbols.lookup_field(cx.class, name)? {
            Some(field) => {
                if cx.is_static && !self.decl(field)?.modifiers.is_static {
                    self.type_error(
                        codes::UNRESOLVED,
                        span,
                        format!(
                            "non-static field {name} cannot be referenced from a static context"
                        ),
                    );
                    return Ok(SpecType::Error);
                }
                self.out.symbols.insert(id, field);
                self.check_symbol(field, span, cx, Access::Read)?;
                self.field_type(field)
            }
            None => {
                self.type_error(codes::UNRESOLVED, span, format!("cannot resolve symbol {name}"));
                Ok(SpecType::Error)
            }
        }
    }

    fn attr_field(
        &mut self,
        id: ExprId,
        target: &ExprRef,
        name: &str,
        span: Span,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        if let Some(owner) = self.static_target(target, cx)? {
            return self.select_field(id, owner, name, span, cx, true);
        }
        let target_ty = self.attr_expr(target, cx, None)?;
        match &target_ty {
            SpecType::Array(_) if name == "length" => Ok(SpecType::int()),
            SpecType::Class { decl, .. } => self.select_field(id, *decl, name, span, cx, false),
            SpecType::Error => Ok(SpecType::Error),
            other => {
                self.type_error(codes::BAD_OPERAND, span, format!("{other} has no field {name}"));
                Ok(SpecType::Error)
            }
        }
    }

    fn select_field(
        &mut self,
        id: ExprId,
        owner: DeclId,
        name: &str,
        span: Span,
        cx: &AttrContext,
        require_static: bool,
    ) -> Result<SpecType, HostError> {
        let Some(field) = self.symbols.lookup_field(owner, name)? else {
            let owner_name = self.decl_name(owner);
            self.type_error(codes::UNRESOLVED, span, format!("{owner_name} has no field {name}"));
            return Ok(SpecType::Error);
        };
        if require_static && !self.decl(field)?.modifiers.is_static {
            self.type_error(
                codes::UNRESOLVED,
                span,
                format!("non-static field {name} cannot be referenced through a type"),
            );
            return Ok(SpecType::Error);
        }
        self.out.symbols.insert(id, field);
        self.check_symbol(field, span, cx, Access::Read)?;
        self.field_type(field)
    }

    /// A target that names a type rather than a value, as in `Type.f`.
    fn static_target(
        &mut self,
        target: &ExprRef,
        cx: &AttrContext,
    ) -> Result<Option<DeclId>, HostError> {
        let Some(name) = target.as_ident() else {
            return Ok(None);
        };
        if cx.lookup(name).is_some() || self.symbols.lookup_field(cx.class, name)?.is_some() {
            return Ok(None);
        }
        let ty = self.symbols.lookup_type(name)?;
        if ty.is_some() {
            self.out.types.insert(target.id, SpecType::TypeOfType);
        }
        Ok(ty)
    }

    fn attr_unary(
        &mut self,
        op: UnaryOp,
        operand: &ExprRef,
        span: Span,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        if op == UnaryOp::Not {
            self.attr_expr(operand, cx, Some(&SpecType::Boolean))?;
            return Ok(SpecType::Boolean);
        }
        let ty = self.attr_expr(operand, cx, None)?;
        if ty.is_error() {
            return Ok(ty);
        }
        let promoted = match op {
            UnaryOp::Neg => ty.unary_promoted(),
            UnaryOp::BitNot if ty.is_integral() => ty.unary_promoted(),
            _ => None,
        };
        match promoted {
            Some(t) => Ok(t),
            None => {
                let sym = if op == UnaryOp::Neg { "-" } else { "~" };
                self.type_error(
                    codes::BAD_OPERAND,
                    span,
                    format!("operator {sym} cannot be applied to {ty}"),
                );
                Ok(SpecType::Error)
            }
        }
    }

    fn attr_binary(
        &mut self,
        op: BinaryOp,
        lhs: &ExprRef,
        rhs: &ExprRef,
        span: Span,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        if op.is_logical() {
            self.attr_expr(lhs, cx, Some(&SpecType::Boolean))?;
            self.attr_expr(rhs, cx, Some(&SpecType::Boolean))?;
            return Ok(SpecType::Boolean);
        }
        let a = self.attr_expr(lhs, cx, None)?;
        let b = self.attr_expr(rhs, cx, None)?;
        if a.is_error() || b.is_error() {
            let boolean = op.is_comparison()
                || matches!(op, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Subtype);
            return Ok(if boolean { SpecType::Boolean } else { SpecType::Error });
        }
        let result = match op {
            BinaryOp::Add if self.is_string(&a) => Some(a.clone()),
            BinaryOp::Add if self.is_string(&b) => Some(b.clone()),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                a.binary_promoted(&b)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                a.binary_promoted(&b).map(|_| SpecType::Boolean)
            }
            BinaryOp::Eq | BinaryOp::Ne => self.comparable(&a, &b).then_some(SpecType::Boolean),
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if a.is_boolean() && b.is_boolean() {
                    Some(SpecType::Boolean)
                } else if a.is_integral() && b.is_integral() {
                    a.binary_promoted(&b)
                } else {
                    None
                }
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                if a.is_integral() && b.is_integral() {
                    a.unary_promoted()
                } else {
                    None
                }
            }
            BinaryOp::Subtype => {
                let types = a == SpecType::TypeOfType && b == SpecType::TypeOfType;
                types.then_some(SpecType::Boolean)
            }
            BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Implies
            | BinaryOp::RevImplies
            | BinaryOp::Equiv
            | BinaryOp::Inequiv => Some(SpecType::Boolean),
        };
        match result {
            Some(t) => Ok(t),
            None => {
                self.type_error(
                    codes::BAD_OPERAND,
                    span,
                    format!("operator {} cannot be applied to {a} and {b}", op.symbol()),
                );
                Ok(SpecType::Error)
            }
        }
    }

    fn attr_call(
        &mut self,
        id: ExprId,
        target: Option<&ExprRef>,
        name: &str,
        args: &[ExprRef],
        span: Span,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        let (owner, through_type) = match target {
            None => (Some(cx.class), false),
            Some(t) => match self.static_target(t, cx)? {
                Some(owner) => (Some(owner), true),
                None => {
                    let receiver = self.attr_expr(t, cx, None)?;
                    match &receiver {
                        SpecType::Set(elem) | SpecType::Seq(elem)
                            if name == "contains" && args.len() == 1 =>
                        {
                            let elem = (**elem).clone();
                            self.attr_expr(&args[0], cx, Some(&elem))?;
                            return Ok(SpecType::Boolean);
                        }
                        SpecType::Class { decl, .. } => (Some(*decl), false),
                        SpecType::Error => (None, false),
                        other => {
                            self.type_error(
                                codes::BAD_OPERAND,
                                span,
                                format!("{other} has no method {name}"),
                            );
                            (None, false)
                        }
                    }
                }
            },
        };

        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.attr_expr(arg, cx, None)?);
        }
        let Some(owner) = owner else {
            return Ok(SpecType::Error);
        };

        let candidates = self.symbols.lookup_methods(owner, name)?;
        let mut arity_match = false;
        let mut chosen = None;
        for candidate in candidates {
            let decl = self.decl(candidate)?;
            let Some(method) = decl.as_method() else { continue };
            if method.params.len() != args.len() {
                continue;
            }
            arity_match = true;
            let params: Vec<SpecType> = method
                .params
                .iter()
                .map(|p| {
                    let ty = self.symbols.decl(*p).and_then(Decl::value_type);
                    ty.cloned().unwrap_or(SpecType::Error)
                })
                .collect();
            if params.iter().zip(&arg_types).all(|(p, a)| self.assignable(a, p)) {
                chosen = Some(candidate);
                break;
            }
        }
        let Some(method_id) = chosen else {
            let owner_name = self.decl_name(owner);
            if arity_match {
                let found: Vec<String> = arg_types.iter().map(ToString::to_string).collect();
                self.type_error(
                    codes::TYPE_MISMATCH,
                    span,
                    format!("no overload of {owner_name}.{name} accepts ({})", found.join(", ")),
                );
            } else {
                self.type_error(
                    codes::UNRESOLVED,
                    span,
                    format!(
                        "cannot resolve method {owner_name}.{name} with {} argument(s)",
                        args.len()
                    ),
                );
            }
            return Ok(SpecType::Error);
        };

        let decl = self.decl(method_id)?;
        let is_static = decl.modifiers.is_static;
        let return_ty = decl.as_method().map(|m| m.return_ty.clone()).unwrap_or(SpecType::Error);
        if (through_type || (target.is_none() && cx.is_static)) && !is_static {
            self.type_error(
                codes::UNRESOLVED,
                span,
                format!("non-static method {name} cannot be called from a static context"),
            );
            return Ok(SpecType::Error);
        }
        self.out.symbols.insert(id, method_id);
        self.check_symbol(method_id, span, cx, Access::Read)?;
        self.check_purity(method_id, span, cx)?;
        Ok(return_ty)
    }

    fn check_purity(
        &mut self,
        method: DeclId,
        span: Span,
        cx: &AttrContext,
    ) -> Result<(), HostError> {
        if !cx.purity_required || self.config.purity == PurityCheck::Off {
            return Ok(());
        }
        let decl = self.decl(method)?;
        if decl.modifiers.is_pure || decl.modifiers.secrecy.query.is_some() {
            return Ok(());
        }
        let message = format!("specification calls non-pure method {}", decl.name);
        let diagnostic = match self.config.purity {
            PurityCheck::Error => Diagnostic::error(Category::Purity, codes::IMPURE_CALL, message),
            _ => Diagnostic::warning(Category::Purity, codes::IMPURE_CALL, message),
        };
        self.report(diagnostic.at(span));
        Ok(())
    }

    fn old_allowed(&self, cx: &AttrContext) -> bool {
        cx.clause.is_some_and(|k| k.info().allows_old)
    }

    fn pseudo_error(&mut self, what: &str, span: Span, cx: &AttrContext) {
        let place = match cx.clause {
            Some(kind) => format!("a {kind} clause"),
            None => "this context".to_string(),
        };
        self.type_error(codes::BAD_PSEUDO_IDENT, span, format!("{what} is not allowed in {place}"));
    }

    fn attr_result(&mut self, span: Span, cx: &AttrContext) -> Result<SpecType, HostError> {
        if !cx.clause.is_some_and(|k| k.info().allows_result) {
            self.pseudo_error("\\result", span, cx);
            return Ok(SpecType::Error);
        }
        match &cx.result_ty {
            Some(SpecType::Void) | None => {
                self.type_error(
                    codes::BAD_PSEUDO_IDENT,
                    span,
                    "\\result used in a method without a result",
                );
                Ok(SpecType::Error)
            }
            Some(ty) => Ok(ty.clone()),
        }
    }

    fn attr_old(
        &mut self,
        inner: &ExprRef,
        label: Option<&str>,
        span: Span,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        let Some(label) = label else {
            if !self.old_allowed(cx) {
                self.pseudo_error("\\old", span, cx);
                return Ok(SpecType::Error);
            }
            return self.attr_expr(inner, cx, None);
        };
        if !cx.clause.is_some_and(|k| k.info().allows_labeled_old) {
            self.pseudo_error("labeled \\old", span, cx);
            return Ok(SpecType::Error);
        }
        let Some(method) = cx.method else {
            self.pseudo_error("labeled \\old", span, cx);
            return Ok(SpecType::Error);
        };
        let Some(snapshot) = self.symbols.label_snapshot(method, label) else {
            self.type_error(codes::UNKNOWN_LABEL, span, format!("no label {label} in this method"));
            return Ok(SpecType::Error);
        };
        let mut bindings = self.param_bindings(method)?;
        bindings.extend(
            snapshot
                .locals
                .iter()
                .map(|(name, ty)| (name.clone(), Binding::new(ty.clone(), BindingKind::Local))),
        );
        let at_label = cx.with_fresh_scope(bindings);
        self.attr_expr(inner, &at_label, None)
    }

    /// Bindings for the parameters of `method`.
    pub fn param_bindings(&self, method: DeclId) -> Result<Vec<(String, Binding)>, HostError> {
        let decl = self.decl(method)?;
        let params = decl.as_method().map(|m| m.params.clone()).unwrap_or_default();
        let mut out = Vec::with_capacity(params.len());
        for p in params {
            let param = self.decl(p)?;
            let ty = param.value_type().cloned().unwrap_or(SpecType::Error);
            out.push((
                param.name.clone(),
                Binding {
                    ty,
                    kind: BindingKind::Param,
                    decl: Some(p),
                },
            ));
        }
        Ok(out)
    }

    fn attr_member(
        &mut self,
        element: &ExprRef,
        collection: &ExprRef,
        span: Span,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        let coll = self.attr_expr(collection, cx, None)?;
        match coll.element_type() {
            Some(elem) => {
                let elem = elem.clone();
                self.attr_expr(element, cx, Some(&elem))?;
            }
            None => {
                self.attr_expr(element, cx, None)?;
                if !coll.is_error() {
                    self.type_error(
                        codes::BAD_OPERAND,
                        span,
                        format!("\\in needs a set, sequence, or array, found {coll}"),
                    );
                }
            }
        }
        Ok(SpecType::Boolean)
    }

    fn attr_match(
        &mut self,
        scrutinee: &ExprRef,
        arms: &[MatchArm],
        span: Span,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        let ty = self.attr_expr(scrutinee, cx, None)?;
        let ctors = match &ty {
            SpecType::Datatype { decl, .. } => self
                .decl(*decl)?
                .as_type()
                .map(|t| t.constructors.clone())
                .unwrap_or_default(),
            SpecType::Error => {
                for arm in arms {
                    self.attr_expr(&arm.body, cx, None)?;
                }
                return Ok(SpecType::Error);
            }
            other => {
                self.type_error(
                    codes::BAD_MATCH,
                    scrutinee.span,
                    format!("cannot match on non-datatype {other}"),
                );
                return Ok(SpecType::Error);
            }
        };

        let mut covered = HashSet::new();
        let mut wildcard = false;
        let mut result: Option<SpecType> = None;
        let mut failed = false;
        for arm in arms {
            let bindings = match &arm.constructor {
                None => {
                    wildcard = true;
                    Vec::new()
                }
                Some(name) => match ctors.iter().find(|c| &c.name == name) {
                    Some(ctor) if ctor.fields.len() == arm.bindings.len() => {
                        covered.insert(name.clone());
                        arm.bindings
                            .iter()
                            .zip(&ctor.fields)
                            .map(|(b, t)| {
                                (b.clone(), Binding::new(t.clone(), BindingKind::MatchBound))
                            })
                            .collect()
                    }
                    Some(ctor) => {
                        self.type_error(
                            codes::BAD_MATCH,
                            arm.span,
                            format!(
                                "constructor {name} has {} field(s) but the pattern binds {}",
                                ctor.fields.len(),
                                arm.bindings.len()
                            ),
                        );
                        failed = true;
                        continue;
                    }
                    None => {
                        self.type_error(
                            codes::BAD_MATCH,
                            arm.span,
                            format!("{ty} has no constructor {name}"),
                        );
                        failed = true;
                        continue;
                    }
                },
            };
            let body_cx = cx.bind_all(bindings);
            let body = self.attr_expr(&arm.body, &body_cx, None)?;
            result = match result {
                None => Some(body),
                Some(prev) => match self.unify(&prev, &body) {
                    Some(t) => Some(t),
                    None => {
                        self.type_error(
                            codes::TYPE_MISMATCH,
                            arm.body.span,
                            format!("match arms have incompatible types {prev} and {body}"),
                        );
                        failed = true;
                        Some(prev)
                    }
                },
            };
        }

        if !wildcard {
            let missing: Vec<&str> = ctors
                .iter()
                .filter(|c| !covered.contains(&c.name))
                .map(|c| c.name.as_str())
                .collect();
            if !missing.is_empty() {
                self.report(
                    Diagnostic::warning(
                        Category::Type,
                        codes::NON_EXHAUSTIVE_MATCH,
                        format!("match on {ty} does not cover {}", missing.join(", ")),
                    )
                    .at(span),
                );
            }
        }
        if failed {
            return Ok(SpecType::Error);
        }
        Ok(result.unwrap_or(SpecType::Error))
    }

    /// Visibility and secrecy checks for a referenced field or method.
    fn check_symbol(
        &mut self,
        sym: DeclId,
        span: Span,
        cx: &AttrContext,
        access: Access,
    ) -> Result<(), HostError> {
        let decl = self.decl(sym)?;
        if self.config.check_visibility {
            if let Some(kind) = cx.clause {
                if let Err(violation) = lattice::check_visible(kind, cx.visibility, decl) {
                    self.report(violation.to_diagnostic().at(span));
                }
            }
        }
        if self.config.check_secrecy && decl.is_field() {
            let checked = match access {
                Access::Read => self.groups.check_read(sym, cx.secrecy),
                Access::Write => self.groups.check_write(sym, cx.secrecy),
            };
            if let Err(violation) = checked {
                let symbols = self.symbols;
                let diagnostic = violation.to_diagnostic(|id| {
                    symbols.decl(id).map(|d| d.name.clone()).unwrap_or_else(|| id.to_string())
                });
                self.report(diagnostic.at(span));
            }
        }
        Ok(())
    }

    pub(crate) fn decl(&self, id: DeclId) -> Result<&'a Decl, HostError> {
        self.symbols.decl(id).ok_or(HostError::UnknownDecl(id))
    }

    fn field_type(&self, field: DeclId) -> Result<SpecType, HostError> {
        Ok(self.decl(field)?.value_type().cloned().unwrap_or(SpecType::Error))
    }

    /// The value type of a declared type.
    pub fn type_of_decl(&self, id: DeclId) -> Result<SpecType, HostError> {
        let decl = self.decl(id)?;
        Ok(match decl.as_type() {
            Some(t) if t.is_datatype() => SpecType::Datatype {
                decl: id,
                name: decl.name.clone(),
            },
            Some(_) => SpecType::Class {
                decl: id,
                name: decl.name.clone(),
            },
            None => SpecType::Error,
        })
    }

    /// Resolve a written type, reporting unknown names.
    pub fn resolve_type(&mut self, ty: &TypeRef) -> Result<SpecType, HostError> {
        Ok(match &ty.kind {
            TypeRefKind::Primitive(p) => SpecType::from(*p),
            TypeRefKind::Named(name) => match self.symbols.lookup_type(name)? {
                Some(id) => self.type_of_decl(id)?,
                None => {
                    self.type_error(
                        codes::UNRESOLVED,
                        ty.span,
                        format!("cannot resolve type {name}"),
                    );
                    SpecType::Error
                }
            },
            TypeRefKind::Array(e) => wrap(self.resolve_type(e)?, SpecType::array_of),
            TypeRefKind::Set(e) => wrap(self.resolve_type(e)?, SpecType::set_of),
            TypeRefKind::Seq(e) => wrap(self.resolve_type(e)?, SpecType::seq_of),
        })
    }

    fn is_string(&self, ty: &SpecType) -> bool {
        matches!(ty, SpecType::Class { name, .. } if name == "String")
    }

    /// Whether a value of type `from` may be used where `to` is expected.
    pub fn assignable(&self, from: &SpecType, to: &SpecType) -> bool {
        if from.is_error() || to.is_error() || from == to {
            return true;
        }
        match (from, to) {
            (f, t) if f.is_numeric() && t.is_numeric() => f.widens_to(t),
            (SpecType::Null, t) => t.is_object_like() && *t != SpecType::TypeOfType,
            (SpecType::Class { decl: a, .. }, SpecType::Class { decl: b, .. }) => {
                self.symbols.is_subtype(*a, *b)
            }
            (SpecType::Array(_), SpecType::Class { name, .. }) => name == "Object",
            (SpecType::Array(a), SpecType::Array(b)) => {
                a.is_reference() && b.is_reference() && self.assignable(a, b)
            }
            (SpecType::Set(a), SpecType::Set(b)) | (SpecType::Seq(a), SpecType::Seq(b)) => {
                self.assignable(a, b)
            }
            _ => false,
        }
    }

    fn comparable(&self, a: &SpecType, b: &SpecType) -> bool {
        (a.is_numeric() && b.is_numeric())
            || (a.is_boolean() && b.is_boolean())
            || (a.is_object_like()
                && b.is_object_like()
                && (self.assignable(a, b) || self.assignable(b, a)))
    }

    fn unify(&self, a: &SpecType, b: &SpecType) -> Option<SpecType> {
        if a == b || b.is_error() {
            return Some(a.clone());
        }
        if a.is_error() {
            return Some(b.clone());
        }
        if let Some(t) = a.binary_promoted(b) {
            return Some(t);
        }
        if self.assignable(a, b) {
            Some(b.clone())
        } else if self.assignable(b, a) {
            Some(a.clone())
        } else {
            None
        }
    }
}

fn wrap(inner: SpecType, make: fn(SpecType) -> SpecType) -> SpecType {
    if inner.is_error() {
        SpecType::Error
    } else {
        make(inner)
    }
}

#[cfg(test)]
mod tests;
