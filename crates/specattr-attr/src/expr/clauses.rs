//! Clause bodies, dispatched on the shape recorded in the clause registry.

use std::rc::Rc;

use specattr_core::ast::{
    CallableTargets, Clause, ClauseBody, ExprRef, Frame, LocalDecl, SpecCase, StatementSpec,
    StoreRef, TypeClause,
};
use specattr_core::{
    codes, Category, ClauseCheck, ClauseKind, DeclId, Diagnostic, HostError, Placement, Span,
    SpecType, TypeRef, Visibility,
};
use tracing::trace;

use super::{Attributor, SeenClause};
use crate::context::{AttrContext, Binding, BindingKind};
use crate::datagroup::Access;

impl Attributor<'_> {
    /// Attribute every clause of `case` in order. Names declared by `old`
    /// and `forall` clauses are visible to the clauses after them.
    pub fn attr_case(&mut self, case: &SpecCase, cx: &AttrContext) -> Result<(), HostError> {
        self.attr_case_as(case, case.visibility, cx)
    }

    /// [`Self::attr_case`] with the case checked at `visibility`, as for a
    /// lightweight case that takes the method's visibility.
    pub fn attr_case_as(
        &mut self,
        case: &SpecCase,
        visibility: Visibility,
        cx: &AttrContext,
    ) -> Result<(), HostError> {
        let mut scope = cx.clone();
        for clause in case.all_clauses() {
            let clause_cx = scope.with_clause(clause.kind, visibility);
            let introduced = self.attr_clause(clause, &clause_cx)?;
            if !introduced.is_empty() {
                scope = scope.bind_all(introduced);
            }
        }
        Ok(())
    }

    /// A type-body clause, in the type's context `cx`.
    pub fn attr_type_clause(&mut self, tc: &TypeClause, cx: &AttrContext) -> Result<(), HostError> {
        if !self.placed(&tc.clause, Placement::TypeBody, "a type body") {
            return Ok(());
        }
        let clause_cx = cx.with_static(tc.is_static).with_clause(tc.clause.kind, tc.visibility);
        self.attr_clause(&tc.clause, &clause_cx)?;
        Ok(())
    }

    /// A statement-level clause. `cx` is the method context with the
    /// statement's locals in scope.
    pub fn attr_statement(
        &mut self,
        spec: &StatementSpec,
        cx: &AttrContext,
    ) -> Result<(), HostError> {
        if !self.placed(&spec.clause, Placement::Statement, "a method body") {
            return Ok(());
        }
        let clause_cx = cx.with_clause(spec.clause.kind, cx.visibility);
        self.attr_clause(&spec.clause, &clause_cx)?;
        Ok(())
    }

    fn placed(&mut self, clause: &Clause, want: Placement, place: &str) -> bool {
        if clause.kind.placement() == want {
            return true;
        }
        self.report(
            Diagnostic::error(
                Category::Placement,
                codes::MISPLACED_CLAUSE,
                format!("{} clause is not allowed in {place}", clause.kind),
            )
            .at(clause.span),
        );
        false
    }

    /// Attribute one clause under `cx`, already entered for it. Returns the
    /// names the clause declares. A clause shared between cases is
    /// attributed once per distinct scope it appears in.
    pub fn attr_clause(
        &mut self,
        clause: &Rc<Clause>,
        cx: &AttrContext,
    ) -> Result<Vec<(String, Binding)>, HostError> {
        let key = Rc::as_ptr(clause);
        let locals = cx.visible_locals();
        let prior = self.seen.get(&key).and_then(|seen| {
            seen.iter()
                .find(|s| s.visibility == cx.visibility && s.locals == locals)
        });
        if let Some(prior) = prior {
            return Ok(prior.introduced.clone());
        }
        trace!(kind = %clause.kind, "attributing clause");
        let introduced = self.attr_body(clause, cx)?;
        self.seen.entry(key).or_default().push(SeenClause {
            visibility: cx.visibility,
            locals,
            introduced: introduced.clone(),
        });
        Ok(introduced)
    }

    fn attr_body(
        &mut self,
        clause: &Clause,
        cx: &AttrContext,
    ) -> Result<Vec<(String, Binding)>, HostError> {
        match (clause.kind.info().check, &clause.body) {
            (ClauseCheck::Predicate, ClauseBody::Expr(e)) => {
                self.attr_expr(e, cx, Some(&SpecType::Boolean))?;
            }
            (ClauseCheck::Integral, ClauseBody::Expr(e)) => {
                let ty = self.attr_expr(e, cx, None)?;
                if !ty.is_error() && !ty.is_integral() {
                    self.type_error(
                        codes::TYPE_MISMATCH,
                        e.span,
                        format!("{} needs an integral value, found {ty}", clause.kind),
                    );
                }
            }
            (ClauseCheck::Recommends, ClauseBody::Recommends { pred, exception }) => {
                self.attr_expr(pred, cx, Some(&SpecType::Boolean))?;
                self.exception_type(exception)?;
            }
            (ClauseCheck::Signals, ClauseBody::Signals { exception, var, pred }) => {
                let ty = self.exception_type(exception)?;
                if let Some(pred) = pred {
                    let inner = match var {
                        Some(name) => {
                            cx.bind(name.clone(), Binding::new(ty, BindingKind::SignalsVar))
                        }
                        None => cx.clone(),
                    };
                    self.attr_expr(pred, &inner, Some(&SpecType::Boolean))?;
                }
            }
            (ClauseCheck::TypeList, ClauseBody::SignalsOnly(types)) => {
                for ty in types {
                    self.exception_type(ty)?;
                }
            }
            (ClauseCheck::StoreRefs, ClauseBody::Frame(frame)) => {
                if let Frame::Targets(targets) = frame {
                    let access = if clause.kind == ClauseKind::Assignable {
                        Access::Write
                    } else {
                        Access::Read
                    };
                    for target in targets {
                        self.attr_store_ref(target, clause.span, cx, access)?;
                    }
                }
            }
            (ClauseCheck::Callable, ClauseBody::Callable(targets)) => {
                if let CallableTargets::Methods(sigs) = targets {
                    for sig in sigs {
                        self.attr_callable(&sig.name, sig.arity, sig.span, cx)?;
                    }
                }
            }
            (ClauseCheck::Declarations, ClauseBody::Decls(decls)) => {
                return self.attr_decls(decls, cx);
            }
            (ClauseCheck::Group, ClauseBody::Group(cases)) => {
                for case in cases {
                    self.attr_case(case, cx)?;
                }
            }
            (ClauseCheck::Represents, ClauseBody::Represents { field, value }) => {
                self.attr_represents(field, value, clause.span, cx)?;
            }
            // Datagroup edges are registered by the driver before any
            // expression is attributed.
            (ClauseCheck::Membership, ClauseBody::InGroups(_))
            | (ClauseCheck::Maps, ClauseBody::Maps { .. }) => {}
            _ => self.report(
                Diagnostic::error(
                    Category::Internal,
                    codes::WRONG_CLAUSE_SHAPE,
                    format!("{} clause has a malformed body", clause.kind),
                )
                .at(clause.span),
            ),
        }
        Ok(Vec::new())
    }

    /// Resolve `ty` and check that it names a `Throwable`.
    fn exception_type(&mut self, ty: &TypeRef) -> Result<SpecType, HostError> {
        let resolved = self.resolve_type(ty)?;
        let throwable = self.symbols.lookup_type("Throwable")?;
        let ok = match (&resolved, throwable) {
            (SpecType::Error, _) => true,
            (SpecType::Class { decl, .. }, Some(root)) => self.symbols.is_subtype(*decl, root),
            (SpecType::Class { .. }, None) => true,
            _ => false,
        };
        if !ok {
            self.type_error(
                codes::TYPE_MISMATCH,
                ty.span,
                format!("{resolved} is not an exception type"),
            );
            return Ok(SpecType::Error);
        }
        Ok(resolved)
    }

    fn attr_decls(
        &mut self,
        decls: &[LocalDecl],
        cx: &AttrContext,
    ) -> Result<Vec<(String, Binding)>, HostError> {
        let mut introduced: Vec<(String, Binding)> = Vec::with_capacity(decls.len());
        for decl in decls {
            let ty = self.resolve_type(&decl.ty)?;
            if let Some(init) = &decl.init {
                let scope = cx.bind_all(introduced.clone());
                self.attr_expr(init, &scope, Some(&ty))?;
            }
            introduced.push((decl.name.clone(), Binding::new(ty, BindingKind::ClauseDecl)));
        }
        Ok(introduced)
    }

    fn attr_store_ref(
        &mut self,
        target: &StoreRef,
        span: Span,
        cx: &AttrContext,
        access: Access,
    ) -> Result<(), HostError> {
        match target {
            StoreRef::Field { target: None, name } => {
                if cx.lookup(name).is_some() {
                    return Ok(());
                }
                match self.symbols.lookup_field(cx.class, name)? {
                    Some(field) => self.check_symbol(field, span, cx, access)?,
                    None => self.type_error(
                        codes::UNRESOLVED,
                        span,
                        format!("cannot resolve field {name}"),
                    ),
                }
            }
            StoreRef::Field { target: Some(t), name } => {
                if let Some(owner) = self.frame_owner(t, cx)? {
                    match self.symbols.lookup_field(owner, name)? {
                        Some(field) => self.check_symbol(field, span, cx, access)?,
                        None => {
                            let owner_name = self.decl_name(owner);
                            self.type_error(
                                codes::UNRESOLVED,
                                span,
                                format!("{owner_name} has no field {name}"),
                            );
                        }
                    }
                }
            }
            StoreRef::AllFields(Some(t)) => {
                self.frame_owner(t, cx)?;
            }
            StoreRef::AllFields(None) => {}
            StoreRef::Element { array, index } => {
                self.frame_array(array, cx)?;
                self.attr_index(index, cx)?;
            }
            StoreRef::Range { array, lo, hi } => {
                self.frame_array(array, cx)?;
                self.attr_index(lo, cx)?;
                self.attr_index(hi, cx)?;
            }
            StoreRef::AllElements(array) => self.frame_array(array, cx)?,
        }
        Ok(())
    }

    /// The class whose fields a frame target `e.f` or `e.*` selects.
    fn frame_owner(
        &mut self,
        target: &ExprRef,
        cx: &AttrContext,
    ) -> Result<Option<DeclId>, HostError> {
        if let Some(owner) = self.static_target(target, cx)? {
            return Ok(Some(owner));
        }
        match self.attr_expr(target, cx, None)? {
            SpecType::Class { decl, .. } => Ok(Some(decl)),
            SpecType::Error => Ok(None),
            other => {
                self.type_error(codes::BAD_OPERAND, target.span, format!("{other} has no fields"));
                Ok(None)
            }
        }
    }

    fn frame_array(&mut self, array: &ExprRef, cx: &AttrContext) -> Result<(), HostError> {
        let ty = self.attr_expr(array, cx, None)?;
        if !ty.is_error() && !matches!(ty, SpecType::Array(_)) {
            self.type_error(
                codes::BAD_OPERAND,
                array.span,
                format!("expected an array, found {ty}"),
            );
        }
        Ok(())
    }

    fn attr_index(&mut self, index: &ExprRef, cx: &AttrContext) -> Result<(), HostError> {
        let ty = self.attr_expr(index, cx, None)?;
        if !ty.is_error() && !ty.is_integral() {
            self.type_error(
                codes::BAD_OPERAND,
                index.span,
                format!("index must be integral, found {ty}"),
            );
        }
        Ok(())
    }

    fn attr_callable(
        &mut self,
        name: &str,
        arity: Option<usize>,
        span: Span,
        cx: &AttrContext,
    ) -> Result<(), HostError> {
        let mut found = None;
        for candidate in self.symbols.lookup_methods(cx.class, name)? {
            let params = self.decl(candidate)?.as_method().map(|m| m.params.len());
            if arity.is_none() || params == arity {
                found = Some(candidate);
                break;
            }
        }
        match found {
            Some(method) => self.check_symbol(method, span, cx, Access::Read),
            None => {
                let what = match arity {
                    Some(n) => format!("{name} with {n} parameter(s)"),
                    None => name.to_string(),
                };
                self.report(
                    Diagnostic::error(
                        Category::Type,
                        codes::BAD_CALLABLE,
                        format!("callable names no method {what}"),
                    )
                        .at(span),
                );
                Ok(())
            }
        }
    }

    fn attr_represents(
        &mut self,
        field: &str,
        value: &ExprRef,
        span: Span,
        cx: &AttrContext,
    ) -> Result<(), HostError> {
        let target = match self.symbols.lookup_field(cx.class, field)? {
            Some(id) if self.decl(id)?.modifiers.is_model => Some(self.field_type(id)?),
            Some(_) => {
                self.report_represents(span, format!("{field} is not a model field"));
                None
            }
            None => {
                self.report_represents(span, format!("no model field {field} in this type"));
                None
            }
        };
        self.attr_expr(value, cx, target.as_ref())?;
        Ok(())
    }

    fn report_represents(&mut self, span: Span, message: String) {
        self.report(Diagnostic::error(Category::Type, codes::BAD_REPRESENTS, message).at(span));
    }
}
