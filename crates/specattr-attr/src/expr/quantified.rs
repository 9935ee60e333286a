use specattr_core::ast::{ExprRef, QuantOp, QuantifiedExpr};
use specattr_core::{codes, Category, Diagnostic, HostError, SpecType};

use super::Attributor;
use crate::context::{AttrContext, Binding, BindingKind};
use crate::rac;

/// Modifiers a bound variable may carry.
const BOUND_MODIFIERS: [&str; 2] = ["non_null", "nullable"];

impl Attributor<'_> {
    pub(super) fn attr_quantified(
        &mut self,
        expr: &ExprRef,
        q: &QuantifiedExpr,
        cx: &AttrContext,
    ) -> Result<SpecType, HostError> {
        let mut bindings = Vec::with_capacity(q.decls.len());
        for decl in &q.decls {
            for modifier in &decl.modifiers {
                if !BOUND_MODIFIERS.contains(&modifier.as_str()) {
                    self.type_error(
                        codes::BAD_QUANT_MODIFIER,
                        decl.span,
                        format!(
                            "modifier {modifier} is not allowed on bound variable {}",
                            decl.name
                        ),
                    );
                }
            }
            let ty = self.resolve_type(&decl.ty)?;
            bindings.push((decl.name.clone(), Binding::new(ty, BindingKind::Bound)));
        }
        let inner = cx.bind_all(bindings);

        let range_ok = match &q.range {
            Some(range) => !self.attr_expr(range, &inner, Some(&SpecType::Boolean))?.is_error(),
            None => true,
        };

        let value = match q.op {
            QuantOp::Forall | QuantOp::Exists => {
                self.attr_expr(&q.value, &inner, Some(&SpecType::Boolean))?
            }
            QuantOp::NumOf => {
                let t = self.attr_expr(&q.value, &inner, Some(&SpecType::Boolean))?;
                if t.is_error() {
                    t
                } else {
                    SpecType::BigInt
                }
            }
            QuantOp::Sum | QuantOp::Product | QuantOp::Max | QuantOp::Min => {
                let t = self.attr_expr(&q.value, &inner, None)?;
                if !t.is_error() && !t.is_numeric() {
                    self.type_error(
                        codes::BAD_OPERAND,
                        q.value.span,
                        format!("{} needs a numeric value, found {t}", q.op.keyword()),
                    );
                    SpecType::Error
                } else {
                    t
                }
            }
        };

        if let Some(triggers) = &q.triggers {
            if matches!(q.op, QuantOp::Forall | QuantOp::Exists) {
                for trigger in triggers {
                    self.attr_expr(trigger, &inner, None)?;
                }
            } else {
                self.report(
                    Diagnostic::warning(
                        Category::Type,
                        codes::IGNORED_TRIGGERS,
                        format!("triggers are ignored on {}", q.op.keyword()),
                    )
                    .at(expr.span),
                );
            }
        }

        if !range_ok || value.is_error() {
            return Ok(SpecType::Error);
        }

        if self.config.rac {
            if let Some(form) = rac::synthesize(self, q, &value, &inner) {
                self.out.rac_forms.insert(expr.id, form);
            }
        }
        Ok(value)
    }
}
