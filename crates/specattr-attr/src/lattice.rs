//! Visibility compatibility between a clause and the symbols it references.

use specattr_core::{codes, Category, ClauseKind, Decl, Diagnostic, Visibility, VisibilityRule};

/// Visibility of a symbol as seen from specifications, after
/// `spec_public` / `spec_protected` upgrades.
pub fn spec_visibility(sym: &Decl) -> Visibility {
    sym.modifiers.spec_visibility_or_declared()
}

/// Symbols exempt from the exact-match rule of invariant-like clauses:
/// finals, parameters and locals, and specification-only declarations.
pub fn exempt_from_exact(sym: &Decl) -> bool {
    sym.modifiers.is_final || sym.is_local() || sym.modifiers.is_spec_only()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityViolation {
    /// Exact rule: the symbol's visibility differs from the clause's.
    Mismatch {
        kind: ClauseKind,
        symbol: String,
        symbol_vis: Visibility,
        clause_vis: Visibility,
    },
    /// At-least rule: the symbol is less visible than the clause.
    TooLow {
        kind: ClauseKind,
        symbol: String,
        symbol_vis: Visibility,
        clause_vis: Visibility,
    },
    /// A field placed in a datagroup less visible than itself.
    GroupLessVisible {
        field: String,
        group: String,
        field_vis: Visibility,
        group_vis: Visibility,
    },
}

impl VisibilityViolation {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            VisibilityViolation::Mismatch {
                kind,
                symbol,
                symbol_vis,
                clause_vis,
            } => Diagnostic::error(
                Category::Visibility,
                codes::VISIBILITY_MISMATCH,
                format!(
                    "{symbol_vis} symbol {symbol} may not be referenced in a {clause_vis} {kind} \
                     clause; visibilities must match"
                ),
            ),
            VisibilityViolation::TooLow {
                kind,
                symbol,
                symbol_vis,
                clause_vis,
            } => Diagnostic::error(
                Category::Visibility,
                codes::VISIBILITY_TOO_LOW,
                format!(
                    "{symbol_vis} symbol {symbol} is not visible in a {clause_vis} {kind} clause"
                ),
            ),
            VisibilityViolation::GroupLessVisible {
                field,
                group,
                field_vis,
                group_vis,
            } => Diagnostic::error(
                Category::Visibility,
                codes::GROUP_LESS_VISIBLE,
                format!("{field_vis} field {field} cannot be in {group_vis} datagroup {group}"),
            ),
        }
    }
}

/// Check a reference to `sym` from a clause of `kind` declared with
/// visibility `clause_vis`. Only fields and methods are subject to checks.
pub fn check_visible(
    kind: ClauseKind,
    clause_vis: Visibility,
    sym: &Decl,
) -> Result<(), VisibilityViolation> {
    if !(sym.is_field() || sym.is_method()) {
        return Ok(());
    }
    let symbol_vis = spec_visibility(sym);
    match kind.info().visibility {
        VisibilityRule::Exact => {
            if symbol_vis == clause_vis || exempt_from_exact(sym) {
                Ok(())
            } else {
                Err(VisibilityViolation::Mismatch {
                    kind,
                    symbol: sym.name.clone(),
                    symbol_vis,
                    clause_vis,
                })
            }
        }
        VisibilityRule::AtLeast | VisibilityRule::Membership => {
            if symbol_vis >= clause_vis {
                Ok(())
            } else {
                Err(VisibilityViolation::TooLow {
                    kind,
                    symbol: sym.name.clone(),
                    symbol_vis,
                    clause_vis,
                })
            }
        }
        VisibilityRule::Unchecked => Ok(()),
    }
}

/// The group named by an `in` clause must be at least as visible as the
/// field placed in it.
pub fn check_group_membership(field: &Decl, group: &Decl) -> Result<(), VisibilityViolation> {
    let field_vis = spec_visibility(field);
    let group_vis = spec_visibility(group);
    if group_vis >= field_vis {
        Ok(())
    } else {
        Err(VisibilityViolation::GroupLessVisible {
            field: field.name.clone(),
            group: group.name.clone(),
            field_vis,
            group_vis,
        })
    }
}
