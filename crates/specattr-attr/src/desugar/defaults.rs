//! Per-case placement and purity enforcement, and defaulting of missing
//! frame and `signals_only` clauses.

use std::rc::Rc;

use specattr_core::ast::{Behavior, Clause, ClauseBody, Frame, StoreRef};
use specattr_core::{
    codes, Category, ClauseKind, DeclId, Diagnostic, Diagnostics, HostError, Placement,
    SymbolTable, TypeRef,
};

use crate::config::AttrConfig;
use crate::desugar::MethodFacts;

/// Drop clauses that cannot appear in a case of this behavior. Clauses the
/// desugarer synthesized are trusted.
pub fn enforce_placement(
    facts: &MethodFacts,
    behavior: Behavior,
    clauses: Vec<Rc<Clause>>,
    diags: &mut Diagnostics,
) -> Vec<Rc<Clause>> {
    clauses
        .into_iter()
        .filter(|clause| {
            let problem = if clause.kind.placement() != Placement::MethodCase {
                Some(format!("{} clause is not allowed in a method specification", clause.kind))
            } else if clause.is_synthesized() {
                None
            } else {
                match (behavior, clause.kind) {
                    (Behavior::Exceptional, ClauseKind::Ensures) => Some(
                        "ensures clause is not allowed in an exceptional_behavior case".to_string(),
                    ),
                    (Behavior::Normal, ClauseKind::Signals | ClauseKind::SignalsOnly) => {
                        Some(format!(
                            "{} clause is not allowed in a normal_behavior case",
                            clause.kind
                        ))
                    }
                    _ => None,
                }
            };
            match problem {
                Some(message) => {
                    diags.push(
                        Diagnostic::error(Category::Placement, codes::MISPLACED_CLAUSE, message)
                            .at(clause.span)
                            .in_decl(facts.id),
                    );
                    false
                }
                None => true,
            }
        })
        .collect()
}

/// Whether an `assignable` frame is permitted for a pure method.
pub fn pure_frame_allowed(frame: &Frame, is_constructor: bool) -> bool {
    if frame.is_nothing() {
        return true;
    }
    match frame {
        Frame::Targets(targets) => {
            is_constructor && targets.iter().all(StoreRef::is_direct_this_field)
        }
        _ => false,
    }
}

/// Report and drop every `assignable` clause of a pure method that may
/// assign more than it is allowed to.
pub fn enforce_purity(
    facts: &MethodFacts,
    clauses: Vec<Rc<Clause>>,
    diags: &mut Diagnostics,
) -> Vec<Rc<Clause>> {
    if !facts.is_pure {
        return clauses;
    }
    clauses
        .into_iter()
        .filter(|clause| {
            if clause.kind != ClauseKind::Assignable {
                return true;
            }
            let Some(frame) = clause.as_frame() else {
                return true;
            };
            if pure_frame_allowed(frame, facts.is_constructor) {
                return true;
            }
            let allowed = if facts.is_constructor {
                "\\nothing or fields of this"
            } else {
                "\\nothing"
            };
            diags.push(
                Diagnostic::error(
                    Category::Purity,
                    codes::PURE_ASSIGNS,
                    format!("pure {} {} may only assign {allowed}", facts.kind_name(), facts.name),
                )
                .at(clause.span)
                .in_decl(facts.id),
            );
            false
        })
        .collect()
}

fn default_assignable(facts: &MethodFacts) -> Frame {
    match (facts.is_pure, facts.is_constructor) {
        (true, true) => Frame::Targets(vec![StoreRef::AllFields(None)]),
        (true, false) => Frame::Nothing,
        (false, _) => Frame::Everything,
    }
}

fn default_accessible(facts: &MethodFacts, config: &AttrConfig) -> Frame {
    if config.default_accessible_everything || !facts.is_pure {
        Frame::Everything
    } else {
        Frame::Nothing
    }
}

/// Types a defaulted `signals_only` lists: the declared throws followed by
/// the configured unchecked catch-all.
fn default_signals_only(
    facts: &MethodFacts,
    config: &AttrConfig,
    symbols: &dyn SymbolTable,
) -> Result<Vec<(TypeRef, Option<DeclId>)>, HostError> {
    let mut out: Vec<(TypeRef, Option<DeclId>)> = facts
        .throws
        .iter()
        .map(|(id, name)| (TypeRef::named(name.clone()), Some(*id)))
        .collect();
    let unchecked = symbols.lookup_type(&config.unchecked_exception)?;
    if !out.iter().any(|(_, id)| id.is_some() && *id == unchecked) {
        out.push((TypeRef::named(config.unchecked_exception.clone()), unchecked));
    }
    Ok(out)
}

/// `signals (T) false` with `T` covering every type in `defaults`.
fn forbids_all(
    clauses: &[&Rc<Clause>],
    defaults: &[(TypeRef, Option<DeclId>)],
    symbols: &dyn SymbolTable,
) -> Result<bool, HostError> {
    for clause in clauses {
        let Some(forbidden) = clause.as_signals_false() else {
            continue;
        };
        let Some(t) = resolve_named(forbidden, symbols)? else {
            continue;
        };
        let covers = defaults
            .iter()
            .all(|(_, id)| id.is_some_and(|d| symbols.is_subtype(d, t)));
        if covers {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn resolve_named(ty: &TypeRef, symbols: &dyn SymbolTable) -> Result<Option<DeclId>, HostError> {
    match &ty.kind {
        specattr_core::TypeRefKind::Named(name) => symbols.lookup_type(name),
        _ => Ok(None),
    }
}

/// Append defaults for missing `assignable`, `accessible`, and
/// `signals_only` clauses. `prefix` is consulted but never extended.
pub fn add_defaults(
    facts: &MethodFacts,
    config: &AttrConfig,
    symbols: &dyn SymbolTable,
    prefix: &[Rc<Clause>],
    clauses: &mut Vec<Rc<Clause>>,
) -> Result<(), HostError> {
    let has = |clauses: &[Rc<Clause>], kind: ClauseKind| {
        prefix.iter().chain(clauses).any(|c| c.kind == kind)
    };

    if !has(&clauses[..], ClauseKind::Assignable) {
        clauses.push(Clause::synth_frame(ClauseKind::Assignable, default_assignable(facts)));
    }
    if !has(&clauses[..], ClauseKind::Accessible) {
        let frame = default_accessible(facts, config);
        clauses.push(Clause::synth_frame(ClauseKind::Accessible, frame));
    }
    if !has(&clauses[..], ClauseKind::SignalsOnly) {
        let defaults = default_signals_only(facts, config, symbols)?;
        let all: Vec<&Rc<Clause>> = prefix.iter().chain(clauses.iter()).collect();
        if !forbids_all(&all, &defaults, symbols)? {
            let types = defaults.into_iter().map(|(t, _)| t).collect();
            clauses.push(Clause::synth_signals_only(types));
        }
    }
    Ok(())
}

/// Whether a clause body has the shape its kind calls for.
pub fn shape_matches(clause: &Clause) -> bool {
    use specattr_core::ClauseCheck as C;
    matches!(
        (clause.kind.info().check, &clause.body),
        (C::Predicate | C::Integral, ClauseBody::Expr(_))
            | (C::Recommends, ClauseBody::Recommends { .. })
            | (C::Signals, ClauseBody::Signals { .. })
            | (C::TypeList, ClauseBody::SignalsOnly(_))
            | (C::StoreRefs, ClauseBody::Frame(_))
            | (C::Callable, ClauseBody::Callable(_))
            | (C::Declarations, ClauseBody::Decls(_))
            | (C::Group, ClauseBody::Group(_))
            | (C::Represents, ClauseBody::Represents { .. })
            | (C::Membership, ClauseBody::InGroups(_))
            | (C::Maps, ClauseBody::Maps { .. })
    )
}
