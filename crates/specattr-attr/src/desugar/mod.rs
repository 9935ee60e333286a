//! Normalization of method specifications into flat, self-contained cases.
//!
//! For each raw case the desugarer appends behavior boilerplate, checks
//! clause order, expands nested groups into sibling cases, expands
//! `recommends` clauses, drops misplaced and purity-violating clauses, and
//! fills in default frame and `signals_only` clauses. Every resulting case
//! shares one read-only prefix of implicit non-null checks. The output is
//! marked desugared, and desugaring a desugared spec returns it unchanged.

pub mod cache;
pub mod defaults;
pub mod denest;
pub mod recommends;

use std::rc::Rc;

use specattr_core::ast::{
    Behavior, BinaryOp, Clause, ClauseBody, ClausePrefix, Expr, MethodSpec, Origin, SpecCase,
};
use specattr_core::{
    codes, Category, ClauseKind, Decl, DeclId, Diagnostic, Diagnostics, HostError, SpecType,
    SymbolTable, Visibility,
};
use tracing::{debug, trace};

use crate::config::AttrConfig;
use crate::error::AttrError;
use crate::order;

pub use cache::{CacheStats, DesugarCache};

/// What desugaring needs to know about the specified method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodFacts {
    pub id: DeclId,
    pub name: String,
    pub visibility: Visibility,
    pub is_pure: bool,
    pub is_constructor: bool,
    pub overrides_something: bool,
    /// Declared exception types with their names.
    pub throws: Vec<(DeclId, String)>,
    /// Reference parameters declared (or defaulted) non-null.
    pub non_null_params: Vec<String>,
    /// Reference return type declared (or defaulted) non-null.
    pub non_null_result: bool,
}

impl MethodFacts {
    /// `None` when `decl` is not a method.
    pub fn from_decl(decl: &Decl, symbols: &dyn SymbolTable, config: &AttrConfig) -> Option<Self> {
        let method = decl.as_method()?;
        let non_null_params = method
            .params
            .iter()
            .filter_map(|p| symbols.decl(*p))
            .filter(|p| {
                p.value_type().is_some_and(nullable_type)
                    && p.modifiers.is_non_null(config.non_null_by_default)
            })
            .map(|p| p.name.clone())
            .collect();
        let throws = method
            .throws
            .iter()
            .filter_map(|t| match t {
                SpecType::Class { decl, name } => Some((*decl, name.clone())),
                _ => None,
            })
            .collect();
        Some(Self {
            id: decl.id,
            name: decl.name.clone(),
            visibility: decl.modifiers.visibility,
            is_pure: decl.modifiers.is_pure,
            is_constructor: method.is_constructor,
            overrides_something: !method.overrides.is_empty(),
            throws,
            non_null_params,
            non_null_result: !method.is_constructor
                && nullable_type(&method.return_ty)
                && decl.modifiers.is_non_null(config.non_null_by_default),
        })
    }

    pub fn kind_name(&self) -> &'static str {
        if self.is_constructor {
            "constructor"
        } else {
            "method"
        }
    }
}

fn nullable_type(ty: &SpecType) -> bool {
    matches!(ty, SpecType::Class { .. } | SpecType::Array(_))
}

pub struct Desugarer<'a> {
    symbols: &'a dyn SymbolTable,
    config: &'a AttrConfig,
}

struct Prefixes {
    /// Non-null preconditions and postcondition.
    full: ClausePrefix,
    /// Preconditions only, for exceptional cases.
    requires_only: ClausePrefix,
}

impl<'a> Desugarer<'a> {
    pub fn new(symbols: &'a dyn SymbolTable, config: &'a AttrConfig) -> Self {
        Self { symbols, config }
    }

    /// Desugar `raw`, the specification of `method`.
    pub fn desugar(
        &self,
        method: DeclId,
        raw: &MethodSpec,
        diags: &mut Diagnostics,
    ) -> Result<MethodSpec, HostError> {
        if raw.desugared {
            return Ok(raw.clone());
        }
        let decl = self.symbols.decl(method).ok_or(HostError::UnknownDecl(method))?;
        let Some(facts) = MethodFacts::from_decl(decl, self.symbols, self.config) else {
            diags.push(
                Diagnostic::internal(format!(
                    "method specification attached to {} {}",
                    decl.kind_name(),
                    decl.name
                ))
                .in_decl(method),
            );
            return Ok(MethodSpec {
                cases: Vec::new(),
                desugared: true,
            });
        };

        let raw_cases = if raw.cases.is_empty() {
            if facts.overrides_something {
                debug!(method = %method, "empty specification of an overriding method left empty");
                return Ok(MethodSpec {
                    cases: Vec::new(),
                    desugared: true,
                });
            }
            vec![default_case(&facts)]
        } else {
            raw.cases.clone()
        };

        let prefixes = common_prefix(&facts);
        let mut cases = Vec::new();
        for raw_case in &raw_cases {
            let case = denest::inject_boilerplate(raw_case);
            let mut order_diags = Diagnostics::new();
            order::check_case(&case.clauses, &mut order_diags);
            for d in order_diags {
                diags.push(d.in_decl(method));
            }

            for branch in denest::expand(case.behavior, &case.clauses) {
                let expansion = recommends::expand_recommends(&branch.clauses);
                cases.push(self.finish(
                    &facts,
                    &case,
                    branch.behavior,
                    case.origin,
                    expansion.clauses,
                    &prefixes,
                    diags,
                )?);
                if let Some(aux) = expansion.aux {
                    cases.push(self.finish(
                        &facts,
                        &case,
                        Behavior::Exceptional,
                        Origin::Synthesized,
                        aux,
                        &prefixes,
                        diags,
                    )?);
                }
            }
        }
        debug!(
            method = %method,
            raw = raw_cases.len(),
            flat = cases.len(),
            "desugared method specification"
        );
        Ok(MethodSpec {
            cases,
            desugared: true,
        })
    }

    /// Desugar through `cache`, keyed by the raw spec's content.
    pub fn desugar_memoized(
        &self,
        cache: &mut DesugarCache,
        method: DeclId,
        raw: &MethodSpec,
        diags: &mut Diagnostics,
    ) -> Result<MethodSpec, AttrError> {
        let key = DesugarCache::key(method, raw)?;
        if let Some(hit) = cache.lookup(&key) {
            return Ok(hit.clone());
        }
        let out = self
            .desugar(method, raw, diags)
            .map_err(|source| AttrError::collaborator(method, source))?;
        cache.store(key, out.clone());
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        facts: &MethodFacts,
        template: &SpecCase,
        behavior: Behavior,
        origin: Origin,
        clauses: Vec<Rc<Clause>>,
        prefixes: &Prefixes,
        diags: &mut Diagnostics,
    ) -> Result<SpecCase, HostError> {
        let clauses: Vec<Rc<Clause>> = clauses
            .into_iter()
            .filter(|c| {
                let ok = defaults::shape_matches(c);
                if !ok {
                    diags.push(
                        Diagnostic::error(
                            Category::Internal,
                            codes::WRONG_CLAUSE_SHAPE,
                            format!("{} clause has a malformed body", c.kind),
                        )
                        .at(c.span)
                        .in_decl(facts.id),
                    );
                }
                ok
            })
            .collect();
        let clauses = defaults::enforce_placement(facts, behavior, clauses, diags);
        let mut clauses = defaults::enforce_purity(facts, clauses, diags);

        let prefix = match behavior {
            Behavior::Exceptional => &prefixes.requires_only,
            _ => &prefixes.full,
        };
        defaults::add_defaults(facts, self.config, self.symbols, prefix, &mut clauses)?;
        trace!(method = %facts.id, ?behavior, clauses = clauses.len(), "flat case");

        Ok(SpecCase {
            visibility: template.visibility,
            behavior,
            also: template.also,
            origin,
            prefix: Rc::clone(prefix),
            clauses,
            span: template.span,
        })
    }
}

/// The case given to a method with no specification that overrides
/// nothing. Frame and exception defaults are added like for any case.
fn default_case(facts: &MethodFacts) -> SpecCase {
    let mut case = SpecCase::new(
        Behavior::Lightweight,
        facts.visibility,
        vec![Clause::synth_expr(ClauseKind::Ensures, Expr::bool(true))],
    );
    case.origin = Origin::Synthesized;
    case
}

fn common_prefix(facts: &MethodFacts) -> Prefixes {
    let requires: Vec<Rc<Clause>> = facts
        .non_null_params
        .iter()
        .map(|p| {
            Clause::synth_expr(
                ClauseKind::Requires,
                Expr::binary(BinaryOp::Ne, Expr::ident(p.as_str()), Expr::null()),
            )
        })
        .collect();
    let mut full = requires.clone();
    if facts.non_null_result {
        full.push(Clause::synth_expr(
            ClauseKind::Ensures,
            Expr::binary(BinaryOp::Ne, Expr::result(), Expr::null()),
        ));
    }
    Prefixes {
        full: Rc::new(full),
        requires_only: Rc::new(requires),
    }
}

/// Whether `spec` is in normalized form: marked desugared, with no nested
/// groups and no recommends clauses left.
pub fn is_flat(spec: &MethodSpec) -> bool {
    spec.desugared
        && spec.cases.iter().all(|case| {
            case.all_clauses()
                .all(|c| !matches!(c.body, ClauseBody::Group(_) | ClauseBody::Recommends { .. }))
        })
}
