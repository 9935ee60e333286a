//! Per-declaration attribution with deferred completion.
//!
//! Requests for a type are queued. A type reached while another is being
//! attributed (a supertype, say) is only queued, and the drain loop picks it
//! up afterwards, so no type is attributed re-entrantly. Each type moves
//! through [`Progress`] once;
//! repeated requests for a type that is in progress or done are ignored.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use serde::Serialize;
use specattr_core::ast::{
    Behavior, ClauseBody, ExprKind, GroupRef, MethodSpec, Specification, StoreRef,
};
use specattr_core::{
    codes, AttrStatus, Category, ClauseKind, CoreError, Decl, DeclId, Diagnostic, Diagnostics, Host,
    HostError, Span, SpecType, DATA_GROUP_TYPE,
};
use tracing::{debug, trace, warn};

use crate::config::AttrConfig;
use crate::context::{AttrContext, Binding, BindingKind};
use crate::datagroup::{DataGroups, SecrecyContext};
use crate::desugar::{CacheStats, DesugarCache, Desugarer};
use crate::error::AttrError;
use crate::expr::{AttrOutput, Attributor};
use crate::lattice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Pending,
    InProgress,
    Done,
}

/// Drives attribution of a host's declarations.
pub struct AttrDriver<'h, H: Host> {
    host: &'h H,
    config: AttrConfig,
    groups: DataGroups,
    cache: DesugarCache,
    output: AttrOutput,
    normalized: IndexMap<DeclId, MethodSpec>,
    /// Desugaring diagnostics not yet reported with their type.
    desugar_diags: HashMap<DeclId, Diagnostics>,
    /// Datagroup registration diagnostics, keyed by the declaring type.
    group_diags: HashMap<DeclId, Diagnostics>,
    registered: HashSet<DeclId>,
    progress: HashMap<DeclId, Progress>,
    queue: VecDeque<DeclId>,
}

#[derive(Serialize)]
struct ExportedSpec<'s> {
    method: DeclId,
    name: &'s str,
    spec: &'s MethodSpec,
}

impl<'h, H: Host> AttrDriver<'h, H> {
    pub fn new(host: &'h H, config: AttrConfig) -> Self {
        Self {
            host,
            config,
            groups: DataGroups::new(),
            cache: DesugarCache::new(),
            output: AttrOutput::default(),
            normalized: IndexMap::new(),
            desugar_diags: HashMap::new(),
            group_diags: HashMap::new(),
            registered: HashSet::new(),
            progress: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &AttrConfig {
        &self.config
    }

    pub fn output(&self) -> &AttrOutput {
        &self.output
    }

    pub fn groups(&self) -> &DataGroups {
        &self.groups
    }

    pub fn progress(&self, id: DeclId) -> Option<Progress> {
        self.progress.get(&id).copied()
    }

    /// The normalized spec of `method`, if it has been desugared.
    pub fn normalized(&self, method: DeclId) -> Option<&MethodSpec> {
        self.normalized.get(&method)
    }

    pub fn cache_statistics(&self) -> CacheStats {
        self.cache.statistics()
    }

    /// Attribute the specifications of `id` and everything its type needs.
    ///
    /// A member is attributed as part of its enclosing type. Nothing happens
    /// once the declaration has a status other than `Unattributed`. User
    /// defects go to the host's reporter; an `Err` means a collaborator
    /// failed and the unit it was attributing was abandoned.
    pub fn attribute_declaration(&mut self, id: DeclId) -> Result<AttrStatus, AttrError> {
        let target = self.owning_type(id)?;
        let status = self.host.status(target);
        if status != AttrStatus::Unattributed {
            trace!(decl = %id, ?status, "already attributed");
            return Ok(status);
        }
        self.request(target);
        self.drain()?;
        Ok(self.host.status(target))
    }

    /// The normalized form of `method`'s specification. Memoized: the same
    /// raw spec is desugared once.
    pub fn desugar(&mut self, method: DeclId) -> Result<MethodSpec, AttrError> {
        if let Some(spec) = self.normalized.get(&method) {
            return Ok(spec.clone());
        }
        let host = self.host;
        let raw = host
            .specification(method)
            .and_then(Specification::as_method)
            .cloned()
            .unwrap_or_default();
        let mut diags = Diagnostics::new();
        let desugarer = Desugarer::new(host, &self.config);
        let spec = desugarer.desugar_memoized(&mut self.cache, method, &raw, &mut diags)?;
        if !diags.is_empty() {
            self.desugar_diags.insert(method, diags);
        }
        self.normalized.insert(method, spec.clone());
        Ok(spec)
    }

    /// Every normalized spec produced so far, as a JSON array in the order
    /// the methods were desugared.
    pub fn export_json(&self) -> Result<String, AttrError> {
        let exported: Vec<ExportedSpec<'_>> = self
            .normalized
            .iter()
            .map(|(id, spec)| ExportedSpec {
                method: *id,
                name: self.host.decl(*id).map(|d| d.name.as_str()).unwrap_or(""),
                spec,
            })
            .collect();
        serde_json::to_string_pretty(&exported)
            .map_err(|e| CoreError::Serialization(e.to_string()).into())
    }

    fn owning_type(&self, id: DeclId) -> Result<DeclId, AttrError> {
        let mut current = id;
        loop {
            let decl = self.host.decl(current).ok_or(AttrError::UnknownDecl(current))?;
            if decl.is_type() {
                return Ok(current);
            }
            current = decl.owner.ok_or(AttrError::UnknownDecl(id))?;
        }
    }

    fn request(&mut self, ty: DeclId) {
        if self.progress.contains_key(&ty) || self.host.status(ty) != AttrStatus::Unattributed {
            return;
        }
        trace!(decl = %ty, "queued");
        self.progress.insert(ty, Progress::Pending);
        self.queue.push_back(ty);
    }

    /// Attribute queued types until none are left. A collaborator failure
    /// abandons only its own type; the first one is returned after the
    /// queue is empty.
    fn drain(&mut self) -> Result<(), AttrError> {
        debug!(queued = self.queue.len(), "draining attribution queue");
        let mut first_error = None;
        while let Some(ty) = self.queue.pop_front() {
            if let Err(err) = self.run(ty) {
                first_error.get_or_insert(err);
            }
        }
        debug!("attribution queue empty");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run(&mut self, ty: DeclId) -> Result<(), AttrError> {
        self.progress.insert(ty, Progress::InProgress);
        debug!(decl = %ty, "attributing type");
        let result = self.attribute_type(ty);
        self.progress.insert(ty, Progress::Done);
        match result {
            Ok(diags) => {
                let status = if diags.has_errors() {
                    AttrStatus::Error
                } else {
                    AttrStatus::SpecsAttr
                };
                debug!(decl = %ty, diagnostics = diags.len(), ?status, "type attributed");
                for d in diags {
                    self.host.report(d);
                }
                self.set_status(ty, status);
                Ok(())
            }
            Err(err) => {
                warn!(decl = %ty, error = %err, "attribution aborted");
                self.set_status(ty, AttrStatus::Error);
                Err(err)
            }
        }
    }

    fn set_status(&self, ty: DeclId, status: AttrStatus) {
        self.host.set_status(ty, status);
        if let Some(t) = self.host.decl(ty).and_then(Decl::as_type) {
            for member in &t.members {
                self.host.set_status(*member, status);
            }
        }
    }

    fn decl(&self, id: DeclId) -> Result<&'h Decl, HostError> {
        self.host.decl(id).ok_or(HostError::UnknownDecl(id))
    }

    fn attribute_type(&mut self, ty: DeclId) -> Result<Diagnostics, AttrError> {
        let host = self.host;
        let wrap = |source| AttrError::collaborator(ty, source);
        let decl = host.decl(ty).ok_or(AttrError::UnknownDecl(ty))?;
        let type_decl = decl.as_type().ok_or(AttrError::UnknownDecl(ty))?;

        for sup in &type_decl.supertypes {
            self.request(*sup);
        }
        self.register_groups(ty).map_err(wrap)?;
        let mut diags = self.group_diags.remove(&ty).unwrap_or_default();

        for member in &type_decl.members {
            let field = self.decl(*member).map_err(wrap)?;
            if !field.is_field() {
                continue;
            }
            if let Some(cycle) = self.groups.check_field_once(field.id) {
                let path: Vec<String> = cycle.iter().map(|id| self.name_of(*id)).collect();
                diags.push(
                    Diagnostic::error(
                        Category::DataGroup,
                        codes::CIRCULAR_DATAGROUP,
                        format!("circular datagroup membership: {}", path.join(" -> ")),
                    )
                    .at(field.span)
                    .in_decl(field.id),
                );
            }
        }

        let class_cx = AttrContext::for_class(ty);
        if let Some(spec) = host.specification(ty).and_then(Specification::as_type) {
            let mut attr = Attributor::new(
                host,
                &self.config,
                &self.groups,
                &mut self.output,
                &mut diags,
                ty,
            );
            for tc in &spec.clauses {
                attr.attr_type_clause(tc, &class_cx).map_err(wrap)?;
            }
        }

        for member in &type_decl.members {
            let m = self.decl(*member).map_err(wrap)?;
            if m.is_method() {
                self.attribute_method(ty, m, &class_cx, &mut diags)?;
            }
        }
        Ok(diags)
    }

    fn attribute_method(
        &mut self,
        ty: DeclId,
        m: &'h Decl,
        class_cx: &AttrContext,
        diags: &mut Diagnostics,
    ) -> Result<(), AttrError> {
        let host = self.host;
        let wrap = |source| AttrError::collaborator(ty, source);
        let Some(method) = m.as_method() else {
            return Ok(());
        };
        trace!(method = %m.name, "attributing method specification");
        let spec = self.desugar(m.id)?;
        if let Some(pending) = self.desugar_diags.remove(&m.id) {
            diags.extend(pending);
        }
        let secrecy = self.secrecy_of(ty, m, diags).map_err(wrap)?;

        let mut attr = Attributor::new(
            host,
            &self.config,
            &self.groups,
            &mut self.output,
            diags,
            m.id,
        );
        let params = attr.param_bindings(m.id).map_err(wrap)?;
        let cx = class_cx
            .with_method(m.id, method.return_ty.clone(), m.modifiers.is_static)
            .bind_all(params.clone())
            .with_secrecy(secrecy);
        for case in &spec.cases {
            let visibility = match case.behavior {
                Behavior::Lightweight => m.modifiers.visibility,
                _ => case.visibility,
            };
            attr.attr_case_as(case, visibility, &cx).map_err(wrap)?;
        }
        for stmt in host.statement_specs(m.id) {
            let mut locals = params.clone();
            locals.extend(
                stmt.scope
                    .locals
                    .iter()
                    .map(|(name, ty)| (name.clone(), Binding::new(ty.clone(), BindingKind::Local))),
            );
            attr.attr_statement(stmt, &cx.with_fresh_scope(locals)).map_err(wrap)?;
        }
        Ok(())
    }

    /// The secrecy context of a method annotated `@Secret` or `@Query`.
    fn secrecy_of(
        &self,
        ty: DeclId,
        m: &Decl,
        diags: &mut Diagnostics,
    ) -> Result<SecrecyContext, HostError> {
        let secrecy = &m.modifiers.secrecy;
        type Make = fn(DeclId) -> SecrecyContext;
        let (name, make): (_, Make) = match (&secrecy.secret, &secrecy.query) {
            (Some(g), _) => (g, SecrecyContext::secret),
            (None, Some(g)) => (g, SecrecyContext::query),
            (None, None) => return Ok(SecrecyContext::default()),
        };
        match self.host.lookup_field(ty, name)? {
            Some(group) => Ok(make(group)),
            None => {
                diags.push(
                    Diagnostic::error(
                        Category::DataGroup,
                        codes::MISSING_DATAGROUP,
                        format!("secrecy group {name} of {} does not exist", m.name),
                    )
                    .at(m.span)
                    .in_decl(m.id),
                );
                Ok(SecrecyContext::default())
            }
        }
    }

    /// Register the `in`, `maps`, and secrecy edges declared by the fields
    /// of `ty` and of its supertypes, once per type.
    fn register_groups(&mut self, ty: DeclId) -> Result<(), HostError> {
        if !self.registered.insert(ty) {
            return Ok(());
        }
        let host = self.host;
        let Some(type_decl) = self.decl(ty)?.as_type() else {
            return Ok(());
        };
        for sup in &type_decl.supertypes {
            self.register_groups(*sup)?;
        }
        let mut diags = Diagnostics::new();
        for member in &type_decl.members {
            let field = self.decl(*member)?;
            if !field.is_field() {
                continue;
            }
            self.register_secret(ty, field, &mut diags)?;
            let Some(spec) = host.specification(field.id).and_then(Specification::as_field) else {
                continue;
            };
            for clause in &spec.clauses {
                match (clause.kind, &clause.body) {
                    (ClauseKind::In, ClauseBody::InGroups(groups)) => {
                        for g in groups {
                            let group = self.resolve_group(ty, field, g, true, &mut diags)?;
                            if let Some(group) = group {
                                self.groups.add_in(field.id, group);
                            }
                        }
                    }
                    (ClauseKind::Maps, ClauseBody::Maps { member, groups }) => {
                        let mapped =
                            self.resolve_mapped(ty, field, member, clause.span, &mut diags)?;
                        let Some(mapped) = mapped else {
                            continue;
                        };
                        for g in groups {
                            let group = self.resolve_group(ty, field, g, false, &mut diags)?;
                            if let Some(group) = group {
                                self.groups.add_maps(mapped, group);
                            }
                        }
                    }
                    (kind, _) => diags.push(
                        Diagnostic::error(
                            Category::Placement,
                            codes::MISPLACED_CLAUSE,
                            format!("{kind} clause is not allowed on a field"),
                        )
                        .at(clause.span)
                        .in_decl(field.id),
                    ),
                }
            }
        }
        trace!(decl = %ty, "datagroups registered");
        self.group_diags.entry(ty).or_default().extend(diags);
        Ok(())
    }

    fn register_secret(
        &mut self,
        ty: DeclId,
        field: &Decl,
        diags: &mut Diagnostics,
    ) -> Result<(), HostError> {
        let Some(name) = &field.modifiers.secrecy.secret else {
            return Ok(());
        };
        // An unnamed secret field is its own group.
        let group = if name.is_empty() {
            Some(field.id)
        } else {
            self.host.lookup_field(ty, name)?
        };
        match group {
            Some(group) => self.groups.set_secret(field.id, group),
            None => diags.push(
                Diagnostic::error(
                    Category::DataGroup,
                    codes::MISSING_DATAGROUP,
                    format!("secrecy group {name} of field {} does not exist", field.name),
                )
                .at(field.span)
                .in_decl(field.id),
            ),
        }
        Ok(())
    }

    fn resolve_group(
        &self,
        ty: DeclId,
        field: &Decl,
        g: &GroupRef,
        check_visibility: bool,
        diags: &mut Diagnostics,
    ) -> Result<Option<DeclId>, HostError> {
        let Some(id) = self.host.lookup_field(ty, &g.name)? else {
            diags.push(
                Diagnostic::error(
                    Category::DataGroup,
                    codes::MISSING_DATAGROUP,
                    format!("datagroup {} of field {} does not exist", g.name, field.name),
                )
                .at(g.span)
                .in_decl(field.id),
            );
            return Ok(None);
        };
        let group = self.decl(id)?;
        if !is_datagroup(group) {
            diags.push(
                Diagnostic::error(
                    Category::DataGroup,
                    codes::NOT_A_DATAGROUP,
                    format!("{} is not a datagroup", group.name),
                )
                .at(g.span)
                .in_decl(field.id),
            );
            return Ok(None);
        }
        if check_visibility && self.config.check_visibility {
            if let Err(violation) = lattice::check_group_membership(field, group) {
                diags.push(violation.to_diagnostic().at(g.span).in_decl(field.id));
            }
        }
        Ok(Some(id))
    }

    /// The member named on the left of a `maps` clause: `f` or `this.f`,
    /// or `g.f` with `g` a field of this type.
    fn resolve_mapped(
        &self,
        ty: DeclId,
        field: &Decl,
        member: &StoreRef,
        span: Span,
        diags: &mut Diagnostics,
    ) -> Result<Option<DeclId>, HostError> {
        let resolved = match member {
            StoreRef::Field { target, name } => {
                let owner = match target.as_deref().map(|t| &t.kind) {
                    None | Some(ExprKind::This) => Some(ty),
                    Some(ExprKind::Ident(via)) => match self.host.lookup_field(ty, via)? {
                        Some(f) => self.decl(f)?.value_type().and_then(SpecType::class_decl),
                        None => None,
                    },
                    Some(_) => None,
                };
                match owner {
                    Some(owner) => self.host.lookup_field(owner, name)?,
                    None => None,
                }
            }
            _ => None,
        };
        if resolved.is_none() {
            diags.push(
                Diagnostic::error(
                    Category::DataGroup,
                    codes::UNRESOLVED,
                    format!("cannot resolve the member mapped by {}", field.name),
                )
                .at(span)
                .in_decl(field.id),
            );
        }
        Ok(resolved)
    }

    fn name_of(&self, id: DeclId) -> String {
        self.host
            .decl(id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

/// A field that can hold other fields: a model field or a declared
/// `JMLDataGroup`.
fn is_datagroup(decl: &Decl) -> bool {
    let declared_group =
        matches!(decl.value_type(), Some(SpecType::Class { name, .. }) if name == DATA_GROUP_TYPE);
    decl.is_field() && (decl.modifiers.is_model || declared_group)
}
