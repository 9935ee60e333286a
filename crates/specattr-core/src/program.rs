//! An in-memory host: declaration table, specification store, status
//! sink, and diagnostic sink in one value.
//!
//! Hosts that already own a symbol table implement the traits in
//! [`host`](crate::host) directly; `Program` serves embedders without one
//! and every test in the workspace.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::ast::{ScopeSnapshot, Specification, StatementSpec};
use crate::decl::{
    DatatypeCtor, Decl, DeclId, DeclKind, FieldDecl, MethodDecl, Modifiers, TypeDecl, VarDecl,
};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{CoreError, HostError};
use crate::host::{AttrStatus, Reporter, SpecRepository, StatusSink, SymbolTable};
use crate::span::Span;
use crate::types::SpecType;

/// Name of the marker type whose fields are pure datagroups.
pub const DATA_GROUP_TYPE: &str = "JMLDataGroup";

/// Types every program starts with.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub object: DeclId,
    pub throwable: DeclId,
    pub exception: DeclId,
    pub runtime_exception: DeclId,
    pub error: DeclId,
    pub string: DeclId,
    pub data_group: DeclId,
}

#[derive(Debug)]
pub struct Program {
    decls: Vec<Decl>,
    types: IndexMap<String, DeclId>,
    specs: HashMap<DeclId, Specification>,
    statement_specs: HashMap<DeclId, Vec<StatementSpec>>,
    labels: HashMap<DeclId, IndexMap<String, ScopeSnapshot>>,
    unloadable: HashSet<String>,
    statuses: RefCell<HashMap<DeclId, AttrStatus>>,
    diagnostics: RefCell<Diagnostics>,
    builtins: Builtins,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        let placeholder = DeclId(0);
        let mut program = Program {
            decls: Vec::new(),
            types: IndexMap::new(),
            specs: HashMap::new(),
            statement_specs: HashMap::new(),
            labels: HashMap::new(),
            unloadable: HashSet::new(),
            statuses: RefCell::new(HashMap::new()),
            diagnostics: RefCell::new(Diagnostics::new()),
            builtins: Builtins {
                object: placeholder,
                throwable: placeholder,
                exception: placeholder,
                runtime_exception: placeholder,
                error: placeholder,
                string: placeholder,
                data_group: placeholder,
            },
        };
        let object = program.push_type(
            "Object",
            Vec::new(),
            TypeDecl::default(),
            Modifiers::public(),
        );
        let throwable = program.push_type(
            "Throwable",
            vec![object],
            TypeDecl::default(),
            Modifiers::public(),
        );
        let exception = program.push_type(
            "Exception",
            vec![throwable],
            TypeDecl::default(),
            Modifiers::public(),
        );
        let runtime_exception = program.push_type(
            "RuntimeException",
            vec![exception],
            TypeDecl::default(),
            Modifiers::public(),
        );
        let error = program.push_type(
            "Error",
            vec![throwable],
            TypeDecl::default(),
            Modifiers::public(),
        );
        let string = program.push_type(
            "String",
            vec![object],
            TypeDecl::default(),
            Modifiers::public().final_(),
        );
        let data_group = program.push_type(
            DATA_GROUP_TYPE,
            vec![object],
            TypeDecl::default(),
            Modifiers::public(),
        );
        program.builtins = Builtins {
            object,
            throwable,
            exception,
            runtime_exception,
            error,
            string,
            data_group,
        };
        program
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    fn push(
        &mut self,
        name: &str,
        kind: DeclKind,
        modifiers: Modifiers,
        owner: Option<DeclId>,
    ) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Decl {
            id,
            name: name.to_string(),
            kind,
            modifiers,
            owner,
            span: Span::DUMMY,
        });
        id
    }

    fn push_type(
        &mut self,
        name: &str,
        supertypes: Vec<DeclId>,
        mut ty: TypeDecl,
        modifiers: Modifiers,
    ) -> DeclId {
        ty.supertypes = supertypes;
        let id = self.push(name, DeclKind::Type(ty), modifiers, None);
        self.types.insert(name.to_string(), id);
        id
    }

    fn get(&self, id: DeclId) -> Result<&Decl, CoreError> {
        self.decls.get(id.0 as usize).ok_or(CoreError::UnknownDecl(id))
    }

    fn get_mut(&mut self, id: DeclId) -> Result<&mut Decl, CoreError> {
        self.decls.get_mut(id.0 as usize).ok_or(CoreError::UnknownDecl(id))
    }

    fn type_mut(&mut self, id: DeclId) -> Result<&mut TypeDecl, CoreError> {
        let decl = self.get_mut(id)?;
        let found = decl.kind_name();
        match &mut decl.kind {
            DeclKind::Type(t) => Ok(t),
            _ => Err(CoreError::WrongKind {
                id,
                found,
                expected: "type",
            }),
        }
    }

    fn method_mut(&mut self, id: DeclId) -> Result<&mut MethodDecl, CoreError> {
        let decl = self.get_mut(id)?;
        let found = decl.kind_name();
        match &mut decl.kind {
            DeclKind::Method(m) => Ok(m),
            _ => Err(CoreError::WrongKind {
                id,
                found,
                expected: "method",
            }),
        }
    }

    fn check_type_name(&self, name: &str) -> Result<(), CoreError> {
        if self.types.contains_key(name) {
            return Err(CoreError::DuplicateType(name.to_string()));
        }
        Ok(())
    }

    /// Declare a class; with no supertypes it extends `Object`.
    pub fn add_class(
        &mut self,
        name: &str,
        supertypes: &[DeclId],
        modifiers: Modifiers,
    ) -> Result<DeclId, CoreError> {
        self.check_type_name(name)?;
        for sup in supertypes {
            self.type_mut(*sup)?;
        }
        let supers = if supertypes.is_empty() {
            vec![self.builtins.object]
        } else {
            supertypes.to_vec()
        };
        Ok(self.push_type(name, supers, TypeDecl::default(), modifiers))
    }

    pub fn add_interface(
        &mut self,
        name: &str,
        supertypes: &[DeclId],
    ) -> Result<DeclId, CoreError> {
        let id = self.add_class(name, supertypes, Modifiers::public())?;
        self.type_mut(id)?.is_interface = true;
        Ok(id)
    }

    /// Declare an algebraic datatype with the given constructors.
    pub fn add_datatype(
        &mut self,
        name: &str,
        constructors: Vec<DatatypeCtor>,
    ) -> Result<DeclId, CoreError> {
        self.check_type_name(name)?;
        let ty = TypeDecl {
            constructors,
            ..TypeDecl::default()
        };
        Ok(self.push_type(name, Vec::new(), ty, Modifiers::public()))
    }

    fn add_member(
        &mut self,
        owner: DeclId,
        name: &str,
        kind: DeclKind,
        modifiers: Modifiers,
    ) -> Result<DeclId, CoreError> {
        self.type_mut(owner)?;
        let id = self.push(name, kind, modifiers, Some(owner));
        self.type_mut(owner)?.members.push(id);
        Ok(id)
    }

    pub fn add_field(
        &mut self,
        owner: DeclId,
        name: &str,
        ty: SpecType,
        modifiers: Modifiers,
    ) -> Result<DeclId, CoreError> {
        let duplicate = self
            .declared_members(owner)?
            .any(|m| m.is_field() && m.name == name);
        if duplicate {
            return Err(CoreError::DuplicateMember {
                owner,
                name: name.to_string(),
            });
        }
        self.add_member(owner, name, DeclKind::Field(FieldDecl { ty }), modifiers)
    }

    /// Declare a model field of type `JMLDataGroup`.
    pub fn add_datagroup(
        &mut self,
        owner: DeclId,
        name: &str,
        modifiers: Modifiers,
    ) -> Result<DeclId, CoreError> {
        let ty = self.class_type(self.builtins.data_group)?;
        self.add_field(owner, name, ty, modifiers.model())
    }

    pub fn add_method(
        &mut self,
        owner: DeclId,
        name: &str,
        return_ty: SpecType,
        modifiers: Modifiers,
    ) -> Result<DeclId, CoreError> {
        let method = MethodDecl {
            params: Vec::new(),
            return_ty,
            throws: Vec::new(),
            overrides: Vec::new(),
            is_constructor: false,
        };
        self.add_member(owner, name, DeclKind::Method(method), modifiers)
    }

    pub fn add_constructor(
        &mut self,
        owner: DeclId,
        modifiers: Modifiers,
    ) -> Result<DeclId, CoreError> {
        let name = self.get(owner)?.name.clone();
        let id = self.add_method(owner, &name, SpecType::Void, modifiers)?;
        self.method_mut(id)?.is_constructor = true;
        Ok(id)
    }

    pub fn add_param(
        &mut self,
        method: DeclId,
        name: &str,
        ty: SpecType,
        modifiers: Modifiers,
    ) -> Result<DeclId, CoreError> {
        self.method_mut(method)?;
        let id = self.push(name, DeclKind::Param(VarDecl { ty }), modifiers, Some(method));
        self.method_mut(method)?.params.push(id);
        Ok(id)
    }

    pub fn set_throws(&mut self, method: DeclId, throws: Vec<SpecType>) -> Result<(), CoreError> {
        self.method_mut(method)?.throws = throws;
        Ok(())
    }

    pub fn set_overrides(
        &mut self,
        method: DeclId,
        overrides: Vec<DeclId>,
    ) -> Result<(), CoreError> {
        self.method_mut(method)?.overrides = overrides;
        Ok(())
    }

    pub fn set_span(&mut self, id: DeclId, span: Span) -> Result<(), CoreError> {
        self.get_mut(id)?.span = span;
        Ok(())
    }

    pub fn set_spec(&mut self, id: DeclId, spec: Specification) -> Result<(), CoreError> {
        self.get(id)?;
        self.specs.insert(id, spec);
        Ok(())
    }

    /// Record the locals in scope at `label` inside `method`.
    pub fn add_label(
        &mut self,
        method: DeclId,
        label: &str,
        scope: ScopeSnapshot,
    ) -> Result<(), CoreError> {
        self.method_mut(method)?;
        self.labels.entry(method).or_default().insert(label.to_string(), scope);
        Ok(())
    }

    pub fn add_statement_spec(
        &mut self,
        method: DeclId,
        spec: StatementSpec,
    ) -> Result<(), CoreError> {
        self.method_mut(method)?;
        self.statement_specs.entry(method).or_default().push(spec);
        Ok(())
    }

    /// Make every lookup that reaches type `name` fail as a class-loading error.
    pub fn mark_unloadable(&mut self, name: &str) {
        self.unloadable.insert(name.to_string());
    }

    /// The value type of a declared class or datatype.
    pub fn class_type(&self, id: DeclId) -> Result<SpecType, CoreError> {
        let decl = self.get(id)?;
        match &decl.kind {
            DeclKind::Type(t) if t.is_datatype() => Ok(SpecType::Datatype {
                decl: id,
                name: decl.name.clone(),
            }),
            DeclKind::Type(_) => Ok(SpecType::Class {
                decl: id,
                name: decl.name.clone(),
            }),
            _ => Err(CoreError::WrongKind {
                id,
                found: decl.kind_name(),
                expected: "type",
            }),
        }
    }

    pub fn type_by_name(&self, name: &str) -> Option<DeclId> {
        self.types.get(name).copied()
    }

    /// User-declared types in declaration order, builtins excluded.
    pub fn user_types(&self) -> Vec<DeclId> {
        let first_user = self.builtins.data_group.0 + 1;
        self.types.values().copied().filter(|id| id.0 >= first_user).collect()
    }

    fn declared_members(&self, owner: DeclId) -> Result<impl Iterator<Item = &Decl>, CoreError> {
        let ty = self.get(owner)?.as_type().ok_or(CoreError::WrongKind {
            id: owner,
            found: "non-type",
            expected: "type",
        })?;
        Ok(ty.members.iter().filter_map(|m| self.decls.get(m.0 as usize)))
    }

    /// `owner` followed by its supertypes, breadth first, failing on any
    /// type marked unloadable.
    fn linearize(&self, owner: DeclId) -> Result<Vec<DeclId>, HostError> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([owner]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let decl = self.decls.get(id.0 as usize).ok_or(HostError::UnknownDecl(id))?;
            if self.unloadable.contains(&decl.name) {
                return Err(HostError::Unloadable(decl.name.clone()));
            }
            order.push(id);
            if let Some(t) = decl.as_type() {
                queue.extend(t.supertypes.iter().copied());
            }
        }
        Ok(order)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.borrow().clone()
    }

    pub fn take_diagnostics(&self) -> Diagnostics {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }
}

impl SymbolTable for Program {
    fn decl(&self, id: DeclId) -> Option<&Decl> {
        self.decls.get(id.0 as usize)
    }

    fn lookup_type(&self, name: &str) -> Result<Option<DeclId>, HostError> {
        if self.unloadable.contains(name) {
            return Err(HostError::Unloadable(name.to_string()));
        }
        Ok(self.types.get(name).copied())
    }

    fn lookup_field(&self, owner: DeclId, name: &str) -> Result<Option<DeclId>, HostError> {
        for ty in self.linearize(owner)? {
            let found = self
                .declared_members(ty)
                .ok()
                .and_then(|mut members| members.find(|m| m.is_field() && m.name == name))
                .map(|m| m.id);
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    fn lookup_methods(&self, owner: DeclId, name: &str) -> Result<Vec<DeclId>, HostError> {
        let mut out = Vec::new();
        for ty in self.linearize(owner)? {
            if let Ok(members) = self.declared_members(ty) {
                out.extend(members.filter(|m| m.is_method() && m.name == name).map(|m| m.id));
            }
        }
        Ok(out)
    }

    fn is_subtype(&self, sub: DeclId, sup: DeclId) -> bool {
        let mut stack = vec![sub];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == sup {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(t) = self.decls.get(id.0 as usize).and_then(Decl::as_type) {
                stack.extend(t.supertypes.iter().copied());
            }
        }
        false
    }

    fn label_snapshot(&self, method: DeclId, label: &str) -> Option<&ScopeSnapshot> {
        self.labels.get(&method).and_then(|labels| labels.get(label))
    }
}

impl SpecRepository for Program {
    fn specification(&self, id: DeclId) -> Option<&Specification> {
        self.specs.get(&id)
    }

    fn statement_specs(&self, method: DeclId) -> &[StatementSpec] {
        self.statement_specs.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl StatusSink for Program {
    fn status(&self, id: DeclId) -> AttrStatus {
        self.statuses.borrow().get(&id).copied().unwrap_or_default()
    }

    fn set_status(&self, id: DeclId, status: AttrStatus) {
        self.statuses.borrow_mut().insert(id, status);
    }
}

impl Reporter for Program {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_exception_hierarchy() {
        let p = Program::new();
        let b = *p.builtins();
        assert!(p.is_subtype(b.runtime_exception, b.exception));
        assert!(p.is_subtype(b.exception, b.throwable));
        assert!(p.is_subtype(b.error, b.object));
        assert!(!p.is_subtype(b.error, b.exception));
        assert!(p.user_types().is_empty());
    }

    #[test]
    fn fields_are_inherited() {
        let mut p = Program::new();
        let base = p.add_class("Base", &[], Modifiers::public()).unwrap();
        let f = p.add_field(base, "x", SpecType::int(), Modifiers::public()).unwrap();
        let derived = p.add_class("Derived", &[base], Modifiers::public()).unwrap();
        assert_eq!(p.lookup_field(derived, "x").unwrap(), Some(f));
        assert_eq!(p.lookup_field(derived, "y").unwrap(), None);
        assert_eq!(p.user_types(), vec![base, derived]);
    }

    #[test]
    fn duplicate_declarations_rejected() {
        let mut p = Program::new();
        let c = p.add_class("C", &[], Modifiers::public()).unwrap();
        p.add_field(c, "x", SpecType::int(), Modifiers::public()).unwrap();
        assert!(matches!(
            p.add_field(c, "x", SpecType::Boolean, Modifiers::public()),
            Err(CoreError::DuplicateMember { .. })
        ));
        assert!(matches!(
            p.add_class("C", &[], Modifiers::public()),
            Err(CoreError::DuplicateType(_))
        ));
    }

    #[test]
    fn unloadable_supertype_fails_lookup() {
        let mut p = Program::new();
        let base = p.add_class("Base", &[], Modifiers::public()).unwrap();
        let derived = p.add_class("Derived", &[base], Modifiers::public()).unwrap();
        p.mark_unloadable("Base");
        assert_eq!(
            p.lookup_field(derived, "x"),
            Err(HostError::Unloadable("Base".into()))
        );
        assert!(p.lookup_type("Base").is_err());
    }

    #[test]
    fn overloads_are_all_returned() {
        let mut p = Program::new();
        let c = p.add_class("C", &[], Modifiers::public()).unwrap();
        let m1 = p.add_method(c, "size", SpecType::int(), Modifiers::public()).unwrap();
        let m2 = p.add_method(c, "size", SpecType::int(), Modifiers::public()).unwrap();
        p.add_param(m2, "k", SpecType::int(), Modifiers::default()).unwrap();
        assert_eq!(p.lookup_methods(c, "size").unwrap(), vec![m1, m2]);
        assert!(p.add_param(c, "k", SpecType::int(), Modifiers::default()).is_err());
    }

    #[test]
    fn status_and_reports_through_shared_reference() {
        let p = Program::new();
        let id = p.builtins().object;
        assert_eq!(p.status(id), AttrStatus::Unattributed);
        p.set_status(id, AttrStatus::SpecsAttr);
        assert_eq!(p.status(id), AttrStatus::SpecsAttr);
        p.report(Diagnostic::internal("x"));
        assert_eq!(p.diagnostics().len(), 1);
        assert_eq!(p.take_diagnostics().len(), 1);
        assert!(p.diagnostics().is_empty());
    }
}
