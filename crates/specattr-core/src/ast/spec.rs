//! Specifications attached to declarations, and their cases.

use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::clause::{Clause, Origin};
use crate::clause_kind::ClauseKind;
use crate::span::Span;
use crate::types::SpecType;
use crate::visibility::Visibility;

/// Behavior keyword heading a specification case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    /// No behavior keyword.
    #[default]
    Lightweight,
    /// `behavior`
    Heavyweight,
    /// `normal_behavior`: the method returns without throwing.
    Normal,
    /// `exceptional_behavior`: the method throws.
    Exceptional,
}

/// Shared, read-only clause list common to sibling cases.
pub type ClausePrefix = Rc<Vec<Rc<Clause>>>;

/// A self-contained bundle of clauses describing one behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecCase {
    pub visibility: Visibility,
    pub behavior: Behavior,
    /// Introduced with `also`: extends rather than replaces inherited cases.
    pub also: bool,
    pub origin: Origin,
    /// Implicit clauses prepended by desugaring, aliased across siblings.
    pub prefix: ClausePrefix,
    pub clauses: Vec<Rc<Clause>>,
    pub span: Span,
}

impl SpecCase {
    pub fn new(behavior: Behavior, visibility: Visibility, clauses: Vec<Rc<Clause>>) -> Self {
        Self {
            visibility,
            behavior,
            also: false,
            origin: Origin::User,
            prefix: Rc::new(Vec::new()),
            clauses,
            span: Span::DUMMY,
        }
    }

    pub fn lightweight(clauses: Vec<Rc<Clause>>) -> Self {
        Self::new(Behavior::Lightweight, Visibility::Package, clauses)
    }

    pub fn normal(visibility: Visibility, clauses: Vec<Rc<Clause>>) -> Self {
        Self::new(Behavior::Normal, visibility, clauses)
    }

    pub fn exceptional(visibility: Visibility, clauses: Vec<Rc<Clause>>) -> Self {
        Self::new(Behavior::Exceptional, visibility, clauses)
    }

    /// Prefix clauses followed by the case's own clauses.
    pub fn all_clauses(&self) -> impl Iterator<Item = &Rc<Clause>> + '_ {
        self.prefix.iter().chain(self.clauses.iter())
    }

    pub fn has_kind(&self, kind: ClauseKind) -> bool {
        self.all_clauses().any(|c| c.kind == kind)
    }

    pub fn clauses_of(&self, kind: ClauseKind) -> impl Iterator<Item = &Rc<Clause>> + '_ {
        self.all_clauses().filter(move |c| c.kind == kind)
    }
}

/// Specification of a method: an ordered list of cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub cases: Vec<SpecCase>,
    /// Set once the cases are in normalized flat form.
    pub desugared: bool,
}

impl MethodSpec {
    pub fn new(cases: Vec<SpecCase>) -> Self {
        Self {
            cases,
            desugared: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// A type-level clause with its own visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeClause {
    pub visibility: Visibility,
    pub is_static: bool,
    pub clause: Rc<Clause>,
}

impl TypeClause {
    pub fn new(visibility: Visibility, clause: Rc<Clause>) -> Self {
        Self {
            visibility,
            is_static: false,
            clause,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub clauses: Vec<TypeClause>,
}

/// `in` and `maps` annotations of a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub clauses: Vec<Rc<Clause>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Specification {
    Type(TypeSpec),
    Method(MethodSpec),
    Field(FieldSpec),
}

impl Specification {
    pub fn as_method(&self) -> Option<&MethodSpec> {
        match self {
            Specification::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeSpec> {
        match self {
            Specification::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldSpec> {
        match self {
            Specification::Field(f) => Some(f),
            _ => None,
        }
    }
}

/// Locals in scope at a program point, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    pub locals: IndexMap<String, SpecType>,
}

impl ScopeSnapshot {
    pub fn with(mut self, name: impl Into<String>, ty: SpecType) -> Self {
        self.locals.insert(name.into(), ty);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SpecType> {
        self.locals.get(name)
    }
}

/// A statement-level clause (`assert`, `loop_invariant`, ...) and the
/// locals visible where it appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSpec {
    pub clause: Rc<Clause>,
    pub scope: ScopeSnapshot,
}
