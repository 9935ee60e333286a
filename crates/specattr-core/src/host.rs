//! Interfaces to the host compiler's collaborators.
//!
//! Attribution never parses, loads classes, or resolves ordinary code on its
//! own; it asks the host through these traits. [`Program`](crate::Program)
//! implements all of them in memory.

use serde::{Deserialize, Serialize};

use crate::ast::{ScopeSnapshot, Specification, StatementSpec};
use crate::decl::{Decl, DeclId};
use crate::diagnostics::Diagnostic;
use crate::error::HostError;

/// Name and type resolution for ordinary declarations.
pub trait SymbolTable {
    fn decl(&self, id: DeclId) -> Option<&Decl>;

    /// Resolve a type name. `Err` means the type exists but cannot be loaded.
    fn lookup_type(&self, name: &str) -> Result<Option<DeclId>, HostError>;

    /// A field of `owner` or of one of its supertypes.
    fn lookup_field(&self, owner: DeclId, name: &str) -> Result<Option<DeclId>, HostError>;

    /// Methods named `name` declared by `owner` or inherited, nearest first.
    fn lookup_methods(&self, owner: DeclId, name: &str) -> Result<Vec<DeclId>, HostError>;

    /// Reflexive, transitive subtyping between declared types.
    fn is_subtype(&self, sub: DeclId, sup: DeclId) -> bool;

    /// Locals in scope at label `label` inside `method`.
    fn label_snapshot(&self, method: DeclId, label: &str) -> Option<&ScopeSnapshot>;
}

/// The per-declaration specification store.
pub trait SpecRepository {
    fn specification(&self, id: DeclId) -> Option<&Specification>;

    /// Statement-level clauses written inside a method body.
    fn statement_specs(&self, method: DeclId) -> &[StatementSpec];
}

/// Attribution progress recorded on each declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrStatus {
    #[default]
    Unattributed,
    SpecsAttr,
    Error,
}

pub trait StatusSink {
    fn status(&self, id: DeclId) -> AttrStatus;
    fn set_status(&self, id: DeclId, status: AttrStatus);
}

/// Fire-and-continue diagnostic reporting.
pub trait Reporter {
    fn report(&self, diagnostic: Diagnostic);
}

/// Everything attribution needs from its host.
pub trait Host: SymbolTable + SpecRepository + StatusSink + Reporter {}

impl<T: SymbolTable + SpecRepository + StatusSink + Reporter> Host for T {}
