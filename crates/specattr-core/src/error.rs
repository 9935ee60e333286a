//! Error types for program construction and collaborator lookups.

use crate::decl::DeclId;

/// Errors building or querying an in-memory [`Program`](crate::Program).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("declaration {0} not found")]
    UnknownDecl(DeclId),

    #[error("declaration {id} is a {found}, expected a {expected}")]
    WrongKind {
        id: DeclId,
        found: &'static str,
        expected: &'static str,
    },

    #[error("type {0} is already declared")]
    DuplicateType(String),

    #[error("{owner} already declares a member named {name}")]
    DuplicateMember { owner: DeclId, name: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Failures of an external collaborator (symbol table, class loader).
///
/// These abort the current attribution unit and are rethrown to the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("type {0} could not be loaded")]
    Unloadable(String),

    #[error("declaration {0} is not known to the host")]
    UnknownDecl(DeclId),
}
