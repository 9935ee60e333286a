//! Data model for behavioral specification attribution.
//!
//! This crate holds everything the attribution passes share: program
//! declarations, the specification AST (expressions, clauses, cases), the
//! specification type lattice, the closed [`ClauseKind`] registry,
//! visibility and secrecy annotations, diagnostics, and the collaborator
//! traits through which a host compiler supplies symbols and stores
//! specifications. [`Program`] is an in-memory host implementing all of
//! those traits.

pub mod ast;
pub mod clause_kind;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod hash;
pub mod host;
pub mod program;
pub mod span;
pub mod types;
pub mod visibility;

pub use clause_kind::{ClauseCheck, ClauseInfo, ClauseKind, OrderRole, Placement, VisibilityRule};
pub use decl::{DatatypeCtor, Decl, DeclId, DeclKind, Modifiers, Nullity};
pub use diagnostics::{codes, Category, Diagnostic, Diagnostics, Severity};
pub use error::{CoreError, HostError};
pub use hash::{content_hash, hash_hex, ContentHash};
pub use host::{AttrStatus, Host, Reporter, SpecRepository, StatusSink, SymbolTable};
pub use program::{Builtins, Program, DATA_GROUP_TYPE};
pub use span::Span;
pub use types::{IntKind, PrimitiveType, SpecType, TypeRef, TypeRefKind};
pub use visibility::{Secrecy, Visibility};
