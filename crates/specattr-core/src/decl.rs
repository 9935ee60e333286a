//! Program declarations that may carry specifications.
//!
//! Declarations are created by the host's ordinary front end and already carry
//! resolved types; this crate never re-resolves ordinary code.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::types::SpecType;
use crate::visibility::{Secrecy, Visibility};

/// Index of a declaration in the host's declaration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclId(pub u32);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declared nullity of a reference-typed declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nullity {
    /// Follows the compilation's non-null-by-default setting.
    #[default]
    Default,
    NonNull,
    Nullable,
}

/// Modifiers and annotations relevant to specification checking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub visibility: Visibility,
    /// `spec_public` / `spec_protected`: wider visibility inside specifications.
    pub spec_visibility: Option<Visibility>,
    pub is_static: bool,
    pub is_final: bool,
    pub is_pure: bool,
    pub is_helper: bool,
    /// Specification-only abstract field or method.
    pub is_model: bool,
    /// Specification-only concrete field or local.
    pub is_ghost: bool,
    pub nullity: Nullity,
    pub secrecy: Secrecy,
}

impl Modifiers {
    pub fn with_visibility(visibility: Visibility) -> Self {
        Self {
            visibility,
            ..Self::default()
        }
    }

    pub fn public() -> Self {
        Self::with_visibility(Visibility::Public)
    }

    pub fn private() -> Self {
        Self::with_visibility(Visibility::Private)
    }

    pub fn pure(mut self) -> Self {
        self.is_pure = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn model(mut self) -> Self {
        self.is_model = true;
        self
    }

    pub fn ghost(mut self) -> Self {
        self.is_ghost = true;
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn non_null(mut self) -> Self {
        self.nullity = Nullity::NonNull;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullity = Nullity::Nullable;
        self
    }

    pub fn spec_public(mut self) -> Self {
        self.spec_visibility = Some(Visibility::Public);
        self
    }

    pub fn spec_protected(mut self) -> Self {
        self.spec_visibility = Some(Visibility::Protected);
        self
    }

    pub fn secret(mut self, group: impl Into<String>) -> Self {
        self.secrecy.secret = Some(group.into());
        self
    }

    pub fn query(mut self, group: impl Into<String>) -> Self {
        self.secrecy.query = Some(group.into());
        self
    }

    /// Visibility as seen from inside specifications.
    pub fn spec_visibility_or_declared(&self) -> Visibility {
        match self.spec_visibility {
            Some(wider) if wider > self.visibility => wider,
            _ => self.visibility,
        }
    }

    pub fn is_spec_only(&self) -> bool {
        self.is_model || self.is_ghost
    }

    /// Whether a reference-typed declaration is non-null under the given default.
    pub fn is_non_null(&self, non_null_by_default: bool) -> bool {
        match self.nullity {
            Nullity::NonNull => true,
            Nullity::Nullable => false,
            Nullity::Default => non_null_by_default,
        }
    }
}

/// Constructor of an algebraic datatype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatatypeCtor {
    pub name: String,
    pub fields: Vec<SpecType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub supertypes: Vec<DeclId>,
    pub members: Vec<DeclId>,
    pub is_interface: bool,
    /// Non-empty for algebraic datatypes.
    pub constructors: Vec<DatatypeCtor>,
}

impl TypeDecl {
    pub fn is_datatype(&self) -> bool {
        !self.constructors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub ty: SpecType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub params: Vec<DeclId>,
    /// `Void` for void methods and constructors.
    pub return_ty: SpecType,
    /// Declared checked exceptions.
    pub throws: Vec<SpecType>,
    /// Supertype methods this method overrides.
    pub overrides: Vec<DeclId>,
    pub is_constructor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDecl {
    pub ty: SpecType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclKind {
    Type(TypeDecl),
    Field(FieldDecl),
    Method(MethodDecl),
    Param(VarDecl),
    Local(VarDecl),
}

/// A declaration: type, field, method, parameter, or local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decl {
    pub id: DeclId,
    pub name: String,
    pub kind: DeclKind,
    pub modifiers: Modifiers,
    /// Enclosing type (for members) or method (for parameters and locals).
    pub owner: Option<DeclId>,
    pub span: Span,
}

impl Decl {
    pub fn as_type(&self) -> Option<&TypeDecl> {
        match &self.kind {
            DeclKind::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodDecl> {
        match &self.kind {
            DeclKind::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, DeclKind::Field(_))
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind, DeclKind::Method(_))
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, DeclKind::Type(_))
    }

    /// Parameters and locals are scoped to a method body.
    pub fn is_local(&self) -> bool {
        matches!(self.kind, DeclKind::Param(_) | DeclKind::Local(_))
    }

    /// Value type of a field, parameter, or local.
    pub fn value_type(&self) -> Option<&SpecType> {
        match &self.kind {
            DeclKind::Field(f) => Some(&f.ty),
            DeclKind::Param(v) | DeclKind::Local(v) => Some(&v.ty),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DeclKind::Type(_) => "type",
            DeclKind::Field(_) => "field",
            DeclKind::Method(ref m) if m.is_constructor => "constructor",
            DeclKind::Method(_) => "method",
            DeclKind::Param(_) => "parameter",
            DeclKind::Local(_) => "local",
        }
    }
}
