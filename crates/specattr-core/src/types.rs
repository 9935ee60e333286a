//! The specification type lattice.
//!
//! Specification expressions are typed over the host language's primitive and
//! reference types extended with mathematical types: arbitrary-precision
//! integers (`\bigint`), reals (`\real`), runtime type values (`\TYPE`),
//! finite sets and sequences, and user-declared algebraic datatypes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decl::DeclId;
use crate::span::Span;

/// Width of a host-language integral type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntKind {
    Byte,
    Short,
    Char,
    Int,
    Long,
}

impl IntKind {
    fn keyword(self) -> &'static str {
        match self {
            IntKind::Byte => "byte",
            IntKind::Short => "short",
            IntKind::Char => "char",
            IntKind::Int => "int",
            IntKind::Long => "long",
        }
    }
}

/// A resolved specification type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecType {
    Boolean,
    Int(IntKind),
    Float,
    Double,
    /// `\bigint`: mathematical integer.
    BigInt,
    /// `\real`: mathematical real.
    Real,
    /// `\TYPE`: the type of runtime type values.
    TypeOfType,
    /// A declared class or interface.
    Class { decl: DeclId, name: String },
    /// A declared algebraic datatype.
    Datatype { decl: DeclId, name: String },
    Array(Box<SpecType>),
    Set(Box<SpecType>),
    Seq(Box<SpecType>),
    /// The type of the `null` literal.
    Null,
    Void,
    /// Absorbs cascading errors after a reported type error.
    Error,
}

impl SpecType {
    pub fn int() -> Self {
        SpecType::Int(IntKind::Int)
    }

    pub fn long() -> Self {
        SpecType::Int(IntKind::Long)
    }

    pub fn array_of(element: SpecType) -> Self {
        SpecType::Array(Box::new(element))
    }

    pub fn set_of(element: SpecType) -> Self {
        SpecType::Set(Box::new(element))
    }

    pub fn seq_of(element: SpecType) -> Self {
        SpecType::Seq(Box::new(element))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SpecType::Error)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, SpecType::Boolean)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, SpecType::Int(_) | SpecType::BigInt)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SpecType::Int(_)
                | SpecType::Float
                | SpecType::Double
                | SpecType::BigInt
                | SpecType::Real
        )
    }

    /// Types whose values may be `null` in the host language.
    pub fn is_reference(&self) -> bool {
        matches!(self, SpecType::Class { .. } | SpecType::Array(_) | SpecType::Null)
    }

    /// Types compared by identity with `==`.
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            SpecType::Class { .. }
                | SpecType::Array(_)
                | SpecType::Null
                | SpecType::Set(_)
                | SpecType::Seq(_)
                | SpecType::Datatype { .. }
                | SpecType::TypeOfType
        )
    }

    /// Element type of arrays, sets, and sequences.
    pub fn element_type(&self) -> Option<&SpecType> {
        match self {
            SpecType::Array(e) | SpecType::Set(e) | SpecType::Seq(e) => Some(e),
            _ => None,
        }
    }

    pub fn class_decl(&self) -> Option<DeclId> {
        match self {
            SpecType::Class { decl, .. } => Some(*decl),
            _ => None,
        }
    }

    /// Unary numeric promotion: sub-int integral kinds widen to `int`.
    pub fn unary_promoted(&self) -> Option<SpecType> {
        match self {
            SpecType::Int(IntKind::Byte | IntKind::Short | IntKind::Char) => Some(SpecType::int()),
            t if t.is_numeric() => Some(t.clone()),
            _ => None,
        }
    }

    /// Binary numeric promotion extended with the mathematical types.
    ///
    /// `\real` dominates everything; `\bigint` dominates the integral kinds
    /// and widens to `\real` when combined with a floating-point operand.
    pub fn binary_promoted(&self, other: &SpecType) -> Option<SpecType> {
        if !self.is_numeric() || !other.is_numeric() {
            return None;
        }
        let either = |t: &SpecType| self == t || other == t;
        let floating = |t: &SpecType| matches!(t, SpecType::Float | SpecType::Double);
        let ty = if either(&SpecType::Real) {
            SpecType::Real
        } else if either(&SpecType::BigInt) {
            if floating(self) || floating(other) {
                SpecType::Real
            } else {
                SpecType::BigInt
            }
        } else if either(&SpecType::Double) {
            SpecType::Double
        } else if either(&SpecType::Float) {
            SpecType::Float
        } else if either(&SpecType::long()) {
            SpecType::long()
        } else {
            SpecType::int()
        };
        Some(ty)
    }

    /// Whether a value of numeric type `self` widens to numeric type `target`
    /// without an explicit cast.
    pub fn widens_to(&self, target: &SpecType) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (SpecType::Int(_) | SpecType::BigInt, SpecType::BigInt) => true,
            (s, SpecType::Real) if s.is_numeric() => true,
            (SpecType::Int(a), SpecType::Int(b)) => int_widens(*a, *b),
            (SpecType::Int(_), SpecType::Float | SpecType::Double) => true,
            (SpecType::Float, SpecType::Double) => true,
            _ => false,
        }
    }
}

fn int_widens(from: IntKind, to: IntKind) -> bool {
    use IntKind::*;
    match from {
        Byte => matches!(to, Short | Int | Long),
        Short => matches!(to, Int | Long),
        Char => matches!(to, Int | Long),
        Int => matches!(to, Long),
        Long => false,
    }
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecType::Boolean => write!(f, "boolean"),
            SpecType::Int(k) => write!(f, "{}", k.keyword()),
            SpecType::Float => write!(f, "float"),
            SpecType::Double => write!(f, "double"),
            SpecType::BigInt => write!(f, "\\bigint"),
            SpecType::Real => write!(f, "\\real"),
            SpecType::TypeOfType => write!(f, "\\TYPE"),
            SpecType::Class { name, .. } | SpecType::Datatype { name, .. } => write!(f, "{name}"),
            SpecType::Array(e) => write!(f, "{e}[]"),
            SpecType::Set(e) => write!(f, "set<{e}>"),
            SpecType::Seq(e) => write!(f, "seq<{e}>"),
            SpecType::Null => write!(f, "null"),
            SpecType::Void => write!(f, "void"),
            SpecType::Error => write!(f, "<error>"),
        }
    }
}

/// Primitive type keywords usable in specification source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Int(IntKind),
    Float,
    Double,
    BigInt,
    Real,
    TypeOfType,
}

impl From<PrimitiveType> for SpecType {
    fn from(p: PrimitiveType) -> Self {
        match p {
            PrimitiveType::Boolean => SpecType::Boolean,
            PrimitiveType::Int(k) => SpecType::Int(k),
            PrimitiveType::Float => SpecType::Float,
            PrimitiveType::Double => SpecType::Double,
            PrimitiveType::BigInt => SpecType::BigInt,
            PrimitiveType::Real => SpecType::Real,
            PrimitiveType::TypeOfType => SpecType::TypeOfType,
        }
    }
}

/// An unresolved type as written in a specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub kind: TypeRefKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRefKind {
    Primitive(PrimitiveType),
    Named(String),
    Array(Box<TypeRef>),
    Set(Box<TypeRef>),
    Seq(Box<TypeRef>),
}

impl TypeRef {
    pub fn new(kind: TypeRefKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(TypeRefKind::Named(name.into()), Span::DUMMY)
    }

    pub fn primitive(p: PrimitiveType) -> Self {
        Self::new(TypeRefKind::Primitive(p), Span::DUMMY)
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveType::Int(IntKind::Int))
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveType::Boolean)
    }

    pub fn array_of(element: TypeRef) -> Self {
        Self::new(TypeRefKind::Array(Box::new(element)), Span::DUMMY)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeRefKind::Primitive(p) => write!(f, "{}", SpecType::from(*p)),
            TypeRefKind::Named(n) => write!(f, "{n}"),
            TypeRefKind::Array(e) => write!(f, "{e}[]"),
            TypeRefKind::Set(e) => write!(f, "set<{e}>"),
            TypeRefKind::Seq(e) => write!(f, "seq<{e}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_prefers_mathematical_types() {
        let int = SpecType::int();
        assert_eq!(int.binary_promoted(&SpecType::long()), Some(SpecType::long()));
        assert_eq!(int.binary_promoted(&SpecType::BigInt), Some(SpecType::BigInt));
        assert_eq!(SpecType::BigInt.binary_promoted(&SpecType::Double), Some(SpecType::Real));
        assert_eq!(SpecType::Real.binary_promoted(&int), Some(SpecType::Real));
        assert_eq!(int.binary_promoted(&SpecType::Boolean), None);
    }

    #[test]
    fn small_integrals_promote_to_int() {
        assert_eq!(
            SpecType::Int(IntKind::Char).unary_promoted(),
            Some(SpecType::int())
        );
        assert_eq!(SpecType::Boolean.unary_promoted(), None);
    }

    #[test]
    fn widening() {
        assert!(SpecType::int().widens_to(&SpecType::long()));
        assert!(SpecType::long().widens_to(&SpecType::BigInt));
        assert!(SpecType::Double.widens_to(&SpecType::Real));
        assert!(!SpecType::long().widens_to(&SpecType::int()));
        assert!(!SpecType::Double.widens_to(&SpecType::BigInt));
    }

    #[test]
    fn display_forms() {
        assert_eq!(SpecType::set_of(SpecType::int()).to_string(), "set<int>");
        assert_eq!(SpecType::array_of(SpecType::Boolean).to_string(), "boolean[]");
        assert_eq!(TypeRef::array_of(TypeRef::named("Node")).to_string(), "Node[]");
    }
}
