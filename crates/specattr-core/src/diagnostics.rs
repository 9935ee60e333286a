//! User-facing defects found while attributing specifications.
//!
//! Diagnostics are values, not errors: passes record them and keep going so
//! that one compilation surfaces as many defects as possible.

use std::fmt;

use serde::Serialize;

use crate::decl::DeclId;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// Which family of check produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    /// Clause order within a case.
    Order,
    /// A clause in a case or position where it is not allowed.
    Placement,
    Visibility,
    /// Datagroup circularity, missing targets, secrecy violations.
    DataGroup,
    Type,
    Purity,
    /// An engine bug rather than a user error.
    Internal,
}

/// Stable diagnostic codes.
pub mod codes {
    pub const OUT_OF_ORDER: &str = "clause-out-of-order";
    pub const MISPLACED_CLAUSE: &str = "misplaced-clause";
    pub const WRONG_CLAUSE_SHAPE: &str = "wrong-clause-shape";

    pub const VISIBILITY_MISMATCH: &str = "visibility-mismatch";
    pub const VISIBILITY_TOO_LOW: &str = "visibility-too-low";
    pub const GROUP_LESS_VISIBLE: &str = "datagroup-less-visible";

    pub const CIRCULAR_DATAGROUP: &str = "circular-datagroup";
    pub const MISSING_DATAGROUP: &str = "missing-datagroup";
    pub const NOT_A_DATAGROUP: &str = "not-a-datagroup";
    pub const SECRET_READ: &str = "secret-read";
    pub const SECRET_WRITE: &str = "secret-write";

    pub const UNRESOLVED: &str = "unresolved-symbol";
    pub const TYPE_MISMATCH: &str = "type-mismatch";
    pub const BAD_OPERAND: &str = "bad-operand";
    pub const BAD_PSEUDO_IDENT: &str = "illegal-pseudo-identifier";
    pub const UNKNOWN_LABEL: &str = "unknown-label";
    pub const BAD_QUANT_MODIFIER: &str = "illegal-bound-modifier";
    pub const IGNORED_TRIGGERS: &str = "ignored-triggers";
    pub const BAD_MATCH: &str = "bad-match";
    pub const NON_EXHAUSTIVE_MATCH: &str = "non-exhaustive-match";
    pub const BAD_REPRESENTS: &str = "bad-represents";
    pub const BAD_CALLABLE: &str = "bad-callable";

    pub const IMPURE_CALL: &str = "impure-call";
    pub const PURE_ASSIGNS: &str = "pure-method-assigns";

    pub const INTERNAL: &str = "internal-error";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    pub code: &'static str,
    pub message: String,
    pub span: Span,
    /// Declaration being attributed when the defect was found.
    pub decl: Option<DeclId>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        category: Category,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            code,
            message: message.into(),
            span: Span::DUMMY,
            decl: None,
        }
    }

    pub fn error(category: Category, code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, code, message)
    }

    pub fn warning(category: Category, code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, Category::Internal, codes::INTERNAL, message)
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn in_decl(mut self, decl: DeclId) -> Self {
        self.decl.get_or_insert(decl);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        write!(f, "{level}[{}] {}: {}", self.code, self.span, self.message)
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    /// Diagnostics carrying the given code.
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn count(&self, code: &str) -> usize {
        self.with_code(code).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
