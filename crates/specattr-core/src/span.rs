//! Source positions carried by declarations, clauses, and expressions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` in the host compilation unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Position used for synthesized nodes with no source text.
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_dummy(&self) -> bool {
        *self == Span::DUMMY
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_union() {
        let a = Span::new(4, 9);
        let b = Span::new(2, 6);
        assert_eq!(a.to(b), Span::new(2, 9));
        assert!(!a.is_dummy());
        assert!(Span::DUMMY.is_dummy());
    }
}
