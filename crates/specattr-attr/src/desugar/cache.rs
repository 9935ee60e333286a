//! Memoization of desugared method specifications.

use std::collections::HashMap;

use specattr_core::ast::MethodSpec;
use specattr_core::{content_hash, hash_hex, ContentHash, CoreError, DeclId};

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Desugared specs keyed by method and the content hash of the raw spec,
/// so an edited spec for the same method is desugared afresh.
#[derive(Debug, Clone, Default)]
pub struct DesugarCache {
    entries: HashMap<(DeclId, ContentHash), MethodSpec>,
    hits: usize,
    misses: usize,
}

impl DesugarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(method: DeclId, raw: &MethodSpec) -> Result<(DeclId, ContentHash), CoreError> {
        Ok((method, content_hash(raw)?))
    }

    pub fn lookup(&mut self, key: &(DeclId, ContentHash)) -> Option<&MethodSpec> {
        match self.entries.get(key) {
            Some(spec) => {
                self.hits += 1;
                tracing::trace!(method = %key.0, hash = %hash_hex(&key.1), "desugar cache hit");
                Some(spec)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn store(&mut self, key: (DeclId, ContentHash), spec: MethodSpec) {
        self.entries.insert(key, spec);
    }

    /// Drop every entry for `method`.
    pub fn invalidate(&mut self, method: DeclId) {
        self.entries.retain(|(m, _), _| *m != method);
    }

    pub fn statistics(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}
