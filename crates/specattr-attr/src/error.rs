//! Error types for the attribution pipeline.
//!
//! Specification defects are reported as diagnostics, never as errors.
//! An `AttrError` means attribution of a unit could not proceed at all.

use specattr_core::{CoreError, DeclId, HostError};

#[derive(Debug, thiserror::Error)]
pub enum AttrError {
    /// A collaborator failed while `decl` was being attributed.
    #[error("attribution of {decl} aborted: {source}")]
    Collaborator {
        decl: DeclId,
        #[source]
        source: HostError,
    },

    #[error("declaration {0} is not known to the host")]
    UnknownDecl(DeclId),

    #[error("failed to read configuration {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigParse(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AttrError {
    pub fn collaborator(decl: DeclId, source: HostError) -> Self {
        AttrError::Collaborator { decl, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_failure_names_decl() {
        let err = AttrError::collaborator(DeclId(7), HostError::Unloadable("Base".into()));
        let text = err.to_string();
        assert!(text.contains("#7"));
        assert!(text.contains("Base"));
    }
}
