//! Visibility levels and information-flow annotations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared visibility of a member or specification case.
///
/// The derived ordering is the one specification checks compare against:
/// `package < private < protected < public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Package,
    Private,
    Protected,
    Public,
}

impl Visibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Package => "package",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Public => "public",
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Package
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// `@Secret` / `@Query` annotations naming the datagroup that bounds what a
/// member may read or write.
///
/// An empty group name on a field means the field is its own group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Secrecy {
    pub secret: Option<String>,
    pub query: Option<String>,
}

impl Secrecy {
    pub fn secret(group: impl Into<String>) -> Self {
        Self {
            secret: Some(group.into()),
            query: None,
        }
    }

    pub fn query(group: impl Into<String>) -> Self {
        Self {
            secret: None,
            query: Some(group.into()),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.secret.is_none() && self.query.is_none()
    }
}
