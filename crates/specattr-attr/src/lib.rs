//! Semantic passes over behavioral specifications.
//!
//! [`AttrDriver`] is the entry point: given a host implementing
//! [`specattr_core::Host`], it attributes a declaration's specifications
//! and those of every type it depends on. Along the way it validates
//! clause order ([`order`]), desugars method specifications into flat
//! cases ([`desugar`]), checks visibility and datagroup secrecy
//! ([`lattice`], [`datagroup`]), type-checks expressions ([`expr`]), and
//! optionally synthesizes runtime forms for quantifiers ([`rac`]).

pub mod config;
pub mod context;
pub mod datagroup;
pub mod desugar;
pub mod driver;
pub mod error;
pub mod expr;
pub mod lattice;
pub mod order;
pub mod rac;

pub use config::{AttrConfig, PurityCheck};
pub use context::{AttrContext, Binding, BindingKind};
pub use datagroup::{Access, DataGroups, SecrecyContext, SecrecyViolation};
pub use desugar::{is_flat, CacheStats, DesugarCache, Desugarer};
pub use driver::{AttrDriver, Progress};
pub use error::AttrError;
pub use expr::{AttrOutput, Attributor};
pub use rac::{RacForm, Strategy};
