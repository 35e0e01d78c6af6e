//! Stencil Resolver - turns a service manifest into a concrete module set
//!
//! Given the service manifest's module references and, recursively, each
//! module's own manifest, the resolver produces a single consistent set of
//! pinned module versions:
//!
//! - version ranges from every referencing module are intersected
//! - prerelease channels are globally consistent per module
//! - a top-level branch pin wins over any transitive range
//! - replacements (URI redirects or in-memory modules) bypass the source
//!   while still contributing their own transitive constraints
//!
//! Fetching module archives lives behind the [`ModuleSource`] trait; the
//! resolver itself never touches the network.

pub mod constraint;
pub mod error;
pub mod resolver;
pub mod source;

pub use constraint::{parse_version, parse_version_spec, range_matches, VersionSpec};
pub use error::{ResolverError, Result};
pub use resolver::ModuleResolver;
pub use source::{InMemorySource, ModuleSource};
