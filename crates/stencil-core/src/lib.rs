//! Stencil Core - Shared types for the stencil code generator
//!
//! This crate provides the foundational types used throughout stencil:
//! - `ServiceManifest` / `TemplateRepositoryManifest`: project and module manifests
//! - `Module`: a resolved, versioned bundle of templates and arguments
//! - `values` / `schema`: the polymorphic argument tree and its validation
//! - `blocks`: preserved-block and deviation markers in generated files
//! - `files`: sandboxed working-directory access for templates
//! - `Lockfile`: the reproducibility record written after a render

pub mod blocks;
pub mod error;
pub mod files;
pub mod lockfile;
pub mod manifest;
pub mod module;
pub mod schema;
pub mod values;

pub use blocks::{has_deviation, parse_blocks};
pub use error::{CoreError, Result};
pub use files::{DirProvider, MemoryProvider, WorkspaceProvider};
pub use lockfile::{Lockfile, LockfileFileEntry, LockfileModuleEntry, LOCKFILE_NAME};
pub use manifest::{
    Argument, ModuleRef, ModuleType, ModuleTypes, PostRunCommand, ServiceManifest,
    TemplateRepositoryManifest, MANIFEST_NAME,
};
pub use module::{Module, ModuleFilesystem, ModuleVersion, TemplateFile, TEMPLATES_DIR};
pub use schema::{build_error_path, validate_argument, zero_value};
