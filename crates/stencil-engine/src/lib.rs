//! Stencil Engine - the two-pass template rendering engine
//!
//! The engine takes a service manifest and a set of resolved modules and
//! renders every template they expose, twice:
//!
//! - **pass 1** populates the cross-template shared data (module hooks and
//!   globals); file output is discarded
//! - between passes, hook lists are sorted into a stable structural order
//!   and directory-replacement expressions are rendered
//! - **pass 2** observes the complete shared state and emits the final files
//!
//! The engine never writes to disk; callers receive the rendered templates
//! and turn them into files and a lockfile themselves.

pub mod context;
pub mod error;
pub mod functions;
pub mod renderer;
pub mod shared;
pub mod template;

pub use context::{ArgError, Values, GENERATOR};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use renderer::{CancelToken, Renderer};
pub use shared::SharedData;
pub use template::{File, Template};
