//! The values provider: read-only computed inputs for templates
//!
//! Every template render sees the same injected context: the service
//! manifest, the raw arguments bag, generator metadata, and the repository
//! head branch. The `Arg` lookup on top of it is the only sanctioned way for
//! templates to consume arguments: it locates the argument spec in the
//! calling template's owning module, follows `from` indirection, validates
//! the value against the declared schema, and walks any remaining dotted
//! path.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use stencil_core::{validate_argument, zero_value, CoreError, Module, ServiceManifest};

/// Generator name reported to templates as `metadata.generator`
pub const GENERATOR: &str = "stencil";

/// Read-only computed inputs shared by every template in a render
#[derive(Debug, Clone)]
pub struct Values {
    /// The service manifest driving this render
    pub manifest: Arc<ServiceManifest>,

    /// Every resolved module, for `from` lookups
    pub modules: Vec<Arc<Module>>,

    /// Generator version string
    pub version: String,

    /// Head branch of the repository being generated into
    pub head_branch: String,
}

impl Values {
    pub fn new(manifest: Arc<ServiceManifest>, modules: Vec<Arc<Module>>) -> Self {
        Self {
            manifest,
            modules,
            version: env!("CARGO_PKG_VERSION").to_string(),
            head_branch: "main".to_string(),
        }
    }

    pub fn with_head_branch(mut self, branch: impl Into<String>) -> Self {
        self.head_branch = branch.into();
        self
    }
}

/// `metadata` as templates see it
#[derive(Debug, Serialize)]
pub struct Metadata<'a> {
    pub generator: &'static str,
    pub version: &'a str,
}

/// `repository` as templates see it
#[derive(Debug, Serialize)]
pub struct Repository<'a> {
    pub head_branch: &'a str,
}

/// `module` as templates see it
#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
}

/// A failed `Arg` lookup
#[derive(Error, Debug)]
pub enum ArgError {
    #[error("argument path must not be empty")]
    EmptyPath,

    #[error("unknown argument {name:?} (module {module:?} does not declare it)")]
    Unknown { name: String, module: String },

    #[error("invalid from: argument {name:?} defers to module {from:?} which is not a resolved dependency of {module:?}")]
    FromNotResolved {
        name: String,
        module: String,
        from: String,
    },

    #[error("invalid from: argument {name:?} has a cyclic from chain through module {module:?}")]
    FromCycle { name: String, module: String },

    #[error(transparent)]
    Schema(#[from] CoreError),

    #[error("path {path:?} not found in argument value")]
    PathNotFound { path: String },
}

/// Resolve `Arg("a.b.c")` for a template owned by `module`
pub fn resolve_arg(
    path: &str,
    module: &Arc<Module>,
    values: &Values,
) -> Result<JsonValue, ArgError> {
    let mut parts = path.split('.');
    let key = match parts.next() {
        Some(k) if !k.is_empty() => k,
        _ => return Err(ArgError::EmptyPath),
    };

    // locate the authoritative spec, following `from` indirection
    let mut owner = module.clone();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(module.name.clone());

    let spec = loop {
        let spec = match owner.manifest.arguments.get(key) {
            Some(spec) => spec.clone(),
            None => {
                return Err(ArgError::Unknown {
                    name: key.to_string(),
                    module: owner.name.clone(),
                });
            }
        };

        match &spec.from {
            Some(from) => {
                if !visited.insert(from.clone()) {
                    return Err(ArgError::FromCycle {
                        name: key.to_string(),
                        module: from.clone(),
                    });
                }
                owner = values
                    .modules
                    .iter()
                    .find(|m| &m.name == from)
                    .cloned()
                    .ok_or_else(|| ArgError::FromNotResolved {
                        name: key.to_string(),
                        module: owner.name.clone(),
                        from: from.clone(),
                    })?;
            }
            None => break spec,
        }
    };

    let schema = spec
        .schema
        .clone()
        .or_else(|| spec.type_hint.as_ref().map(|t| json!({ "type": t })));

    // the value always comes from the service manifest's flat bag, even when
    // the schema lives in another module
    let value = match values.manifest.arguments.get(key) {
        Some(value) => value.clone(),
        None => schema.as_ref().map(zero_value).unwrap_or(JsonValue::Null),
    };

    if let Some(schema) = &schema {
        validate_argument(&owner.uri, key, schema, &value)?;
    }

    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return Ok(value);
    }
    match stencil_core::values::walk(&value, &rest) {
        Some(leaf) => Ok(leaf.clone()),
        None => Err(ArgError::PathNotFound {
            path: path.to_string(),
        }),
    }
}
