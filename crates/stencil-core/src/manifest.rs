//! Service and template-repository manifests
//!
//! A service manifest (`manifest.yaml` in the generated project) declares the
//! modules a project is built from and the arguments handed to their
//! templates. Each template module ships its own manifest describing the
//! arguments it accepts, its transitive module dependencies, directory
//! replacements, and post-run commands.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// Name of the manifest file inside a project or template repository
pub const MANIFEST_NAME: &str = "manifest.yaml";

/// The service manifest: what a project wants generated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceManifest {
    /// Project name
    pub name: String,

    /// Arguments handed to templates, keyed by argument name
    #[serde(default)]
    pub arguments: BTreeMap<String, JsonValue>,

    /// Modules this project is generated from
    #[serde(default)]
    pub modules: Vec<ModuleRef>,

    /// Source replacements, module name -> alternate URI
    #[serde(default)]
    pub replacements: BTreeMap<String, String>,
}

impl ServiceManifest {
    /// Load a service manifest from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a service manifest from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(yaml)?;
        Ok(manifest)
    }
}

/// A reference to a module from a service manifest or from another module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleRef {
    /// Module name, typically `host/org/repo`
    pub name: String,

    /// Explicit source URL, overriding the name-derived location
    #[serde(default)]
    pub url: Option<String>,

    /// Version constraint: a semver range, an exact version, or a branch name
    #[serde(default)]
    pub version: Option<String>,

    /// Prerelease channel (e.g. `rc`, `unstable`)
    #[serde(default)]
    pub channel: Option<String>,
}

impl ModuleRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

/// What a template repository contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    /// The repository exposes templates under `templates/`
    Templates,
    /// The repository exposes a native extension
    Extension,
}

/// Set of module types declared by a repository manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleTypes(pub Vec<ModuleType>);

impl Default for ModuleTypes {
    fn default() -> Self {
        Self(vec![ModuleType::Templates])
    }
}

impl ModuleTypes {
    pub fn contains(&self, t: ModuleType) -> bool {
        self.0.contains(&t)
    }
}

/// An argument declared by a template repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Argument {
    /// JSON-Schema fragment validating the argument value
    #[serde(default)]
    pub schema: Option<JsonValue>,

    /// Name of the module whose spec for this argument is authoritative
    #[serde(default)]
    pub from: Option<String>,

    /// Deprecated shorthand for `schema: {type: <type>}`
    #[serde(default, rename = "type")]
    pub type_hint: Option<String>,
}

/// A command run after files have been written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRunCommand {
    /// Human-readable name, shown while running
    pub name: String,

    /// Shell command, executed via `bash -c`
    pub command: String,
}

/// The manifest of a template repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRepositoryManifest {
    /// Module name
    pub name: String,

    /// Repository types, defaults to `[templates]`
    #[serde(default, rename = "type")]
    pub types: ModuleTypes,

    /// Arguments this module accepts
    #[serde(default)]
    pub arguments: BTreeMap<String, Argument>,

    /// Transitive module dependencies
    #[serde(default)]
    pub modules: Vec<ModuleRef>,

    /// Directory replacements, source dir -> template expression
    #[serde(default)]
    pub dir_replacements: BTreeMap<String, String>,

    /// Commands to run after a render has been written
    #[serde(default)]
    pub post_run_command: Vec<PostRunCommand>,
}

impl TemplateRepositoryManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a template repository manifest from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(yaml)?;
        Ok(manifest)
    }

    /// Load a template repository manifest from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_manifest_parse() {
        let manifest = ServiceManifest::from_yaml(
            r#"
name: testing-service
arguments:
  hello: world
  replicas: 3
modules:
  - name: github.com/example/stencil-base
    version: ">=0.5.0"
  - name: github.com/example/stencil-ci
    channel: rc
replacements:
  github.com/example/stencil-base: file://testdata
"#,
        )
        .unwrap();

        assert_eq!(manifest.name, "testing-service");
        assert_eq!(manifest.arguments["hello"], "world");
        assert_eq!(manifest.modules.len(), 2);
        assert_eq!(
            manifest.modules[0].version.as_deref(),
            Some(">=0.5.0")
        );
        assert_eq!(manifest.modules[1].channel.as_deref(), Some("rc"));
        assert_eq!(
            manifest.replacements["github.com/example/stencil-base"],
            "file://testdata"
        );
    }

    #[test]
    fn test_repository_manifest_parse() {
        let manifest = TemplateRepositoryManifest::from_yaml(
            r#"
name: github.com/example/stencil-base
type: [templates, extension]
arguments:
  serviceName:
    schema:
      type: string
  org:
    from: github.com/example/stencil-org
  legacy:
    type: string
modules:
  - name: github.com/example/stencil-org
dirReplacements:
  service: "{{ stencil.Arg(\"serviceName\") }}"
postRunCommand:
  - name: format
    command: gofmt -w .
"#,
        )
        .unwrap();

        assert!(manifest.types.contains(ModuleType::Templates));
        assert!(manifest.types.contains(ModuleType::Extension));
        assert!(manifest.arguments["serviceName"].schema.is_some());
        assert_eq!(
            manifest.arguments["org"].from.as_deref(),
            Some("github.com/example/stencil-org")
        );
        assert_eq!(manifest.arguments["legacy"].type_hint.as_deref(), Some("string"));
        assert_eq!(manifest.dir_replacements.len(), 1);
        assert_eq!(manifest.post_run_command[0].name, "format");
    }

    #[test]
    fn test_repository_manifest_defaults() {
        let manifest = TemplateRepositoryManifest::from_yaml("name: minimal").unwrap();

        assert!(manifest.types.contains(ModuleType::Templates));
        assert!(!manifest.types.contains(ModuleType::Extension));
        assert!(manifest.arguments.is_empty());
        assert!(manifest.modules.is_empty());
        assert!(manifest.dir_replacements.is_empty());
    }
}
