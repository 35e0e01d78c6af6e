//! Module sources
//!
//! The resolver is generic over where modules actually come from. A source
//! lists the versions available for a module name and materialises a module
//! at a chosen version, branch, or replacement URI. Fetching archives and
//! talking to hosting providers happens behind this trait, outside the
//! resolver.

use semver::Version;
use std::collections::HashMap;

use stencil_core::{Module, ModuleVersion};

use crate::constraint::channel_matches;
use crate::error::{ResolverError, Result};

/// Where modules are loaded from
pub trait ModuleSource {
    /// All released versions of a module, prereleases included
    fn versions(&self, name: &str) -> Result<Vec<Version>>;

    /// Materialise a module at a resolved version or branch
    fn load(&self, name: &str, version: &ModuleVersion) -> Result<Module>;

    /// Materialise a module from a replacement URI
    fn load_uri(&self, name: &str, uri: &str) -> Result<Module>;
}

/// An in-memory source, used by tests and module development tooling
#[derive(Debug, Default)]
pub struct InMemorySource {
    released: HashMap<String, Vec<Module>>,
    branches: HashMap<(String, String), Module>,
    uris: HashMap<String, Module>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its own name and version
    pub fn add(&mut self, module: Module) {
        match &module.version {
            ModuleVersion::Semver(_) => {
                self.released
                    .entry(module.name.clone())
                    .or_default()
                    .push(module);
            }
            ModuleVersion::Branch(branch) => {
                self.branches
                    .insert((module.name.clone(), branch.clone()), module);
            }
        }
    }

    /// Register a module behind a replacement URI
    pub fn add_uri(&mut self, uri: impl Into<String>, module: Module) {
        self.uris.insert(uri.into(), module);
    }

    /// Whether any candidate version of a module belongs to a channel
    pub fn has_channel(&self, name: &str, channel: &str) -> bool {
        self.released
            .get(name)
            .map(|modules| {
                modules.iter().any(|m| match &m.version {
                    ModuleVersion::Semver(v) => channel_matches(v, channel),
                    ModuleVersion::Branch(_) => false,
                })
            })
            .unwrap_or(false)
    }
}

impl ModuleSource for InMemorySource {
    fn versions(&self, name: &str) -> Result<Vec<Version>> {
        let Some(modules) = self.released.get(name) else {
            return Ok(Vec::new());
        };
        Ok(modules
            .iter()
            .filter_map(|m| match &m.version {
                ModuleVersion::Semver(v) => Some(v.clone()),
                ModuleVersion::Branch(_) => None,
            })
            .collect())
    }

    fn load(&self, name: &str, version: &ModuleVersion) -> Result<Module> {
        match version {
            ModuleVersion::Semver(wanted) => self
                .released
                .get(name)
                .and_then(|modules| {
                    modules
                        .iter()
                        .find(|m| m.version == ModuleVersion::Semver(wanted.clone()))
                })
                .cloned()
                .ok_or_else(|| ResolverError::VersionNotFound {
                    name: name.to_string(),
                    version: version.to_string(),
                }),
            ModuleVersion::Branch(branch) => self
                .branches
                .get(&(name.to_string(), branch.clone()))
                .cloned()
                .ok_or_else(|| ResolverError::VersionNotFound {
                    name: name.to_string(),
                    version: version.to_string(),
                }),
        }
    }

    fn load_uri(&self, name: &str, uri: &str) -> Result<Module> {
        self.uris
            .get(uri)
            .cloned()
            .ok_or_else(|| ResolverError::ModuleNotFound {
                name: format!("{name} ({uri})"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::TemplateRepositoryManifest;

    fn released(name: &str, version: &str) -> Module {
        Module::new(
            ModuleVersion::Semver(Version::parse(version).unwrap()),
            format!("https://{name}"),
            TemplateRepositoryManifest::new(name),
            stencil_core::ModuleFilesystem::Memory(Default::default()),
        )
    }

    #[test]
    fn test_versions_listing() {
        let mut source = InMemorySource::new();
        source.add(released("base", "0.1.0"));
        source.add(released("base", "0.3.2"));
        source.add(released("base", "0.6.0-rc.4"));

        let versions = source.versions("base").unwrap();
        assert_eq!(versions.len(), 3);
        assert!(source.versions("missing").unwrap().is_empty());
    }

    #[test]
    fn test_load_by_version_and_branch() {
        let mut source = InMemorySource::new();
        source.add(released("base", "0.3.2"));
        source.add(Module::new(
            ModuleVersion::Branch("main".into()),
            "https://base",
            TemplateRepositoryManifest::new("base"),
            stencil_core::ModuleFilesystem::Memory(Default::default()),
        ));

        let module = source
            .load("base", &ModuleVersion::Semver(Version::new(0, 3, 2)))
            .unwrap();
        assert_eq!(module.version.to_string(), "v0.3.2");

        let module = source
            .load("base", &ModuleVersion::Branch("main".into()))
            .unwrap();
        assert_eq!(module.version.to_string(), "main");

        assert!(source
            .load("base", &ModuleVersion::Semver(Version::new(9, 9, 9)))
            .is_err());
    }

    #[test]
    fn test_has_channel() {
        let mut source = InMemorySource::new();
        source.add(released("base", "0.6.0-rc.4"));

        assert!(source.has_channel("base", "rc"));
        assert!(!source.has_channel("base", "unstable"));
    }
}
