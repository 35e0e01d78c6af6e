//! Module resolution with transitive constraint merging
//!
//! Resolution walks the module graph breadth-first from the service
//! manifest's direct modules. Every reference to a module contributes a
//! constraint with its provenance; the set only ever grows, and whenever a
//! newly discovered constraint invalidates an already chosen version the
//! whole solve restarts with the expanded set. The grow-only set bounds the
//! number of restarts, so resolution terminates even when modules reference
//! each other in cycles.

use indexmap::IndexMap;
use semver::Version;
use std::collections::{HashMap, HashSet, VecDeque};

use stencil_core::{Module, ModuleRef, ModuleVersion, ServiceManifest};

use crate::constraint::{channel_matches, parse_version_spec, range_matches, VersionSpec};
use crate::error::{ResolverError, Result};
use crate::source::ModuleSource;

/// A version requirement with its provenance
#[derive(Debug, Clone)]
struct Constraint {
    /// Who asked: `<service> (top-level)` or `<module>@<version>`
    origin: String,
    /// The constraint expression as written
    wants: String,
    /// The parsed range
    req: semver::VersionReq,
}

/// Everything known so far about one module name
#[derive(Debug, Clone, Default)]
struct ConstraintSet {
    history: Vec<Constraint>,
    seen: HashSet<String>,
    channel: Option<String>,
    branch: Option<String>,
    url: Option<String>,
}

impl ConstraintSet {
    /// Merge one reference into the set, returning whether anything new was
    /// recorded
    fn add(&mut self, name: &str, origin: &str, reference: &ModuleRef) -> Result<bool> {
        let mut added = false;

        if let Some(channel) = &reference.channel {
            match &self.channel {
                Some(existing) if existing != channel => {
                    return Err(ResolverError::ChannelConflict {
                        name: name.to_string(),
                        requested: channel.clone(),
                        existing: existing.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.channel = Some(channel.clone());
                    added = true;
                }
            }
        }

        if let Some(url) = &reference.url {
            if self.url.is_none() {
                self.url = Some(url.clone());
                added = true;
            }
        }

        match parse_version_spec(reference.version.as_deref()) {
            VersionSpec::Any => {}
            VersionSpec::Branch(branch) => {
                if self.branch.is_none() {
                    self.branch = Some(branch);
                    added = true;
                }
            }
            VersionSpec::Range(req) => {
                let wants = reference.version.clone().unwrap_or_default();
                let key = format!("{origin}\u{1}{wants}");
                if self.seen.insert(key) {
                    self.history.push(Constraint {
                        origin: origin.to_string(),
                        wants,
                        req,
                    });
                    added = true;
                }
            }
        }

        Ok(added)
    }

    /// Whether an already resolved module still satisfies this set
    ///
    /// Branch pins and in-memory replacements carry branch versions; ranges
    /// are recorded against them but not enforced.
    fn satisfied_by(&self, module: &Module) -> bool {
        match &module.version {
            ModuleVersion::Branch(_) => true,
            ModuleVersion::Semver(version) => self
                .history
                .iter()
                .all(|c| range_matches(&c.req, version, self.channel.as_deref())),
        }
    }

    /// Render the provenance chain for diagnostics
    fn chain(&self) -> String {
        let mut out = String::new();
        for (depth, constraint) in self.history.iter().enumerate() {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!(
                "└─ {} wants {}\n",
                constraint.origin, constraint.wants
            ));
        }
        out
    }
}

/// Resolves a service manifest into a concrete set of modules
pub struct ModuleResolver<'a> {
    source: &'a dyn ModuleSource,
    replacements: HashMap<String, Module>,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(source: &'a dyn ModuleSource) -> Self {
        Self {
            source,
            replacements: HashMap::new(),
        }
    }

    /// Register an in-memory module that replaces any reference to `name`
    ///
    /// The replacement bypasses the source entirely but still contributes its
    /// own transitive constraints.
    pub fn with_replacement(mut self, name: impl Into<String>, module: Module) -> Self {
        self.replacements.insert(name.into(), module);
        self
    }

    /// Resolve every module the service manifest requires, directly or
    /// transitively
    pub fn resolve(&self, manifest: &ServiceManifest) -> Result<Vec<Module>> {
        let top_origin = format!("{} (top-level)", manifest.name);
        let mut sets: HashMap<String, ConstraintSet> = HashMap::new();
        let mut roots: Vec<String> = Vec::new();

        for reference in &manifest.modules {
            if !roots.contains(&reference.name) {
                roots.push(reference.name.clone());
            }
            sets.entry(reference.name.clone())
                .or_default()
                .add(&reference.name, &top_origin, reference)?;
        }

        'solve: loop {
            let mut resolved: IndexMap<String, Module> = IndexMap::new();
            let mut queue: VecDeque<String> = roots.iter().cloned().collect();

            while let Some(name) = queue.pop_front() {
                if resolved.contains_key(&name) {
                    continue;
                }

                let set = sets.get(&name).cloned().unwrap_or_default();
                let module = self.load_module(manifest, &name, &set)?;
                let origin = format!("{}@{}", module.name, module.version);

                for dep in module.manifest.modules.clone() {
                    let dep_set = sets.entry(dep.name.clone()).or_default();
                    let added = dep_set.add(&dep.name, &origin, &dep)?;

                    match resolved.get(&dep.name) {
                        Some(existing) => {
                            if added && !dep_set.satisfied_by(existing) {
                                // a new constraint invalidated an earlier
                                // choice; re-solve with the expanded set
                                continue 'solve;
                            }
                        }
                        None => queue.push_back(dep.name.clone()),
                    }
                }

                resolved.insert(name, module);
            }

            return Ok(resolved.into_values().collect());
        }
    }

    fn load_module(
        &self,
        manifest: &ServiceManifest,
        name: &str,
        set: &ConstraintSet,
    ) -> Result<Module> {
        if let Some(replacement) = self.replacements.get(name) {
            return Ok(replacement.clone());
        }

        if let Some(uri) = manifest.replacements.get(name).or(set.url.as_ref()) {
            let mut module = self.source.load_uri(name, uri)?;
            module.uri = uri.clone();
            return Ok(module);
        }

        if let Some(branch) = &set.branch {
            return self
                .source
                .load(name, &ModuleVersion::Branch(branch.clone()));
        }

        let version = self.select_version(name, set)?;
        self.source.load(name, &ModuleVersion::Semver(version))
    }

    /// Pick the highest version satisfying every recorded range within the
    /// active channel
    fn select_version(&self, name: &str, set: &ConstraintSet) -> Result<Version> {
        let channel = set.channel.as_deref();
        let candidates = self.source.versions(name)?;

        candidates
            .into_iter()
            .filter(|v| {
                if v.pre.is_empty() {
                    true
                } else {
                    channel.map(|c| channel_matches(v, c)).unwrap_or(false)
                }
            })
            .filter(|v| {
                set.history
                    .iter()
                    .all(|c| range_matches(&c.req, v, channel))
            })
            .max()
            .ok_or_else(|| ResolverError::ConstraintUnsatisfiable {
                name: name.to_string(),
                chain: set.chain(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use stencil_core::{ModuleFilesystem, TemplateRepositoryManifest};

    const BASE: &str = "github.com/example/stencil-base";

    fn released(name: &str, version: &str, deps: Vec<ModuleRef>) -> Module {
        let mut manifest = TemplateRepositoryManifest::new(name);
        manifest.modules = deps;
        Module::new(
            ModuleVersion::Semver(Version::parse(version).unwrap()),
            format!("https://{name}"),
            manifest,
            ModuleFilesystem::Memory(Default::default()),
        )
    }

    fn branch(name: &str, branch_name: &str, deps: Vec<ModuleRef>) -> Module {
        let mut manifest = TemplateRepositoryManifest::new(name);
        manifest.modules = deps;
        Module::new(
            ModuleVersion::Branch(branch_name.into()),
            format!("https://{name}"),
            manifest,
            ModuleFilesystem::Memory(Default::default()),
        )
    }

    fn base_source() -> InMemorySource {
        let mut source = InMemorySource::new();
        for v in ["0.1.0", "0.3.0", "0.3.1", "0.3.2", "0.4.0", "0.5.0"] {
            source.add(released(BASE, v, vec![]));
        }
        source
    }

    fn service(modules: Vec<ModuleRef>) -> ServiceManifest {
        ServiceManifest {
            name: "testing-service".into(),
            modules,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolves_highest_version() {
        let source = base_source();
        let resolver = ModuleResolver::new(&source);

        let mods = resolver.resolve(&service(vec![ModuleRef::new(BASE)])).unwrap();
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].version.to_string(), "v0.5.0");
    }

    #[test]
    fn test_transitive_dependency_resolved() {
        let mut source = base_source();
        source.add(released(
            "app",
            "1.0.0",
            vec![ModuleRef::new(BASE).with_version("~0.3.0")],
        ));
        let resolver = ModuleResolver::new(&source);

        let mods = resolver.resolve(&service(vec![ModuleRef::new("app")])).unwrap();
        assert_eq!(mods.len(), 2);

        let base = mods.iter().find(|m| m.name == BASE).unwrap();
        assert_eq!(base.version.to_string(), "v0.3.2");
    }

    #[test]
    fn test_constraint_merge_picks_highest_shared_patch() {
        let source = base_source();
        let nested = Module::virtual_module(
            {
                let mut m = TemplateRepositoryManifest::new("nested_constraint");
                m.modules = vec![ModuleRef::new(BASE).with_version("~0.3.0")];
                m
            },
            &[],
        );
        let resolver = ModuleResolver::new(&source).with_replacement("nested_constraint", nested);

        let mods = resolver
            .resolve(&service(vec![
                ModuleRef::new(BASE).with_version("=<0.5.0"),
                ModuleRef::new("nested_constraint"),
            ]))
            .unwrap();

        assert_eq!(mods.len(), 2);
        let base = mods.iter().find(|m| m.name == BASE).unwrap();
        assert_eq!(base.version.to_string(), "v0.3.2");
    }

    #[test]
    fn test_incompatible_constraints_error() {
        let source = base_source();
        let nested = Module::virtual_module(
            {
                let mut m = TemplateRepositoryManifest::new("nested_constraint");
                m.modules = vec![ModuleRef::new(BASE).with_version("~0.3.0")];
                m
            },
            &[],
        );
        let resolver = ModuleResolver::new(&source).with_replacement("nested_constraint", nested);

        let err = resolver
            .resolve(&service(vec![
                ModuleRef::new(BASE).with_version(">=0.5.0"),
                ModuleRef::new("nested_constraint"),
            ]))
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("no version found matching criteria"), "{message}");
        assert!(
            message.contains("testing-service (top-level) wants >=0.5.0"),
            "{message}"
        );
        assert!(message.contains("nested_constraint@vfs wants ~0.3.0"), "{message}");
    }

    #[test]
    fn test_incompatible_channels_error() {
        let source = base_source();
        let resolver = ModuleResolver::new(&source);

        let err = resolver
            .resolve(&service(vec![
                ModuleRef::new(BASE).with_channel("rc"),
                ModuleRef::new(BASE).with_channel("unstable"),
            ]))
            .unwrap_err();

        assert!(err.to_string().contains("previously resolved with channel"));
    }

    #[test]
    fn test_channel_with_exact_prerelease() {
        let mut source = base_source();
        source.add(released(BASE, "0.6.0-rc.4", vec![]));
        let resolver = ModuleResolver::new(&source);

        let mods = resolver
            .resolve(&service(vec![ModuleRef::new(BASE)
                .with_version("v0.6.0-rc.4")
                .with_channel("rc")]))
            .unwrap();

        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].version.to_string(), "v0.6.0-rc.4");
    }

    #[test]
    fn test_channel_selects_prereleases() {
        let mut source = base_source();
        source.add(released(BASE, "0.6.0-rc.4", vec![]));
        let resolver = ModuleResolver::new(&source);

        let mods = resolver
            .resolve(&service(vec![ModuleRef::new(BASE).with_channel("rc")]))
            .unwrap();
        assert_eq!(mods[0].version.to_string(), "v0.6.0-rc.4");

        // without a channel, prereleases are not eligible
        let mods = resolver.resolve(&service(vec![ModuleRef::new(BASE)])).unwrap();
        assert_eq!(mods[0].version.to_string(), "v0.5.0");
    }

    #[test]
    fn test_branch_pin() {
        let mut source = base_source();
        source.add(branch(BASE, "main", vec![]));
        let resolver = ModuleResolver::new(&source);

        let mods = resolver
            .resolve(&service(vec![ModuleRef::new(BASE).with_version("main")]))
            .unwrap();
        assert_eq!(mods[0].version.to_string(), "main");
    }

    #[test]
    fn test_branch_wins_over_transitive_range() {
        let mut source = base_source();
        source.add(branch(BASE, "main", vec![]));
        let dep = Module::virtual_module(
            {
                let mut m = TemplateRepositoryManifest::new("test-dep");
                m.modules = vec![ModuleRef::new(BASE).with_version(">=v0.0.0")];
                m
            },
            &[],
        );
        let resolver = ModuleResolver::new(&source).with_replacement("test-dep", dep);

        let mods = resolver
            .resolve(&service(vec![
                ModuleRef::new(BASE).with_version("main"),
                ModuleRef::new("test-dep"),
            ]))
            .unwrap();

        let base = mods.iter().find(|m| m.name == BASE).unwrap();
        assert_eq!(base.version.to_string(), "main");
    }

    #[test]
    fn test_uri_replacement() {
        let mut source = base_source();
        source.add_uri("file://testdata", branch(BASE, "local", vec![]));
        let resolver = ModuleResolver::new(&source);

        let mut manifest = service(vec![ModuleRef::new(BASE)]);
        manifest
            .replacements
            .insert(BASE.into(), "file://testdata".into());

        let mods = resolver.resolve(&manifest).unwrap();
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].uri, "file://testdata");
    }

    #[test]
    fn test_replacement_transparency() {
        // an in-memory replacement still contributes transitive constraints
        let mut source = base_source();
        source.add(released("b", "1.2.0", vec![]));
        let replacement = Module::virtual_module(
            {
                let mut m = TemplateRepositoryManifest::new("a");
                m.modules = vec![ModuleRef::new("b").with_version("~1.2.0")];
                m
            },
            &[],
        );
        let resolver = ModuleResolver::new(&source).with_replacement("a", replacement);

        let mods = resolver.resolve(&service(vec![ModuleRef::new("a")])).unwrap();
        assert_eq!(mods.len(), 2);
        assert!(mods.iter().any(|m| m.name == "a"));
        assert!(mods.iter().any(|m| m.name == "b" && m.version.to_string() == "v1.2.0"));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut source = InMemorySource::new();
        source.add(released("a", "1.0.0", vec![ModuleRef::new("b")]));
        source.add(released("b", "1.0.0", vec![ModuleRef::new("a")]));
        let resolver = ModuleResolver::new(&source);

        let mods = resolver.resolve(&service(vec![ModuleRef::new("a")])).unwrap();
        assert_eq!(mods.len(), 2);
    }

    #[test]
    fn test_restart_on_late_constraint() {
        // base resolves to 0.5.0 first; a later module narrows it to ~0.3.0,
        // which forces a re-solve from scratch
        let mut source = base_source();
        source.add(released(
            "narrower",
            "1.0.0",
            vec![ModuleRef::new(BASE).with_version("~0.3.0")],
        ));
        let resolver = ModuleResolver::new(&source);

        let mods = resolver
            .resolve(&service(vec![
                ModuleRef::new(BASE),
                ModuleRef::new("narrower"),
            ]))
            .unwrap();

        assert_eq!(mods.len(), 2);
        let base = mods.iter().find(|m| m.name == BASE).unwrap();
        assert_eq!(base.version.to_string(), "v0.3.2");

        // exactly one entry per module name
        let mut names: Vec<&str> = mods.iter().map(|m| m.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), mods.len());
    }
}
