//! Local module source
//!
//! The CLI resolves modules from local checkouts referenced through
//! `file://` URIs (via `replacements` or an explicit `url` on the module
//! reference). Fetching remote archives and authenticating to hosting
//! providers is a separate concern and not wired in here; references that
//! would need it produce a clear error instead.

use semver::Version;
use std::path::{Path, PathBuf};

use stencil_core::{Module, ModuleVersion};
use stencil_resolver::{ModuleSource, ResolverError};

pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn dir_for(&self, uri: &str) -> Option<PathBuf> {
        let path = uri.strip_prefix("file://")?;
        let path = Path::new(path);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.root.join(path))
        }
    }
}

impl ModuleSource for DiskSource {
    fn versions(&self, name: &str) -> stencil_resolver::Result<Vec<Version>> {
        Err(ResolverError::ModuleNotFound {
            name: format!("{name} (no remote source configured; use a file:// url or replacement)"),
        })
    }

    fn load(&self, name: &str, version: &ModuleVersion) -> stencil_resolver::Result<Module> {
        Err(ResolverError::VersionNotFound {
            name: format!("{name} (no remote source configured; use a file:// url or replacement)"),
            version: version.to_string(),
        })
    }

    fn load_uri(&self, name: &str, uri: &str) -> stencil_resolver::Result<Module> {
        let Some(dir) = self.dir_for(uri) else {
            return Err(ResolverError::ModuleNotFound {
                name: format!("{name} ({uri} is not a file:// uri)"),
            });
        };
        let module = Module::from_dir(ModuleVersion::Branch("local".into()), uri, &dir)?;
        Ok(module)
    }
}
