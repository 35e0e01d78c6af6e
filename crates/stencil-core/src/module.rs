//! Module model
//!
//! A module is a versioned bundle of templates, argument declarations, and
//! directory replacements, rooted at a virtual filesystem. Modules are
//! produced by the resolver and immutable afterwards; the renderer only reads
//! from them.

use semver::Version;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::manifest::{ModuleType, TemplateRepositoryManifest};

/// Subdirectory of a module holding its templates
pub const TEMPLATES_DIR: &str = "templates";

/// Extension identifying template files
pub const TEMPLATE_EXT: &str = "tpl";

/// A resolved module version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleVersion {
    /// A concrete semantic version, possibly channel-tagged
    Semver(Version),
    /// A branch name (or a virtual marker for in-memory modules)
    Branch(String),
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semver(v) => write!(f, "v{v}"),
            Self::Branch(b) => write!(f, "{b}"),
        }
    }
}

/// A template file discovered inside a module
#[derive(Debug, Clone)]
pub struct TemplateFile {
    /// Path relative to the module's `templates/` directory
    pub path: String,
    /// Raw template text
    pub contents: String,
    /// Unix file mode of the source template
    pub mode: u32,
}

/// The filesystem backing a module
#[derive(Debug, Clone)]
pub enum ModuleFilesystem {
    /// A directory on disk (an unpacked module archive or a local checkout)
    Dir(PathBuf),
    /// An in-memory file map, used for tests and replacement handles
    Memory(BTreeMap<String, String>),
}

impl ModuleFilesystem {
    fn template_files(&self, module: &str) -> Result<Vec<TemplateFile>> {
        match self {
            Self::Memory(files) => {
                let prefix = format!("{TEMPLATES_DIR}/");
                let mut out = Vec::new();
                for (path, contents) in files {
                    let Some(rel) = path.strip_prefix(&prefix) else {
                        continue;
                    };
                    if Path::new(rel).extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXT) {
                        continue;
                    }
                    out.push(TemplateFile {
                        path: rel.to_string(),
                        contents: contents.clone(),
                        mode: 0o644,
                    });
                }
                Ok(out)
            }
            Self::Dir(root) => {
                let templates_dir = root.join(TEMPLATES_DIR);
                if !templates_dir.is_dir() {
                    return Err(CoreError::FileAccess {
                        path: templates_dir.display().to_string(),
                        message: format!(
                            "module {module:?} has no templates/ directory (does it exist?)"
                        ),
                    });
                }

                let mut out = Vec::new();
                for entry in walkdir::WalkDir::new(&templates_dir)
                    .sort_by_file_name()
                    .into_iter()
                {
                    let entry = entry.map_err(|e| CoreError::FileAccess {
                        path: templates_dir.display().to_string(),
                        message: e.to_string(),
                    })?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if entry.path().extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXT) {
                        continue;
                    }

                    let rel = entry
                        .path()
                        .strip_prefix(&templates_dir)
                        .unwrap_or(entry.path())
                        .to_string_lossy()
                        .replace('\\', "/");
                    let contents =
                        std::fs::read_to_string(entry.path()).map_err(|e| CoreError::FileAccess {
                            path: rel.clone(),
                            message: format!("failed to read template from module {module:?}: {e}"),
                        })?;

                    out.push(TemplateFile {
                        path: rel,
                        contents,
                        mode: file_mode(entry.path()),
                    });
                }
                Ok(out)
            }
        }
    }
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o777)
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    0o644
}

/// A resolved module
#[derive(Debug, Clone)]
pub struct Module {
    /// Module name, typically `host/org/repo`
    pub name: String,

    /// Resolved version
    pub version: ModuleVersion,

    /// Source URI the module was loaded from
    pub uri: String,

    /// The module's own manifest
    pub manifest: TemplateRepositoryManifest,

    /// Filesystem rooted at the module archive
    fs: ModuleFilesystem,
}

impl Module {
    pub fn new(
        version: ModuleVersion,
        uri: impl Into<String>,
        manifest: TemplateRepositoryManifest,
        fs: ModuleFilesystem,
    ) -> Self {
        Self {
            name: manifest.name.clone(),
            version,
            uri: uri.into(),
            manifest,
            fs,
        }
    }

    /// Create an in-memory module from a manifest and `(path, contents)` pairs
    ///
    /// Paths are relative to the module root, so templates live under
    /// `templates/`. Used by tests and as the replacement handle for modules
    /// that never touch a remote source.
    pub fn virtual_module(
        manifest: TemplateRepositoryManifest,
        files: &[(&str, &str)],
    ) -> Self {
        let uri = format!("vfs://{}", manifest.name);
        let fs = ModuleFilesystem::Memory(
            files
                .iter()
                .map(|(path, contents)| (path.to_string(), contents.to_string()))
                .collect(),
        );
        Self::new(ModuleVersion::Branch("vfs".into()), uri, manifest, fs)
    }

    /// Load a module from an on-disk directory containing `manifest.yaml`
    pub fn from_dir(version: ModuleVersion, uri: impl Into<String>, root: &Path) -> Result<Self> {
        let manifest =
            TemplateRepositoryManifest::from_file(root.join(crate::manifest::MANIFEST_NAME))?;
        Ok(Self::new(
            version,
            uri,
            manifest,
            ModuleFilesystem::Dir(root.to_path_buf()),
        ))
    }

    /// Whether this module exposes templates
    pub fn is_templates(&self) -> bool {
        self.manifest.types.contains(ModuleType::Templates)
    }

    /// List all `*.tpl` files under the module's `templates/` directory
    pub fn template_files(&self) -> Result<Vec<TemplateFile>> {
        self.fs.template_files(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display() {
        assert_eq!(
            ModuleVersion::Semver(Version::new(0, 3, 2)).to_string(),
            "v0.3.2"
        );
        assert_eq!(ModuleVersion::Branch("main".into()).to_string(), "main");
    }

    #[test]
    fn test_virtual_module_templates() {
        let module = Module::virtual_module(
            TemplateRepositoryManifest::new("testing"),
            &[
                ("templates/test-template.tpl", "{{ config.name }}"),
                ("templates/sub/other.tpl", "x"),
                ("templates/notes.txt", "not a template"),
                ("README.md", "nope"),
            ],
        );

        assert_eq!(module.uri, "vfs://testing");
        assert!(module.is_templates());

        let mut files = module.template_files().unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "sub/other.tpl");
        assert_eq!(files[1].path, "test-template.tpl");
        assert_eq!(files[1].contents, "{{ config.name }}");
    }

    #[test]
    fn test_dir_module_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.yaml"), "name: disk-module").unwrap();
        std::fs::create_dir_all(dir.path().join("templates/nested")).unwrap();
        std::fs::write(dir.path().join("templates/a.tpl"), "a").unwrap();
        std::fs::write(dir.path().join("templates/nested/b.tpl"), "b").unwrap();
        std::fs::write(dir.path().join("templates/skip.txt"), "skip").unwrap();

        let module = Module::from_dir(
            ModuleVersion::Semver(Version::new(1, 0, 0)),
            "file://disk",
            dir.path(),
        )
        .unwrap();

        assert_eq!(module.name, "disk-module");
        let mut files = module.template_files().unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "a.tpl");
        assert_eq!(files[1].path, "nested/b.tpl");
    }

    #[test]
    fn test_dir_module_missing_templates_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.yaml"), "name: empty-module").unwrap();

        let module = Module::from_dir(
            ModuleVersion::Branch("main".into()),
            "file://disk",
            dir.path(),
        )
        .unwrap();

        assert!(module.template_files().is_err());
    }
}
