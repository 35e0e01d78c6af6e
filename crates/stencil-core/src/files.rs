//! Sandboxed access to the invocation's working directory
//!
//! Templates may read previously generated files (`stencil.ReadFile`,
//! `stencil.ReadBlocks`) but only inside the directory stencil was invoked
//! from. All paths are resolved relative to that root; absolute paths and any
//! path that resolves outside the root (including through symlinks) are
//! rejected.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, Result};

/// Read access to the working directory, as seen by templates
pub trait WorkspaceProvider: Send + Sync + Debug {
    /// Read a file, failing if it does not exist
    fn read(&self, path: &str) -> Result<String>;

    /// Read a file, returning `None` if it does not exist
    fn try_read(&self, path: &str) -> Result<Option<String>>;

    /// Whether the file exists (and is reachable inside the sandbox)
    fn exists(&self, path: &str) -> bool;
}

/// Workspace provider rooted at a directory on disk
#[derive(Debug)]
pub struct DirProvider {
    canonical_root: PathBuf,
}

impl DirProvider {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical_root = root.canonicalize().map_err(|e| CoreError::FileAccess {
            path: root.display().to_string(),
            message: format!("failed to canonicalize working directory: {e}"),
        })?;
        Ok(Self { canonical_root })
    }

    /// Resolve a relative path, enforcing the sandbox
    fn resolve(&self, relative: &str) -> Result<Option<PathBuf>> {
        let requested = Path::new(relative);

        if requested.is_absolute() {
            return Err(CoreError::SandboxEscape {
                path: relative.to_string(),
            });
        }
        if requested
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(CoreError::SandboxEscape {
                path: relative.to_string(),
            });
        }

        let full = self.canonical_root.join(requested);
        if !full.exists() {
            return Ok(None);
        }

        // resolves symlinks, so a link pointing outside the root is caught
        let canonical = full.canonicalize().map_err(|e| CoreError::FileAccess {
            path: relative.to_string(),
            message: format!("failed to resolve path: {e}"),
        })?;

        if !canonical.starts_with(&self.canonical_root) {
            return Err(CoreError::SandboxEscape {
                path: relative.to_string(),
            });
        }

        Ok(Some(canonical))
    }
}

impl WorkspaceProvider for DirProvider {
    fn read(&self, path: &str) -> Result<String> {
        match self.try_read(path)? {
            Some(contents) => Ok(contents),
            None => Err(CoreError::FileAccess {
                path: path.to_string(),
                message: "file does not exist".to_string(),
            }),
        }
    }

    fn try_read(&self, path: &str) -> Result<Option<String>> {
        let Some(resolved) = self.resolve(path)? else {
            return Ok(None);
        };
        let contents = std::fs::read_to_string(&resolved).map_err(|e| CoreError::FileAccess {
            path: path.to_string(),
            message: format!("failed to read file: {e}"),
        })?;
        Ok(Some(contents))
    }

    fn exists(&self, path: &str) -> bool {
        matches!(self.resolve(path), Ok(Some(_)))
    }
}

/// In-memory workspace provider for tests
#[derive(Debug, Default)]
pub struct MemoryProvider {
    files: BTreeMap<String, String>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    fn check(&self, path: &str) -> Result<()> {
        if Path::new(path).is_absolute() || path.split('/').any(|c| c == "..") {
            return Err(CoreError::SandboxEscape {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

impl WorkspaceProvider for MemoryProvider {
    fn read(&self, path: &str) -> Result<String> {
        match self.try_read(path)? {
            Some(contents) => Ok(contents),
            None => Err(CoreError::FileAccess {
                path: path.to_string(),
                message: "file does not exist".to_string(),
            }),
        }
    }

    fn try_read(&self, path: &str) -> Result<Option<String>> {
        self.check(path)?;
        Ok(self.files.get(path).cloned())
    }

    fn exists(&self, path: &str) -> bool {
        self.check(path).is_ok() && self.files.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_provider_reads_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("myfile.txt"), "hello").unwrap();

        let provider = DirProvider::new(dir.path()).unwrap();
        assert_eq!(provider.read("myfile.txt").unwrap(), "hello");
        assert!(provider.exists("myfile.txt"));
        assert!(!provider.exists("missing.txt"));
        assert!(provider.try_read("missing.txt").unwrap().is_none());
    }

    #[test]
    fn test_dir_provider_rejects_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirProvider::new(dir.path()).unwrap();

        let err = provider.read("/etc/hostname").unwrap_err();
        assert!(matches!(err, CoreError::SandboxEscape { .. }));
        assert!(!provider.exists("/etc/hostname"));
    }

    #[test]
    fn test_dir_provider_rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let provider = DirProvider::new(dir.path().join("sub")).unwrap();

        let err = provider.read("../secret.txt").unwrap_err();
        assert!(matches!(err, CoreError::SandboxEscape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_dir_provider_rejects_symlink_escape() {
        let outer = tempfile::tempdir().unwrap();
        std::fs::write(outer.path().join("secret.txt"), "secret").unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.txt"), root.join("link.txt"))
            .unwrap();

        let provider = DirProvider::new(&root).unwrap();
        let err = provider.read("link.txt").unwrap_err();
        assert!(matches!(err, CoreError::SandboxEscape { .. }));
    }

    #[test]
    fn test_memory_provider() {
        let provider = MemoryProvider::new().with_file("a.txt", "contents");

        assert_eq!(provider.read("a.txt").unwrap(), "contents");
        assert!(provider.exists("a.txt"));
        assert!(!provider.exists("b.txt"));
        assert!(matches!(
            provider.read("../a.txt").unwrap_err(),
            CoreError::SandboxEscape { .. }
        ));
    }
}
