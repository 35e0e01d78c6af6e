//! Lockfile format for reproducible renders
//!
//! After a render, stencil records which module versions were used and which
//! files were generated from which templates. The lockfile is deterministic
//! for a given manifest and module set: both lists are sorted by name and
//! skipped or deleted files never appear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};

/// Name of the lockfile written next to the service manifest
pub const LOCKFILE_NAME: &str = "stencil.lock";

/// A module recorded in the lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileModuleEntry {
    /// Module name
    pub name: String,

    /// Source URL the module was loaded from
    pub url: String,

    /// Resolved version (display form, e.g. `v0.3.2` or a branch name)
    pub version: String,
}

/// A generated file recorded in the lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileFileEntry {
    /// Output path relative to the invocation directory
    pub name: String,

    /// Template that generated the file, relative to its module's `templates/`
    pub template: String,

    /// Name of the module owning the template
    pub module: String,
}

/// The stencil lockfile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Generator version that produced this file
    pub version: String,

    /// When this file was generated
    pub generated: DateTime<Utc>,

    /// Modules used during the last render
    #[serde(default)]
    pub modules: Vec<LockfileModuleEntry>,

    /// Files produced by the last render
    #[serde(default)]
    pub files: Vec<LockfileFileEntry>,
}

impl Lockfile {
    /// Create an empty lockfile stamped with the generator version
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            generated: Utc::now(),
            modules: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Load a lockfile from a directory containing `stencil.lock`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCKFILE_NAME);
        if !path.exists() {
            return Err(CoreError::FileAccess {
                path: path.display().to_string(),
                message: "lockfile does not exist".to_string(),
            });
        }
        let content = std::fs::read_to_string(&path)?;
        let lock: Self = serde_yaml::from_str(&content)?;
        Ok(lock)
    }

    /// Save the lockfile into a directory as `stencil.lock`
    pub fn save(&self, dir: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(dir.join(LOCKFILE_NAME), content)?;
        Ok(())
    }

    /// Sort both entry lists by name for deterministic output
    pub fn sort(&mut self) {
        self.modules.sort_by(|a, b| a.name.cmp(&b.name));
        self.files.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Find the file entry for a generated path
    pub fn file(&self, name: &str) -> Option<&LockfileFileEntry> {
        self.files.iter().find(|f| f.name == name)
    }
}
