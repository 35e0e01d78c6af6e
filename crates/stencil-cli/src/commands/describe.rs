//! Describe command - show which template and module generated a file

use console::style;
use std::path::Path;

use stencil_core::Lockfile;

use crate::error::{CliError, Result};

pub fn run(dir: &Path, file: &str) -> Result<()> {
    let lockfile = Lockfile::load(dir)?;

    let Some(entry) = lockfile.file(file) else {
        return Err(CliError::Other {
            message: format!(
                "file {file:?} was not generated by stencil (not present in {})",
                stencil_core::LOCKFILE_NAME
            ),
        });
    };

    println!(
        "{} {} was generated by template {} from module {}",
        style("→").blue(),
        entry.name,
        style(&entry.template).cyan(),
        style(&entry.module).cyan()
    );

    Ok(())
}
