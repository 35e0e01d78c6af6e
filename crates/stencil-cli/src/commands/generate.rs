//! Generate command - resolve modules, render templates, write the results

use console::style;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use stencil_core::{DirProvider, ServiceManifest, MANIFEST_NAME};
use stencil_engine::{CancelToken, File, Renderer};
use stencil_resolver::ModuleResolver;

use crate::error::{CliError, Result};
use crate::source::DiskSource;
use crate::util::head_branch;

pub fn run(dir: &Path, dry_run: bool, skip_post_run: bool) -> Result<()> {
    let manifest = ServiceManifest::from_file(dir.join(MANIFEST_NAME))?;

    println!("{} Resolving modules", style("→").blue());
    let source = DiskSource::new(dir);
    let modules = ModuleResolver::new(&source).resolve(&manifest)?;
    for module in &modules {
        println!("  {} {}@{}", style("✓").green(), module.name, module.version);
    }

    let workdir = DirProvider::new(dir)?;
    let mut renderer =
        Renderer::new(manifest, modules, Arc::new(workdir)).with_head_branch(head_branch(dir));

    println!("{} Rendering templates", style("→").blue());
    let templates = renderer.render(&CancelToken::new())?;
    let lockfile = renderer.generate_lockfile(&templates);

    for template in &templates {
        for file in &template.files {
            report_file(file);
            if !dry_run {
                apply_file(dir, file)?;
            }
        }
    }

    if dry_run {
        println!("{} Dry run, nothing written", style("→").blue());
        return Ok(());
    }

    lockfile.save(dir)?;
    println!("{} Wrote {}", style("→").blue(), stencil_core::LOCKFILE_NAME);

    if !skip_post_run {
        post_run(dir, renderer.modules())?;
    }

    Ok(())
}

fn report_file(file: &File) {
    if file.skipped {
        let reason = file.warnings.join("; ");
        println!("  {} skipped '{}' {}", style("⚠").yellow(), file.name, reason);
    } else if file.deleted {
        println!("  {} deleted '{}'", style("✗").red(), file.name);
    } else {
        println!("  {} wrote '{}'", style("✓").green(), file.name);
    }
}

/// Write, or remove, a single rendered file under `dir`
fn apply_file(dir: &Path, file: &File) -> Result<()> {
    let path = dir.join(&file.name);

    if file.skipped {
        return Ok(());
    }
    if file.deleted {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &file.contents)?;
    set_mode(&path, file.mode)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if mode != 0 {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Run every module's post-run commands in the project directory
fn post_run(dir: &Path, modules: &[Arc<stencil_core::Module>]) -> Result<()> {
    for module in modules {
        for command in &module.manifest.post_run_command {
            println!("{} Running post-run command: {}", style("→").blue(), command.name);
            let status = Command::new("/usr/bin/env")
                .args(["bash", "-c", &command.command])
                .current_dir(dir)
                .status()?;
            if !status.success() {
                return Err(CliError::Other {
                    message: format!(
                        "post-run command {:?} of module {:?} failed",
                        command.name, module.name
                    ),
                });
            }
        }
    }

    Ok(())
}
