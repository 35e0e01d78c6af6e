//! Modules command - print the resolved module set

use console::style;
use std::path::Path;

use stencil_core::{ServiceManifest, MANIFEST_NAME};
use stencil_resolver::ModuleResolver;

use crate::error::Result;
use crate::source::DiskSource;

pub fn run(dir: &Path) -> Result<()> {
    let manifest = ServiceManifest::from_file(dir.join(MANIFEST_NAME))?;
    let source = DiskSource::new(dir);
    let mut modules = ModuleResolver::new(&source).resolve(&manifest)?;
    modules.sort_by(|a, b| a.name.cmp(&b.name));

    println!(
        "{} {} module(s) for {}",
        style("→").blue(),
        modules.len(),
        manifest.name
    );
    for module in &modules {
        println!(
            "  {} {}@{} ({})",
            style("✓").green(),
            module.name,
            module.version,
            module.uri
        );
    }

    Ok(())
}
