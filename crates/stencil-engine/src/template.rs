//! Template and rendered-file model

use std::sync::Arc;

use stencil_core::module::TemplateFile;
use stencil_core::Module;

/// A file produced by a template during a render
#[derive(Debug, Clone)]
pub struct File {
    /// Output path relative to the invocation directory
    pub name: String,

    /// Unix file mode the file should be written with
    pub mode: u32,

    /// Rendered contents
    pub contents: String,

    /// The template asked for this file not to be written
    pub skipped: bool,

    /// The template asked for this file to be removed
    pub deleted: bool,

    /// Non-fatal notes attached while rendering (deviations, skip reasons)
    pub warnings: Vec<String>,

    /// `SetContents` was called, so the rendered template body is not used
    pub(crate) explicit_contents: bool,
}

impl File {
    pub fn new(name: impl Into<String>, mode: u32) -> Self {
        Self {
            name: name.into(),
            mode,
            contents: String::new(),
            skipped: false,
            deleted: false,
            warnings: Vec::new(),
            explicit_contents: false,
        }
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// A discovered template and, after a render, the files it emitted
#[derive(Debug, Clone)]
pub struct Template {
    /// Module this template belongs to
    pub module: Arc<Module>,

    /// Path relative to the module's `templates/` directory
    pub path: String,

    /// Mode of the template source file
    pub mode: u32,

    /// Raw template text
    pub contents: String,

    /// Files emitted during the current render
    pub files: Vec<File>,
}

impl Template {
    pub fn new(module: Arc<Module>, file: TemplateFile) -> Self {
        Self {
            module,
            path: file.path,
            mode: file.mode,
            contents: file.contents,
            files: Vec::new(),
        }
    }

    /// Fully qualified path used in diagnostics, `<module>/templates/<path>`
    pub fn import_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.module.name,
            stencil_core::TEMPLATES_DIR,
            self.path
        )
    }

    /// Initial output path: the template path with the `.tpl` suffix stripped
    pub fn output_path(&self) -> String {
        self.path
            .strip_suffix(".tpl")
            .unwrap_or(&self.path)
            .to_string()
    }
}
