//! The two-pass rendering engine
//!
//! A render discovers every template exposed by the resolved modules,
//! shuffles them, parses each into its owning module's environment, and then
//! executes the whole set twice. The first pass exists only to populate the
//! shared-data store; its file output is discarded. Between passes the hook
//! lists are sorted into their stable order and every directory-replacement
//! expression is rendered. The second pass produces the files that are
//! returned to the caller.
//!
//! Discovery order is shuffled on purpose: templates must not depend on the
//! order they execute in, and a fixed order would let such dependencies hide.

use minijinja::value::Value;
use minijinja::{Environment, UndefinedBehavior};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use stencil_core::{
    has_deviation, parse_blocks, Lockfile, LockfileFileEntry, LockfileModuleEntry, Module,
    ServiceManifest, WorkspaceProvider,
};

use crate::context::{Metadata, ModuleInfo, Repository, Values, GENERATOR};
use crate::error::{EngineError, Result, TemplateError};
use crate::functions::{FileEmission, FileObject, RenderState, StencilObject};
use crate::shared::SharedData;
use crate::template::{File, Template};

/// Cooperative cancellation for a render
///
/// Observed at discovery boundaries and between template renders; an
/// in-flight template execution is short and CPU-bound and is not
/// interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-module template environments built during the parse phase
type ModuleEnvs = HashMap<String, Arc<Environment<'static>>>;

/// The renderer
pub struct Renderer {
    values: Arc<Values>,
    workdir: Arc<dyn WorkspaceProvider>,
    shared: Arc<SharedData>,
    /// Rendered directory replacements, module name -> source dir -> output
    dir_replacements: HashMap<String, BTreeMap<String, String>>,
}

impl Renderer {
    pub fn new(
        manifest: ServiceManifest,
        modules: Vec<Module>,
        workdir: Arc<dyn WorkspaceProvider>,
    ) -> Self {
        let modules: Vec<Arc<Module>> = modules.into_iter().map(Arc::new).collect();
        Self {
            values: Arc::new(Values::new(Arc::new(manifest), modules)),
            workdir,
            shared: Arc::new(SharedData::new()),
            dir_replacements: HashMap::new(),
        }
    }

    /// Override the head branch exposed to templates (defaults to `main`)
    pub fn with_head_branch(mut self, branch: impl Into<String>) -> Self {
        let values = (*self.values).clone().with_head_branch(branch);
        self.values = Arc::new(values);
        self
    }

    /// The resolved modules this renderer was built with
    pub fn modules(&self) -> &[Arc<Module>] {
        &self.values.modules
    }

    /// Render all templates and return them with their emitted files
    ///
    /// No files are written here; writing is the caller's responsibility.
    pub fn render(&mut self, cancel: &CancelToken) -> Result<Vec<Template>> {
        // a render owns its shared state exclusively; start fresh so the same
        // renderer can be invoked again
        self.shared = Arc::new(SharedData::new());
        self.dir_replacements.clear();

        let mut templates = self.discover(cancel)?;
        let envs = self.parse(&templates)?;

        // pass 1: populate shared data, discard file output
        for template in templates.iter_mut() {
            ensure_not_cancelled(cancel)?;
            self.render_template(template, &envs)?;
            template.files.clear();
        }

        self.shared.end_first_pass();
        let replacements = self.render_dir_replacements()?;
        self.dir_replacements = replacements;

        // pass 2: hook and global state is complete, keep the files
        for template in templates.iter_mut() {
            ensure_not_cancelled(cancel)?;
            self.render_template(template, &envs)?;
        }

        Ok(templates)
    }

    /// Produce the lockfile for a finished render
    pub fn generate_lockfile(&self, templates: &[Template]) -> Lockfile {
        let mut lock = Lockfile::new(self.values.version.clone());

        for template in templates {
            for file in &template.files {
                // skipped and deleted files never land in the lockfile
                if file.skipped || file.deleted {
                    continue;
                }
                lock.files.push(LockfileFileEntry {
                    name: file.name.clone(),
                    template: template.path.clone(),
                    module: template.module.name.clone(),
                });
            }
        }

        for module in &self.values.modules {
            lock.modules.push(LockfileModuleEntry {
                name: module.name.clone(),
                url: module.uri.clone(),
                version: module.version.to_string(),
            });
        }

        lock.sort();
        lock
    }

    /// Discover every template exposed by the resolved modules, shuffled
    fn discover(&self, cancel: &CancelToken) -> Result<Vec<Template>> {
        let mut templates = Vec::new();

        for module in &self.values.modules {
            ensure_not_cancelled(cancel)?;
            if !module.is_templates() {
                continue;
            }
            for file in module.template_files()? {
                templates.push(Template::new(module.clone(), file));
            }
        }

        templates.shuffle(&mut rand::rng());
        Ok(templates)
    }

    /// Parse every template into its owning module's environment
    ///
    /// Templates of one module share a namespace, so they can invoke each
    /// other through `ApplyTemplate`; templates of other modules are not
    /// reachable.
    fn parse(&self, templates: &[Template]) -> Result<ModuleEnvs> {
        let mut builders: HashMap<String, Environment<'static>> = HashMap::new();

        for template in templates {
            let env = builders.entry(template.module.name.clone()).or_insert_with(|| {
                let mut env = Environment::new();
                env.set_undefined_behavior(UndefinedBehavior::Chainable);
                env
            });
            env.add_template_owned(template.path.clone(), template.contents.clone())
                .map_err(|e| {
                    TemplateError::parse(e, &template.import_path(), &template.contents)
                })?;
        }

        Ok(builders
            .into_iter()
            .map(|(name, env)| (name, Arc::new(env)))
            .collect())
    }

    /// Context entries every template sees, before the API objects
    fn base_context(&self, module: &Arc<Module>) -> BTreeMap<String, Value> {
        let manifest = self.values.manifest.as_ref();
        let mut ctx = BTreeMap::new();
        ctx.insert("config".to_string(), Value::from_serialize(manifest));
        ctx.insert("manifest".to_string(), Value::from_serialize(manifest));
        ctx.insert(
            "arguments".to_string(),
            Value::from_serialize(&manifest.arguments),
        );
        ctx.insert(
            "metadata".to_string(),
            Value::from_serialize(&Metadata {
                generator: GENERATOR,
                version: &self.values.version,
            }),
        );
        ctx.insert(
            "repository".to_string(),
            Value::from_serialize(&Repository {
                head_branch: &self.values.head_branch,
            }),
        );
        ctx.insert(
            "module".to_string(),
            Value::from_serialize(&ModuleInfo {
                name: module.name.clone(),
                version: module.version.to_string(),
            }),
        );
        ctx
    }

    /// Execute one template for the current pass
    fn render_template(&self, template: &mut Template, envs: &ModuleEnvs) -> Result<()> {
        let env = envs
            .get(&template.module.name)
            // built from the same template list we iterate
            .expect("environment exists for every discovered module")
            .clone();

        let mut out_path = template.output_path();
        if !self.shared.is_first_pass() {
            out_path = self.apply_dir_replacements(&template.module.name, &out_path);
        }

        // pick up preserved blocks and deviation markers from a previous run
        let existing = self.workdir.try_read(&out_path)?;
        let mut deviated = false;
        let mut blocks = BTreeMap::new();
        if let Some(contents) = &existing {
            if has_deviation(contents) {
                deviated = true;
            } else {
                blocks = parse_blocks(&out_path, contents)?;
            }
        }

        let mut ctx = self.base_context(&template.module);
        for (name, body) in &blocks {
            // reserved context keys win over block names
            ctx.entry(name.clone())
                .or_insert_with(|| Value::from(body.clone()));
        }

        let parent_context = Value::from_iter(ctx.clone());
        let emission = Arc::new(Mutex::new(FileEmission {
            files: vec![File::new(out_path.clone(), template.mode)],
        }));
        let state = Arc::new(RenderState {
            shared: self.shared.clone(),
            values: self.values.clone(),
            module: template.module.clone(),
            env: env.clone(),
            template_path: template.import_path(),
            workdir: self.workdir.clone(),
            hooks_allowed: true,
            parent_context,
        });
        ctx.insert(
            "stencil".to_string(),
            Value::from_object(StencilObject::new(state)),
        );
        ctx.insert(
            "file".to_string(),
            Value::from_object(FileObject::new(emission.clone(), template.mode)),
        );

        let import_path = template.import_path();
        let compiled = env
            .get_template(&template.path)
            .map_err(|e| TemplateError::render(e, &import_path, &template.contents))?;
        let rendered = compiled
            .render(Value::from_iter(ctx))
            .map_err(|e| TemplateError::render(e, &import_path, &template.contents))?;

        let mut files = {
            let mut emission = emission.lock().expect("file state lock poisoned");
            std::mem::take(&mut emission.files)
        };

        // the implicit file carries the rendered body unless the template
        // replaced it
        if let Some(first) = files.first_mut() {
            if !first.explicit_contents {
                first.contents = rendered;
            }
        }

        if deviated {
            for file in files.iter_mut() {
                file.skipped = true;
            }
            if let Some(first) = files.first_mut() {
                first
                    .warnings
                    .push(format!("'{out_path}' had deviations and will not be re-generated"));
            }
        }

        template.files = files;
        Ok(())
    }

    /// Render every module's directory-replacement expressions, exactly once
    fn render_dir_replacements(&self) -> Result<HashMap<String, BTreeMap<String, String>>> {
        let mut all = HashMap::new();

        for module in &self.values.modules {
            let mut rendered_map = BTreeMap::new();
            for (source, expression) in &module.manifest.dir_replacements {
                let rendered = self.render_dir_replacement(module, expression)?;
                if rendered.contains('/') || rendered.contains(std::path::MAIN_SEPARATOR) {
                    return Err(EngineError::DirReplacementIllegal {
                        expression: expression.clone(),
                        rendered,
                    });
                }
                rendered_map.insert(source.clone(), rendered);
            }
            if !rendered_map.is_empty() {
                all.insert(module.name.clone(), rendered_map);
            }
        }

        Ok(all)
    }

    /// Render a single replacement expression with the shared values
    ///
    /// Hook and global access is disabled here; replacements only depend on
    /// arguments and metadata.
    fn render_dir_replacement(&self, module: &Arc<Module>, expression: &str) -> Result<String> {
        const NAME: &str = "dirReplace";

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.add_template_owned(NAME.to_string(), expression.to_string())
            .map_err(|e| TemplateError::parse(e, NAME, expression))?;
        let env = Arc::new(env);

        let mut ctx = self.base_context(module);
        let parent_context = Value::from_iter(ctx.clone());
        let emission = Arc::new(Mutex::new(FileEmission {
            files: vec![File::new(NAME, 0)],
        }));
        let state = Arc::new(RenderState {
            shared: self.shared.clone(),
            values: self.values.clone(),
            module: module.clone(),
            env: env.clone(),
            template_path: format!("{}/{NAME}", module.name),
            workdir: self.workdir.clone(),
            hooks_allowed: false,
            parent_context,
        });
        ctx.insert(
            "stencil".to_string(),
            Value::from_object(StencilObject::new(state)),
        );
        ctx.insert(
            "file".to_string(),
            Value::from_object(FileObject::new(emission, 0)),
        );

        let compiled = env
            .get_template(NAME)
            .map_err(|e| TemplateError::render(e, NAME, expression))?;
        let rendered = compiled
            .render(Value::from_iter(ctx))
            .map_err(|e| TemplateError::render(e, NAME, expression))?;
        Ok(rendered)
    }

    /// Rewrite an output path through its module's directory replacements
    ///
    /// Replacements apply from shallowest to deepest; each matching source
    /// prefix substitutes the final component of that prefix. All prefixes
    /// are matched against the original path.
    fn apply_dir_replacements(&self, module: &str, path: &str) -> String {
        let Some(replacements) = self.dir_replacements.get(module) else {
            return path.to_string();
        };

        let original: Vec<&str> = path.split('/').collect();
        let mut output: Vec<String> = original.iter().map(|s| s.to_string()).collect();

        for depth in 1..original.len() {
            let prefix = original[..depth].join("/");
            if let Some(replacement) = replacements.get(&prefix) {
                output[depth - 1] = replacement.clone();
            }
        }

        output.join("/")
    }
}

fn ensure_not_cancelled(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}
