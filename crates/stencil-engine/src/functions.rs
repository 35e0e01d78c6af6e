//! The template-scoped API
//!
//! Templates interact with stencil through two objects injected into every
//! render context:
//!
//! - `stencil`: argument lookups, module hooks, globals, within-module
//!   sub-template rendering, and sandboxed reads of the working directory
//! - `file`: emission controls for the current output file
//!
//! Both are MiniJinja objects dispatching on method name, so template code
//! reads as `{{ stencil.Arg("name") }}` and `{{ file.Skip("reason") }}`.

use minijinja::value::{Object, ObjectRepr, Value, ValueKind};
use minijinja::{Environment, Error, ErrorKind, State};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::{Arc, Mutex};

use stencil_core::{parse_blocks, Module, WorkspaceProvider};

use crate::context::{resolve_arg, Values};
use crate::shared::SharedData;
use crate::template::File;

/// Per-template-render state shared by the API objects
pub(crate) struct RenderState {
    pub shared: Arc<SharedData>,
    pub values: Arc<Values>,
    pub module: Arc<Module>,
    pub env: Arc<Environment<'static>>,
    pub template_path: String,
    pub workdir: Arc<dyn WorkspaceProvider>,
    /// Hook and global access is disabled while rendering directory
    /// replacement expressions
    pub hooks_allowed: bool,
    /// Context handed to `ApplyTemplate` when no data is passed
    pub parent_context: Value,
}

impl fmt::Debug for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderState")
            .field("module", &self.module.name)
            .field("template", &self.template_path)
            .field("hooks_allowed", &self.hooks_allowed)
            .finish()
    }
}

/// Files being emitted by the template currently rendering
///
/// The first entry is the template's implicit output file; `file.Create`
/// appends further ones. The last entry is the one the `file` object mutates.
#[derive(Debug, Default)]
pub(crate) struct FileEmission {
    pub files: Vec<File>,
}

impl FileEmission {
    fn current(&mut self) -> Result<&mut File, Error> {
        self.files.last_mut().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                "no output file is active for this template",
            )
        })
    }
}

fn str_arg(args: &[Value], index: usize, method: &str) -> Result<String, Error> {
    args.get(index)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("{method}() requires a string as argument {}", index + 1),
            )
        })
}

fn to_json(value: &Value) -> Result<JsonValue, Error> {
    serde_json::to_value(value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

fn invalid_op(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

/// The `stencil` object
#[derive(Debug)]
pub(crate) struct StencilObject {
    state: Arc<RenderState>,
}

impl StencilObject {
    pub fn new(state: Arc<RenderState>) -> Self {
        Self { state }
    }

    fn require_hooks(&self, method: &str) -> Result<(), Error> {
        if self.state.hooks_allowed {
            Ok(())
        } else {
            Err(invalid_op(format!(
                "stencil.{method}() is not available while rendering directory replacements"
            )))
        }
    }
}

impl Object for StencilObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        let state = &self.state;
        match method {
            "Arg" => {
                let path = str_arg(args, 0, "stencil.Arg")?;
                let value = resolve_arg(&path, &state.module, &state.values)
                    .map_err(|e| invalid_op(e.to_string()))?;
                Ok(Value::from_serialize(&value))
            }

            // deprecated flat view of the raw arguments bag
            "Args" => Ok(Value::from_serialize(&state.values.manifest.arguments)),

            "GetModuleHook" => {
                self.require_hooks(method)?;
                let name = str_arg(args, 0, "stencil.GetModuleHook")?;
                // always the calling template's own namespace
                let values = state.shared.hook(&state.module.name, &name);
                Ok(Value::from_serialize(&values))
            }

            "AddToModuleHook" => {
                self.require_hooks(method)?;
                let module = str_arg(args, 0, "stencil.AddToModuleHook")?;
                let name = str_arg(args, 1, "stencil.AddToModuleHook")?;

                // writes only land on the first pass
                if !state.shared.is_first_pass() {
                    return Ok(Value::from(""));
                }

                let data = args.get(2).filter(|v| !v.is_undefined() && !v.is_none());
                let Some(data) = data else {
                    return Err(invalid_op("third parameter, data, must be set"));
                };
                if data.kind() != ValueKind::Seq {
                    return Err(invalid_op(format!(
                        "unsupported module hook data type {:?}, supported type is list",
                        data.kind()
                    )));
                }

                let JsonValue::Array(values) = to_json(data)? else {
                    return Err(invalid_op("module hook data did not serialize as a list"));
                };
                state.shared.add_to_hook(&module, &name, values);
                Ok(Value::from(""))
            }

            "SetGlobal" => {
                self.require_hooks(method)?;
                let name = str_arg(args, 0, "stencil.SetGlobal")?;
                let value = args
                    .get(1)
                    .ok_or_else(|| invalid_op("second parameter, value, must be set"))?;

                let key = format!("{}/{}", state.module.name, name);
                state
                    .shared
                    .set_global(&state.module.name, &name, &state.template_path, to_json(value)?)
                    .map_err(|existing| {
                        invalid_op(format!(
                            "global {key:?} already set by template {existing:?}"
                        ))
                    })?;
                Ok(Value::from(""))
            }

            "GetGlobal" => {
                self.require_hooks(method)?;
                let module = str_arg(args, 0, "stencil.GetGlobal")?;
                let name = str_arg(args, 1, "stencil.GetGlobal")?;
                match state.shared.global(&module, &name) {
                    Some(value) => Ok(Value::from_serialize(&value)),
                    // the first pass runs before all globals exist; only the
                    // second pass observes the fully populated state
                    None if state.shared.is_first_pass() => Ok(Value::UNDEFINED),
                    None => Err(invalid_op(format!("global {module}/{name} is not set"))),
                }
            }

            "ApplyTemplate" => {
                if args.len() > 2 {
                    return Err(invalid_op(
                        "ApplyTemplate() only takes two arguments, name and data",
                    ));
                }
                let name = str_arg(args, 0, "stencil.ApplyTemplate")?;
                let data = args
                    .get(1)
                    .cloned()
                    .unwrap_or_else(|| state.parent_context.clone());

                // templates parse into their owning module's environment, so
                // only same-module templates are reachable here
                let template = state.env.get_template(&name)?;
                template.render(data).map(Value::from)
            }

            "ReadFile" => {
                let path = str_arg(args, 0, "stencil.ReadFile")?;
                state
                    .workdir
                    .read(&path)
                    .map(Value::from)
                    .map_err(|e| invalid_op(e.to_string()))
            }

            "Exists" => {
                let path = str_arg(args, 0, "stencil.Exists")?;
                Ok(Value::from(state.workdir.exists(&path)))
            }

            "ReadBlocks" => {
                let path = str_arg(args, 0, "stencil.ReadBlocks")?;
                match state.workdir.try_read(&path) {
                    Err(e) => Err(invalid_op(e.to_string())),
                    Ok(None) => Ok(Value::from_serialize(
                        &std::collections::BTreeMap::<String, String>::new(),
                    )),
                    Ok(Some(contents)) => parse_blocks(&path, &contents)
                        .map(|blocks| Value::from_serialize(&blocks))
                        .map_err(|e| invalid_op(e.to_string())),
                }
            }

            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!(
                    "stencil object has no method {method:?}. Available methods: Arg, Args, \
                     GetModuleHook, AddToModuleHook, GetGlobal, SetGlobal, ApplyTemplate, \
                     ReadFile, Exists, ReadBlocks"
                ),
            )),
        }
    }
}

/// The `file` object: emission controls for the current output file
#[derive(Debug)]
pub(crate) struct FileObject {
    emission: Arc<Mutex<FileEmission>>,
    default_mode: u32,
}

impl FileObject {
    pub fn new(emission: Arc<Mutex<FileEmission>>, default_mode: u32) -> Self {
        Self {
            emission,
            default_mode,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FileEmission>, Error> {
        self.emission
            .lock()
            .map_err(|_| invalid_op("file state lock poisoned"))
    }
}

impl Object for FileObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "path" => {
                let emission = self.emission.lock().ok()?;
                emission.files.last().map(|f| Value::from(f.name.clone()))
            }
            _ => None,
        }
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "SetContents" => {
                let contents = str_arg(args, 0, "file.SetContents")?;
                let mut emission = self.lock()?;
                let file = emission.current()?;
                file.contents = contents;
                file.explicit_contents = true;
                Ok(Value::from(""))
            }

            "SetPath" => {
                let path = str_arg(args, 0, "file.SetPath")?;
                if path.is_empty() {
                    return Err(invalid_op("file.SetPath() requires a non-empty path"));
                }
                self.lock()?.current()?.name = path;
                Ok(Value::from(""))
            }

            "SetMode" => {
                let mode = args.first().and_then(|v| v.as_i64()).ok_or_else(|| {
                    invalid_op("file.SetMode() requires an integer mode")
                })?;
                self.lock()?.current()?.mode = mode as u32;
                Ok(Value::from(""))
            }

            "Skip" => {
                let mut emission = self.lock()?;
                let file = emission.current()?;
                file.skipped = true;
                if let Some(reason) = args.first().and_then(|v| v.as_str()) {
                    file.warnings.push(reason.to_string());
                }
                Ok(Value::from(""))
            }

            "Delete" => {
                self.lock()?.current()?.deleted = true;
                Ok(Value::from(""))
            }

            "Create" => {
                let path = str_arg(args, 0, "file.Create")?;
                let mode = args
                    .get(1)
                    .and_then(|v| v.as_i64())
                    .map(|m| m as u32)
                    .unwrap_or(self.default_mode);
                let mut file = File::new(path, mode);
                // additional files only carry what the template sets on them
                file.explicit_contents = true;
                self.lock()?.files.push(file);
                Ok(Value::from(""))
            }

            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!(
                    "file object has no method {method:?}. Available methods: SetContents, \
                     SetPath, SetMode, Skip, Delete, Create"
                ),
            )),
        }
    }
}
