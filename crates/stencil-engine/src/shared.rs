//! Cross-template shared data
//!
//! The two-pass discipline lets any template publish data during the first
//! pass that any other template may consume during the second, without
//! ordering constraints between templates. Two stores exist:
//!
//! - **module hooks**: named, append-only lists owned by a module and
//!   writable by any template. Between passes every list is sorted by a
//!   structural hash of its values, so the second pass observes an order
//!   independent of template discovery order and writer order.
//! - **globals**: named write-once values scoped to the defining module.
//!
//! The pass flag lives here and is never exposed to templates; it surfaces
//! only through `AddToModuleHook`'s silent second-pass no-op and
//! `SetGlobal`'s duplicate error.

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use stencil_core::values::canonical_string;

/// A write-once global with the template that defined it
#[derive(Debug, Clone)]
pub struct Global {
    /// Import path of the defining template
    pub template: String,
    /// The stored value
    pub value: JsonValue,
}

/// Store for module hook data and template module globals
#[derive(Debug)]
pub struct SharedData {
    first_pass: AtomicBool,
    hooks: Mutex<HashMap<String, Vec<JsonValue>>>,
    globals: Mutex<HashMap<String, Global>>,
}

impl Default for SharedData {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedData {
    pub fn new() -> Self {
        Self {
            first_pass: AtomicBool::new(true),
            hooks: Mutex::new(HashMap::new()),
            globals: Mutex::new(HashMap::new()),
        }
    }

    /// Key for data stored in both hook and global maps
    fn key(module: &str, name: &str) -> String {
        format!("{module}/{name}")
    }

    pub fn is_first_pass(&self) -> bool {
        self.first_pass.load(Ordering::SeqCst)
    }

    /// Leave the first pass: hook writes become no-ops and every hook list is
    /// sorted into its stable order
    pub fn end_first_pass(&self) {
        self.first_pass.store(false, Ordering::SeqCst);
        let mut hooks = self.hooks.lock().expect("hook store lock poisoned");
        for values in hooks.values_mut() {
            // stable sort: equal hashes keep insertion order
            values.sort_by_key(hash_hook_value);
        }
    }

    /// Append values to a module hook; silently ignored outside the first pass
    pub fn add_to_hook(&self, module: &str, name: &str, values: Vec<JsonValue>) {
        if !self.is_first_pass() {
            return;
        }
        let mut hooks = self.hooks.lock().expect("hook store lock poisoned");
        hooks
            .entry(Self::key(module, name))
            .or_default()
            .extend(values);
    }

    /// Read a module hook, empty if nothing was written
    pub fn hook(&self, module: &str, name: &str) -> Vec<JsonValue> {
        let hooks = self.hooks.lock().expect("hook store lock poisoned");
        hooks
            .get(&Self::key(module, name))
            .cloned()
            .unwrap_or_default()
    }

    /// Bind a global, failing with the previous definer on re-definition
    ///
    /// A template re-binding its own global is a no-op so the second pass can
    /// execute the same `SetGlobal` call without erroring.
    pub fn set_global(
        &self,
        module: &str,
        name: &str,
        template: &str,
        value: JsonValue,
    ) -> Result<(), String> {
        let mut globals = self.globals.lock().expect("global store lock poisoned");
        let key = Self::key(module, name);
        match globals.get(&key) {
            None => {
                globals.insert(
                    key,
                    Global {
                        template: template.to_string(),
                        value,
                    },
                );
                Ok(())
            }
            Some(existing) if existing.template == template => Ok(()),
            Some(existing) => Err(existing.template.clone()),
        }
    }

    /// Read a global's value
    pub fn global(&self, module: &str, name: &str) -> Option<JsonValue> {
        let globals = self.globals.lock().expect("global store lock poisoned");
        globals.get(&Self::key(module, name)).map(|g| g.value.clone())
    }
}

/// Structural hash of a hook value over its canonicalised form
fn hash_hook_value(value: &JsonValue) -> u64 {
    let digest = Sha256::digest(canonical_string(value).as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}
