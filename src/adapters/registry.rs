//! Module registry: in-memory modules plus `.fns` scripts on search paths.

use crate::adapters::stdlib;
use crate::domain::ports::{LoaderImports, ModuleLoader};
use crate::script::{new_globals, Interpreter, Module, ModuleRef};
use crate::utils::error::{CallableError, Result};
use crate::utils::validation::validate_module_id;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, ThreadId};

pub const SCRIPT_EXTENSION: &str = "fns";

/// Loads modules by dotted id and caches them.
///
/// A module is loaded at most once; later loads return the same `Arc`, so
/// callables read out of it keep their identity across loads.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, ModuleRef>>,
    search_paths: Vec<PathBuf>,
    loading: Mutex<HashSet<(ThreadId, String)>>,
    max_steps: Option<u64>,
}

/// Marks a module id as being loaded on this thread until dropped.
struct LoadGuard<'a> {
    loading: &'a Mutex<HashSet<(ThreadId, String)>>,
    key: (ThreadId, String),
}

impl<'a> LoadGuard<'a> {
    fn enter(loading: &'a Mutex<HashSet<(ThreadId, String)>>, id: &str) -> Result<Self> {
        let key = (thread::current().id(), id.to_string());
        if !loading.lock().insert(key.clone()) {
            return Err(CallableError::ResolutionError {
                module: id.to_string(),
                reason: "circular import".to_string(),
            });
        }
        Ok(Self { loading, key })
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.loading.lock().remove(&self.key);
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the native `math` and `text` modules.
    pub fn with_stdlib() -> Self {
        let registry = Self::new();
        for module in stdlib::modules() {
            registry.register(module);
        }
        registry
    }

    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Register a ready-made module under its own name, replacing any module
    /// already registered under that name.
    pub fn register(&self, module: Module) -> ModuleRef {
        let module = ModuleRef::new(module);
        self.modules
            .write()
            .insert(module.name().to_string(), module.clone());
        module
    }

    /// Execute `source` as module `id` and register the result.
    ///
    /// Imports inside the script go through this registry.
    pub fn register_script(&self, id: &str, source: &str) -> Result<ModuleRef> {
        validate_module_id(id)?;
        let module = self.build_script_module(id, source)?;
        Ok(self.register(module))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.read().contains_key(id)
    }

    pub fn module_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.modules.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn build_script_module(&self, id: &str, source: &str) -> Result<Module> {
        let _guard = LoadGuard::enter(&self.loading, id)?;
        let globals = new_globals(HashMap::new());
        let imports = LoaderImports::new(self);
        Interpreter::new(&imports)
            .with_step_limit(self.max_steps)
            .exec(source, &globals)
            .map_err(|e| CallableError::ResolutionError {
                module: id.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!("📦 built module '{}' ({} bindings)", id, globals.read().len());
        Ok(Module::from_globals(id, &globals))
    }

    fn find_script(&self, id: &str) -> Option<PathBuf> {
        let relative: PathBuf = id.split('.').collect::<PathBuf>().with_extension(SCRIPT_EXTENSION);
        self.search_paths
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
    }

    fn load_from_disk(&self, id: &str, path: &Path) -> Result<ModuleRef> {
        tracing::debug!("loading module '{}' from {}", id, path.display());
        let source = fs::read_to_string(path)?;
        let module = self.build_script_module(id, &source)?;
        let mut modules = self.modules.write();
        // a concurrent load may have won; keep the first module registered
        let module = modules
            .entry(id.to_string())
            .or_insert_with(|| ModuleRef::new(module))
            .clone();
        Ok(module)
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load(&self, id: &str) -> Result<ModuleRef> {
        if let Some(module) = self.modules.read().get(id) {
            return Ok(module.clone());
        }
        validate_module_id(id).map_err(|e| CallableError::ResolutionError {
            module: id.to_string(),
            reason: e.to_string(),
        })?;
        match self.find_script(id) {
            Some(path) => self.load_from_disk(id, &path),
            None => Err(CallableError::ResolutionError {
                module: id.to_string(),
                reason: if self.search_paths.is_empty() {
                    "no such module registered".to_string()
                } else {
                    format!(
                        "no such module registered or found under {}",
                        self.search_paths
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                },
            }),
        }
    }
}
