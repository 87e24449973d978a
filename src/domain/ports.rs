use crate::script::{ModuleRef, ScriptError, ScriptResult, Value};
use crate::utils::error::Result;
use crate::Module;

/// Turns module ids into loaded modules and back.
///
/// `module_id(&*load(id)?) == id` must hold for every module a record names.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, id: &str) -> Result<ModuleRef>;

    fn module_id(&self, module: &Module) -> String {
        module.name().to_string()
    }
}

impl<L: ModuleLoader + ?Sized> ModuleLoader for &L {
    fn load(&self, id: &str) -> Result<ModuleRef> {
        (**self).load(id)
    }

    fn module_id(&self, module: &Module) -> String {
        (**self).module_id(module)
    }
}

impl<L: ModuleLoader + ?Sized> ModuleLoader for std::sync::Arc<L> {
    fn load(&self, id: &str) -> Result<ModuleRef> {
        (**self).load(id)
    }

    fn module_id(&self, module: &Module) -> String {
        (**self).module_id(module)
    }
}

/// Resolves `import` statements while a script runs.
///
/// The interpreter never reaches for a process-wide import mechanism; whoever
/// builds an interpreter decides what importing means for that run.
pub trait ImportHook {
    fn import(&self, module: &str) -> ScriptResult<Value>;
}

/// Real imports: load through a [`ModuleLoader`] and hand back the module.
pub struct LoaderImports<'a> {
    loader: &'a dyn ModuleLoader,
}

impl<'a> LoaderImports<'a> {
    pub fn new(loader: &'a dyn ModuleLoader) -> Self {
        Self { loader }
    }
}

impl ImportHook for LoaderImports<'_> {
    fn import(&self, module: &str) -> ScriptResult<Value> {
        self.loader
            .load(module)
            .map(Value::Module)
            .map_err(|e| ScriptError::Import {
                module: module.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Refuses every import. Used where no loader is in scope.
pub struct NoImports;

impl ImportHook for NoImports {
    fn import(&self, module: &str) -> ScriptResult<Value> {
        Err(ScriptError::Import {
            module: module.to_string(),
            reason: "imports are disabled in this context".to_string(),
        })
    }
}
