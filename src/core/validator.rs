//! Sandbox validation of serialized source.
//!
//! The source is rebuilt against a namespace where every module member is a
//! stand-in, then called with stand-in arguments. Imports made along the way
//! are checked for real through the module loader but the callable only ever
//! receives stand-ins. The import hook is injected into the interpreter of a
//! single run and dropped with it, so the real import path is never swapped
//! out and there is nothing to restore afterwards.

use crate::core::codec::deserialize_in_namespace;
use crate::core::namespace::{resolve, Namespace};
use crate::domain::model::SerializedCallable;
use crate::domain::ports::{ImportHook, ModuleLoader};
use crate::script::{Interpreter, ScriptError, ScriptResult, Value};
use crate::utils::error::{CallableError, Result};
use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub name: String,
    pub arity: usize,
    /// Modules the callable imported, in first-import order.
    pub imports_checked: Vec<String>,
}

/// Import hook for the sandbox: confirm the module loads, return a stand-in.
pub struct SandboxImports<'a> {
    loader: &'a dyn ModuleLoader,
    confirmed: RefCell<Vec<String>>,
}

impl<'a> SandboxImports<'a> {
    pub fn new(loader: &'a dyn ModuleLoader) -> Self {
        Self {
            loader,
            confirmed: RefCell::new(Vec::new()),
        }
    }

    pub fn confirmed(&self) -> Vec<String> {
        self.confirmed.borrow().clone()
    }
}

impl ImportHook for SandboxImports<'_> {
    fn import(&self, module: &str) -> ScriptResult<Value> {
        self.loader.load(module).map_err(|e| ScriptError::Import {
            module: module.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!("sandbox confirmed import of '{}'", module);
        let mut confirmed = self.confirmed.borrow_mut();
        if !confirmed.iter().any(|m| m == module) {
            confirmed.push(module.to_string());
        }
        Ok(Value::stand_in(module))
    }
}

pub struct SandboxValidator<'a> {
    loader: &'a dyn ModuleLoader,
    step_limit: Option<u64>,
}

impl<'a> SandboxValidator<'a> {
    pub fn new(loader: &'a dyn ModuleLoader) -> Self {
        Self {
            loader,
            step_limit: None,
        }
    }

    pub fn with_step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }

    /// Validate a record against the modules it names.
    ///
    /// Direct records have no source to exercise; they pass once the name is
    /// confirmed to be bound to a fn.
    pub fn validate(&self, record: &SerializedCallable) -> Result<ValidationReport> {
        let (_, namespace) =
            resolve(self.loader, &record.modules).map_err(|e| failure(&record.name, e))?;
        match record.source.as_deref() {
            Some(source) => self.validate_in_namespace(&record.name, source, &namespace),
            None => match namespace.get(&record.name).and_then(Value::as_callable) {
                Some(callable) => Ok(ValidationReport {
                    name: record.name.clone(),
                    arity: callable.arity().unwrap_or(0),
                    imports_checked: Vec::new(),
                }),
                None => Err(CallableError::ValidationError {
                    name: record.name.clone(),
                    reason: format!(
                        "'{}' is not bound to a fn in [{}]",
                        record.name,
                        record.modules.join(", ")
                    ),
                }),
            },
        }
    }

    /// Exercise `source` against the stand-in version of `namespace`.
    pub fn validate_in_namespace(
        &self,
        name: &str,
        source: &str,
        namespace: &Namespace,
    ) -> Result<ValidationReport> {
        let sandbox = namespace.sandboxed();
        let imports = SandboxImports::new(self.loader);
        let arity = self.run(name, source, &sandbox, &imports)?;

        Ok(ValidationReport {
            name: name.to_string(),
            arity,
            imports_checked: imports.confirmed(),
        })
    }

    fn run(
        &self,
        name: &str,
        source: &str,
        sandbox: &Namespace,
        imports: &SandboxImports<'_>,
    ) -> Result<usize> {
        let interpreter = Interpreter::new(imports).with_step_limit(self.step_limit);
        let rebuilt = deserialize_in_namespace(name, Some(source), sandbox, &interpreter)
            .map_err(|e| failure(name, e))?;

        let arity = rebuilt.arity().unwrap_or(0);
        let args = (0..arity)
            .map(|i| Value::stand_in(format!("arg{}", i)))
            .collect();
        interpreter
            .call(rebuilt.callable(), args)
            .map_err(|e| failure(name, e.into()))?;
        Ok(arity)
    }
}

fn failure(name: &str, error: CallableError) -> CallableError {
    CallableError::ValidationError {
        name: name.to_string(),
        reason: error.to_string(),
    }
}
