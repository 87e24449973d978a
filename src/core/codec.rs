use crate::core::classifier::classify;
use crate::core::namespace::{namespace_for_modules, resolve, Namespace};
use crate::core::validator::{SandboxValidator, ValidationReport};
use crate::domain::model::{PortableCallable, SerializedCallable};
use crate::domain::ports::{LoaderImports, ModuleLoader};
use crate::script::{Interpreter, ModuleRef, Value};
use crate::utils::error::{CallableError, Result};

/// Knobs for [`CallableCodec`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecSettings {
    /// Statement budget for script execution; `None` is unlimited.
    pub max_steps: Option<u64>,
}

/// Converts callables to [`SerializedCallable`] records and back.
pub struct CallableCodec<L: ModuleLoader> {
    loader: L,
    settings: CodecSettings,
}

impl<L: ModuleLoader> CallableCodec<L> {
    pub fn new(loader: L) -> Self {
        Self::with_settings(loader, CodecSettings::default())
    }

    pub fn with_settings(loader: L, settings: CodecSettings) -> Self {
        Self { loader, settings }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    /// Produce the record for `callable` against the given modules.
    ///
    /// The record is always rebuilt before it is returned, so anything that
    /// cannot be deserialized fails here rather than at load time.
    pub fn serialize(
        &self,
        callable: &PortableCallable,
        modules: &[ModuleRef],
    ) -> Result<SerializedCallable> {
        let namespace = namespace_for_modules(modules);
        let classification = classify(callable, &namespace)?;
        tracing::debug!(
            "classified '{}' as {}",
            classification.name(),
            classification.kind()
        );

        let ids = modules
            .iter()
            .map(|module| self.loader.module_id(module))
            .collect();
        let record = classification.into_record(ids);

        self.deserialize(&record)?;
        tracing::info!(
            "✅ serialized '{}' ({} module(s), {})",
            record.name,
            record.modules.len(),
            if record.is_direct() { "direct" } else { "with source" }
        );
        Ok(record)
    }

    /// [`serialize`](Self::serialize), then exercise the source in the
    /// sandbox when the record carries any. Only records that pass both
    /// checks come back.
    pub fn serialize_and_test(
        &self,
        callable: &PortableCallable,
        modules: &[ModuleRef],
    ) -> Result<SerializedCallable> {
        let record = self.serialize(callable, modules)?;
        if let Some(source) = record.source.as_deref() {
            let namespace = namespace_for_modules(modules);
            let report = self
                .validator()
                .validate_in_namespace(&record.name, source, &namespace)
                .inspect_err(|e| tracing::warn!("⚠️ {}", e))?;
            tracing::debug!(
                "validated '{}' (arity {}, imports {:?})",
                report.name,
                report.arity,
                report.imports_checked
            );
        }
        Ok(record)
    }

    pub fn deserialize(&self, record: &SerializedCallable) -> Result<PortableCallable> {
        self.deserialize_parts(&record.name, record.source.as_deref(), &record.modules)
    }

    pub fn deserialize_parts(
        &self,
        name: &str,
        source: Option<&str>,
        modules: &[String],
    ) -> Result<PortableCallable> {
        self.restore(name, source, modules).map(|(callable, _)| callable)
    }

    /// Rebuild the callable and also hand back the loaded modules.
    pub fn restore(
        &self,
        name: &str,
        source: Option<&str>,
        modules: &[String],
    ) -> Result<(PortableCallable, Vec<ModuleRef>)> {
        let (loaded, namespace) = resolve(&self.loader, modules)?;
        let imports = LoaderImports::new(&self.loader);
        let interpreter = Interpreter::new(&imports).with_step_limit(self.settings.max_steps);
        let callable = deserialize_in_namespace(name, source, &namespace, &interpreter).map_err(
            |e| match e {
                CallableError::NameResolutionError { name, .. } => {
                    CallableError::NameResolutionError {
                        name,
                        modules: modules.to_vec(),
                    }
                }
                other => other,
            },
        )?;
        Ok((callable, loaded))
    }

    /// Run `source` in the namespace of `modules` and return the function it
    /// binds to `name`. The result carries no provenance; classifying it
    /// extracts its source from `source`.
    pub fn load_function(
        &self,
        source: &str,
        name: &str,
        modules: &[ModuleRef],
    ) -> Result<PortableCallable> {
        let globals = namespace_for_modules(modules).to_globals();
        let imports = LoaderImports::new(&self.loader);
        Interpreter::new(&imports)
            .with_step_limit(self.settings.max_steps)
            .exec(source, &globals)?;
        let value = globals.read().get(name).cloned();
        match value {
            Some(Value::Function(callable)) => Ok(PortableCallable::new(callable)),
            Some(other) => Err(CallableError::ExecutionError {
                name: name.to_string(),
                message: format!("script binds '{}' to a {}, not a fn", name, other.type_name()),
            }),
            None => Err(CallableError::ExecutionError {
                name: name.to_string(),
                message: format!("script does not define '{}'", name),
            }),
        }
    }

    /// Invoke `callable` with real imports.
    pub fn call(&self, callable: &PortableCallable, args: Vec<Value>) -> Result<Value> {
        let imports = LoaderImports::new(&self.loader);
        let value = Interpreter::new(&imports)
            .with_step_limit(self.settings.max_steps)
            .call(callable.callable(), args)?;
        Ok(value)
    }

    pub fn validator(&self) -> SandboxValidator<'_> {
        SandboxValidator::new(&self.loader).with_step_limit(self.settings.max_steps)
    }

    pub fn validate(&self, record: &SerializedCallable) -> Result<ValidationReport> {
        self.validator().validate(record)
    }
}

/// Rebuild a callable from its parts inside an already built namespace.
///
/// Without source, `name` must be bound to a callable in `namespace`. With
/// source, the source runs in a private copy of `namespace` and must bind a
/// fn called `name`; the result carries `source` as its provenance.
pub fn deserialize_in_namespace(
    name: &str,
    source: Option<&str>,
    namespace: &Namespace,
    interpreter: &Interpreter<'_>,
) -> Result<PortableCallable> {
    let Some(source) = source else {
        return match namespace.get(name) {
            Some(Value::Function(callable)) => Ok(PortableCallable::new(callable.clone())),
            Some(other) => Err(CallableError::ExecutionError {
                name: name.to_string(),
                message: format!("'{}' is bound to a {}, not a fn", name, other.type_name()),
            }),
            None => Err(CallableError::NameResolutionError {
                name: name.to_string(),
                modules: Vec::new(),
            }),
        };
    };

    let globals = namespace.to_globals();
    interpreter
        .exec(source, &globals)
        .map_err(|e| CallableError::ExecutionError {
            name: name.to_string(),
            message: e.to_string(),
        })?;

    let value = globals.read().get(name).cloned();
    match value {
        Some(Value::Function(callable)) => Ok(PortableCallable::with_provenance(callable, source)),
        Some(other) => Err(CallableError::ExecutionError {
            name: name.to_string(),
            message: format!("source binds '{}' to a {}, not a fn", name, other.type_name()),
        }),
        None => Err(CallableError::ExecutionError {
            name: name.to_string(),
            message: format!("source does not define '{}'", name),
        }),
    }
}
