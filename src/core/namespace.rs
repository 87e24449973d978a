use crate::domain::ports::ModuleLoader;
use crate::script::{new_globals, Callable, Globals, ModuleRef, Value};
use crate::utils::error::{CallableError, Result};
use std::collections::HashMap;

/// The merged name -> value view over an ordered list of modules.
///
/// Iteration follows first insertion. Re-inserting an existing key replaces
/// the value but keeps the key's position.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    order: Vec<String>,
    values: HashMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if !self.values.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| (name.as_str(), v)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Inverse index from callable to the name it is bound under.
    ///
    /// Only callable, hashable values take part. When one callable is bound
    /// under several names the entry visited last wins.
    pub fn callable_index(&self) -> HashMap<Callable, String> {
        self.iter()
            .filter(|(_, value)| value.is_callable() && value.is_hashable())
            .filter_map(|(name, value)| value.as_callable().map(|c| (c.clone(), name.to_string())))
            .collect()
    }

    /// Same names minus dunders, each value swapped for a stand-in labelled
    /// with its name.
    pub fn sandboxed(&self) -> Namespace {
        let mut sandbox = Namespace::new();
        for name in self.names().filter(|name| !is_dunder(name)) {
            sandbox.insert(name, Value::stand_in(name));
        }
        sandbox
    }

    /// A private mutable copy for the interpreter to execute against.
    pub fn to_globals(&self) -> Globals {
        new_globals(self.values.clone())
    }
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

pub fn namespace_for_module(module: &ModuleRef) -> Namespace {
    namespace_for_modules(std::slice::from_ref(module))
}

/// Merge module members in order; later modules overwrite earlier ones.
pub fn namespace_for_modules(modules: &[ModuleRef]) -> Namespace {
    let mut namespace = Namespace::new();
    for module in modules {
        for (name, value) in module.members() {
            namespace.insert(name.as_str(), value.clone());
        }
    }
    namespace
}

/// Load every id through `loader` and build the merged namespace.
///
/// Nothing is cached here; every call sees the current state of the modules.
pub fn resolve<L: ModuleLoader + ?Sized>(
    loader: &L,
    ids: &[String],
) -> Result<(Vec<ModuleRef>, Namespace)> {
    let modules = ids
        .iter()
        .map(|id| {
            loader.load(id).map_err(|e| match e {
                CallableError::ResolutionError { .. } => e,
                other => CallableError::ResolutionError {
                    module: id.clone(),
                    reason: other.to_string(),
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!("resolved {} module(s): {:?}", modules.len(), ids);
    let namespace = namespace_for_modules(&modules);
    Ok((modules, namespace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Module;
    use std::sync::Arc;

    fn module(name: &str, members: &[(&str, Value)]) -> ModuleRef {
        let mut module = Module::new(name);
        for (key, value) in members {
            module.insert(*key, value.clone());
        }
        Arc::new(module)
    }

    #[test]
    fn test_later_modules_win_and_order_is_stable() {
        let a = module("a", &[("x", Value::Int(1)), ("y", Value::Int(2))]);
        let b = module("b", &[("x", Value::Int(10)), ("z", Value::Int(3))]);
        let ns = namespace_for_modules(&[a, b]);

        assert_eq!(ns.get("x"), Some(&Value::Int(10)));
        assert_eq!(ns.get("y"), Some(&Value::Int(2)));
        let names: Vec<&str> = ns.names().collect();
        assert_eq!(names, vec!["__name__", "x", "y", "z"]);
        assert_eq!(ns.get("__name__"), Some(&Value::str("b")));
    }

    #[test]
    fn test_empty_module_list() {
        let ns = namespace_for_modules(&[]);
        assert!(ns.is_empty());
        assert!(ns.callable_index().is_empty());
    }

    #[test]
    fn test_callable_index_skips_plain_values_and_later_name_wins() {
        let f = Callable::native("f", Some(0), |_| Ok(Value::Nil));
        let mut ns = Namespace::new();
        ns.insert("first", Value::Function(f.clone()));
        ns.insert("n", Value::Int(1));
        ns.insert("items", Value::list(vec![]));
        ns.insert("second", Value::Function(f.clone()));

        let index = ns.callable_index();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&f).map(String::as_str), Some("second"));
    }

    #[test]
    fn test_sandboxed_replaces_values_and_drops_dunders() {
        let m = module("m", &[("helper", Value::Int(7))]);
        let sandbox = namespace_for_module(&m).sandboxed();

        assert!(!sandbox.contains("__name__"));
        assert_eq!(sandbox.get("helper"), Some(&Value::stand_in("helper")));
    }

    #[test]
    fn test_to_globals_is_a_private_copy() {
        let mut ns = Namespace::new();
        ns.insert("x", Value::Int(1));
        let globals = ns.to_globals();
        globals.write().insert("x".to_string(), Value::Int(2));
        assert_eq!(ns.get("x"), Some(&Value::Int(1)));
    }
}
