use crate::core::codec::CallableCodec;
use crate::domain::model::{PortableCallable, SerializedCallable};
use crate::domain::ports::ModuleLoader;
use crate::script::{ModuleRef, Value};
use crate::utils::error::Result;

/// A callable that persists as its [`SerializedCallable`] record.
///
/// `get_state` always validates before handing out a record, so anything
/// stored through this type was rebuilt and exercised at least once.
#[derive(Debug, Clone)]
pub struct SerializableCallable {
    callable: PortableCallable,
    modules: Vec<ModuleRef>,
}

impl SerializableCallable {
    pub fn new(callable: impl Into<PortableCallable>, modules: Vec<ModuleRef>) -> Self {
        Self {
            callable: callable.into(),
            modules,
        }
    }

    pub fn callable(&self) -> &PortableCallable {
        &self.callable
    }

    pub fn modules(&self) -> &[ModuleRef] {
        &self.modules
    }

    pub fn get_state<L: ModuleLoader>(&self, codec: &CallableCodec<L>) -> Result<SerializedCallable> {
        codec.serialize_and_test(&self.callable, &self.modules)
    }

    pub fn set_state<L: ModuleLoader>(
        &mut self,
        codec: &CallableCodec<L>,
        state: &SerializedCallable,
    ) -> Result<()> {
        let (callable, modules) =
            codec.restore(&state.name, state.source.as_deref(), &state.modules)?;
        self.callable = callable;
        self.modules = modules;
        Ok(())
    }

    pub fn from_state<L: ModuleLoader>(
        codec: &CallableCodec<L>,
        state: &SerializedCallable,
    ) -> Result<Self> {
        let (callable, modules) =
            codec.restore(&state.name, state.source.as_deref(), &state.modules)?;
        Ok(Self { callable, modules })
    }

    pub fn call<L: ModuleLoader>(&self, codec: &CallableCodec<L>, args: Vec<Value>) -> Result<Value> {
        codec.call(&self.callable, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::registry::ModuleRegistry;

    #[test]
    fn test_state_round_trip() {
        let codec = CallableCodec::new(ModuleRegistry::with_stdlib());
        let text = codec.loader().load("text").unwrap();
        let shout = codec
            .load_function(
                "fn shout(s) {\n    return upper(s) + \"!\";\n}",
                "shout",
                &[text.clone()],
            )
            .unwrap();

        let original = SerializableCallable::new(shout, vec![text]);
        let state = original.get_state(&codec).unwrap();
        assert_eq!(state.modules, vec!["text".to_string()]);

        let json = serde_json::to_string(&state).unwrap();
        let restored =
            SerializableCallable::from_state(&codec, &serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(
            restored.call(&codec, vec![Value::str("hi")]).unwrap(),
            Value::str("HI!")
        );
        assert_eq!(restored.get_state(&codec).unwrap(), state);
    }

    #[test]
    fn test_set_state_replaces_callable_and_modules() {
        let codec = CallableCodec::new(ModuleRegistry::with_stdlib());
        let math = codec.loader().load("math").unwrap();
        let sqrt = math.get("sqrt").and_then(Value::as_callable).cloned().unwrap();
        let mut wrapper = SerializableCallable::new(sqrt, vec![math]);

        let state = SerializedCallable::direct("upper", vec!["text".to_string()]);
        wrapper.set_state(&codec, &state).unwrap();
        assert_eq!(wrapper.modules().len(), 1);
        assert_eq!(wrapper.modules()[0].name(), "text");
        assert_eq!(
            wrapper.call(&codec, vec![Value::str("a")]).unwrap(),
            Value::str("A")
        );
    }
}
