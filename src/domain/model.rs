use crate::script::{Callable, Globals};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The persisted form of a callable.
///
/// `source` is `None` exactly when `name` is expected to be bound directly in
/// one of `modules`. Module order is significant: later modules shadow earlier
/// ones when the namespace is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedCallable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub modules: Vec<String>,
}

impl SerializedCallable {
    pub fn direct(name: impl Into<String>, modules: Vec<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            modules,
        }
    }

    pub fn with_source(name: impl Into<String>, source: impl Into<String>, modules: Vec<String>) -> Self {
        Self {
            name: name.into(),
            source: Some(source.into()),
            modules,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.source.is_none()
    }
}

/// A callable paired with the source text it was rebuilt from, if any.
///
/// Deserialized callables keep their source so they can be serialized again
/// without access to the script that first defined them. The wrapper also
/// owns the globals a script function resolves names in; once the last
/// wrapper goes, so does a rebuilt function's private namespace.
#[derive(Clone)]
pub struct PortableCallable {
    callable: Callable,
    provenance: Option<Arc<str>>,
    scope: Option<Globals>,
}

impl PortableCallable {
    pub fn new(callable: Callable) -> Self {
        Self {
            scope: callable.scope(),
            callable,
            provenance: None,
        }
    }

    pub fn with_provenance(callable: Callable, source: impl Into<Arc<str>>) -> Self {
        Self {
            provenance: Some(source.into()),
            ..Self::new(callable)
        }
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn source(&self) -> Option<&str> {
        self.provenance.as_deref()
    }

    pub fn name(&self) -> String {
        self.callable.name()
    }

    pub fn arity(&self) -> Option<usize> {
        self.callable.arity()
    }
}

impl std::fmt::Debug for PortableCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortableCallable")
            .field("callable", &self.callable)
            .field("provenance", &self.provenance)
            .finish()
    }
}

impl From<Callable> for PortableCallable {
    fn from(callable: Callable) -> Self {
        PortableCallable::new(callable)
    }
}
