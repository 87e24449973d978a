//! Decides how a callable will be persisted and recovers its source text.

use crate::core::namespace::Namespace;
use crate::domain::model::{PortableCallable, SerializedCallable};
use crate::script::Callable;
use crate::utils::error::{CallableError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Bound under `name` in the module namespace; no source needed.
    DirectReference { name: String },
    /// Carries the source it was itself rebuilt from.
    AttachedSource { name: String, source: String },
    /// Source recovered from the script that defined it.
    ExtractedSource { name: String, source: String },
}

impl Classification {
    pub fn name(&self) -> &str {
        match self {
            Classification::DirectReference { name }
            | Classification::AttachedSource { name, .. }
            | Classification::ExtractedSource { name, .. } => name,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Classification::DirectReference { .. } => None,
            Classification::AttachedSource { source, .. }
            | Classification::ExtractedSource { source, .. } => Some(source),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Classification::DirectReference { .. } => "direct reference",
            Classification::AttachedSource { .. } => "attached source",
            Classification::ExtractedSource { .. } => "extracted source",
        }
    }

    pub fn into_record(self, modules: Vec<String>) -> SerializedCallable {
        match self {
            Classification::DirectReference { name } => SerializedCallable::direct(name, modules),
            Classification::AttachedSource { name, source }
            | Classification::ExtractedSource { name, source } => {
                SerializedCallable::with_source(name, source, modules)
            }
        }
    }
}

/// Classify `callable` against the merged namespace of its declared modules.
///
/// Checked in order: direct reference, attached provenance, partial
/// application (rejected), extracted source.
pub fn classify(callable: &PortableCallable, namespace: &Namespace) -> Result<Classification> {
    let index = namespace.callable_index();
    if let Some(name) = index.get(callable.callable()) {
        tracing::debug!("'{}' is bound directly as '{}'", callable.name(), name);
        return Ok(Classification::DirectReference { name: name.clone() });
    }

    if let Some(source) = callable.source() {
        tracing::debug!("'{}' carries attached source", callable.name());
        return Ok(Classification::AttachedSource {
            name: callable.name(),
            source: source.to_string(),
        });
    }

    if callable.callable().is_partial() {
        return Err(CallableError::UnsupportedCallableError {
            name: callable.name(),
            reason: "partial applications have no source of their own".to_string(),
        });
    }

    let source = dedent_by_first_line(&extract_source(callable.callable())?);
    tracing::debug!("extracted {} bytes of source for '{}'", source.len(), callable.name());
    Ok(Classification::ExtractedSource {
        name: callable.name(),
        source,
    })
}

/// Raw text of a script function's definition, starting at the beginning of
/// the line the definition opens on.
pub fn extract_source(callable: &Callable) -> Result<String> {
    let origin = match callable {
        Callable::Script(_) => callable.origin(),
        Callable::Native(_) => {
            return Err(CallableError::SourceUnavailableError {
                name: callable.name(),
                reason: "native functions have no script source".to_string(),
            })
        }
        Callable::Partial(_) => {
            return Err(CallableError::UnsupportedCallableError {
                name: callable.name(),
                reason: "partial applications have no source of their own".to_string(),
            })
        }
    };
    let origin = origin.ok_or_else(|| CallableError::SourceUnavailableError {
        name: callable.name(),
        reason: "the defining script text was not retained".to_string(),
    })?;

    let text: &str = &origin.text;
    let line_start = text[..origin.span.start]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    // keep the indentation only when nothing else precedes `fn` on its line
    let prefix = &text[line_start..origin.span.start];
    let start = if prefix.chars().all(char::is_whitespace) {
        line_start
    } else {
        origin.span.start
    };
    Ok(text[start..origin.span.end].to_string())
}

/// Remove the first line's indentation width from every line.
///
/// Each line loses at most that many leading whitespace characters; lines
/// indented less than the first keep whatever text follows their whitespace.
pub fn dedent_by_first_line(text: &str) -> String {
    let width = text
        .lines()
        .next()
        .map(|first| first.chars().take_while(|c| c.is_whitespace()).count())
        .unwrap_or(0);
    if width == 0 {
        return text.lines().collect::<Vec<_>>().join("\n");
    }
    text.lines()
        .map(|line| {
            let strip: usize = line
                .chars()
                .take(width)
                .take_while(|c| c.is_whitespace())
                .map(char::len_utf8)
                .sum();
            &line[strip..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::namespace::namespace_for_modules;
    use crate::domain::ports::NoImports;
    use crate::script::{new_globals, Interpreter, Module, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn define(source: &str, name: &str) -> Callable {
        let globals = new_globals(HashMap::new());
        Interpreter::new(&NoImports).exec(source, &globals).unwrap();
        let value = globals.read().get(name).cloned().unwrap();
        value.as_callable().cloned().unwrap()
    }

    #[test]
    fn test_dedent_by_first_line() {
        let text = "    fn f(x) {\n        return x;\n    }";
        assert_eq!(dedent_by_first_line(text), "fn f(x) {\n    return x;\n}");
    }

    #[test]
    fn test_dedent_keeps_text_of_shallower_lines() {
        let text = "    fn f(x) {\n  return x;\n}";
        assert_eq!(dedent_by_first_line(text), "fn f(x) {\nreturn x;\n}");
    }

    #[test]
    fn test_dedent_without_indent_is_identity() {
        let text = "fn f(x) {\n    return x;\n}";
        assert_eq!(dedent_by_first_line(text), text);
    }

    #[test]
    fn test_extract_source_includes_leading_indent() {
        let source = "let a = 1;\nif true {\n    fn inner(x) {\n        return x;\n    }\n    let kept = inner;\n}\n";
        let inner = define(source, "kept");
        assert_eq!(
            extract_source(&inner).unwrap(),
            "    fn inner(x) {\n        return x;\n    }"
        );
    }

    #[test]
    fn test_extract_source_mid_line_definition() {
        let source = "let a = 1; fn f() { return a; }";
        let f = define(source, "f");
        assert_eq!(extract_source(&f).unwrap(), "fn f() { return a; }");
    }

    #[test]
    fn test_classify_direct_reference() {
        let f = define("fn square(x) { return x * x; }", "square");
        let module = Arc::new(Module::new("shapes").constant("square", Value::Function(f.clone())));
        let ns = namespace_for_modules(&[module]);

        let classification = classify(&PortableCallable::new(f), &ns).unwrap();
        assert_eq!(
            classification,
            Classification::DirectReference {
                name: "square".to_string()
            }
        );
    }

    #[test]
    fn test_classify_prefers_attached_source() {
        let f = define("fn g() { return 1; }", "g");
        let portable = PortableCallable::with_provenance(f, "fn g() {\n  return 1;\n}");
        let classification = classify(&portable, &namespace_for_modules(&[])).unwrap();
        assert_eq!(classification.kind(), "attached source");
        assert_eq!(classification.source(), Some("fn g() {\n  return 1;\n}"));
    }

    #[test]
    fn test_classify_rejects_partial_and_native() {
        let f = define("fn add(a, b) { return a + b; }", "add");
        let partial = Callable::partial(f, vec![Value::Int(1)]);
        let err = classify(&partial.into(), &namespace_for_modules(&[])).unwrap_err();
        assert!(matches!(err, CallableError::UnsupportedCallableError { .. }));

        let native = Callable::native("n", Some(0), |_| Ok(Value::Nil));
        let err = classify(&native.into(), &namespace_for_modules(&[])).unwrap_err();
        assert!(matches!(err, CallableError::SourceUnavailableError { .. }));
    }
}
