use serializable_callable::core::{dedent_by_first_line, namespace_for_modules};
use serializable_callable::{
    CallableCodec, CallableError, Module, ModuleLoader, ModuleRegistry, PortableCallable,
    SerializedCallable, Value,
};
use std::sync::Arc;

fn registry() -> ModuleRegistry {
    let registry = ModuleRegistry::with_stdlib();
    registry
        .register_script(
            "counters",
            r#"
fn increment(x) {
    return x + 1;
}

fn clamp(x, low, high) {
    return max(low, min(x, high));
}
"#,
        )
        .unwrap();
    registry
}

fn member(module: &Module, name: &str) -> PortableCallable {
    module
        .get(name)
        .and_then(Value::as_callable)
        .cloned()
        .map(PortableCallable::new)
        .unwrap()
}

#[test]
fn test_direct_reference_behaves_like_original() {
    let codec = CallableCodec::new(registry());
    let counters = codec.loader().load("counters").unwrap();
    let clamp = member(&counters, "clamp");

    let record = codec.serialize(&clamp, &[counters.clone()]).unwrap();
    assert!(record.is_direct());

    let rebuilt = codec.deserialize(&record).unwrap();
    for (x, low, high) in [(5, 0, 10), (-3, 0, 10), (42, 0, 10)] {
        let args = vec![Value::Int(x), Value::Int(low), Value::Int(high)];
        assert_eq!(
            codec.call(&rebuilt, args.clone()).unwrap(),
            codec.call(&clamp, args).unwrap()
        );
    }
}

#[test]
fn test_serializing_twice_is_identical() {
    let codec = CallableCodec::new(registry());
    let counters = codec.loader().load("counters").unwrap();
    let math = codec.loader().load("math").unwrap();
    let novel = codec
        .load_function(
            "fn scaled(x) {\n    return increment(x) * 2;\n}",
            "scaled",
            &[counters.clone()],
        )
        .unwrap();

    for callable in [member(&math, "sqrt"), novel] {
        let modules = [counters.clone(), math.clone()];
        let first = codec.serialize(&callable, &modules).unwrap();
        let second = codec.serialize(&callable, &modules).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_novel_function_rebuilds_from_source() {
    let codec = CallableCodec::new(registry());
    let f = codec
        .load_function("fn f(x) {\n    return x + 1;\n}", "f", &[])
        .unwrap();

    let record = codec.serialize_and_test(&f, &[]).unwrap();
    assert_eq!(record.name, "f");
    assert!(record.source.is_some());
    assert!(record.modules.is_empty());

    let g = codec.deserialize(&record).unwrap();
    assert_eq!(codec.call(&g, vec![Value::Int(5)]).unwrap(), Value::Int(6));
}

#[test]
fn test_nested_definition_is_dedented() {
    let codec = CallableCodec::new(registry());
    let source = r#"
fn make() {
    fn helper(x) {
        return x * 3;
    }
    return helper;
}
let tripled = make();
"#;
    let helper = codec.load_function(source, "tripled", &[]).unwrap();
    let record = codec.serialize(&helper, &[]).unwrap();

    let text = record.source.as_deref().unwrap();
    let first_line = text.lines().next().unwrap();
    assert!(!first_line.starts_with(char::is_whitespace));
    assert_eq!(text, "fn helper(x) {\n    return x * 3;\n}");
    assert_eq!(record.name, "helper");

    let rebuilt = codec.deserialize(&record).unwrap();
    assert_eq!(codec.call(&rebuilt, vec![Value::Int(4)]).unwrap(), Value::Int(12));
}

#[test]
fn test_later_module_shadows_earlier() {
    let registry = ModuleRegistry::new();
    let a = registry.register(Module::new("a").constant("x", Value::Int(1)));
    let b = registry.register(Module::new("b").constant("x", Value::Int(2)));

    let namespace = namespace_for_modules(&[a.clone(), b.clone()]);
    assert_eq!(namespace.get("x"), Some(&Value::Int(2)));

    let codec = CallableCodec::new(registry);
    let f = codec
        .load_function("fn read() {\n    return x;\n}", "read", &[a, b])
        .unwrap();
    let record = codec.serialize(&f, &[codec.loader().load("a").unwrap(), codec.loader().load("b").unwrap()]).unwrap();
    assert_eq!(record.modules, vec!["a".to_string(), "b".to_string()]);
    let rebuilt = codec.deserialize(&record).unwrap();
    assert_eq!(codec.call(&rebuilt, vec![]).unwrap(), Value::Int(2));
}

#[test]
fn test_partial_application_is_unsupported() {
    let codec = CallableCodec::new(registry());
    let counters = codec.loader().load("counters").unwrap();
    let clamp = counters.get("clamp").and_then(Value::as_callable).cloned().unwrap();
    let partial = serializable_callable::Callable::partial(clamp, vec![Value::Int(0)]);
    let err = codec
        .serialize_and_test(&PortableCallable::new(partial), &[counters])
        .unwrap_err();
    assert!(matches!(err, CallableError::UnsupportedCallableError { .. }));
}

#[test]
fn test_native_without_module_has_no_source() {
    let codec = CallableCodec::new(registry());
    let math = codec.loader().load("math").unwrap();
    let sqrt = member(&math, "sqrt");
    let err = codec.serialize(&sqrt, &[]).unwrap_err();
    assert!(matches!(err, CallableError::SourceUnavailableError { .. }));
}

#[test]
fn test_record_survives_json_without_changes() {
    let codec = CallableCodec::new(registry());
    let f = codec
        .load_function("if true {\n\tfn tabbed(x) {\n\t\treturn x;   \n\t}\n}", "tabbed", &[])
        .unwrap();
    let record = codec.serialize(&f, &[]).unwrap();
    assert_eq!(record.source.as_deref(), Some("fn tabbed(x) {\n\treturn x;   \n}"));

    let json = serde_json::to_string(&record).unwrap();
    let back: SerializedCallable = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn test_module_changed_since_serialization() {
    let registry = ModuleRegistry::new();
    let v1 = Arc::new(Module::new("lib"));
    registry.register(Module::new("lib").constant("gone", Value::Nil));

    let codec = CallableCodec::new(registry);
    let record = SerializedCallable::direct("renamed", vec![codec.loader().module_id(&v1)]);
    let err = codec.deserialize(&record).unwrap_err();
    assert!(matches!(err, CallableError::NameResolutionError { .. }));
    assert!(err.to_string().contains("[lib]"));
}

#[test]
fn test_dedent_matches_extracted_width() {
    assert_eq!(
        dedent_by_first_line("        fn f() {\n            return 1;\n        }"),
        "fn f() {\n    return 1;\n}"
    );
}
