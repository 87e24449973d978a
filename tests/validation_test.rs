use serializable_callable::core::{namespace_for_modules, SandboxImports};
use serializable_callable::domain::LoaderImports;
use serializable_callable::script::Interpreter;
use serializable_callable::{
    CallableCodec, CallableError, ImportHook, ModuleLoader, ModuleRegistry, SandboxValidator,
    SerializedCallable, Value,
};

fn codec() -> CallableCodec<ModuleRegistry> {
    let registry = ModuleRegistry::with_stdlib();
    registry
        .register_script("config", "let threshold = 10;\nfn above(x) {\n    return x > threshold;\n}\n")
        .unwrap();
    CallableCodec::new(registry)
}

#[test]
fn test_import_of_missing_module_fails_validation() {
    let codec = codec();
    let f = codec
        .load_function(
            "fn fetch(key) {\n    import remote_store;\n    return remote_store.get(key);\n}",
            "fetch",
            &[],
        )
        .unwrap();

    let err = codec.serialize_and_test(&f, &[]).unwrap_err();
    match err {
        CallableError::ValidationError { name, reason } => {
            assert_eq!(name, "fetch");
            assert!(reason.contains("remote_store"), "{}", reason);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_import_of_real_module_passes() {
    let codec = codec();
    let f = codec
        .load_function(
            "fn norm(x, y) {\n    import math;\n    return math.hypot(x, y);\n}",
            "norm",
            &[],
        )
        .unwrap();

    let record = codec.serialize_and_test(&f, &[]).unwrap();
    let report = codec.validate(&record).unwrap();
    assert_eq!(report.arity, 2);
    assert_eq!(report.imports_checked, vec!["math".to_string()]);

    let rebuilt = codec.deserialize(&record).unwrap();
    assert_eq!(
        codec.call(&rebuilt, vec![Value::Int(3), Value::Int(4)]).unwrap(),
        Value::Float(5.0)
    );
}

#[test]
fn test_declared_module_members_pass() {
    let codec = codec();
    let config = codec.loader().load("config").unwrap();
    let f = codec
        .load_function(
            "fn gate(values) {\n    let kept = [];\n    for v in values {\n        if above(v) {\n            kept = append(kept, v);\n        }\n    }\n    return kept;\n}",
            "gate",
            &[config.clone()],
        )
        .unwrap();

    let record = codec.serialize_and_test(&f, &[config]).unwrap();
    assert_eq!(record.modules, vec!["config".to_string()]);
    let rebuilt = codec.deserialize(&record).unwrap();
    let values = Value::list(vec![Value::Int(5), Value::Int(15), Value::Int(20)]);
    assert_eq!(
        codec.call(&rebuilt, vec![values]).unwrap(),
        Value::list(vec![Value::Int(15), Value::Int(20)])
    );
}

#[test]
fn test_reference_outside_declared_modules_fails() {
    let codec = codec();
    let config = codec.loader().load("config").unwrap();
    // defined with `config` in scope but serialized without declaring it
    let f = codec
        .load_function("fn check(x) {\n    return above(x);\n}", "check", &[config])
        .unwrap();

    // the record rebuilds (names resolve at call time) but the sandbox call
    // cannot find `above`
    let err = codec.serialize_and_test(&f, &[]).unwrap_err();
    match err {
        CallableError::ValidationError { name, reason } => {
            assert_eq!(name, "check");
            assert!(reason.contains("above"), "{}", reason);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_validation_leaves_real_imports_untouched() {
    let codec = codec();
    let validator = SandboxValidator::new(codec.loader());
    let namespace = namespace_for_modules(&[]);

    let real = LoaderImports::new(codec.loader());
    let before = match real.import("math").unwrap() {
        Value::Module(m) => m,
        other => panic!("expected module, got {:?}", other),
    };

    assert!(validator
        .validate_in_namespace("f", "fn f() {\n    import nowhere;\n}", &namespace)
        .is_err());
    assert!(validator
        .validate_in_namespace("f", "fn f() {\n    import math;\n    return math.sqrt(4);\n}", &namespace)
        .is_ok());
    // errors raised by the body itself also fail validation
    assert!(validator
        .validate_in_namespace("f", "fn f() {\n    return 1 / 0;\n}", &namespace)
        .is_err());

    match real.import("math").unwrap() {
        Value::Module(after) => assert!(std::sync::Arc::ptr_eq(&before, &after)),
        other => panic!("expected module, got {:?}", other),
    }

    // a real interpreter still performs real imports after validation
    let globals = namespace.to_globals();
    Interpreter::new(&real)
        .exec("import math;\nlet root = math.sqrt(16);", &globals)
        .unwrap();
    assert_eq!(globals.read().get("root"), Some(&Value::Float(4.0)));
}

#[test]
fn test_sandbox_imports_hand_back_stand_ins() {
    let codec = codec();
    let hook = SandboxImports::new(codec.loader());
    assert!(hook.import("text").unwrap().is_stand_in());
    assert!(hook.import("text").unwrap().is_stand_in());
    assert!(hook.import("missing").is_err());
    assert_eq!(hook.confirmed(), vec!["text".to_string()]);
}

#[test]
fn test_direct_record_validation() {
    let codec = codec();
    let report = codec
        .validate(&SerializedCallable::direct("above", vec!["config".to_string()]))
        .unwrap();
    assert_eq!(report.arity, 1);
    assert!(report.imports_checked.is_empty());

    let err = codec
        .validate(&SerializedCallable::direct("threshold", vec!["config".to_string()]))
        .unwrap_err();
    assert!(matches!(err, CallableError::ValidationError { .. }));
}
