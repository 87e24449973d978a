#![cfg(feature = "cli")]

use serializable_callable::config::cli::execute;
use serializable_callable::{CallableError, CodecConfig, Command, SerializedCallable};
use std::fs;
use tempfile::TempDir;

fn config_with_scripts(dir: &TempDir) -> CodecConfig {
    let toml = format!(
        "[loader]\nsearch_paths = [{:?}]\n\n[codec]\nmax_steps = 10000\n",
        dir.path().join("lib").display().to_string()
    );
    CodecConfig::from_toml_str(&toml).unwrap()
}

#[test]
fn test_serialize_deserialize_and_call() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(
        dir.path().join("lib").join("pricing.fns"),
        "let tax_rate = 0.5;\nfn with_tax(amount) {\n    return amount + amount * tax_rate;\n}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("discount.fns"),
        "fn discounted(amount) {\n    return with_tax(amount) - 1;\n}\n",
    )
    .unwrap();
    let config = config_with_scripts(&dir);
    let record_path = dir.path().join("out").join("discounted.json");

    let message = execute(
        &Command::Serialize {
            script: Some(dir.path().join("discount.fns")),
            function: "discounted".to_string(),
            modules: vec!["pricing".to_string()],
            output: Some(record_path.clone()),
        },
        &config,
    )
    .unwrap();
    assert!(message.contains("discounted"));

    let record: SerializedCallable =
        serde_json::from_str(&fs::read_to_string(&record_path).unwrap()).unwrap();
    assert_eq!(record.modules, vec!["pricing".to_string()]);
    assert!(record.source.is_some());

    let output = execute(
        &Command::Deserialize {
            record: record_path.clone(),
            call: Some(vec!["10".to_string()]),
        },
        &config,
    )
    .unwrap();
    assert_eq!(output, "14.0");

    let output = execute(&Command::Validate { record: record_path }, &config).unwrap();
    assert!(output.contains("passed validation"));
}

#[test]
fn test_serialize_direct_member_to_stdout() {
    let dir = TempDir::new().unwrap();
    let config = config_with_scripts(&dir);

    let json = execute(
        &Command::Serialize {
            script: None,
            function: "upper".to_string(),
            modules: vec!["text".to_string()],
            output: None,
        },
        &config,
    )
    .unwrap();
    let record: SerializedCallable = serde_json::from_str(&json).unwrap();
    assert_eq!(
        record,
        SerializedCallable::direct("upper", vec!["text".to_string()])
    );
}

#[test]
fn test_unknown_module_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = config_with_scripts(&dir);

    let err = execute(
        &Command::Serialize {
            script: None,
            function: "anything".to_string(),
            modules: vec!["nowhere".to_string()],
            output: None,
        },
        &config,
    )
    .unwrap_err();
    assert!(matches!(err, CallableError::ResolutionError { .. }));
}
