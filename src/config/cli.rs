use crate::config::toml_config::CodecConfig;
use crate::core::codec::CallableCodec;
use crate::core::namespace::namespace_for_modules;
use crate::domain::model::{PortableCallable, SerializedCallable};
use crate::domain::ports::ModuleLoader;
use crate::script::{ModuleRef, Value};
use crate::utils::error::{CallableError, Result};
use crate::utils::validation::validate_module_ids;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "serializable-callable")]
#[command(about = "Persist fnscript callables as portable records and rebuild them")]
pub struct CliConfig {
    #[arg(long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serialize a function into a JSON record
    Serialize {
        /// Script defining the function; omit to reference a module member directly
        #[arg(long)]
        script: Option<PathBuf>,

        #[arg(long)]
        function: String,

        #[arg(long, value_delimiter = ',')]
        modules: Vec<String>,

        /// Write the record here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rebuild a callable from a record, optionally calling it
    Deserialize {
        #[arg(long)]
        record: PathBuf,

        #[arg(long, num_args = 0.., allow_hyphen_values = true)]
        call: Option<Vec<String>>,
    },
    /// Run the sandbox validation on a record
    Validate {
        #[arg(long)]
        record: PathBuf,
    },
}

impl CliConfig {
    /// Load the TOML file named by `--config`, or defaults without one.
    /// Command line flags win over the file.
    pub fn load_codec_config(&self) -> Result<CodecConfig> {
        let mut config = match &self.config {
            Some(path) => CodecConfig::from_file(path)?,
            None => CodecConfig::default(),
        };
        if self.verbose {
            config.logging.verbose = Some(true);
        }
        if self.json_logs {
            config.logging.format = Some("json".to_string());
        }
        Ok(config)
    }
}

/// Run one subcommand and return what should be printed.
pub fn execute(command: &Command, config: &CodecConfig) -> Result<String> {
    let codec = CallableCodec::with_settings(config.build_registry(), config.codec_settings());
    match command {
        Command::Serialize {
            script,
            function,
            modules,
            output,
        } => {
            let record = serialize(&codec, script.as_deref(), function, modules)?;
            let json = serde_json::to_string_pretty(&record)?;
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(path, &json)?;
                    tracing::info!("📁 Record saved to: {}", path.display());
                    Ok(format!("✅ Serialized '{}' to {}", record.name, path.display()))
                }
                None => Ok(json),
            }
        }
        Command::Deserialize { record, call } => {
            let record = read_record(record)?;
            let callable = codec.deserialize(&record)?;
            match call {
                Some(raw_args) => {
                    let args = raw_args.iter().map(|a| parse_arg(a)).collect();
                    let result = codec.call(&callable, args)?;
                    Ok(result.to_string())
                }
                None => Ok(format!(
                    "✅ Rebuilt '{}' ({} parameter(s))",
                    callable.name(),
                    callable.arity().unwrap_or(0)
                )),
            }
        }
        Command::Validate { record } => {
            let record = read_record(record)?;
            let report = codec.validate(&record)?;
            let imports = if report.imports_checked.is_empty() {
                "none".to_string()
            } else {
                report.imports_checked.join(", ")
            };
            Ok(format!(
                "✅ '{}' passed validation (arity {}, imports: {})",
                report.name, report.arity, imports
            ))
        }
    }
}

fn serialize<L: ModuleLoader>(
    codec: &CallableCodec<L>,
    script: Option<&Path>,
    function: &str,
    module_ids: &[String],
) -> Result<SerializedCallable> {
    validate_module_ids("--modules", module_ids)?;
    let modules = module_ids
        .iter()
        .map(|id| codec.loader().load(id))
        .collect::<Result<Vec<ModuleRef>>>()?;

    let callable = match script {
        Some(path) => {
            let source = fs::read_to_string(path)?;
            codec.load_function(&source, function, &modules)?
        }
        None => {
            let namespace = namespace_for_modules(&modules);
            let callable = namespace
                .get(function)
                .and_then(Value::as_callable)
                .cloned()
                .ok_or_else(|| CallableError::NameResolutionError {
                    name: function.to_string(),
                    modules: module_ids.to_vec(),
                })?;
            PortableCallable::new(callable)
        }
    };
    codec.serialize_and_test(&callable, &modules)
}

fn read_record(path: &Path) -> Result<SerializedCallable> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Interpret a command line argument as a script literal. Anything that is
/// not a number, bool or nil is passed as a string.
pub fn parse_arg(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "nil" => return Value::Nil,
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    Value::str(unquoted)
}
