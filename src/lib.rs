pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod script;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::ModuleRegistry;
pub use config::CodecConfig;
pub use self::core::{
    CallableCodec, Classification, CodecSettings, Namespace, SandboxValidator,
    SerializableCallable, ValidationReport,
};
pub use domain::{ImportHook, ModuleLoader, PortableCallable, SerializedCallable};
pub use script::{Callable, Module, ModuleRef, Value};
pub use utils::error::{CallableError, Result};
