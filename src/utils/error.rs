use crate::script::ScriptError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallableError {
    #[error("Module '{module}' could not be loaded: {reason}")]
    ResolutionError { module: String, reason: String },

    #[error("Source for '{name}' is unavailable: {reason}")]
    SourceUnavailableError { name: String, reason: String },

    #[error("Callable '{name}' cannot be serialized: {reason}")]
    UnsupportedCallableError { name: String, reason: String },

    #[error("Executing source for '{name}' failed: {message}")]
    ExecutionError { name: String, message: String },

    #[error("Name '{name}' is not bound in modules [{}]", .modules.join(", "))]
    NameResolutionError { name: String, modules: Vec<String> },

    #[error("Validation of '{name}' failed: {reason}")]
    ValidationError { name: String, reason: String },

    #[error("Script error: {0}")]
    ScriptError(#[from] ScriptError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Environment,
    Callable,
    Record,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CallableError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CallableError::ResolutionError { .. } | CallableError::NameResolutionError { .. } => {
                ErrorCategory::Environment
            }
            CallableError::SourceUnavailableError { .. }
            | CallableError::UnsupportedCallableError { .. }
            | CallableError::ScriptError(_) => ErrorCategory::Callable,
            CallableError::ExecutionError { .. } | CallableError::ValidationError { .. } => {
                ErrorCategory::Record
            }
            CallableError::InvalidConfigValueError { .. } | CallableError::TomlError(_) => {
                ErrorCategory::Configuration
            }
            CallableError::IoError(_) | CallableError::SerializationError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::Environment | ErrorCategory::Callable | ErrorCategory::Record => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CallableError::ResolutionError { .. } => {
                "Check the module id and the configured search paths"
            }
            CallableError::NameResolutionError { .. } => {
                "The declared modules changed since the record was written; re-serialize the callable"
            }
            CallableError::SourceUnavailableError { .. } => {
                "Define the callable in a script so its source can be extracted"
            }
            CallableError::UnsupportedCallableError { .. } => {
                "Rewrite the partial application as a named fn definition"
            }
            CallableError::ExecutionError { .. } => {
                "The record's source is corrupt or incompatible with the declared modules"
            }
            CallableError::ValidationError { .. } => {
                "Declare every module the callable uses and fix misspelled imports"
            }
            CallableError::ScriptError(_) => "Fix the script and try again",
            CallableError::IoError(_) => "Check file paths and permissions",
            CallableError::SerializationError(_) => "Check that the record is valid JSON",
            CallableError::TomlError(_) => "Check the TOML syntax of the configuration file",
            CallableError::InvalidConfigValueError { .. } => "Fix the configuration file",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Environment => format!("Environment mismatch: {}", self),
            ErrorCategory::Callable => format!("Unsupported callable: {}", self),
            ErrorCategory::Record => format!("Invalid record: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CallableError>;
