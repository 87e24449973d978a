use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("Syntax error at {line}:{column}: {message}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
    },

    #[error("Name '{0}' is not defined")]
    UndefinedName(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("{name}() takes {expected} argument(s) but {found} were given")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'{0}' is not callable")]
    NotCallable(String),

    #[error("'{target}' has no attribute '{attribute}'")]
    Attribute { target: String, attribute: String },

    #[error("Import of '{module}' failed: {reason}")]
    Import { module: String, reason: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Step limit of {0} exceeded")]
    StepLimit(u64),

    #[error("{0}")]
    Runtime(String),
}

pub type ScriptResult<T> = std::result::Result<T, ScriptError>;
