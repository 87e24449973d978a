//! fnscript: the small embedded language callables are written in.

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::{ScriptError, ScriptResult};
pub use interpreter::Interpreter;
pub use parser::parse;
pub use value::{
    new_globals, Callable, Globals, Module, ModuleRef, SourceOrigin, StandIn, Value,
};
