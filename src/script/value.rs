//! Runtime values of the embedded script engine.
//!
//! Callables compare and hash by identity: two handles are equal only when they
//! point at the same function object, which is what lets a namespace be
//! inverted into a callable -> name index.

use crate::script::ast::Stmt;
use crate::script::error::{ScriptError, ScriptResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::{Arc, Weak};

/// Mutable name -> value map a script executes against.
pub type Globals = Arc<RwLock<HashMap<String, Value>>>;

/// Non-owning handle a script function keeps on the globals it was defined in.
///
/// The globals usually hold the function itself, so an owning handle would
/// keep both alive forever.
pub type WeakGlobals = Weak<RwLock<HashMap<String, Value>>>;

pub type ModuleRef = Arc<Module>;

/// Longest list or string a builtin will materialize in one call.
pub const MAX_SEQUENCE_LEN: usize = 1 << 20;

pub type NativeFn = dyn Fn(&[Value]) -> ScriptResult<Value> + Send + Sync;

pub fn new_globals(entries: HashMap<String, Value>) -> Globals {
    Arc::new(RwLock::new(entries))
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Function(Callable),
    Module(ModuleRef),
    StandIn(StandIn),
}

impl Value {
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn stand_in(label: impl Into<Arc<str>>) -> Self {
        Value::StandIn(StandIn::new(label))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Function(_) => "fn",
            Value::Module(_) => "module",
            Value::StandIn(_) => "stand-in",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Function(_) | Value::Module(_) | Value::StandIn(_) => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::StandIn(_))
    }

    /// Lists are the only values without a stable identity or hash.
    pub fn is_hashable(&self) -> bool {
        !matches!(self, Value::List(_))
    }

    pub fn is_stand_in(&self) -> bool {
        matches!(self, Value::StandIn(_))
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Function(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Function(callable)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            (Value::StandIn(a), Value::StandIn(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
            Value::Function(c) => write!(f, "<fn {}>", c.name()),
            Value::Module(m) => write!(f, "<module {}>", m.name()),
            Value::StandIn(s) => write!(f, "<stand-in {}>", s.label()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Inert object used by the validation sandbox.
///
/// Every attribute access, call, index or operator applied to a stand-in yields
/// another stand-in whose label records how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StandIn {
    label: Arc<str>,
}

impl StandIn {
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn derive(&self, suffix: &str) -> StandIn {
        StandIn::new(format!("{}{}", self.label, suffix))
    }
}

/// Where a script function was defined: the full program text and the byte
/// span of the `fn ... { ... }` definition inside it.
#[derive(Clone)]
pub struct SourceOrigin {
    pub text: Arc<str>,
    pub span: Range<usize>,
}

impl SourceOrigin {
    pub fn definition(&self) -> &str {
        &self.text[self.span.clone()]
    }
}

impl fmt::Debug for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOrigin")
            .field("span", &self.span)
            .finish()
    }
}

pub struct NativeFunction {
    pub name: String,
    pub arity: Option<usize>,
    pub func: Box<NativeFn>,
}

pub struct ScriptFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Arc<[Stmt]>,
    pub globals: WeakGlobals,
    pub origin: Option<SourceOrigin>,
}

impl ScriptFunction {
    /// The defining globals, if whoever owned them still does.
    pub fn scope(&self) -> ScriptResult<Globals> {
        self.globals.upgrade().ok_or_else(|| {
            ScriptError::Runtime(format!(
                "the namespace {}() was defined in has been dropped",
                self.name
            ))
        })
    }
}

pub struct PartialApplication {
    pub func: Callable,
    pub args: Vec<Value>,
}

#[derive(Clone)]
pub enum Callable {
    Native(Arc<NativeFunction>),
    Script(Arc<ScriptFunction>),
    Partial(Arc<PartialApplication>),
}

impl Callable {
    pub fn native<F>(name: impl Into<String>, arity: Option<usize>, func: F) -> Self
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        Callable::Native(Arc::new(NativeFunction {
            name: name.into(),
            arity,
            func: Box::new(func),
        }))
    }

    /// Bind leading arguments. Partials of partials collapse into one layer.
    pub fn partial(func: Callable, args: Vec<Value>) -> Self {
        match func {
            Callable::Partial(inner) => {
                let mut bound = inner.args.clone();
                bound.extend(args);
                Callable::Partial(Arc::new(PartialApplication {
                    func: inner.func.clone(),
                    args: bound,
                }))
            }
            func => Callable::Partial(Arc::new(PartialApplication { func, args })),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Callable::Native(f) => f.name.clone(),
            Callable::Script(f) => f.name.clone(),
            Callable::Partial(p) => format!("partial({})", p.func.name()),
        }
    }

    /// Declared positional parameter count, `None` for variadic natives.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Callable::Native(f) => f.arity,
            Callable::Script(f) => Some(f.params.len()),
            Callable::Partial(p) => p
                .func
                .arity()
                .map(|n| n.saturating_sub(p.args.len())),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Callable::Partial(_))
    }

    pub fn origin(&self) -> Option<&SourceOrigin> {
        match self {
            Callable::Script(f) => f.origin.as_ref(),
            _ => None,
        }
    }

    /// Owning handle on the globals a script function (or the function under
    /// a partial) resolves names in. `None` for natives and dropped scopes.
    pub fn scope(&self) -> Option<Globals> {
        match self {
            Callable::Native(_) => None,
            Callable::Script(f) => f.globals.upgrade(),
            Callable::Partial(p) => p.func.scope(),
        }
    }

    fn identity(&self) -> (u8, usize) {
        match self {
            Callable::Native(f) => (0, Arc::as_ptr(f) as *const () as usize),
            Callable::Script(f) => (1, Arc::as_ptr(f) as *const () as usize),
            Callable::Partial(p) => (2, Arc::as_ptr(p) as *const () as usize),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Callable {}

impl Hash for Callable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(n) => write!(f, "<native fn {}>", n.name),
            Callable::Script(s) => write!(f, "<fn {}({})>", s.name, s.params.join(", ")),
            Callable::Partial(p) => write!(f, "<partial {:?} +{}>", p.func, p.args.len()),
        }
    }
}

/// A loaded unit of code: a canonical id plus its named members.
///
/// Members are kept sorted by name. A module built from a script owns the
/// globals its functions were defined in.
pub struct Module {
    name: String,
    members: BTreeMap<String, Value>,
    scope: Option<Globals>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut members = BTreeMap::new();
        members.insert("__name__".to_string(), Value::str(name.as_str()));
        Self {
            name,
            members,
            scope: None,
        }
    }

    /// Snapshot the globals left behind by executing a module script.
    pub fn from_globals(name: impl Into<String>, globals: &Globals) -> Self {
        let mut module = Module::new(name);
        for (key, value) in globals.read().iter() {
            module.members.insert(key.clone(), value.clone());
        }
        module.scope = Some(globals.clone());
        module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.members.insert(name.into(), value);
    }

    pub fn constant(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn function<F>(mut self, name: &str, arity: Option<usize>, func: F) -> Self
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        self.insert(name, Value::Function(Callable::native(name, arity, func)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn members(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}
