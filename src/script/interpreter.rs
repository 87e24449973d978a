//! Tree-walking evaluator for fnscript.
//!
//! Imports go through the [`ImportHook`] the interpreter was built with; there
//! is no global import state to patch or restore.

use crate::domain::ports::ImportHook;
use crate::script::ast::{BinaryOp, Expr, FnDecl, Literal, Program, Stmt, UnaryOp};
use crate::script::builtins;
use crate::script::error::{ScriptError, ScriptResult};
use crate::script::parser;
use crate::script::value::{Callable, Globals, ScriptFunction, SourceOrigin, StandIn, Value};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

/// Script function frames allowed on the stack at once.
pub const MAX_CALL_DEPTH: usize = 40;

/// Evaluator recursion allowed at once, counting statements, expressions and
/// calls together. Keeps native stack use bounded for any program.
pub const MAX_NESTING: usize = 256;

enum Flow {
    Next,
    Return(Value),
}

/// Releases one level of evaluator nesting on drop.
struct Nested<'a>(&'a Cell<usize>);

impl Drop for Nested<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

struct Frame<'a> {
    /// `None` while running top-level statements: bindings go to globals.
    locals: Option<HashMap<String, Value>>,
    globals: &'a Globals,
    text: Option<&'a Arc<str>>,
}

impl Frame<'_> {
    fn bind(&mut self, name: &str, value: Value) {
        match &mut self.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => {
                self.globals.write().insert(name.to_string(), value);
            }
        }
    }

    fn lookup(&self, name: &str) -> ScriptResult<Value> {
        if let Some(value) = self.locals.as_ref().and_then(|l| l.get(name)) {
            return Ok(value.clone());
        }
        let global = self.globals.read().get(name).cloned();
        global
            .or_else(|| builtins::lookup(name))
            .ok_or_else(|| ScriptError::UndefinedName(name.to_string()))
    }
}

pub struct Interpreter<'h> {
    imports: &'h dyn ImportHook,
    step_limit: Option<u64>,
    steps: Cell<u64>,
    depth: Cell<usize>,
    nesting: Cell<usize>,
}

impl<'h> Interpreter<'h> {
    pub fn new(imports: &'h dyn ImportHook) -> Self {
        Self {
            imports,
            step_limit: None,
            steps: Cell::new(0),
            depth: Cell::new(0),
            nesting: Cell::new(0),
        }
    }

    pub fn with_step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// Parse `source` and run its top-level statements against `globals`.
    ///
    /// Functions defined by the program remember `source` as their origin.
    pub fn exec(&self, source: &str, globals: &Globals) -> ScriptResult<()> {
        let program = parser::parse(source)?;
        let text: Arc<str> = Arc::from(source);
        self.exec_program(&program, &text, globals)
    }

    pub fn exec_program(
        &self,
        program: &Program,
        text: &Arc<str>,
        globals: &Globals,
    ) -> ScriptResult<()> {
        let mut frame = Frame {
            locals: None,
            globals,
            text: Some(text),
        };
        match self.exec_block(&program.statements, &mut frame)? {
            Flow::Next => Ok(()),
            Flow::Return(_) => Err(ScriptError::Runtime(
                "'return' outside of a fn".to_string(),
            )),
        }
    }

    pub fn call(&self, callable: &Callable, args: Vec<Value>) -> ScriptResult<Value> {
        let _nested = self.nest()?;
        match callable {
            Callable::Native(f) => {
                if let Some(expected) = f.arity {
                    check_arity(&f.name, expected, args.len())?;
                }
                (f.func)(&args)
            }
            Callable::Script(f) => {
                check_arity(&f.name, f.params.len(), args.len())?;
                let depth = self.depth.get();
                if depth >= MAX_CALL_DEPTH {
                    return Err(ScriptError::Runtime(format!(
                        "maximum call depth of {} exceeded in {}()",
                        MAX_CALL_DEPTH, f.name
                    )));
                }
                let globals = f.scope()?;
                let locals: HashMap<String, Value> =
                    f.params.iter().cloned().zip(args).collect();
                let mut frame = Frame {
                    locals: Some(locals),
                    globals: &globals,
                    text: f.origin.as_ref().map(|o| &o.text),
                };
                self.depth.set(depth + 1);
                let flow = self.exec_block(&f.body, &mut frame);
                self.depth.set(depth);
                match flow? {
                    Flow::Return(value) => Ok(value),
                    Flow::Next => Ok(Value::Nil),
                }
            }
            Callable::Partial(p) => {
                let mut full = p.args.clone();
                full.extend(args);
                self.call(&p.func, full)
            }
        }
    }

    pub fn call_value(&self, callee: &Value, args: Vec<Value>) -> ScriptResult<Value> {
        match callee {
            Value::Function(callable) => self.call(callable, args),
            Value::StandIn(s) => Ok(Value::StandIn(s.derive("()"))),
            other => Err(ScriptError::NotCallable(other.type_name().to_string())),
        }
    }

    fn nest(&self) -> ScriptResult<Nested<'_>> {
        let level = self.nesting.get();
        if level >= MAX_NESTING {
            return Err(ScriptError::Runtime(format!(
                "evaluation nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.nesting.set(level + 1);
        Ok(Nested(&self.nesting))
    }

    fn tick(&self) -> ScriptResult<()> {
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        match self.step_limit {
            Some(limit) if steps > limit => Err(ScriptError::StepLimit(limit)),
            _ => Ok(()),
        }
    }

    fn exec_block(&self, statements: &[Stmt], frame: &mut Frame<'_>) -> ScriptResult<Flow> {
        for stmt in statements {
            self.tick()?;
            if let Flow::Return(value) = self.exec_stmt(stmt, frame)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&self, stmt: &Stmt, frame: &mut Frame<'_>) -> ScriptResult<Flow> {
        let _nested = self.nest()?;
        match stmt {
            Stmt::Let { name, value } | Stmt::Assign { name, value } => {
                let value = self.eval(value, frame)?;
                frame.bind(name, value);
            }
            Stmt::Fn(decl) => {
                let function = self.make_function(decl, frame);
                frame.bind(&decl.name, Value::Function(function));
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, frame)?.is_truthy() {
                    return self.exec_block(then_branch, frame);
                } else if let Some(else_branch) = else_branch {
                    return self.exec_block(else_branch, frame);
                }
            }
            Stmt::While { condition, body } => loop {
                self.tick()?;
                if !self.eval(condition, frame)?.is_truthy() {
                    break;
                }
                if let Flow::Return(value) = self.exec_block(body, frame)? {
                    return Ok(Flow::Return(value));
                }
            },
            Stmt::For {
                binding,
                iterable,
                body,
            } => {
                let items = self.iterate(&self.eval(iterable, frame)?)?;
                for item in items {
                    frame.bind(binding, item);
                    if let Flow::Return(value) = self.exec_block(body, frame)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Import { module, binding } => {
                tracing::trace!("import {} as {}", module, binding);
                let value = self.imports.import(module)?;
                frame.bind(binding, value);
            }
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
            }
        }
        Ok(Flow::Next)
    }

    fn make_function(&self, decl: &Arc<FnDecl>, frame: &Frame<'_>) -> Callable {
        Callable::Script(Arc::new(ScriptFunction {
            name: decl.name.clone(),
            params: decl.params.clone(),
            body: decl.body.clone(),
            globals: Arc::downgrade(frame.globals),
            origin: frame.text.map(|text| SourceOrigin {
                text: text.clone(),
                span: decl.span.clone(),
            }),
        }))
    }

    fn iterate(&self, value: &Value) -> ScriptResult<Vec<Value>> {
        match value {
            Value::List(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
            // stand-ins iterate as empty
            Value::StandIn(_) => Ok(Vec::new()),
            other => Err(ScriptError::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    fn eval(&self, expr: &Expr, frame: &mut Frame<'_>) -> ScriptResult<Value> {
        let _nested = self.nest()?;
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Nil => Value::Nil,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::str(s.as_str()),
            }),
            Expr::Name(name) => frame.lookup(name),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item, frame))
                    .collect::<ScriptResult<Vec<_>>>()?;
                Ok(Value::list(values))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, frame)?;
                unary(*op, value)
            }
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                let left = self.eval(lhs, frame)?;
                if left.is_truthy() {
                    self.eval(rhs, frame)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => {
                let left = self.eval(lhs, frame)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(rhs, frame)
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs, frame)?;
                let right = self.eval(rhs, frame)?;
                binary(*op, left, right)
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee, frame)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, frame))
                    .collect::<ScriptResult<Vec<_>>>()?;
                self.call_value(&callee, args)
            }
            Expr::Attribute { target, name } => {
                let target = self.eval(target, frame)?;
                attribute(&target, name)
            }
            Expr::Index { target, index } => {
                let target = self.eval(target, frame)?;
                let index = self.eval(index, frame)?;
                subscript(&target, &index)
            }
        }
    }
}

fn check_arity(name: &str, expected: usize, found: usize) -> ScriptResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(ScriptError::Arity {
            name: name.to_string(),
            expected,
            found,
        })
    }
}

fn attribute(target: &Value, name: &str) -> ScriptResult<Value> {
    match target {
        Value::Module(module) => module.get(name).cloned().ok_or_else(|| ScriptError::Attribute {
            target: format!("module {}", module.name()),
            attribute: name.to_string(),
        }),
        Value::StandIn(s) => Ok(Value::StandIn(s.derive(&format!(".{}", name)))),
        other => Err(ScriptError::Attribute {
            target: other.type_name().to_string(),
            attribute: name.to_string(),
        }),
    }
}

fn subscript(target: &Value, index: &Value) -> ScriptResult<Value> {
    if let Some(stand_in) = first_stand_in(target, index) {
        return Ok(Value::StandIn(stand_in.derive("[]")));
    }
    let position = |len: usize| -> ScriptResult<usize> {
        let i = index.as_int().ok_or_else(|| {
            ScriptError::Type(format!("indices must be integers, not '{}'", index.type_name()))
        })?;
        let resolved = if i < 0 { len as i64 + i } else { i };
        if resolved < 0 || resolved >= len as i64 {
            Err(ScriptError::Runtime(format!("index {} out of range", i)))
        } else {
            Ok(resolved as usize)
        }
    };
    match target {
        Value::List(items) => Ok(items[position(items.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::str(chars[position(chars.len())?].to_string()))
        }
        other => Err(ScriptError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn first_stand_in<'v>(a: &'v Value, b: &'v Value) -> Option<&'v StandIn> {
    match (a, b) {
        (Value::StandIn(s), _) | (_, Value::StandIn(s)) => Some(s),
        _ => None,
    }
}

fn unary(op: UnaryOp, value: Value) -> ScriptResult<Value> {
    match (op, value) {
        (_, Value::StandIn(s)) => Ok(Value::StandIn(s.derive(match op {
            UnaryOp::Neg => ".neg()",
            UnaryOp::Not => ".not()",
        }))),
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ScriptError::Runtime("integer overflow".to_string())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, other) => Err(ScriptError::Type(format!(
            "bad operand type for unary -: '{}'",
            other.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> ScriptResult<Value> {
    if let Some(stand_in) = first_stand_in(&left, &right) {
        return Ok(Value::StandIn(stand_in.derive(&format!(".{:?}()", op).to_lowercase())));
    }

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            return compare(op, &left, &right)
        }
        _ => {}
    }

    let type_error = |left: &Value, right: &Value| {
        ScriptError::Type(format!(
            "unsupported operand types for {:?}: '{}' and '{}'",
            op,
            left.type_name(),
            right.type_name()
        ))
    };
    let overflow = || ScriptError::Runtime("integer overflow".to_string());

    match (op, &left, &right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::list(items))
        }
        (_, Value::Int(a), Value::Int(b)) => match op {
            BinaryOp::Add => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div if *b == 0 => Err(ScriptError::DivisionByZero),
            BinaryOp::Div => Ok(Value::Float(*a as f64 / *b as f64)),
            BinaryOp::Rem if *b == 0 => Err(ScriptError::DivisionByZero),
            BinaryOp::Rem => a.checked_rem_euclid(*b).map(Value::Int).ok_or_else(overflow),
            _ => Err(type_error(&left, &right)),
        },
        (_, a, b) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => match op {
                BinaryOp::Add => Ok(Value::Float(x + y)),
                BinaryOp::Sub => Ok(Value::Float(x - y)),
                BinaryOp::Mul => Ok(Value::Float(x * y)),
                BinaryOp::Div | BinaryOp::Rem if y == 0.0 => Err(ScriptError::DivisionByZero),
                BinaryOp::Div => Ok(Value::Float(x / y)),
                BinaryOp::Rem => Ok(Value::Float(x.rem_euclid(y))),
                _ => Err(type_error(&left, &right)),
            },
            _ => Err(type_error(&left, &right)),
        },
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => {
                return Err(ScriptError::Type(format!(
                    "'{:?}' not supported between '{}' and '{}'",
                    op,
                    left.type_name(),
                    right.type_name()
                )))
            }
        },
    };
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::GtEq => ordering.is_ge(),
        _ => false,
    };
    Ok(Value::Bool(result))
}
