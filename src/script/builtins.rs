//! Builtin functions visible to every script.
//!
//! Builtins sit outside any module namespace, so the validation sandbox never
//! replaces them. A builtin handed a stand-in answers with a stand-in.

use crate::script::error::{ScriptError, ScriptResult};
use crate::script::value::{Callable, Value, MAX_SEQUENCE_LEN};
use std::collections::HashMap;
use std::sync::OnceLock;

static BUILTINS: OnceLock<HashMap<&'static str, Value>> = OnceLock::new();

pub fn lookup(name: &str) -> Option<Value> {
    BUILTINS.get_or_init(build).get(name).cloned()
}

pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = BUILTINS.get_or_init(build).keys().copied().collect();
    names.sort_unstable();
    names
}

fn build() -> HashMap<&'static str, Value> {
    let mut table = HashMap::new();
    let mut add = |name: &'static str, arity: Option<usize>, f: fn(&[Value]) -> ScriptResult<Value>| {
        table.insert(
            name,
            Value::Function(Callable::native(name, arity, move |args: &[Value]| {
                if let Some(stand_in) = args.iter().find_map(|a| match a {
                    Value::StandIn(s) => Some(s),
                    _ => None,
                }) {
                    return Ok(Value::StandIn(stand_in.derive(&format!(".{}()", name))));
                }
                f(args)
            })),
        );
    };

    add("len", Some(1), len);
    add("str", Some(1), |args| Ok(Value::str(args[0].to_string())));
    add("int", Some(1), int);
    add("float", Some(1), float);
    add("abs", Some(1), abs);
    add("min", None, |args| extremum("min", args, |a, b| a < b));
    add("max", None, |args| extremum("max", args, |a, b| a > b));
    add("range", None, range);
    add("append", Some(2), append);
    add("type_of", Some(1), |args| Ok(Value::str(args[0].type_name())));
    add("partial", None, partial);
    table
}

fn len(args: &[Value]) -> ScriptResult<Value> {
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(ScriptError::Type(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

fn int(args: &[Value]) -> ScriptResult<Value> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ScriptError::Type(format!("invalid literal for int(): '{}'", s))),
        other => Err(ScriptError::Type(format!(
            "int() argument must be a number or string, not '{}'",
            other.type_name()
        ))),
    }
}

fn float(args: &[Value]) -> ScriptResult<Value> {
    match &args[0] {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ScriptError::Type(format!("could not convert string to float: '{}'", s))),
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            ScriptError::Type(format!(
                "float() argument must be a number or string, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn abs(args: &[Value]) -> ScriptResult<Value> {
    match &args[0] {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ScriptError::Runtime("integer overflow in abs()".to_string())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(ScriptError::Type(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn extremum(name: &str, args: &[Value], better: fn(f64, f64) -> bool) -> ScriptResult<Value> {
    let items: Vec<Value> = match args {
        [Value::List(items)] => items.as_ref().clone(),
        _ => args.to_vec(),
    };
    let mut best: Option<(f64, Value)> = None;
    for item in items {
        let key = item.as_float().ok_or_else(|| {
            ScriptError::Type(format!("{}() expects numbers, got '{}'", name, item.type_name()))
        })?;
        match &best {
            Some((current, _)) if !better(key, *current) => {}
            _ => best = Some((key, item)),
        }
    }
    best.map(|(_, v)| v)
        .ok_or_else(|| ScriptError::Runtime(format!("{}() arg is an empty sequence", name)))
}

fn range(args: &[Value]) -> ScriptResult<Value> {
    let bounds: Vec<i64> = args
        .iter()
        .map(|a| {
            a.as_int().ok_or_else(|| {
                ScriptError::Type(format!("range() expects ints, got '{}'", a.type_name()))
            })
        })
        .collect::<ScriptResult<_>>()?;
    let (start, end) = match bounds.as_slice() {
        [end] => (0, *end),
        [start, end] => (*start, *end),
        _ => {
            return Err(ScriptError::Arity {
                name: "range".to_string(),
                expected: 2,
                found: args.len(),
            })
        }
    };
    let len = end.saturating_sub(start).max(0);
    if len as u64 > MAX_SEQUENCE_LEN as u64 {
        return Err(ScriptError::Runtime(format!(
            "range() of {} items exceeds the limit of {}",
            len, MAX_SEQUENCE_LEN
        )));
    }
    Ok(Value::list((start..end).map(Value::Int).collect()))
}

fn append(args: &[Value]) -> ScriptResult<Value> {
    match &args[0] {
        Value::List(items) => {
            let mut items = items.as_ref().clone();
            items.push(args[1].clone());
            Ok(Value::list(items))
        }
        other => Err(ScriptError::Type(format!(
            "append() expects a list, got '{}'",
            other.type_name()
        ))),
    }
}

fn partial(args: &[Value]) -> ScriptResult<Value> {
    match args.split_first() {
        Some((Value::Function(func), bound)) => {
            Ok(Value::Function(Callable::partial(func.clone(), bound.to_vec())))
        }
        Some((other, _)) => Err(ScriptError::NotCallable(other.type_name().to_string())),
        None => Err(ScriptError::Arity {
            name: "partial".to_string(),
            expected: 1,
            found: 0,
        }),
    }
}
