//! Native modules available to every registry built with the stdlib.

use crate::script::value::MAX_SEQUENCE_LEN;
use crate::script::{Module, ScriptError, ScriptResult, Value};

pub fn modules() -> Vec<Module> {
    vec![math(), text()]
}

fn number(fn_name: &str, value: &Value) -> ScriptResult<f64> {
    value.as_float().ok_or_else(|| {
        ScriptError::Type(format!(
            "{}() expects a number, got '{}'",
            fn_name,
            value.type_name()
        ))
    })
}

fn string<'v>(fn_name: &str, value: &'v Value) -> ScriptResult<&'v str> {
    value.as_str().ok_or_else(|| {
        ScriptError::Type(format!(
            "{}() expects a string, got '{}'",
            fn_name,
            value.type_name()
        ))
    })
}

pub fn math() -> Module {
    Module::new("math")
        .constant("pi", Value::Float(std::f64::consts::PI))
        .constant("e", Value::Float(std::f64::consts::E))
        .function("sqrt", Some(1), |args| {
            let x = number("sqrt", &args[0])?;
            if x < 0.0 {
                return Err(ScriptError::Runtime("math domain error".to_string()));
            }
            Ok(Value::Float(x.sqrt()))
        })
        .function("pow", Some(2), |args| match (&args[0], &args[1]) {
            (Value::Int(base), Value::Int(exp)) if *exp >= 0 => u32::try_from(*exp)
                .ok()
                .and_then(|exp| base.checked_pow(exp))
                .map(Value::Int)
                .ok_or_else(|| ScriptError::Runtime("integer overflow in pow()".to_string())),
            (base, exp) => Ok(Value::Float(number("pow", base)?.powf(number("pow", exp)?))),
        })
        .function("floor", Some(1), |args| {
            Ok(Value::Int(number("floor", &args[0])?.floor() as i64))
        })
        .function("ceil", Some(1), |args| {
            Ok(Value::Int(number("ceil", &args[0])?.ceil() as i64))
        })
        .function("abs", Some(1), |args| match &args[0] {
            Value::Int(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| ScriptError::Runtime("integer overflow in abs()".to_string())),
            other => Ok(Value::Float(number("abs", other)?.abs())),
        })
        .function("hypot", Some(2), |args| {
            Ok(Value::Float(
                number("hypot", &args[0])?.hypot(number("hypot", &args[1])?),
            ))
        })
}

pub fn text() -> Module {
    Module::new("text")
        .function("upper", Some(1), |args| {
            Ok(Value::str(string("upper", &args[0])?.to_uppercase()))
        })
        .function("lower", Some(1), |args| {
            Ok(Value::str(string("lower", &args[0])?.to_lowercase()))
        })
        .function("trim", Some(1), |args| {
            Ok(Value::str(string("trim", &args[0])?.trim()))
        })
        .function("split", Some(2), |args| {
            let s = string("split", &args[0])?;
            let sep = string("split", &args[1])?;
            if sep.is_empty() {
                return Err(ScriptError::Runtime("empty separator".to_string()));
            }
            Ok(Value::list(s.split(sep).map(Value::str).collect()))
        })
        .function("join", Some(2), |args| {
            let Value::List(items) = &args[0] else {
                return Err(ScriptError::Type(format!(
                    "join() expects a list, got '{}'",
                    args[0].type_name()
                )));
            };
            let sep = string("join", &args[1])?;
            let parts = items
                .iter()
                .map(|item| string("join", item))
                .collect::<ScriptResult<Vec<_>>>()?;
            Ok(Value::str(parts.join(sep)))
        })
        .function("contains", Some(2), |args| {
            let s = string("contains", &args[0])?;
            Ok(Value::Bool(s.contains(string("contains", &args[1])?)))
        })
        .function("replace", Some(3), |args| {
            let s = string("replace", &args[0])?;
            let from = string("replace", &args[1])?;
            let to = string("replace", &args[2])?;
            Ok(Value::str(s.replace(from, to)))
        })
        .function("repeat", Some(2), |args| {
            let s = string("repeat", &args[0])?;
            match args[1].as_int() {
                Some(n) if n >= 0 => {
                    let len = (s.len() as u64).saturating_mul(n as u64);
                    if len > MAX_SEQUENCE_LEN as u64 {
                        return Err(ScriptError::Runtime(format!(
                            "repeat() result of {} bytes exceeds the limit of {}",
                            len, MAX_SEQUENCE_LEN
                        )));
                    }
                    Ok(Value::str(s.repeat(n as usize)))
                }
                _ => Err(ScriptError::Type(
                    "repeat() expects a non-negative int count".to_string(),
                )),
            }
        })
}
