//! Utility functions: coalesce, ifThenElse, isNull, isNotNull, isEmpty,
//! typeOf, defaultVal, format, clamp, between.

use super::support::{arity_exact, arity_min};
use crate::error::{Error, Result};
use crate::registry::{FunctionDescriptor, Registry, Signature};
use crate::value::{Ty, Value};
use std::sync::Arc;

fn builtin_coalesce(args: &[Value]) -> Result<Value> {
    arity_min("coalesce", args, 1)?;
    for arg in args {
        if !matches!(arg, Value::Null) {
            return Ok(arg.clone());
        }
    }
    Ok(Value::Null)
}

fn builtin_if_then_else(args: &[Value]) -> Result<Value> {
    arity_exact("ifThenElse", args, 3)?;
    Ok(if args[0].is_truthy() {
        args[1].clone()
    } else {
        args[2].clone()
    })
}

fn builtin_is_null(args: &[Value]) -> Result<Value> {
    arity_exact("isNull", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Null)))
}

fn builtin_is_not_null(args: &[Value]) -> Result<Value> {
    arity_exact("isNotNull", args, 1)?;
    Ok(Value::Bool(!matches!(args[0], Value::Null)))
}

fn builtin_is_empty(args: &[Value]) -> Result<Value> {
    arity_exact("isEmpty", args, 1)?;
    let empty = match &args[0] {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        other => {
            return Err(Error::type_mismatch(
                "isEmpty",
                "Null, String, or List",
                other.type_name(),
                0,
            ))
        }
    };
    Ok(Value::Bool(empty))
}

fn builtin_type_of(args: &[Value]) -> Result<Value> {
    arity_exact("typeOf", args, 1)?;
    Ok(Value::String(args[0].type_name()))
}

fn builtin_default_val(args: &[Value]) -> Result<Value> {
    arity_exact("defaultVal", args, 2)?;
    Ok(if matches!(args[0], Value::Null) {
        args[1].clone()
    } else {
        args[0].clone()
    })
}

fn builtin_format(args: &[Value]) -> Result<Value> {
    arity_min("format", args, 1)?;
    let template = super::support::as_str("format", args, 0)?;
    let rest = &args[1..];
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut digits = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek() == Some(&'}') && !digits.is_empty() {
                chars.next();
                let idx: usize = digits.parse().unwrap();
                match rest.get(idx) {
                    Some(v) => out.push_str(&v.to_string()),
                    None => {
                        return Err(Error::argument_count(
                            "format",
                            format!("a value at placeholder index {}", idx),
                            args.len(),
                        ))
                    }
                }
                continue;
            }
            out.push('{');
            out.push_str(&digits);
        } else {
            out.push(c);
        }
    }
    Ok(Value::String(out))
}

fn builtin_clamp(args: &[Value]) -> Result<Value> {
    arity_exact("clamp", args, 3)?;
    let value = super::support::as_f64("clamp", args, 0)?;
    let lo = super::support::as_f64("clamp", args, 1)?;
    let hi = super::support::as_f64("clamp", args, 2)?;
    let clamped = value.max(lo).min(hi);
    Ok(if matches!(args[0], Value::Int(_)) && matches!(args[1], Value::Int(_)) && matches!(args[2], Value::Int(_)) {
        Value::Int(clamped as i64)
    } else {
        Value::Float(clamped)
    })
}

fn builtin_between(args: &[Value]) -> Result<Value> {
    arity_exact("between", args, 3)?;
    let value = super::support::as_f64("between", args, 0)?;
    let lo = super::support::as_f64("between", args, 1)?;
    let hi = super::support::as_f64("between", args, 2)?;
    Ok(Value::Bool(value >= lo && value <= hi))
}

pub fn register(registry: &Registry) -> Result<()> {
    registry.register(FunctionDescriptor::native(
        "coalesce",
        Signature::new(vec![Ty::Any], Ty::Any).variadic(),
        Arc::new(builtin_coalesce),
    ))?;
    registry.register(FunctionDescriptor::native(
        "ifThenElse",
        Signature::new(vec![Ty::Any, Ty::Any, Ty::Any], Ty::Any),
        Arc::new(builtin_if_then_else),
    ))?;
    registry.register(FunctionDescriptor::native(
        "isNull",
        Signature::new(vec![Ty::Any], Ty::Bool),
        Arc::new(builtin_is_null),
    ))?;
    registry.register(FunctionDescriptor::native(
        "isNotNull",
        Signature::new(vec![Ty::Any], Ty::Bool),
        Arc::new(builtin_is_not_null),
    ))?;
    registry.register(FunctionDescriptor::native(
        "isEmpty",
        Signature::new(vec![Ty::Any], Ty::Bool),
        Arc::new(builtin_is_empty),
    ))?;
    registry.register(FunctionDescriptor::native(
        "typeOf",
        Signature::new(vec![Ty::Any], Ty::String),
        Arc::new(builtin_type_of),
    ))?;
    registry.register(FunctionDescriptor::native(
        "defaultVal",
        Signature::new(vec![Ty::Any, Ty::Any], Ty::Any),
        Arc::new(builtin_default_val),
    ))?;
    registry.register(FunctionDescriptor::native(
        "format",
        Signature::new(vec![Ty::String, Ty::Any], Ty::String).variadic(),
        Arc::new(builtin_format),
    ))?;
    registry.register(FunctionDescriptor::native(
        "clamp",
        Signature::new(vec![Ty::Numeric, Ty::Numeric, Ty::Numeric], Ty::Numeric),
        Arc::new(builtin_clamp),
    ))?;
    registry.register(FunctionDescriptor::native(
        "between",
        Signature::new(vec![Ty::Numeric, Ty::Numeric, Ty::Numeric], Ty::Bool),
        Arc::new(builtin_between),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_returns_first_non_null() {
        let result = builtin_coalesce(&[Value::Null, Value::Null, Value::Int(7)]).unwrap();
        assert!(matches!(result, Value::Int(7)));
    }

    #[test]
    fn format_substitutes_positional_placeholders() {
        let result = builtin_format(&[
            Value::String("{0} of {1}".into()),
            Value::Int(1),
            Value::Int(10),
        ])
        .unwrap();
        assert_eq!(result.to_string(), "1 of 10");
    }

    #[test]
    fn format_errors_on_missing_placeholder_arg() {
        let err = builtin_format(&[Value::String("{0} {1}".into()), Value::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("format"));
    }

    #[test]
    fn clamp_preserves_int_when_all_int() {
        let result = builtin_clamp(&[Value::Int(15), Value::Int(0), Value::Int(10)]).unwrap();
        assert!(matches!(result, Value::Int(10)));
    }

    #[test]
    fn between_is_inclusive() {
        assert!(matches!(
            builtin_between(&[Value::Int(5), Value::Int(5), Value::Int(10)]).unwrap(),
            Value::Bool(true)
        ));
    }

    #[test]
    fn is_empty_handles_null_string_and_list() {
        assert!(matches!(builtin_is_empty(&[Value::Null]).unwrap(), Value::Bool(true)));
        assert!(matches!(
            builtin_is_empty(&[Value::String(String::new())]).unwrap(),
            Value::Bool(true)
        ));
        assert!(matches!(
            builtin_is_empty(&[Value::List(vec![Value::Int(1)])]).unwrap(),
            Value::Bool(false)
        ));
    }
}
