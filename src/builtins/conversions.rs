//! Type-coercion functions: int, float, string, bool. Each accepts `Ty::Any`
//! so every runtime value can reach them, and decides behavior on the
//! actual `Value` variant per spec §4.6's coercion table.

use super::support::arity_exact;
use crate::error::{Error, Result};
use crate::registry::{FunctionDescriptor, Registry, Signature};
use crate::value::{Ty, Value};
use std::sync::Arc;

fn builtin_int(args: &[Value]) -> Result<Value> {
    arity_exact("int", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => Ok(Value::Int(*n as i64)),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| s.trim().parse::<f64>().map(|f| Value::Int(f as i64)))
            .map_err(|_| Error::type_mismatch("int", "a numeric String", format!("\"{}\"", s), 0)),
        other => Err(Error::type_mismatch("int", "Int, Float, Bool, or String", other.type_name(), 0)),
    }
}

fn builtin_float(args: &[Value]) -> Result<Value> {
    arity_exact("float", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(n) => Ok(Value::Float(*n)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::type_mismatch("float", "a numeric String", format!("\"{}\"", s), 0)),
        other => Err(Error::type_mismatch("float", "Int, Float, Bool, or String", other.type_name(), 0)),
    }
}

fn builtin_string(args: &[Value]) -> Result<Value> {
    arity_exact("string", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::String(s.clone())),
        other => Ok(Value::String(other.to_string())),
    }
}

fn builtin_bool(args: &[Value]) -> Result<Value> {
    arity_exact("bool", args, 1)?;
    Ok(Value::Bool(args[0].is_truthy()))
}

pub fn register(registry: &Registry) -> Result<()> {
    registry.register(FunctionDescriptor::native(
        "int",
        Signature::new(vec![Ty::Any], Ty::Int),
        Arc::new(builtin_int),
    ))?;
    registry.register(FunctionDescriptor::native(
        "float",
        Signature::new(vec![Ty::Any], Ty::Float),
        Arc::new(builtin_float),
    ))?;
    registry.register(FunctionDescriptor::native(
        "string",
        Signature::new(vec![Ty::Any], Ty::String),
        Arc::new(builtin_string),
    ))?;
    registry.register(FunctionDescriptor::native(
        "bool",
        Signature::new(vec![Ty::Any], Ty::Bool),
        Arc::new(builtin_bool),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_parses_numeric_strings() {
        assert!(matches!(builtin_int(&[Value::String("42".into())]).unwrap(), Value::Int(42)));
        assert!(matches!(builtin_int(&[Value::String("3.9".into())]).unwrap(), Value::Int(3)));
    }

    #[test]
    fn int_rejects_non_numeric_string() {
        assert!(builtin_int(&[Value::String("abc".into())]).is_err());
    }

    #[test]
    fn bool_uses_truthiness() {
        assert!(matches!(builtin_bool(&[Value::Int(0)]).unwrap(), Value::Bool(false)));
        assert!(matches!(builtin_bool(&[Value::String("x".into())]).unwrap(), Value::Bool(true)));
    }

    #[test]
    fn string_of_list_uses_display() {
        let result = builtin_string(&[Value::List(vec![Value::Int(1), Value::Int(2)])]).unwrap();
        assert_eq!(result.to_string(), "[1, 2]");
    }
}
