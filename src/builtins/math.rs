//! Math functions: abs, ceil, floor, round, pow, sqrt, mod.

use super::support::{arity_exact, as_f64, as_i64};
use crate::error::{Error, ErrorKind, Result};
use crate::registry::{FunctionDescriptor, Registry, Signature};
use crate::value::{Ty, Value};
use std::sync::Arc;

fn builtin_abs(args: &[Value]) -> Result<Value> {
    arity_exact("abs", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.abs())),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(Error::type_mismatch("abs", "Numeric", other.type_name(), 0)),
    }
}

fn builtin_ceil(args: &[Value]) -> Result<Value> {
    arity_exact("ceil", args, 1)?;
    Ok(Value::Int(as_f64("ceil", args, 0)?.ceil() as i64))
}

fn builtin_floor(args: &[Value]) -> Result<Value> {
    arity_exact("floor", args, 1)?;
    Ok(Value::Int(as_f64("floor", args, 0)?.floor() as i64))
}

fn builtin_round(args: &[Value]) -> Result<Value> {
    arity_exact("round", args, 1)?;
    Ok(Value::Int(as_f64("round", args, 0)?.round() as i64))
}

fn builtin_pow(args: &[Value]) -> Result<Value> {
    arity_exact("pow", args, 2)?;
    let base = as_f64("pow", args, 0)?;
    let exp = as_f64("pow", args, 1)?;
    Ok(Value::Float(base.powf(exp)))
}

fn builtin_sqrt(args: &[Value]) -> Result<Value> {
    arity_exact("sqrt", args, 1)?;
    Ok(Value::Float(as_f64("sqrt", args, 0)?.sqrt()))
}

fn builtin_mod(args: &[Value]) -> Result<Value> {
    arity_exact("mod", args, 2)?;
    let a = as_i64("mod", args, 0)?;
    let b = as_i64("mod", args, 1)?;
    if b == 0 {
        return Err(Error::new(ErrorKind::DivisionByZero));
    }
    Ok(Value::Int(a % b))
}

pub fn register(registry: &Registry) -> Result<()> {
    registry.register(FunctionDescriptor::native(
        "abs",
        Signature::new(vec![Ty::Numeric], Ty::Numeric),
        Arc::new(builtin_abs),
    ))?;
    registry.register(FunctionDescriptor::native(
        "ceil",
        Signature::new(vec![Ty::Numeric], Ty::Int),
        Arc::new(builtin_ceil),
    ))?;
    registry.register(FunctionDescriptor::native(
        "floor",
        Signature::new(vec![Ty::Numeric], Ty::Int),
        Arc::new(builtin_floor),
    ))?;
    registry.register(FunctionDescriptor::native(
        "round",
        Signature::new(vec![Ty::Numeric], Ty::Int),
        Arc::new(builtin_round),
    ))?;
    registry.register(FunctionDescriptor::native(
        "pow",
        Signature::new(vec![Ty::Numeric, Ty::Numeric], Ty::Float),
        Arc::new(builtin_pow),
    ))?;
    registry.register(FunctionDescriptor::native(
        "sqrt",
        Signature::new(vec![Ty::Numeric], Ty::Float),
        Arc::new(builtin_sqrt),
    ))?;
    registry.register(FunctionDescriptor::native(
        "mod",
        Signature::new(vec![Ty::Int, Ty::Int], Ty::Int),
        Arc::new(builtin_mod),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_preserves_kind() {
        assert!(matches!(builtin_abs(&[Value::Int(-3)]).unwrap(), Value::Int(3)));
        assert!(matches!(
            builtin_abs(&[Value::Float(-3.5)]).unwrap(),
            Value::Float(n) if n == 3.5
        ));
    }

    #[test]
    fn mod_by_zero_is_division_by_zero() {
        let err = builtin_mod(&[Value::Int(5), Value::Int(0)]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DivisionByZero));
    }

    #[test]
    fn pow_and_sqrt_compute_correctly() {
        assert!(matches!(
            builtin_pow(&[Value::Int(2), Value::Int(10)]).unwrap(),
            Value::Float(n) if (n - 1024.0).abs() < f64::EPSILON
        ));
        assert!(matches!(
            builtin_sqrt(&[Value::Int(9)]).unwrap(),
            Value::Float(n) if (n - 3.0).abs() < f64::EPSILON
        ));
    }
}
