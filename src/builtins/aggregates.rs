//! Aggregate functions over a List argument: count, sum, avg, min, max.
//!
//! `sum`/`avg`/`min`/`max` preserve Int when every element is Int, and
//! promote to Float the moment one element isn't (spec §3.2's promotion
//! rule applied across a whole list rather than a pair).

use super::support::{arity_exact, as_list};
use crate::error::{Error, ErrorKind, Result};
use crate::registry::{FunctionDescriptor, Registry, Signature};
use crate::value::{Ty, Value};
use std::cmp::Ordering;
use std::sync::Arc;

fn builtin_count(args: &[Value]) -> Result<Value> {
    arity_exact("count", args, 1)?;
    let list = as_list("count", args, 0)?;
    Ok(count_over(list))
}

fn builtin_count_variadic(args: &[Value]) -> Result<Value> {
    Ok(count_over(args))
}

fn count_over(list: &[Value]) -> Value {
    Value::Int(list.len() as i64)
}

fn builtin_sum(args: &[Value]) -> Result<Value> {
    arity_exact("sum", args, 1)?;
    let list = as_list("sum", args, 0)?;
    sum_over("sum", list)
}

fn builtin_sum_variadic(args: &[Value]) -> Result<Value> {
    sum_over("sum", args)
}

fn sum_over(name: &str, list: &[Value]) -> Result<Value> {
    for (i, v) in list.iter().enumerate() {
        if !v.is_numeric() {
            return Err(Error::type_mismatch(name, "Numeric", v.type_name(), i));
        }
    }
    Ok(super::support::numeric_fold(list, 0, |a, b| a + b))
}

fn builtin_avg(args: &[Value]) -> Result<Value> {
    arity_exact("avg", args, 1)?;
    let list = as_list("avg", args, 0)?;
    avg_over("avg", list)
}

fn builtin_avg_variadic(args: &[Value]) -> Result<Value> {
    avg_over("avg", args)
}

fn avg_over(name: &str, list: &[Value]) -> Result<Value> {
    if list.is_empty() {
        return Err(Error::new(ErrorKind::DivisionByZero));
    }
    for (i, v) in list.iter().enumerate() {
        if !v.is_numeric() {
            return Err(Error::type_mismatch(name, "Numeric", v.type_name(), i));
        }
    }
    let total: f64 = list.iter().filter_map(|v| v.as_f64()).sum();
    Ok(Value::Float(total / list.len() as f64))
}

fn builtin_min(args: &[Value]) -> Result<Value> {
    arity_exact("min", args, 1)?;
    let list = as_list("min", args, 0)?;
    extremum("min", list, Ordering::Less)
}

fn builtin_min_variadic(args: &[Value]) -> Result<Value> {
    extremum("min", args, Ordering::Less)
}

fn builtin_max(args: &[Value]) -> Result<Value> {
    arity_exact("max", args, 1)?;
    let list = as_list("max", args, 0)?;
    extremum("max", list, Ordering::Greater)
}

fn builtin_max_variadic(args: &[Value]) -> Result<Value> {
    extremum("max", args, Ordering::Greater)
}

fn extremum(name: &str, list: &[Value], favor: Ordering) -> Result<Value> {
    if list.is_empty() {
        return Err(Error::argument_count(name, "a non-empty list", 0));
    }
    let mut best = &list[0];
    for (i, v) in list.iter().enumerate() {
        if !v.is_numeric() {
            return Err(Error::type_mismatch(name, "Numeric", v.type_name(), i));
        }
        if v.compare(best) == Some(favor) {
            best = v;
        }
    }
    Ok(best.clone())
}

pub fn register(registry: &Registry) -> Result<()> {
    registry.register_overload(FunctionDescriptor::native(
        "count",
        Signature::new(vec![Ty::List], Ty::Int),
        Arc::new(builtin_count),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "count",
        Signature::new(vec![Ty::Numeric], Ty::Int).variadic(),
        Arc::new(builtin_count_variadic),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "sum",
        Signature::new(vec![Ty::List], Ty::Numeric),
        Arc::new(builtin_sum),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "sum",
        Signature::new(vec![Ty::Numeric], Ty::Numeric).variadic(),
        Arc::new(builtin_sum_variadic),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "avg",
        Signature::new(vec![Ty::List], Ty::Float),
        Arc::new(builtin_avg),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "avg",
        Signature::new(vec![Ty::Numeric], Ty::Float).variadic(),
        Arc::new(builtin_avg_variadic),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "min",
        Signature::new(vec![Ty::List], Ty::Numeric),
        Arc::new(builtin_min),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "min",
        Signature::new(vec![Ty::Numeric], Ty::Numeric).variadic(),
        Arc::new(builtin_min_variadic),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "max",
        Signature::new(vec![Ty::List], Ty::Numeric),
        Arc::new(builtin_max),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "max",
        Signature::new(vec![Ty::Numeric], Ty::Numeric).variadic(),
        Arc::new(builtin_max_variadic),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_preserves_int_when_all_elements_are_int() {
        let result = builtin_sum(&[Value::List(vec![Value::Int(1), Value::Int(2)])]).unwrap();
        assert!(matches!(result, Value::Int(3)));
    }

    #[test]
    fn sum_promotes_to_float_when_any_element_is_float() {
        let result = builtin_sum(&[Value::List(vec![Value::Int(1), Value::Float(2.5)])]).unwrap();
        match result {
            Value::Float(n) => assert!((n - 3.5).abs() < f64::EPSILON),
            other => panic!("expected Float, got {:?}", other),
        }
    }

    #[test]
    fn avg_of_empty_list_is_division_by_zero() {
        let err = builtin_avg(&[Value::List(vec![])]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DivisionByZero));
    }

    #[test]
    fn min_and_max_pick_correct_elements() {
        let list = Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert!(matches!(builtin_min(&[list.clone()]).unwrap(), Value::Int(1)));
        assert!(matches!(builtin_max(&[list]).unwrap(), Value::Int(3)));
    }

    #[test]
    fn max_dispatches_through_the_registry_with_bare_variadic_args() {
        let registry = Registry::new();
        register(&registry).unwrap();
        let args = [Value::Int(1), Value::Int(2), Value::Int(3)];
        let result = registry
            .call("max", &args, None, &crate::deadline::Deadline::none())
            .unwrap();
        assert!(matches!(result, Value::Int(3)));
    }
}
