//! Non-higher-order list functions: first, last, at, reverse, unique,
//! flatten, slice, indexOf, sortAsc, sortDesc, all, any.
//!
//! `map`/`filter`/`reduce`/`find`/`some`/`every` are higher-order forms
//! dispatched directly by the evaluator (they need a callable, not a
//! registry entry) and live in `eval::higher_order` instead.

use super::support::{arity_exact, arity_range, as_list, resolve_index};
use crate::error::{Error, ErrorKind, Result};
use crate::registry::{FunctionDescriptor, Registry, Signature};
use crate::value::{Ty, Value};
use std::cmp::Ordering;
use std::sync::Arc;

fn builtin_first(args: &[Value]) -> Result<Value> {
    arity_exact("first", args, 1)?;
    let list = as_list("first", args, 0)?;
    Ok(list.first().cloned().unwrap_or(Value::Null))
}

fn builtin_last(args: &[Value]) -> Result<Value> {
    arity_exact("last", args, 1)?;
    let list = as_list("last", args, 0)?;
    Ok(list.last().cloned().unwrap_or(Value::Null))
}

fn builtin_at(args: &[Value]) -> Result<Value> {
    arity_exact("at", args, 2)?;
    let list = as_list("at", args, 0)?;
    let index = super::support::as_i64("at", args, 1)?;
    match resolve_index(index, list.len()) {
        Some(i) => Ok(list[i].clone()),
        None => Err(Error::new(ErrorKind::IndexOutOfBounds {
            index,
            length: list.len(),
        })),
    }
}

fn builtin_reverse(args: &[Value]) -> Result<Value> {
    arity_exact("reverse", args, 1)?;
    let list = as_list("reverse", args, 0)?;
    let mut out = list.to_vec();
    out.reverse();
    Ok(Value::List(out))
}

fn builtin_unique(args: &[Value]) -> Result<Value> {
    arity_exact("unique", args, 1)?;
    let list = as_list("unique", args, 0)?;
    let mut out: Vec<Value> = Vec::with_capacity(list.len());
    for item in list {
        if !out.iter().any(|existing| existing.values_equal(item)) {
            out.push(item.clone());
        }
    }
    Ok(Value::List(out))
}

fn builtin_flatten(args: &[Value]) -> Result<Value> {
    arity_exact("flatten", args, 1)?;
    let list = as_list("flatten", args, 0)?;
    let mut out = Vec::new();
    for item in list {
        match item {
            Value::List(inner) => out.extend(inner.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::List(out))
}

fn builtin_slice(args: &[Value]) -> Result<Value> {
    arity_range("slice", args, 2, 3)?;
    let list = as_list("slice", args, 0)?;
    let len = list.len();
    let start = clamp_bound(super::support::as_i64("slice", args, 1)?, len);
    let end = if args.len() == 3 {
        clamp_bound(super::support::as_i64("slice", args, 2)?, len)
    } else {
        len
    };
    if start >= end {
        return Ok(Value::List(vec![]));
    }
    Ok(Value::List(list[start..end].to_vec()))
}

fn clamp_bound(index: i64, len: usize) -> usize {
    if index >= 0 {
        (index as usize).min(len)
    } else {
        let from_end = index.checked_neg().map(|n| n as usize).unwrap_or(usize::MAX);
        if from_end > len {
            0
        } else {
            len - from_end
        }
    }
}

fn builtin_index_of(args: &[Value]) -> Result<Value> {
    arity_exact("indexOf", args, 2)?;
    let list = as_list("indexOf", args, 0)?;
    let needle = &args[1];
    match list.iter().position(|v| v.values_equal(needle)) {
        Some(i) => Ok(Value::Int(i as i64)),
        None => Ok(Value::Int(-1)),
    }
}

fn sorted(name: &str, args: &[Value], descending: bool) -> Result<Value> {
    arity_exact(name, args, 1)?;
    let list = as_list(name, args, 0)?;
    let mut out = list.to_vec();
    let mut sort_err = None;
    out.sort_by(|a, b| match a.compare(b) {
        Some(ord) => {
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        None => {
            sort_err = Some(Error::type_mismatch(
                name,
                "a list of mutually comparable values",
                format!("{} and {}", a.type_name(), b.type_name()),
                0,
            ));
            Ordering::Equal
        }
    });
    if let Some(err) = sort_err {
        return Err(err);
    }
    Ok(Value::List(out))
}

fn builtin_sort_asc(args: &[Value]) -> Result<Value> {
    sorted("sortAsc", args, false)
}

fn builtin_sort_desc(args: &[Value]) -> Result<Value> {
    sorted("sortDesc", args, true)
}

fn builtin_all(args: &[Value]) -> Result<Value> {
    arity_exact("all", args, 1)?;
    let list = as_list("all", args, 0)?;
    Ok(Value::Bool(list.iter().all(|v| v.is_truthy())))
}

fn builtin_any(args: &[Value]) -> Result<Value> {
    arity_exact("any", args, 1)?;
    let list = as_list("any", args, 0)?;
    Ok(Value::Bool(list.iter().any(|v| v.is_truthy())))
}

pub fn register(registry: &Registry) -> Result<()> {
    registry.register(FunctionDescriptor::native(
        "first",
        Signature::new(vec![Ty::List], Ty::Any),
        Arc::new(builtin_first),
    ))?;
    registry.register(FunctionDescriptor::native(
        "last",
        Signature::new(vec![Ty::List], Ty::Any),
        Arc::new(builtin_last),
    ))?;
    registry.register(FunctionDescriptor::native(
        "at",
        Signature::new(vec![Ty::List, Ty::Int], Ty::Any),
        Arc::new(builtin_at),
    ))?;
    registry.register(FunctionDescriptor::native(
        "reverse",
        Signature::new(vec![Ty::List], Ty::List),
        Arc::new(builtin_reverse),
    ))?;
    registry.register(FunctionDescriptor::native(
        "unique",
        Signature::new(vec![Ty::List], Ty::List),
        Arc::new(builtin_unique),
    ))?;
    registry.register(FunctionDescriptor::native(
        "flatten",
        Signature::new(vec![Ty::List], Ty::List),
        Arc::new(builtin_flatten),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "slice",
        Signature::new(vec![Ty::List, Ty::Int], Ty::List),
        Arc::new(builtin_slice),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "slice",
        Signature::new(vec![Ty::List, Ty::Int, Ty::Int], Ty::List),
        Arc::new(builtin_slice),
    ))?;
    registry.register(FunctionDescriptor::native(
        "indexOf",
        Signature::new(vec![Ty::List, Ty::Any], Ty::Int),
        Arc::new(builtin_index_of),
    ))?;
    registry.register(FunctionDescriptor::native(
        "sortAsc",
        Signature::new(vec![Ty::List], Ty::List),
        Arc::new(builtin_sort_asc),
    ))?;
    registry.register(FunctionDescriptor::native(
        "sortDesc",
        Signature::new(vec![Ty::List], Ty::List),
        Arc::new(builtin_sort_desc),
    ))?;
    registry.register(FunctionDescriptor::native(
        "all",
        Signature::new(vec![Ty::List], Ty::Bool),
        Arc::new(builtin_all),
    ))?;
    registry.register(FunctionDescriptor::native(
        "any",
        Signature::new(vec![Ty::List], Ty::Bool),
        Arc::new(builtin_any),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: Vec<Value>) -> Value {
        Value::List(items)
    }

    #[test]
    fn at_supports_negative_index() {
        let l = list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches!(builtin_at(&[l, Value::Int(-1)]).unwrap(), Value::Int(3)));
    }

    #[test]
    fn at_out_of_bounds_errors() {
        let l = list(vec![Value::Int(1)]);
        let err = builtin_at(&[l, Value::Int(5)]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IndexOutOfBounds { .. }));
    }

    #[test]
    fn at_i64_min_is_out_of_bounds_not_a_panic() {
        let l = list(vec![Value::Int(1)]);
        let err = builtin_at(&[l, Value::Int(i64::MIN)]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IndexOutOfBounds { .. }));
    }

    #[test]
    fn unique_drops_duplicates_preserving_order() {
        let l = list(vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
        let result = builtin_unique(&[l]).unwrap();
        assert_eq!(result.to_string(), "[1, 2]");
    }

    #[test]
    fn flatten_is_one_level_only() {
        let inner = list(vec![Value::Int(1), list(vec![Value::Int(2)])]);
        let outer = list(vec![inner]);
        let result = builtin_flatten(&[outer]).unwrap();
        assert_eq!(result.to_string(), "[1, [2]]");
    }

    #[test]
    fn slice_handles_negative_bounds() {
        let l = list(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
        let result = builtin_slice(&[l, Value::Int(-3), Value::Int(-1)]).unwrap();
        assert_eq!(result.to_string(), "[2, 3]");
    }

    #[test]
    fn slice_with_i64_min_bound_does_not_panic() {
        let l = list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = builtin_slice(&[l, Value::Int(i64::MIN)]).unwrap();
        assert_eq!(result.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn sort_asc_and_desc_order_correctly() {
        let l = list(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert_eq!(builtin_sort_asc(&[l.clone()]).unwrap().to_string(), "[1, 2, 3]");
        assert_eq!(builtin_sort_desc(&[l]).unwrap().to_string(), "[3, 2, 1]");
    }

    #[test]
    fn all_and_any_use_truthiness() {
        let l = list(vec![Value::Int(1), Value::Int(0)]);
        assert!(matches!(builtin_all(&[l.clone()]).unwrap(), Value::Bool(false)));
        assert!(matches!(builtin_any(&[l]).unwrap(), Value::Bool(true)));
    }
}
