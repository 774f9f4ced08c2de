//! String functions: len, lower, upper, trim[Left|Right], contains,
//! startsWith, endsWith, substr, replace, split, join, concat, match,
//! padLeft, padRight, repeat.
//!
//! `len` counts Unicode code points, not bytes, per spec §4.6; it is
//! registered as an overload over both String and List so `len($.tags)`
//! and `len($.name)` both resolve.

use super::support::{arity_exact, arity_range, as_list, as_str};
use crate::error::{Error, ErrorKind, Result};
use crate::registry::{FunctionDescriptor, Registry, Signature};
use crate::value::{Ty, Value};
use regex::Regex;
use std::sync::Arc;

fn builtin_len(args: &[Value]) -> Result<Value> {
    arity_exact("len", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(Error::type_mismatch(
            "len",
            "String or List",
            other.type_name(),
            0,
        )),
    }
}

fn builtin_lower(args: &[Value]) -> Result<Value> {
    arity_exact("lower", args, 1)?;
    Ok(Value::String(as_str("lower", args, 0)?.to_lowercase()))
}

fn builtin_upper(args: &[Value]) -> Result<Value> {
    arity_exact("upper", args, 1)?;
    Ok(Value::String(as_str("upper", args, 0)?.to_uppercase()))
}

fn builtin_trim(args: &[Value]) -> Result<Value> {
    arity_exact("trim", args, 1)?;
    Ok(Value::String(as_str("trim", args, 0)?.trim().to_string()))
}

fn builtin_trim_left(args: &[Value]) -> Result<Value> {
    arity_exact("trimLeft", args, 1)?;
    Ok(Value::String(
        as_str("trimLeft", args, 0)?.trim_start().to_string(),
    ))
}

fn builtin_trim_right(args: &[Value]) -> Result<Value> {
    arity_exact("trimRight", args, 1)?;
    Ok(Value::String(
        as_str("trimRight", args, 0)?.trim_end().to_string(),
    ))
}

fn builtin_contains(args: &[Value]) -> Result<Value> {
    arity_exact("contains", args, 2)?;
    let s = as_str("contains", args, 0)?;
    let sub = as_str("contains", args, 1)?;
    Ok(Value::Bool(s.contains(sub)))
}

fn builtin_starts_with(args: &[Value]) -> Result<Value> {
    arity_exact("startsWith", args, 2)?;
    let s = as_str("startsWith", args, 0)?;
    let prefix = as_str("startsWith", args, 1)?;
    Ok(Value::Bool(s.starts_with(prefix)))
}

fn builtin_ends_with(args: &[Value]) -> Result<Value> {
    arity_exact("endsWith", args, 2)?;
    let s = as_str("endsWith", args, 0)?;
    let suffix = as_str("endsWith", args, 1)?;
    Ok(Value::Bool(s.ends_with(suffix)))
}

fn builtin_substr(args: &[Value]) -> Result<Value> {
    arity_range("substr", args, 2, 3)?;
    let s = as_str("substr", args, 0)?;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let start_raw = super::support::as_i64("substr", args, 1)?;
    let start = clamp_start(start_raw, len);
    let end = if args.len() == 3 {
        let length = super::support::as_i64("substr", args, 2)?;
        if length < 0 {
            start
        } else {
            (start + length as usize).min(len)
        }
    } else {
        len
    };
    let end = end.max(start);
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn clamp_start(start: i64, len: usize) -> usize {
    if start >= 0 {
        (start as usize).min(len)
    } else {
        let from_end = start.checked_neg().map(|n| n as usize).unwrap_or(usize::MAX);
        if from_end > len {
            0
        } else {
            len - from_end
        }
    }
}

fn builtin_replace(args: &[Value]) -> Result<Value> {
    arity_exact("replace", args, 3)?;
    let s = as_str("replace", args, 0)?;
    let from = as_str("replace", args, 1)?;
    let to = as_str("replace", args, 2)?;
    Ok(Value::String(s.replace(from, to)))
}

fn builtin_split(args: &[Value]) -> Result<Value> {
    arity_exact("split", args, 2)?;
    let s = as_str("split", args, 0)?;
    let sep = as_str("split", args, 1)?;
    let parts = if sep.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(sep).map(|p| Value::String(p.to_string())).collect()
    };
    Ok(Value::List(parts))
}

fn builtin_join(args: &[Value]) -> Result<Value> {
    arity_exact("join", args, 2)?;
    let list = as_list("join", args, 0)?;
    let sep = as_str("join", args, 1)?;
    let parts: Vec<String> = list.iter().map(|v| v.to_string()).collect();
    Ok(Value::String(parts.join(sep)))
}

fn builtin_concat(args: &[Value]) -> Result<Value> {
    super::support::arity_min("concat", args, 1)?;
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        match arg {
            Value::String(s) => out.push_str(s),
            other => return Err(Error::type_mismatch("concat", "String", other.type_name(), i)),
        }
    }
    Ok(Value::String(out))
}

fn builtin_match(args: &[Value]) -> Result<Value> {
    arity_exact("match", args, 2)?;
    let s = as_str("match", args, 0)?;
    let pattern = as_str("match", args, 1)?;
    let re = Regex::new(pattern)
        .map_err(|e| Error::new(ErrorKind::InvalidSyntax(format!("invalid regex '{}': {}", pattern, e))))?;
    Ok(Value::Bool(re.is_match(s)))
}

fn builtin_pad_left(args: &[Value]) -> Result<Value> {
    arity_range("padLeft", args, 2, 3)?;
    pad("padLeft", args, true)
}

fn builtin_pad_right(args: &[Value]) -> Result<Value> {
    arity_range("padRight", args, 2, 3)?;
    pad("padRight", args, false)
}

fn pad(name: &str, args: &[Value], left: bool) -> Result<Value> {
    let s = as_str(name, args, 0)?;
    let target_len = super::support::as_i64(name, args, 1)?.max(0) as usize;
    let pad_str = if args.len() == 3 { as_str(name, args, 2)? } else { " " };
    let current_len = s.chars().count();
    if current_len >= target_len || pad_str.is_empty() {
        return Ok(Value::String(s.to_string()));
    }
    let pad_chars: Vec<char> = pad_str.chars().collect();
    let mut filler = String::new();
    for i in 0..(target_len - current_len) {
        filler.push(pad_chars[i % pad_chars.len()]);
    }
    Ok(Value::String(if left {
        format!("{}{}", filler, s)
    } else {
        format!("{}{}", s, filler)
    }))
}

fn builtin_repeat(args: &[Value]) -> Result<Value> {
    arity_exact("repeat", args, 2)?;
    let s = as_str("repeat", args, 0)?;
    let n = super::support::as_i64("repeat", args, 1)?;
    if n < 0 {
        return Err(Error::type_mismatch("repeat", "non-negative Int", "negative Int", 1));
    }
    Ok(Value::String(s.repeat(n as usize)))
}

pub fn register(registry: &Registry) -> Result<()> {
    registry.register_overload(FunctionDescriptor::native(
        "len",
        Signature::new(vec![Ty::String], Ty::Int),
        Arc::new(builtin_len),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "len",
        Signature::new(vec![Ty::List], Ty::Int),
        Arc::new(builtin_len),
    ))?;
    registry.register(FunctionDescriptor::native(
        "lower",
        Signature::new(vec![Ty::String], Ty::String),
        Arc::new(builtin_lower),
    ))?;
    registry.register(FunctionDescriptor::native(
        "upper",
        Signature::new(vec![Ty::String], Ty::String),
        Arc::new(builtin_upper),
    ))?;
    registry.register(FunctionDescriptor::native(
        "trim",
        Signature::new(vec![Ty::String], Ty::String),
        Arc::new(builtin_trim),
    ))?;
    registry.register(FunctionDescriptor::native(
        "trimLeft",
        Signature::new(vec![Ty::String], Ty::String),
        Arc::new(builtin_trim_left),
    ))?;
    registry.register(FunctionDescriptor::native(
        "trimRight",
        Signature::new(vec![Ty::String], Ty::String),
        Arc::new(builtin_trim_right),
    ))?;
    registry.register(FunctionDescriptor::native(
        "contains",
        Signature::new(vec![Ty::String, Ty::String], Ty::Bool),
        Arc::new(builtin_contains),
    ))?;
    registry.register(FunctionDescriptor::native(
        "startsWith",
        Signature::new(vec![Ty::String, Ty::String], Ty::Bool),
        Arc::new(builtin_starts_with),
    ))?;
    registry.register(FunctionDescriptor::native(
        "endsWith",
        Signature::new(vec![Ty::String, Ty::String], Ty::Bool),
        Arc::new(builtin_ends_with),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "substr",
        Signature::new(vec![Ty::String, Ty::Int], Ty::String),
        Arc::new(builtin_substr),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "substr",
        Signature::new(vec![Ty::String, Ty::Int, Ty::Int], Ty::String),
        Arc::new(builtin_substr),
    ))?;
    registry.register(FunctionDescriptor::native(
        "replace",
        Signature::new(vec![Ty::String, Ty::String, Ty::String], Ty::String),
        Arc::new(builtin_replace),
    ))?;
    registry.register(FunctionDescriptor::native(
        "split",
        Signature::new(vec![Ty::String, Ty::String], Ty::List),
        Arc::new(builtin_split),
    ))?;
    registry.register(FunctionDescriptor::native(
        "join",
        Signature::new(vec![Ty::List, Ty::String], Ty::String),
        Arc::new(builtin_join),
    ))?;
    registry.register(FunctionDescriptor::native(
        "concat",
        Signature::new(vec![Ty::String], Ty::String).variadic(),
        Arc::new(builtin_concat),
    ))?;
    registry.register(FunctionDescriptor::native(
        "match",
        Signature::new(vec![Ty::String, Ty::String], Ty::Bool),
        Arc::new(builtin_match),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "padLeft",
        Signature::new(vec![Ty::String, Ty::Int], Ty::String),
        Arc::new(builtin_pad_left),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "padLeft",
        Signature::new(vec![Ty::String, Ty::Int, Ty::String], Ty::String),
        Arc::new(builtin_pad_left),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "padRight",
        Signature::new(vec![Ty::String, Ty::Int], Ty::String),
        Arc::new(builtin_pad_right),
    ))?;
    registry.register_overload(FunctionDescriptor::native(
        "padRight",
        Signature::new(vec![Ty::String, Ty::Int, Ty::String], Ty::String),
        Arc::new(builtin_pad_right),
    ))?;
    registry.register(FunctionDescriptor::native(
        "repeat",
        Signature::new(vec![Ty::String, Ty::Int], Ty::String),
        Arc::new(builtin_repeat),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_code_points_not_bytes() {
        let result = builtin_len(&[Value::String("héllo".to_string())]).unwrap();
        assert!(matches!(result, Value::Int(5)));
    }

    #[test]
    fn substr_accepts_negative_start() {
        let result = builtin_substr(&[
            Value::String("hello".to_string()),
            Value::Int(-3),
        ])
        .unwrap();
        assert_eq!(result.to_string(), "llo");
    }

    #[test]
    fn substr_with_i64_min_start_does_not_panic() {
        let result = builtin_substr(&[
            Value::String("hello".to_string()),
            Value::Int(i64::MIN),
        ])
        .unwrap();
        assert_eq!(result.to_string(), "hello");
    }

    #[test]
    fn split_and_join_roundtrip() {
        let split = builtin_split(&[
            Value::String("a,b,c".to_string()),
            Value::String(",".to_string()),
        ])
        .unwrap();
        let joined = builtin_join(&[split, Value::String("-".to_string())]).unwrap();
        assert_eq!(joined.to_string(), "a-b-c");
    }

    #[test]
    fn pad_left_pads_to_target_length() {
        let result = builtin_pad_left(&[
            Value::String("7".to_string()),
            Value::Int(3),
            Value::String("0".to_string()),
        ])
        .unwrap();
        assert_eq!(result.to_string(), "007");
    }

    #[test]
    fn repeat_rejects_negative_count() {
        let err = builtin_repeat(&[Value::String("x".to_string()), Value::Int(-1)]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    }
}
