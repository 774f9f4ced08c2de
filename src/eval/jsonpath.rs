//! JSONPath resolution against the payload's parsed JSON form (spec §4.5).
//!
//! The parser preserves bracket notation textually in the canonical path
//! string; this module performs the dotted rewrite at resolution time:
//! strip the leading `$`, convert `[N]`/`["K"]`/`['K']` to `.N`/`.K`,
//! collapse repeated dots.

use crate::value::Value;
use std::rc::Rc;

pub fn resolve(path: &str, payload: &serde_json::Value) -> Value {
    let rewritten = rewrite(path);
    if rewritten.is_empty() {
        return json_to_value(payload);
    }
    let mut current = payload;
    for segment in rewritten.split('.') {
        if segment.is_empty() {
            continue;
        }
        match current {
            serde_json::Value::Object(map) => match map.get(segment) {
                Some(v) => current = v,
                None => return Value::Null,
            },
            serde_json::Value::Array(items) => match segment.parse::<usize>() {
                Ok(i) => match items.get(i) {
                    Some(v) => current = v,
                    None => return Value::Null,
                },
                Err(_) => return Value::Null,
            },
            _ => return Value::Null,
        }
    }
    json_to_value(current)
}

fn rewrite(path: &str) -> String {
    let stripped = path.strip_prefix('$').unwrap_or(path);
    let stripped = stripped.strip_prefix('.').unwrap_or(stripped);

    let chars: Vec<char> = stripped.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '[' {
            let mut j = i + 1;
            while j < chars.len() && chars[j] != ']' {
                j += 1;
            }
            let inner: String = chars[i + 1..j].iter().collect();
            let inner = inner.trim_matches(|c| c == '"' || c == '\'');
            if !out.is_empty() && !out.ends_with('.') {
                out.push('.');
            }
            out.push_str(inner);
            i = j + 1;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    let mut collapsed = String::new();
    let mut last_was_dot = false;
    for c in out.chars() {
        if c == '.' {
            if last_was_dot {
                continue;
            }
            last_was_dot = true;
        } else {
            last_was_dot = false;
        }
        collapsed.push(c);
    }
    collapsed.trim_matches('.').to_string()
}

/// Converts a `serde_json::Value` into AMEL's runtime `Value`, per spec
/// §3.2/§4.5: whole-number floats normalize to Int; objects become `Any`
/// (Member access resolves against them without further conversion).
pub fn json_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 {
                    Value::Int(f as i64)
                } else {
                    Value::Float(f)
                }
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(_) => Value::Any(Rc::new(v.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_dotted_path() {
        let payload = json!({"user": {"age": 25}});
        let result = resolve("$.user.age", &payload);
        assert!(matches!(result, Value::Int(25)));
    }

    #[test]
    fn resolves_bracket_index_and_quoted_key() {
        let payload = json!({"users": [{"name": "Ada"}]});
        let result = resolve("$.users[0][\"name\"]", &payload);
        assert_eq!(result.to_string(), "Ada");
    }

    #[test]
    fn missing_path_yields_null_not_error() {
        let payload = json!({"user": {}});
        let result = resolve("$.user.missing.deeper", &payload);
        assert!(matches!(result, Value::Null));
    }

    #[test]
    fn bare_dollar_resolves_whole_payload() {
        let payload = json!({"a": 1});
        let result = resolve("$", &payload);
        assert!(matches!(result, Value::Any(_)));
    }

    #[test]
    fn whole_number_float_normalizes_to_int() {
        let payload = json!({"n": 4.0});
        let result = resolve("$.n", &payload);
        assert!(matches!(result, Value::Int(4)));
    }
}
