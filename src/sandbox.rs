// ABOUTME: Sandbox — the narrow contract the core uses to run guest-script
// ABOUTME: functions (spec §4.8); the guest runtime itself is external.

use crate::deadline::Deadline;
use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Resource limits a sandbox implementation is expected to enforce per
/// invocation. Defaults mirror spec §4.8.
#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub deadline: Duration,
    pub max_call_depth: u32,
    /// Informational only; no implementation here can enforce it directly.
    pub max_memory_bytes: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(100),
            max_call_depth: 100,
            max_memory_bytes: 64 * 1024 * 1024,
        }
    }
}

/// The contract the evaluator depends on to run a guest-defined function.
/// Implementations own the actual guest runtime (not part of this crate);
/// this trait is the seam between the two.
pub trait GuestSandbox: Send + Sync {
    /// Runs `function_name` from `source_text`, marshalling `args` in and
    /// the result back, honoring `deadline`. Fails with `Timeout`,
    /// `SandboxViolation`, `UndefinedFunction`, or `InvalidSyntax`.
    fn execute(
        &self,
        deadline: &Deadline,
        source_text: &str,
        function_name: &str,
        args: &[Value],
    ) -> Result<Value>;
}

/// A parsed guest-function signature, extracted by the permissive source
/// parser below. `body` is the function's full source text (braces
/// included), handed to the guest runtime verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestFunctionSource {
    pub name: String,
    pub params: Vec<String>,
    pub return_type: Option<String>,
    pub body: String,
}

fn function_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?s)function\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*(?::\s*([A-Za-z_][A-Za-z0-9_]*))?\s*(\{.*\})",
        )
        .expect("static guest-function pattern is valid")
    })
}

/// Extracts `name`, parameter names, an optional return type, and the full
/// function body from `function name(params[: type]) [: returnType] { ... }`
/// source text. Deliberately lightweight: it does not parse the body, only
/// locates its outermost braces via the trailing greedy capture.
pub fn parse_guest_source(source: &str) -> Result<GuestFunctionSource> {
    let captures = function_pattern()
        .captures(source)
        .ok_or_else(|| Error::new(ErrorKind::InvalidSyntax(
            "expected 'function name(params) { body }'".into(),
        )))?;

    let name = captures[1].to_string();
    let params: Vec<String> = captures[2]
        .split(',')
        .map(|p| p.split(':').next().unwrap_or("").trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    let return_type = captures.get(3).map(|m| m.as_str().to_string());
    let body = captures[4].to_string();

    Ok(GuestFunctionSource {
        name,
        params,
        return_type,
        body,
    })
}

/// A sandbox test double: does not execute guest code at all, it simply
/// echoes its first argument (or Null with no arguments). Useful for
/// exercising the Registry/evaluator's guest-dispatch path without a real
/// guest runtime.
#[derive(Debug, Default)]
pub struct EchoSandbox {
    pub limits: SandboxLimits,
}

impl EchoSandbox {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GuestSandbox for EchoSandbox {
    fn execute(
        &self,
        deadline: &Deadline,
        source_text: &str,
        function_name: &str,
        args: &[Value],
    ) -> Result<Value> {
        if deadline.is_expired() {
            return Err(Error::new(ErrorKind::Timeout));
        }
        tracing::debug!(function = %function_name, "echo sandbox invoked");
        let parsed = parse_guest_source(source_text)?;
        if parsed.name != function_name {
            return Err(Error::new(ErrorKind::UndefinedFunction(
                function_name.to_string(),
            )));
        }
        Ok(args.first().cloned().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_function_signature_and_body() {
        let src = "function double(x: Int): Int { return x * 2; }";
        let parsed = parse_guest_source(src).unwrap();
        assert_eq!(parsed.name, "double");
        assert_eq!(parsed.params, vec!["x".to_string()]);
        assert_eq!(parsed.return_type, Some("Int".to_string()));
        assert!(parsed.body.contains("return x * 2;"));
    }

    #[test]
    fn parses_multiple_untyped_params() {
        let src = "function add(a, b) { return a + b; }";
        let parsed = parse_guest_source(src).unwrap();
        assert_eq!(parsed.params, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(parsed.return_type, None);
    }

    #[test]
    fn rejects_source_without_function_keyword() {
        assert!(parse_guest_source("x + 1").is_err());
    }

    #[test]
    fn echo_sandbox_returns_first_argument() {
        let sandbox = EchoSandbox::new();
        let result = sandbox
            .execute(
                &Deadline::none(),
                "function identity(x) { return x; }",
                "identity",
                &[Value::Int(42)],
            )
            .unwrap();
        assert!(matches!(result, Value::Int(42)));
    }

    #[test]
    fn echo_sandbox_rejects_name_mismatch() {
        let sandbox = EchoSandbox::new();
        let err = sandbox
            .execute(
                &Deadline::none(),
                "function identity(x) { return x; }",
                "other",
                &[Value::Int(1)],
            )
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedFunction(_)));
    }

    #[test]
    fn echo_sandbox_fails_on_expired_deadline() {
        let sandbox = EchoSandbox::new();
        let deadline = Deadline::after(Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(1));
        let err = sandbox
            .execute(&deadline, "function f() { }", "f", &[])
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Timeout));
    }
}
