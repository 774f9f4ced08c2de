//! Tree-walking evaluator (spec §4.4): dispatch by AST variant, JSONPath
//! data binding, short-circuit logical operators, higher-order forms, and
//! the explanation tree. Grounded on the teacher's `eval.rs` dispatch-by-variant
//! shape, generalized from a Lisp S-expression walk to this AST's variants.

pub mod explain;
mod higher_order;
pub mod jsonpath;

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::deadline::Deadline;
use crate::error::{Error, ErrorKind, Result};
use crate::registry::Registry;
use crate::sandbox::GuestSandbox;
use crate::value::Value;
use explain::Explanation;
use regex::Regex;
use std::collections::HashMap;

/// Per-evaluation context (spec §3.5): opaque payload (kept as parsed
/// JSON — re-serializing and re-parsing for every path lookup would be
/// wasteful since `serde_json::Value` already is the canonical form),
/// host/lambda variable bindings, and a cancellation/deadline handle.
pub struct EvalContext {
    pub payload: serde_json::Value,
    pub variables: HashMap<String, Value>,
    pub deadline: Deadline,
}

impl EvalContext {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            variables: HashMap::new(),
            deadline: Deadline::none(),
        }
    }

    pub fn with_deadline(payload: serde_json::Value, deadline: Deadline) -> Self {
        Self {
            payload,
            variables: HashMap::new(),
            deadline,
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }
}

pub struct Evaluator<'a> {
    registry: &'a Registry,
    sandbox: Option<&'a dyn GuestSandbox>,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            sandbox: None,
        }
    }

    pub fn with_sandbox(registry: &'a Registry, sandbox: &'a dyn GuestSandbox) -> Self {
        Self {
            registry,
            sandbox: Some(sandbox),
        }
    }

    pub fn evaluate(&self, expr: &Expr, ctx: &mut EvalContext) -> Result<Value> {
        if ctx.deadline.is_expired() {
            tracing::warn!("evaluation cancelled: deadline expired");
            return Err(Error::new(ErrorKind::Timeout));
        }
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_to_value(lit)),
            ExprKind::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.evaluate(item, ctx)?);
                }
                Ok(Value::List(out))
            }
            ExprKind::Identifier(name) => ctx
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| Error::new(ErrorKind::UndefinedVariable(name.clone()))),
            ExprKind::JsonPath { path, .. } => Ok(jsonpath::resolve(path, &ctx.payload)),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, ctx),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right, ctx),
            ExprKind::In {
                left,
                right,
                negated,
            } => self.eval_in(left, right, *negated, ctx),
            ExprKind::Regex {
                left,
                pattern,
                negated,
            } => self.eval_regex(left, pattern, *negated, ctx),
            ExprKind::Grouped(inner) => self.evaluate(inner, ctx),
            ExprKind::FunctionCall { name, args } => self.eval_call(name, args, ctx),
            ExprKind::Index { container, index } => self.eval_index(container, index, ctx),
            ExprKind::Member { object, property } => self.eval_member(object, property, ctx),
            ExprKind::Lambda { .. } => Err(Error::new(ErrorKind::InvalidSyntax(
                "lambda may only appear as a higher-order function argument".to_string(),
            ))),
        }
    }

    pub fn evaluate_bool(&self, expr: &Expr, ctx: &mut EvalContext) -> Result<bool> {
        Ok(self.evaluate(expr, ctx)?.is_truthy())
    }

    pub fn evaluate_with_explanation(
        &self,
        expr: &Expr,
        ctx: &mut EvalContext,
    ) -> (Result<Value>, Explanation) {
        self.explain(expr, ctx)
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, ctx: &mut EvalContext) -> Result<Value> {
        let v = self.evaluate(operand, ctx)?;
        match op {
            UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
            UnaryOp::Neg => match v {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Float(n) => Ok(Value::Float(-n)),
                other => Err(Error::type_mismatch("-", "Numeric", other.type_name(), 0)),
            },
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr, ctx: &mut EvalContext) -> Result<Value> {
        if matches!(op, BinaryOp::And) {
            let l = self.evaluate(left, ctx)?;
            if !l.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(self.evaluate_bool(right, ctx)?));
        }
        if matches!(op, BinaryOp::Or) {
            let l = self.evaluate(left, ctx)?;
            if l.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(self.evaluate_bool(right, ctx)?));
        }

        let l = self.evaluate(left, ctx)?;
        let r = self.evaluate(right, ctx)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(l.values_equal(&r))),
            BinaryOp::NotEq => Ok(Value::Bool(!l.values_equal(&r))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ord = l.compare(&r).ok_or_else(|| {
                    Error::type_mismatch(op.to_string(), "mutually comparable operands", format!("{}/{}", l.type_name(), r.type_name()), 0)
                })?;
                let result = match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    BinaryOp::Ge => ord.is_ge(),
                    _ => unreachable!(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::Add => match (&l, &r) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                (a, b) if a.is_numeric() && b.is_numeric() => {
                    Ok(numeric_op(a, b, i64::checked_add, |x, y| x + y))
                }
                _ => Err(Error::type_mismatch("+", "two Strings or two Numerics", format!("{}/{}", l.type_name(), r.type_name()), 0)),
            },
            BinaryOp::Sub => numeric_binary("-", &l, &r, i64::checked_sub, |x, y| x - y),
            BinaryOp::Mul => numeric_binary("*", &l, &r, i64::checked_mul, |x, y| x * y),
            BinaryOp::Div => {
                let (a, b) = (numeric_f64("/", &l)?, numeric_f64("/", &r)?);
                if b == 0.0 {
                    return Err(Error::new(ErrorKind::DivisionByZero));
                }
                Ok(Value::Float(a / b))
            }
            BinaryOp::Mod => {
                let a = require_int("%", &l)?;
                let b = require_int("%", &r)?;
                if b == 0 {
                    return Err(Error::new(ErrorKind::DivisionByZero));
                }
                Ok(Value::Int(a % b))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_in(&self, left: &Expr, right: &Expr, negated: bool, ctx: &mut EvalContext) -> Result<Value> {
        let needle = self.evaluate(left, ctx)?;
        let haystack = self.evaluate(right, ctx)?;
        let list = match haystack {
            Value::List(items) => items,
            other => return Err(Error::type_mismatch("IN", "List", other.type_name(), 1)),
        };
        let found = list.iter().any(|v| v.values_equal(&needle));
        Ok(Value::Bool(found != negated))
    }

    fn eval_regex(&self, left: &Expr, pattern: &Expr, negated: bool, ctx: &mut EvalContext) -> Result<Value> {
        let l = self.evaluate(left, ctx)?;
        if matches!(l, Value::Null) {
            return Ok(Value::Bool(negated));
        }
        let s = match &l {
            Value::String(s) => s.clone(),
            other => return Err(Error::type_mismatch("=~", "String", other.type_name(), 0)),
        };
        let p = match self.evaluate(pattern, ctx)? {
            Value::String(s) => s,
            other => return Err(Error::type_mismatch("=~", "String", other.type_name(), 1)),
        };
        let re = Regex::new(&p)
            .map_err(|e| Error::new(ErrorKind::InvalidSyntax(format!("invalid regex '{}': {}", p, e))))?;
        Ok(Value::Bool(re.is_match(&s) != negated))
    }

    fn eval_call(&self, name: &str, args: &[Expr], ctx: &mut EvalContext) -> Result<Value> {
        if let Some(result) = higher_order::dispatch(self, name, args, ctx) {
            return result;
        }
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.evaluate(arg, ctx)?);
        }
        self.registry.call(name, &evaluated, self.sandbox, &ctx.deadline)
    }

    fn eval_index(&self, container: &Expr, index: &Expr, ctx: &mut EvalContext) -> Result<Value> {
        let list = match self.evaluate(container, ctx)? {
            Value::List(items) => items,
            other => return Err(Error::type_mismatch("[]", "List", other.type_name(), 0)),
        };
        let idx = match self.evaluate(index, ctx)? {
            Value::Int(n) => n,
            other => return Err(Error::type_mismatch("[]", "Int", other.type_name(), 1)),
        };
        let resolved = if idx >= 0 {
            let i = idx as usize;
            if i < list.len() { Some(i) } else { None }
        } else {
            match idx.checked_neg() {
                Some(n) => {
                    let from_end = n as usize;
                    if from_end <= list.len() { Some(list.len() - from_end) } else { None }
                }
                None => None,
            }
        };
        match resolved {
            Some(i) => Ok(list[i].clone()),
            None => Err(Error::new(ErrorKind::IndexOutOfBounds {
                index: idx,
                length: list.len(),
            })),
        }
    }

    fn eval_member(&self, object: &Expr, property: &str, ctx: &mut EvalContext) -> Result<Value> {
        match self.evaluate(object, ctx)? {
            Value::Any(json) => match json.as_object().and_then(|m| m.get(property)) {
                Some(v) => Ok(jsonpath::json_to_value(v)),
                None => Ok(Value::Null),
            },
            Value::Null => Ok(Value::Null),
            other => Err(Error::type_mismatch(".", "an object (Any)", other.type_name(), 0)),
        }
    }

    fn explain(&self, expr: &Expr, ctx: &mut EvalContext) -> (Result<Value>, Explanation) {
        let source = expr.to_string();
        match &expr.kind {
            ExprKind::Binary { op: BinaryOp::And, left, right } => {
                let (lr, lex) = self.explain(left, ctx);
                match lr {
                    Ok(ref lv) if !lv.is_truthy() => {
                        let result = Ok(Value::Bool(false));
                        (result.clone(), Explanation::with_children(source, &result, vec![lex]))
                    }
                    Ok(_) => {
                        let (rr, rex) = self.explain(right, ctx);
                        let result = rr.map(|v| Value::Bool(v.is_truthy()));
                        (result.clone(), Explanation::with_children(source, &result, vec![lex, rex]))
                    }
                    Err(_) => (lr.clone(), Explanation::with_children(source, &lr, vec![lex])),
                }
            }
            ExprKind::Binary { op: BinaryOp::Or, left, right } => {
                let (lr, lex) = self.explain(left, ctx);
                match lr {
                    Ok(ref lv) if lv.is_truthy() => {
                        let result = Ok(Value::Bool(true));
                        (result.clone(), Explanation::with_children(source, &result, vec![lex]))
                    }
                    Ok(_) => {
                        let (rr, rex) = self.explain(right, ctx);
                        let result = rr.map(|v| Value::Bool(v.is_truthy()));
                        (result.clone(), Explanation::with_children(source, &result, vec![lex, rex]))
                    }
                    Err(_) => (lr.clone(), Explanation::with_children(source, &lr, vec![lex])),
                }
            }
            ExprKind::Binary { left, right, .. } => {
                let (_, lex) = self.explain(left, ctx);
                let (_, rex) = self.explain(right, ctx);
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::with_children(source, &result, vec![lex, rex]))
            }
            ExprKind::Unary { operand, .. } => {
                let (_, oex) = self.explain(operand, ctx);
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::with_children(source, &result, vec![oex]))
            }
            ExprKind::Grouped(inner) => {
                let (ir, iex) = self.explain(inner, ctx);
                (ir.clone(), Explanation::with_children(source, &ir, vec![iex]))
            }
            ExprKind::List(items) => {
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    children.push(self.explain(item, ctx).1);
                }
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::with_children(source, &result, children))
            }
            ExprKind::FunctionCall { name, args } => {
                let mut children = Vec::with_capacity(args.len());
                for arg in args {
                    children.push(self.explain(arg, ctx).1);
                }
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::with_children(source, &result, children))
            }
            ExprKind::Index { container, index } => {
                let (_, cex) = self.explain(container, ctx);
                let (_, iex) = self.explain(index, ctx);
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::with_children(source, &result, vec![cex, iex]))
            }
            ExprKind::Member { object, .. } => {
                let (_, oex) = self.explain(object, ctx);
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::with_children(source, &result, vec![oex]))
            }
            ExprKind::In { left, right, .. } => {
                let (_, lex) = self.explain(left, ctx);
                let (_, rex) = self.explain(right, ctx);
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::with_children(source, &result, vec![lex, rex]))
            }
            ExprKind::Regex { left, pattern, .. } => {
                let (_, lex) = self.explain(left, ctx);
                let (_, pex) = self.explain(pattern, ctx);
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::with_children(source, &result, vec![lex, pex]))
            }
            _ => {
                let result = self.evaluate(expr, ctx);
                (result.clone(), Explanation::leaf(source, &result))
            }
        }
    }
}

pub(crate) fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn numeric_f64(op: &str, v: &Value) -> Result<f64> {
    v.as_f64().ok_or_else(|| Error::type_mismatch(op, "Numeric", v.type_name(), 0))
}

fn require_int(op: &str, v: &Value) -> Result<i64> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(Error::type_mismatch(op, "Int", other.type_name(), 0)),
    }
}

/// Dispatches to `int_op` (checked i64 arithmetic, matching the optimizer's
/// constant-folding path) when both operands are `Int`, falling back to
/// `float_op` only when at least one is a `Float` or the checked i64
/// operation would overflow — never routing whole-Int arithmetic through
/// `f64`, which silently loses precision past 2^53.
fn numeric_op(a: &Value, b: &Value, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Value {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if let Some(result) = int_op(*x, *y) {
            return Value::Int(result);
        }
    }
    Value::Float(float_op(a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0)))
}

fn numeric_binary(
    op: &str,
    l: &Value,
    r: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    if !l.is_numeric() || !r.is_numeric() {
        return Err(Error::type_mismatch(op, "Numeric", format!("{}/{}", l.type_name(), r.type_name()), 0));
    }
    Ok(numeric_op(l, r, int_op, float_op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn eval(src: &str, payload: serde_json::Value) -> Result<Value> {
        let registry = Registry::new();
        crate::builtins::register_all(&registry).unwrap();
        let evaluator = Evaluator::new(&registry);
        let mut ctx = EvalContext::new(payload);
        let expr = crate::parser::parse(src).unwrap();
        evaluator.evaluate(&expr, &mut ctx)
    }

    #[test]
    fn jsonpath_and_logical_and_short_circuit() {
        let payload = serde_json::json!({"user": {"age": 25, "verified": true}});
        let result = eval("$.user.age >= 18 && $.user.verified == true", payload).unwrap();
        assert!(matches!(result, Value::Bool(true)));
    }

    #[test]
    fn function_call_dispatches_to_registry() {
        let result = eval("max(1, 2, 3)", serde_json::json!({})).unwrap();
        assert!(matches!(result, Value::Int(3)));
    }

    #[test]
    fn division_by_zero_is_not_folded_away() {
        let err = eval("10 / 0", serde_json::json!({})).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DivisionByZero));
    }

    #[test]
    fn large_int_addition_does_not_lose_precision_through_float() {
        let result = eval(
            "$.bigId + 1",
            serde_json::json!({"bigId": 9_007_199_254_740_993i64}),
        )
        .unwrap();
        assert!(matches!(result, Value::Int(9_007_199_254_740_994)));
    }

    #[test]
    fn lambda_outside_higher_order_context_fails() {
        let err = eval("x => x", serde_json::json!({})).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidSyntax(_)));
    }

    #[test]
    fn negative_index_wraps_from_end() {
        let result = eval("[1,2,3][-1]", serde_json::json!({})).unwrap();
        assert!(matches!(result, Value::Int(3)));
    }

    #[test]
    fn negative_index_at_i64_min_is_out_of_bounds_not_a_panic() {
        use crate::ast::{Expr, ExprKind, Literal};
        use crate::token::Token;

        let container = Expr::new(
            ExprKind::List(vec![Expr::new(
                ExprKind::Literal(Literal::Int(1)),
                Token::eof(0, 0),
            )]),
            Token::eof(0, 0),
        );
        let index = Expr::new(ExprKind::Literal(Literal::Int(i64::MIN)), Token::eof(0, 0));
        let expr = Expr::new(
            ExprKind::Index {
                container: Box::new(container),
                index: Box::new(index),
            },
            Token::eof(0, 0),
        );

        let registry = Registry::new();
        crate::builtins::register_all(&registry).unwrap();
        let evaluator = Evaluator::new(&registry);
        let mut ctx = EvalContext::new(serde_json::json!({}));
        let err = evaluator.evaluate(&expr, &mut ctx).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IndexOutOfBounds { .. }));
    }

    #[test]
    fn regex_on_null_left_returns_negated_flag() {
        let result = eval("$.missing =~ \"x\"", serde_json::json!({})).unwrap();
        assert!(matches!(result, Value::Bool(false)));
        let result = eval("$.missing !~ \"x\"", serde_json::json!({})).unwrap();
        assert!(matches!(result, Value::Bool(true)));
    }

    #[test]
    fn explanation_tree_omits_short_circuited_branch() {
        let registry = Registry::new();
        crate::builtins::register_all(&registry).unwrap();
        let evaluator = Evaluator::new(&registry);
        let mut ctx = EvalContext::new(serde_json::json!({}));
        let expr = crate::parser::parse("false && (1 / 0 > 0)").unwrap();
        let (result, explanation) = evaluator.evaluate_with_explanation(&expr, &mut ctx);
        assert!(matches!(result, Ok(Value::Bool(false))));
        assert_eq!(explanation.children.len(), 1);
    }
}
