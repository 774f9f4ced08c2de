//! AST → parameterized SQL WHERE-clause fragment (spec §4.9).
//!
//! Grounded on the `other_examples` SQL token enum's dialect-agnostic idea
//! (tokens/identifiers render differently per dialect) generalized here to
//! direct string emission, since AMEL compiles a fixed boolean-expression
//! grammar rather than a general SQL AST.

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Standard,
    Postgres,
    MySQL,
    SQLite,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Standard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    Question,
    Dollar,
    Named,
    Inline,
}

/// Compilation options. `field_mapper` overrides the default JSONPath →
/// column-identifier mapping (spec §4.9); `None` uses [`default_field_mapping`].
pub struct SqlOptions {
    pub dialect: Dialect,
    pub param_style: Option<ParamStyle>,
    pub field_mapper: Option<Box<dyn Fn(&str) -> String>>,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Standard,
            param_style: None,
            field_mapper: None,
        }
    }
}

impl SqlOptions {
    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    fn resolved_param_style(&self) -> ParamStyle {
        self.param_style.unwrap_or(match self.dialect {
            Dialect::Postgres => ParamStyle::Dollar,
            _ => ParamStyle::Question,
        })
    }
}

/// Strips `$`/`$.`, replaces `.` with `_` and `[`/`]` with `_`/empty,
/// collapses repeated underscores, and trims a trailing underscore.
pub fn default_field_mapping(path: &str) -> String {
    let stripped = path
        .strip_prefix("$.")
        .or_else(|| path.strip_prefix('$'))
        .unwrap_or(path);
    let mut out = stripped.replace('.', "_").replace('[', "_").replace(']', "");
    while out.contains("__") {
        out = out.replace("__", "_");
    }
    out.trim_matches('_').to_string()
}

pub fn compile(expr: &Expr, options: &SqlOptions) -> Result<(String, Vec<Value>)> {
    let mut compiler = Compiler {
        options,
        params: Vec::new(),
        index: 0,
    };
    let sql = compiler.emit(expr)?;
    Ok((sql, compiler.params))
}

struct Compiler<'a> {
    options: &'a SqlOptions,
    params: Vec<Value>,
    index: usize,
}

impl<'a> Compiler<'a> {
    fn quote_ident(&self, name: &str) -> String {
        match self.options.dialect {
            Dialect::MySQL => format!("`{}`", name.replace('`', "``")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    fn map_field(&self, path: &str) -> String {
        match &self.options.field_mapper {
            Some(f) => f(path),
            None => default_field_mapping(path),
        }
    }

    fn placeholder(&mut self) -> String {
        self.index += 1;
        match self.options.resolved_param_style() {
            ParamStyle::Question => "?".to_string(),
            ParamStyle::Dollar => format!("${}", self.index),
            ParamStyle::Named => format!(":p{}", self.index),
            ParamStyle::Inline => unreachable!("inline style never allocates a placeholder"),
        }
    }

    fn emit_value(&mut self, v: Value) -> String {
        if self.options.resolved_param_style() == ParamStyle::Inline {
            self.inline_literal(&v)
        } else {
            let ph = self.placeholder();
            self.params.push(v);
            ph
        }
    }

    fn inline_literal(&self, v: &Value) -> String {
        match v {
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bool(b) => self.inline_bool(*b),
            Value::Null => "NULL".to_string(),
            other => format!("'{}'", other.to_string().replace('\'', "''")),
        }
    }

    fn bool_literal(&self, b: bool) -> String {
        match (self.options.dialect, self.options.resolved_param_style()) {
            (Dialect::Postgres, ParamStyle::Inline) => if b { "TRUE" } else { "FALSE" }.to_string(),
            (Dialect::Postgres, _) => if b { "true" } else { "false" }.to_string(),
            _ => if b { "1" } else { "0" }.to_string(),
        }
    }

    fn inline_bool(&self, b: bool) -> String {
        self.bool_literal(b)
    }

    fn emit(&mut self, expr: &Expr) -> Result<String> {
        match &expr.kind {
            ExprKind::Literal(Literal::Bool(b)) => Ok(self.bool_literal(*b)),
            ExprKind::Literal(lit) => {
                let v = crate::eval::literal_to_value(lit);
                Ok(self.emit_value(v))
            }
            ExprKind::JsonPath { path, .. } => Ok(self.quote_ident(&self.map_field(path))),
            ExprKind::Identifier(name) => Ok(self.quote_ident(&self.map_field(name))),
            ExprKind::Grouped(inner) => Ok(format!("({})", self.emit(inner)?)),
            ExprKind::Unary { op, operand } => {
                let inner = self.emit(operand)?;
                match op {
                    UnaryOp::Not => Ok(format!("NOT ({})", inner)),
                    UnaryOp::Neg => Ok(format!("-({})", inner)),
                }
            }
            ExprKind::Binary { op, left, right } => self.emit_binary(*op, left, right),
            ExprKind::In {
                left,
                right,
                negated,
            } => self.emit_in(left, right, *negated),
            ExprKind::Regex {
                left,
                pattern,
                negated,
            } => self.emit_regex(left, pattern, *negated),
            ExprKind::FunctionCall { name, args } => self.emit_function(name, args),
            ExprKind::List(_) => Err(unsupported("list literal outside IN/NOT IN")),
            ExprKind::Index { .. } => Err(unsupported("index expression")),
            ExprKind::Member { .. } => Err(unsupported("member access")),
            ExprKind::Lambda { .. } => Err(unsupported("lambda expression")),
        }
    }

    fn emit_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<String> {
        let left_null = matches!(left.as_literal(), Some(Literal::Null));
        let right_null = matches!(right.as_literal(), Some(Literal::Null));
        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) && (left_null || right_null) {
            let other = if right_null { left } else { right };
            let sql = self.emit(other)?;
            return Ok(if matches!(op, BinaryOp::Eq) {
                format!("{} IS NULL", sql)
            } else {
                format!("{} IS NOT NULL", sql)
            });
        }

        let l = self.emit(left)?;
        let r = self.emit(right)?;
        let sym = match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        Ok(format!("({} {} {})", l, sym, r))
    }

    fn emit_in(&mut self, left: &Expr, right: &Expr, negated: bool) -> Result<String> {
        let list = match &right.kind {
            ExprKind::List(items) => items,
            _ => return Err(unsupported("IN right-hand side must be a list literal")),
        };
        let l = self.emit(left)?;
        let mut rendered = Vec::with_capacity(list.len());
        for item in list {
            rendered.push(self.emit(item)?);
        }
        let op = if negated { "NOT IN" } else { "IN" };
        Ok(format!("{} {} ({})", l, op, rendered.join(", ")))
    }

    fn emit_regex(&mut self, left: &Expr, pattern: &Expr, negated: bool) -> Result<String> {
        let l = self.emit(left)?;
        match self.options.dialect {
            Dialect::Postgres => {
                let p = self.emit(pattern)?;
                let op = if negated { "!~" } else { "~" };
                Ok(format!("{} {} {}", l, op, p))
            }
            Dialect::MySQL => {
                let p = self.emit(pattern)?;
                let op = if negated { "NOT REGEXP" } else { "REGEXP" };
                Ok(format!("{} {} {}", l, op, p))
            }
            Dialect::SQLite => {
                if negated {
                    return Err(unsupported("SQLite has no NOT REGEXP operator"));
                }
                let p = self.emit(pattern)?;
                Ok(format!("{} REGEXP {}", l, p))
            }
            Dialect::Standard => {
                let pattern_str = match pattern.as_literal() {
                    Some(Literal::String(s)) => s.clone(),
                    _ => return Err(unsupported("Standard dialect needs a literal regex pattern")),
                };
                let like_pattern = regex_to_like(&pattern_str);
                let p = self.emit_value(Value::String(like_pattern));
                if negated {
                    Ok(format!("NOT ({} LIKE {} ESCAPE '\\')", l, p))
                } else {
                    Ok(format!("{} LIKE {} ESCAPE '\\'", l, p))
                }
            }
        }
    }

    fn emit_function(&mut self, name: &str, args: &[Expr]) -> Result<String> {
        match name {
            "lower" => self.unary_fn("LOWER", args),
            "upper" => self.unary_fn("UPPER", args),
            "trim" => self.unary_fn("TRIM", args),
            "len" | "length" => {
                let fn_name = if self.options.dialect == Dialect::MySQL {
                    "CHAR_LENGTH"
                } else {
                    "LENGTH"
                };
                self.unary_fn(fn_name, args)
            }
            "abs" => self.unary_fn("ABS", args),
            "ceil" => {
                let fn_name = if self.options.dialect == Dialect::Standard {
                    "CEILING"
                } else {
                    "CEIL"
                };
                self.unary_fn(fn_name, args)
            }
            "floor" => self.unary_fn("FLOOR", args),
            "round" => self.variadic_fn("ROUND", args),
            "coalesce" => self.variadic_fn("COALESCE", args),
            "concat" => {
                let rendered = self.emit_all(args)?;
                match self.options.dialect {
                    Dialect::Postgres | Dialect::SQLite => Ok(format!("({})", rendered.join(" || "))),
                    _ => Ok(format!("CONCAT({})", rendered.join(", "))),
                }
            }
            "substr" | "substring" => {
                let fn_name = if self.options.dialect == Dialect::MySQL {
                    "SUBSTRING"
                } else {
                    "SUBSTR"
                };
                self.variadic_fn(fn_name, args)
            }
            "isNull" => {
                let a = self.require_arity(name, args, 1)?;
                Ok(format!("{} IS NULL", a[0]))
            }
            "isNotNull" => {
                let a = self.require_arity(name, args, 1)?;
                Ok(format!("{} IS NOT NULL", a[0]))
            }
            "min" | "max" | "sum" | "avg" | "count" => {
                self.variadic_fn(&name.to_uppercase(), args)
            }
            "contains" => self.like_fn(name, args, true, true),
            "startsWith" => self.like_fn(name, args, false, true),
            "endsWith" => self.like_fn(name, args, true, false),
            other => Err(unsupported(format!("function '{}'", other))),
        }
    }

    fn emit_all(&mut self, args: &[Expr]) -> Result<Vec<String>> {
        args.iter().map(|a| self.emit(a)).collect()
    }

    fn unary_fn(&mut self, sql_name: &str, args: &[Expr]) -> Result<String> {
        let a = self.require_arity(sql_name, args, 1)?;
        Ok(format!("{}({})", sql_name, a[0]))
    }

    fn variadic_fn(&mut self, sql_name: &str, args: &[Expr]) -> Result<String> {
        let rendered = self.emit_all(args)?;
        Ok(format!("{}({})", sql_name, rendered.join(", ")))
    }

    fn require_arity(&mut self, name: &str, args: &[Expr], n: usize) -> Result<Vec<String>> {
        if args.len() != n {
            return Err(Error::argument_count(name, n.to_string(), args.len()));
        }
        self.emit_all(args)
    }

    fn like_fn(&mut self, name: &str, args: &[Expr], lead: bool, trail: bool) -> Result<String> {
        if args.len() != 2 {
            return Err(Error::argument_count(name, "2", args.len()));
        }
        let field = self.emit(&args[0])?;
        let literal = match args[1].as_literal() {
            Some(Literal::String(s)) => s.clone(),
            _ => return Err(unsupported(format!("{} needs a literal string argument", name))),
        };
        let escaped = literal.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!(
            "{}{}{}",
            if lead { "%" } else { "" },
            escaped,
            if trail { "%" } else { "" }
        );
        let p = self.emit_value(Value::String(pattern));
        Ok(format!("{} LIKE {} ESCAPE '\\'", field, p))
    }
}

/// Best-effort regex-anchor → LIKE-pattern conversion for dialects with no
/// native regex operator: `^x` / `x$` anchor the match, `.*` becomes `%`,
/// any other `.` becomes `_`. Literal `%`/`_`/`\` from the source pattern
/// are backslash-escaped so they survive as literal characters under the
/// `ESCAPE '\\'` clause the caller emits alongside this pattern.
fn regex_to_like(pattern: &str) -> String {
    let mut p = pattern.to_string();
    let anchored_start = p.starts_with('^');
    if anchored_start {
        p.remove(0);
    }
    let anchored_end = p.ends_with('$') && !p.ends_with("\\$");
    if anchored_end {
        p.pop();
    }

    let mut out = String::new();
    let mut chars = p.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push('%');
            }
            '.' => out.push('_'),
            '\\' => out.push_str("\\\\"),
            '%' => out.push_str("\\%"),
            '_' => out.push_str("\\_"),
            other => out.push(other),
        }
    }
    if !anchored_start {
        out = format!("%{}", out);
    }
    if !anchored_end {
        out = format!("{}%", out);
    }
    out
}

fn unsupported(msg: impl Into<String>) -> Error {
    let msg = msg.into();
    tracing::debug!(reason = %msg, "sql compile rejected expression");
    Error::new(ErrorKind::Unsupported(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Expr {
        crate::parser::parse(src).unwrap()
    }

    #[test]
    fn equality_on_jsonpath_uses_dollar_placeholder_for_postgres() {
        let expr = parse("$.status == \"active\"");
        let options = SqlOptions::with_dialect(Dialect::Postgres);
        let (sql, params) = compile(&expr, &options).unwrap();
        assert_eq!(sql, "(\"status\" = $1)");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn null_equality_rewrites_to_is_null_regardless_of_side() {
        let expr = parse("null == $.deletedAt");
        let options = SqlOptions::default();
        let (sql, _params) = compile(&expr, &options).unwrap();
        assert_eq!(sql, "\"deletedAt\" IS NULL");
    }

    #[test]
    fn in_list_emits_question_marks_by_default() {
        let expr = parse("$.status IN [\"a\", \"b\", \"c\"]");
        let options = SqlOptions::default();
        let (sql, params) = compile(&expr, &options).unwrap();
        assert_eq!(sql, "\"status\" IN (?, ?, ?)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn regex_on_postgres_emits_tilde_operator() {
        let expr = parse("$.email =~ \"@gmail\\\\.com$\"");
        let options = SqlOptions::with_dialect(Dialect::Postgres);
        let (sql, _params) = compile(&expr, &options).unwrap();
        assert!(sql.contains("~ $1"));
    }

    #[test]
    fn standard_dialect_regex_escapes_literal_like_metacharacters() {
        let expr = parse(r#"$.code =~ "^100%_off$""#);
        let options = SqlOptions::with_dialect(Dialect::Standard);
        let (sql, params) = compile(&expr, &options).unwrap();
        assert!(sql.contains("ESCAPE '\\'"));
        assert_eq!(params.len(), 1);
        assert!(params[0].values_equal(&Value::String("100\\%_off".to_string())));
    }

    #[test]
    fn sqlite_negated_regex_is_unsupported() {
        let expr = parse("$.email !~ \"x\"");
        let options = SqlOptions::with_dialect(Dialect::SQLite);
        let err = compile(&expr, &options).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Unsupported(_)));
    }

    #[test]
    fn unknown_function_is_unsupported() {
        let expr = parse("totallyMadeUp($.x)");
        let options = SqlOptions::default();
        let err = compile(&expr, &options).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Unsupported(_)));
    }

    #[test]
    fn contains_translates_to_like_with_escape_clause() {
        let expr = parse("contains($.name, \"O'Brien\")");
        let options = SqlOptions::default();
        let (sql, params) = compile(&expr, &options).unwrap();
        assert!(sql.contains("LIKE"));
        assert!(sql.contains("ESCAPE"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn inline_param_style_bakes_literals_and_produces_no_params() {
        let expr = parse("$.age > 18");
        let options = SqlOptions {
            dialect: Dialect::Standard,
            param_style: Some(ParamStyle::Inline),
            field_mapper: None,
        };
        let (sql, params) = compile(&expr, &options).unwrap();
        assert_eq!(sql, "(\"age\" > 18)");
        assert!(params.is_empty());
    }

    #[test]
    fn default_field_mapping_strips_dollar_and_brackets() {
        assert_eq!(default_field_mapping("$.user.profile[0]"), "user_profile_0");
        assert_eq!(default_field_mapping("$name"), "name");
    }
}
