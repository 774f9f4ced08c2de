//! AST → nested filter-document mapping (spec §4.10), grounded on the
//! `other_examples` flitbit-avocado `dsl::filter` `Filter` enum's
//! `$eq`/`$ne`/`$and`/`$regex` naming convention, adapted to AMEL's own AST
//! instead of a pre-built Bson filter type.

use crate::ast::{BinaryOp, Expr, ExprKind, Literal};
use crate::error::{Error, ErrorKind, Result};
use indexmap::IndexMap;

/// A value in a compiled filter document: a scalar, an ordered list, or a
/// nested document (ordered so `$and`/`$or` children print deterministically).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<FilterValue>),
    Doc(IndexMap<String, FilterValue>),
}

impl FilterValue {
    fn doc(entries: Vec<(&str, FilterValue)>) -> Self {
        let mut map = IndexMap::new();
        for (k, v) in entries {
            map.insert(k.to_string(), v);
        }
        FilterValue::Doc(map)
    }

    fn single(key: &str, value: FilterValue) -> Self {
        Self::doc(vec![(key, value)])
    }

    pub fn to_compact_string(&self) -> String {
        let mut out = String::new();
        write_value(self, &mut out);
        out
    }

    pub fn to_indented_string(&self) -> String {
        let mut out = String::new();
        write_value_indented(self, &mut out, 0);
        out
    }
}

fn escape_json_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn write_value(v: &FilterValue, out: &mut String) {
    match v {
        FilterValue::Null => out.push_str("null"),
        FilterValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        FilterValue::Int(n) => out.push_str(&n.to_string()),
        FilterValue::Float(f) => out.push_str(&f.to_string()),
        FilterValue::String(s) => {
            out.push('"');
            out.push_str(&escape_json_string(s));
            out.push('"');
        }
        FilterValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, out);
            }
            out.push(']');
        }
        FilterValue::Doc(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push('"');
                out.push_str(&escape_json_string(k));
                out.push_str("\": ");
                write_value(v, out);
            }
            out.push('}');
        }
    }
}

fn write_value_indented(v: &FilterValue, out: &mut String, depth: usize) {
    let pad = "  ".repeat(depth);
    let pad_inner = "  ".repeat(depth + 1);
    match v {
        FilterValue::List(items) if !items.is_empty() => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                out.push_str(&pad_inner);
                write_value_indented(item, out, depth + 1);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&pad);
            out.push(']');
        }
        FilterValue::Doc(map) if !map.is_empty() => {
            out.push_str("{\n");
            for (i, (k, v)) in map.iter().enumerate() {
                out.push_str(&pad_inner);
                out.push('"');
                out.push_str(&escape_json_string(k));
                out.push_str("\": ");
                write_value_indented(v, out, depth + 1);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&pad);
            out.push('}');
        }
        other => write_value(other, out),
    }
}

/// Strips `$`/`$.`, rewrites `[n]`/`["k"]`/`['k']` to `.n`/`.k`, collapses
/// repeated dots, and trims edge dots (spec §4.10).
pub fn default_field_mapping(path: &str) -> String {
    let stripped = path
        .strip_prefix("$.")
        .or_else(|| path.strip_prefix('$'))
        .unwrap_or(path);

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
    let mut last_dot = false;
    for c in out.chars() {
        if c == '.' {
            if last_dot {
                continue;
            }
            last_dot = true;
        } else {
            last_dot = false;
        }
        collapsed.push(c);
    }
    collapsed.trim_matches('.').to_string()
}

#[derive(Default)]
pub struct DocQueryOptions {
    pub field_mapper: Option<Box<dyn Fn(&str) -> String>>,
}

pub fn compile(expr: &Expr, options: &DocQueryOptions) -> Result<FilterValue> {
    let compiler = Compiler { options };
    compiler.emit(expr)
}

struct Compiler<'a> {
    options: &'a DocQueryOptions,
}

impl<'a> Compiler<'a> {
    fn map_field(&self, path: &str) -> String {
        match &self.options.field_mapper {
            Some(f) => f(path),
            None => default_field_mapping(path),
        }
    }

    fn field_name(&self, e: &Expr) -> Result<String> {
        match &e.kind {
            ExprKind::JsonPath { path, .. } => Ok(self.map_field(path)),
            ExprKind::Identifier(name) => Ok(self.map_field(name)),
            _ => Err(unsupported("expected a field reference")),
        }
    }

    fn literal_value(&self, e: &Expr) -> Result<FilterValue> {
        match e.as_literal() {
            Some(lit) => Ok(literal_to_filter(lit)),
            None => Err(unsupported("expected a literal value")),
        }
    }

    fn emit(&self, expr: &Expr) -> Result<FilterValue> {
        match &expr.kind {
            ExprKind::Literal(Literal::Bool(true)) => Ok(FilterValue::Doc(IndexMap::new())),
            ExprKind::Literal(Literal::Bool(false)) => {
                Ok(FilterValue::single("$expr", FilterValue::Bool(false)))
            }
            ExprKind::Grouped(inner) => self.emit(inner),
            ExprKind::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => self.emit_logical(matches!(op, BinaryOp::And), left, right),
            ExprKind::Binary { op, left, right }
                if matches!(
                    op,
                    BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
                ) =>
            {
                self.emit_comparison(*op, left, right)
            }
            ExprKind::Binary { .. } => Err(unsupported("arithmetic expression outside $expr context")),
            ExprKind::Unary { op, operand } if matches!(op, crate::ast::UnaryOp::Not) => {
                self.emit_not(operand)
            }
            ExprKind::Unary { .. } => Err(unsupported("unary minus is not a boolean predicate")),
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
            ExprKind::FunctionCall { name, args } => self.emit_function_predicate(name, args),
            other => Err(unsupported(format!("{:?} is not a boolean predicate", other))),
        }
    }

    fn emit_logical(&self, is_and: bool, left: &Expr, right: &Expr) -> Result<FilterValue> {
        let key = if is_and { "$and" } else { "$or" };
        let mut items = Vec::new();
        self.flatten(is_and, left, &mut items)?;
        self.flatten(is_and, right, &mut items)?;
        Ok(FilterValue::single(key, FilterValue::List(items)))
    }

    fn flatten(&self, is_and: bool, e: &Expr, items: &mut Vec<FilterValue>) -> Result<()> {
        if let ExprKind::Binary { op, left, right } = &e.kind {
            let same = (is_and && matches!(op, BinaryOp::And)) || (!is_and && matches!(op, BinaryOp::Or));
            if same {
                self.flatten(is_and, left, items)?;
                self.flatten(is_and, right, items)?;
                return Ok(());
            }
        }
        items.push(self.emit(e)?);
        Ok(())
    }

    fn emit_comparison(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<FilterValue> {
        let left_is_field = matches!(left.kind, ExprKind::JsonPath { .. } | ExprKind::Identifier(_));
        let right_is_field = matches!(right.kind, ExprKind::JsonPath { .. } | ExprKind::Identifier(_));
        let left_is_lit = left.as_literal().is_some();
        let right_is_lit = right.as_literal().is_some();

        if left_is_field && right_is_lit {
            return self.emit_field_literal_comparison(op, left, right);
        }
        if right_is_field && left_is_lit {
            return self.emit_field_literal_comparison(mirror(op), right, left);
        }
        // Field-to-field, arithmetic operands, or anything else not expressible
        // as a plain shorthand map falls through to the $expr escape hatch.
        self.emit_expr_comparison(op, left, right)
    }

    fn emit_field_literal_comparison(&self, op: BinaryOp, field: &Expr, lit: &Expr) -> Result<FilterValue> {
        let name = self.field_name(field)?;
        let value = self.literal_value(lit)?;
        let inner = match op {
            BinaryOp::Eq => value,
            BinaryOp::NotEq => FilterValue::single("$ne", value),
            BinaryOp::Lt => FilterValue::single("$lt", value),
            BinaryOp::Le => FilterValue::single("$lte", value),
            BinaryOp::Gt => FilterValue::single("$gt", value),
            BinaryOp::Ge => FilterValue::single("$gte", value),
            _ => unreachable!("non-comparison op"),
        };
        Ok(FilterValue::single(&name, inner))
    }

    fn emit_expr_comparison(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<FilterValue> {
        let sym = expr_cmp_symbol(op)?;
        let l = self.emit_expr_operand(left)?;
        let r = self.emit_expr_operand(right)?;
        Ok(FilterValue::single(
            "$expr",
            FilterValue::single(sym, FilterValue::List(vec![l, r])),
        ))
    }

    fn emit_expr_operand(&self, e: &Expr) -> Result<FilterValue> {
        match &e.kind {
            ExprKind::JsonPath { path, .. } => Ok(FilterValue::String(format!("${}", self.map_field(path)))),
            ExprKind::Identifier(name) => Ok(FilterValue::String(format!("${}", self.map_field(name)))),
            ExprKind::Literal(lit) => Ok(literal_to_filter(lit)),
            ExprKind::Grouped(inner) => self.emit_expr_operand(inner),
            ExprKind::Binary { op, left, right } => {
                let sym = expr_arith_symbol(*op)?;
                let l = self.emit_expr_operand(left)?;
                let r = self.emit_expr_operand(right)?;
                Ok(FilterValue::single(sym, FilterValue::List(vec![l, r])))
            }
            ExprKind::FunctionCall { name, args } if args.len() == 1 => {
                let operand = self.emit_expr_operand(&args[0])?;
                let mongo_name = match name.as_str() {
                    "lower" => "$toLower",
                    "upper" => "$toUpper",
                    "abs" => "$abs",
                    "len" | "length" => "$strLenCP",
                    "typeOf" => "$type",
                    other => return Err(unsupported(format!("function '{}' inside $expr", other))),
                };
                Ok(FilterValue::single(mongo_name, operand))
            }
            other => Err(unsupported(format!("{:?} is not valid inside $expr", other))),
        }
    }

    fn emit_in(&self, left: &Expr, right: &Expr, negated: bool) -> Result<FilterValue> {
        let name = self.field_name(left)?;
        let items = match &right.kind {
            ExprKind::List(items) => items
                .iter()
                .map(|i| self.literal_value(i))
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(unsupported("IN right-hand side must be a list literal")),
        };
        let key = if negated { "$nin" } else { "$in" };
        Ok(FilterValue::single(&name, FilterValue::single(key, FilterValue::List(items))))
    }

    fn emit_regex(&self, left: &Expr, pattern: &Expr, negated: bool) -> Result<FilterValue> {
        let name = self.field_name(left)?;
        let pattern_str = match pattern.as_literal() {
            Some(Literal::String(s)) => s.clone(),
            _ => return Err(unsupported("regex pattern must be a literal string")),
        };
        let regex_doc = FilterValue::single("$regex", FilterValue::String(pattern_str));
        let inner = if negated {
            FilterValue::single("$not", regex_doc)
        } else {
            regex_doc
        };
        Ok(FilterValue::single(&name, inner))
    }

    fn emit_function_predicate(&self, name: &str, args: &[Expr]) -> Result<FilterValue> {
        match name {
            "isNull" => {
                let field = self.require_one_field(name, args)?;
                Ok(FilterValue::single(&field, FilterValue::Null))
            }
            "isNotNull" => {
                let field = self.require_one_field(name, args)?;
                Ok(FilterValue::single(&field, FilterValue::single("$ne", FilterValue::Null)))
            }
            "exists" => {
                let field = self.require_one_field(name, args)?;
                Ok(FilterValue::single(&field, FilterValue::single("$exists", FilterValue::Bool(true))))
            }
            "contains" | "startsWith" | "endsWith" => {
                if args.len() != 2 {
                    return Err(Error::argument_count(name, "2", args.len()));
                }
                let field = self.field_name(&args[0])?;
                let literal = match args[1].as_literal() {
                    Some(Literal::String(s)) => s.clone(),
                    _ => return Err(unsupported(format!("{} needs a literal string argument", name))),
                };
                let escaped = regex::escape(&literal);
                let pattern = match name {
                    "contains" => escaped,
                    "startsWith" => format!("^{}", escaped),
                    _ => format!("{}$", escaped),
                };
                Ok(FilterValue::single(&field, FilterValue::single("$regex", FilterValue::String(pattern))))
            }
            "len" | "lower" | "upper" | "abs" | "typeOf" => Err(unsupported(format!(
                "'{}' must appear inside a comparison, not standalone",
                name
            ))),
            other => Err(unsupported(format!("function '{}'", other))),
        }
    }

    fn require_one_field(&self, name: &str, args: &[Expr]) -> Result<String> {
        if args.len() != 1 {
            return Err(Error::argument_count(name, "1", args.len()));
        }
        self.field_name(&args[0])
    }

    fn emit_not(&self, inner: &Expr) -> Result<FilterValue> {
        let inner = unwrap_grouped(inner);
        match &inner.kind {
            ExprKind::In {
                left,
                right,
                negated,
            } => self.emit_in(left, right, !negated),
            ExprKind::Regex {
                left,
                pattern,
                negated,
            } => self.emit_regex(left, pattern, !negated),
            ExprKind::Binary { op, left, right }
                if matches!(
                    op,
                    BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
                ) =>
            {
                self.emit_comparison(negate_cmp(*op), left, right)
            }
            ExprKind::FunctionCall { name, args } if name == "isNull" => {
                self.emit_function_predicate("isNotNull", args)
            }
            ExprKind::FunctionCall { name, args } if name == "isNotNull" => {
                self.emit_function_predicate("isNull", args)
            }
            ExprKind::FunctionCall { name, args } if name == "exists" => {
                let field = self.require_one_field("exists", args)?;
                Ok(FilterValue::single(&field, FilterValue::single("$exists", FilterValue::Bool(false))))
            }
            _ => {
                let doc = self.emit(inner)?;
                Ok(FilterValue::single("$nor", FilterValue::List(vec![doc])))
            }
        }
    }
}

fn unwrap_grouped(e: &Expr) -> &Expr {
    match &e.kind {
        ExprKind::Grouped(inner) => unwrap_grouped(inner),
        _ => e,
    }
}

fn mirror(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

fn negate_cmp(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Eq => BinaryOp::NotEq,
        BinaryOp::NotEq => BinaryOp::Eq,
        BinaryOp::Lt => BinaryOp::Ge,
        BinaryOp::Le => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::Le,
        BinaryOp::Ge => BinaryOp::Lt,
        other => other,
    }
}

fn expr_cmp_symbol(op: BinaryOp) -> Result<&'static str> {
    Ok(match op {
        BinaryOp::Eq => "$eq",
        BinaryOp::NotEq => "$ne",
        BinaryOp::Lt => "$lt",
        BinaryOp::Le => "$lte",
        BinaryOp::Gt => "$gt",
        BinaryOp::Ge => "$gte",
        _ => return Err(unsupported("not a comparison operator")),
    })
}

fn expr_arith_symbol(op: BinaryOp) -> Result<&'static str> {
    Ok(match op {
        BinaryOp::Add => "$add",
        BinaryOp::Sub => "$subtract",
        BinaryOp::Mul => "$multiply",
        BinaryOp::Div => "$divide",
        BinaryOp::Mod => "$mod",
        _ => return Err(unsupported("operator not valid inside $expr")),
    })
}

fn literal_to_filter(lit: &Literal) -> FilterValue {
    match lit {
        Literal::Int(n) => FilterValue::Int(*n),
        Literal::Float(f) => FilterValue::Float(*f),
        Literal::String(s) => FilterValue::String(s.clone()),
        Literal::Bool(b) => FilterValue::Bool(*b),
        Literal::Null => FilterValue::Null,
    }
}

fn unsupported(msg: impl Into<String>) -> Error {
    let msg = msg.into();
    tracing::debug!(reason = %msg, "document-query compile rejected expression");
    Error::new(ErrorKind::Unsupported(msg))
}
