// ABOUTME: Optimizer — pure constant-folding pass over the parsed AST
// ABOUTME: (spec §4.3); never mutates its input, may share unchanged nodes.

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::value::Value;

/// Counters returned alongside the optimized tree, useful for diagnostics
/// and benchmarking; not load-bearing for correctness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub visited: usize,
    pub folded: usize,
}

pub struct Optimizer {
    stats: Stats,
}

impl Optimizer {
    pub fn new() -> Self {
        Self {
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Fold `expr` into a new, independent AST. The source tree is left
    /// untouched.
    pub fn optimize(&mut self, expr: &Expr) -> Expr {
        self.stats.visited += 1;
        match &expr.kind {
            ExprKind::Literal(_) => expr.clone(),

            ExprKind::List(items) => {
                let folded: Vec<Expr> = items.iter().map(|i| self.optimize(i)).collect();
                Expr::new(ExprKind::List(folded), expr.token.clone())
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.optimize(operand);
                if let Some(lit) = operand.as_literal() {
                    if let Some(folded) = fold_unary(*op, lit) {
                        self.stats.folded += 1;
                        return Expr::new(ExprKind::Literal(folded), expr.token.clone());
                    }
                }
                Expr::new(
                    ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    expr.token.clone(),
                )
            }

            ExprKind::Binary { op, left, right } => {
                let left = self.optimize(left);
                let right = self.optimize(right);
                if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
                    if let Some(folded) = fold_binary(*op, l, r) {
                        self.stats.folded += 1;
                        return Expr::new(ExprKind::Literal(folded), expr.token.clone());
                    }
                }
                Expr::new(
                    ExprKind::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    expr.token.clone(),
                )
            }

            ExprKind::In {
                left,
                right,
                negated,
            } => {
                let left = self.optimize(left);
                let right = self.optimize(right);
                if let (Some(l), ExprKind::List(items)) = (left.as_literal(), &right.kind) {
                    if items.iter().all(|i| i.is_literal()) {
                        let lv = literal_to_value(l);
                        let found = items.iter().any(|i| {
                            let rv = literal_to_value(i.as_literal().unwrap());
                            lv.values_equal(&rv)
                        });
                        self.stats.folded += 1;
                        return Expr::new(
                            ExprKind::Literal(Literal::Bool(found != *negated)),
                            expr.token.clone(),
                        );
                    }
                }
                Expr::new(
                    ExprKind::In {
                        left: Box::new(left),
                        right: Box::new(right),
                        negated: *negated,
                    },
                    expr.token.clone(),
                )
            }

            ExprKind::Regex {
                left,
                pattern,
                negated,
            } => {
                let left = self.optimize(left);
                let pattern = self.optimize(pattern);
                Expr::new(
                    ExprKind::Regex {
                        left: Box::new(left),
                        pattern: Box::new(pattern),
                        negated: *negated,
                    },
                    expr.token.clone(),
                )
            }

            ExprKind::Grouped(inner) => {
                let inner = self.optimize(inner);
                if inner.is_literal() {
                    self.stats.folded += 1;
                    inner
                } else {
                    Expr::new(ExprKind::Grouped(Box::new(inner)), expr.token.clone())
                }
            }

            ExprKind::FunctionCall { name, args } => {
                let folded_args: Vec<Expr> = args.iter().map(|a| self.optimize(a)).collect();
                Expr::new(
                    ExprKind::FunctionCall {
                        name: name.clone(),
                        args: folded_args,
                    },
                    expr.token.clone(),
                )
            }

            ExprKind::Index { container, index } => {
                let container = self.optimize(container);
                let index = self.optimize(index);
                if let (ExprKind::List(items), Some(Literal::Int(i))) =
                    (&container.kind, index.as_literal())
                {
                    if *i >= 0 && (*i as usize) < items.len() {
                        self.stats.folded += 1;
                        return items[*i as usize].clone();
                    }
                }
                Expr::new(
                    ExprKind::Index {
                        container: Box::new(container),
                        index: Box::new(index),
                    },
                    expr.token.clone(),
                )
            }

            ExprKind::Member { object, property } => {
                let object = self.optimize(object);
                Expr::new(
                    ExprKind::Member {
                        object: Box::new(object),
                        property: property.clone(),
                    },
                    expr.token.clone(),
                )
            }

            ExprKind::Identifier(_) | ExprKind::JsonPath { .. } | ExprKind::Lambda { .. } => {
                expr.clone()
            }
        }
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn fold_unary(op: UnaryOp, operand: &Literal) -> Option<Literal> {
    let v = literal_to_value(operand);
    match op {
        UnaryOp::Not => Some(Literal::Bool(!v.is_truthy())),
        UnaryOp::Neg => match v {
            Value::Int(n) => Some(Literal::Int(-n)),
            Value::Float(n) => Some(Literal::Float(-n)),
            _ => None,
        },
    }
}

fn fold_binary(op: BinaryOp, left: &Literal, right: &Literal) -> Option<Literal> {
    let l = literal_to_value(left);
    let r = literal_to_value(right);

    match op {
        BinaryOp::And => return Some(Literal::Bool(l.is_truthy() && r.is_truthy())),
        BinaryOp::Or => return Some(Literal::Bool(l.is_truthy() || r.is_truthy())),
        BinaryOp::Eq => return Some(Literal::Bool(l.values_equal(&r))),
        BinaryOp::NotEq => return Some(Literal::Bool(!l.values_equal(&r))),
        _ => {}
    }

    if matches!(op, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge) {
        let ordering = l.compare(&r)?;
        let result = match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::Le => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            BinaryOp::Ge => ordering.is_ge(),
            _ => unreachable!(),
        };
        return Some(Literal::Bool(result));
    }

    if op == BinaryOp::Add {
        if let (Value::String(a), Value::String(b)) = (&l, &r) {
            return Some(Literal::String(format!("{}{}", a, b)));
        }
    }

    if matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul) && l.is_numeric() && r.is_numeric() {
        let both_int = matches!(l, Value::Int(_)) && matches!(r, Value::Int(_));
        if both_int {
            let (a, b) = (as_i64(&l), as_i64(&r));
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                _ => unreachable!(),
            };
            return result.map(Literal::Int);
        } else {
            let (a, b) = (l.as_f64().unwrap(), r.as_f64().unwrap());
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ => unreachable!(),
            };
            return Some(Literal::Float(result));
        }
    }

    // Division and modulo by a literal zero are deliberately left unfolded
    // so the evaluator reports DivisionByZero at evaluation time.
    if op == BinaryOp::Div && l.is_numeric() && r.is_numeric() {
        let divisor = r.as_f64().unwrap();
        if divisor == 0.0 {
            return None;
        }
        return Some(Literal::Float(l.as_f64().unwrap() / divisor));
    }

    if op == BinaryOp::Mod {
        if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
            if *b == 0 {
                return None;
            }
            return Some(Literal::Int(a % b));
        }
    }

    None
}

fn as_i64(v: &Value) -> i64 {
    match v {
        Value::Int(n) => *n,
        _ => unreachable!("caller guarantees Int"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn optimize_source(src: &str) -> Expr {
        let ast = parse(src).unwrap();
        Optimizer::new().optimize(&ast)
    }

    #[test]
    fn folds_constant_arithmetic() {
        let expr = optimize_source("1 + 2 * 3");
        assert_eq!(expr.to_string(), "7");
    }

    #[test]
    fn does_not_fold_division_by_literal_zero() {
        let expr = optimize_source("1 / 0");
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Div, .. } => {}
            other => panic!("expected unfolded Div, got {:?}", other),
        }
    }

    #[test]
    fn does_not_fold_modulo_by_literal_zero() {
        let expr = optimize_source("5 % 0");
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Mod, .. } => {}
            other => panic!("expected unfolded Mod, got {:?}", other),
        }
    }

    #[test]
    fn folds_in_over_literal_list() {
        let expr = optimize_source("2 IN [1, 2, 3]");
        assert_eq!(expr.to_string(), "true");
    }

    #[test]
    fn folds_list_index_in_range() {
        let expr = optimize_source("[10, 20, 30][1]");
        assert_eq!(expr.to_string(), "20");
    }

    #[test]
    fn leaves_out_of_range_index_unfolded() {
        let expr = optimize_source("[10, 20][5]");
        match expr.kind {
            ExprKind::Index { .. } => {}
            other => panic!("expected unfolded Index, got {:?}", other),
        }
    }

    #[test]
    fn does_not_evaluate_function_calls_but_folds_their_arguments() {
        let expr = optimize_source("len(1 + 1)");
        match &expr.kind {
            ExprKind::FunctionCall { args, .. } => {
                assert_eq!(args[0].to_string(), "2");
            }
            other => panic!("expected FunctionCall, got {:?}", other),
        }
    }

    #[test]
    fn leaves_identifiers_and_jsonpaths_unfolded() {
        let expr = optimize_source("x + $.y");
        match expr.kind {
            ExprKind::Binary { .. } => {}
            other => panic!("expected unfolded Binary, got {:?}", other),
        }
    }

    #[test]
    fn tracks_stats() {
        let ast = parse("1 + 2").unwrap();
        let mut opt = Optimizer::new();
        let _ = opt.optimize(&ast);
        assert!(opt.stats().visited > 0);
        assert_eq!(opt.stats().folded, 1);
    }
}
