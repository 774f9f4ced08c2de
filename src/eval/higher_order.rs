//! Higher-order array forms: map, filter, reduce, find, some, every
//! (spec §4.7). Dispatched by name *before* generic registry lookup,
//! because their second argument is a Lambda (or lambda-shaped expression)
//! rather than a pre-evaluated Value.

use super::{EvalContext, Evaluator};
use crate::ast::{Expr, ExprKind};
use crate::error::{Error, Result};
use crate::value::Value;

/// Returns `Some(result)` if `name` names a higher-order form, `None`
/// otherwise (the caller should fall back to generic function dispatch).
pub fn dispatch(
    evaluator: &Evaluator,
    name: &str,
    args: &[Expr],
    ctx: &mut EvalContext,
) -> Option<Result<Value>> {
    match name {
        "map" => Some(do_map(evaluator, args, ctx)),
        "filter" => Some(do_filter(evaluator, args, ctx)),
        "reduce" => Some(do_reduce(evaluator, args, ctx)),
        "find" => Some(do_find(evaluator, args, ctx)),
        "some" => Some(do_some(evaluator, args, ctx)),
        "every" => Some(do_every(evaluator, args, ctx)),
        _ => None,
    }
}

fn eval_list(evaluator: &Evaluator, args: &[Expr], name: &str, ctx: &mut EvalContext) -> Result<Vec<Value>> {
    match evaluator.evaluate(&args[0], ctx)? {
        Value::List(items) => Ok(items),
        other => Err(Error::type_mismatch(name, "List", other.type_name(), 0)),
    }
}

/// Extracts `(param names, body)` for a callable at `args[idx]`. If it's a
/// Lambda node its own params/body are used (arity-checked); otherwise the
/// expression itself is the body, `default_params` names the implicit
/// parameters, and subsequent String-literal arguments may override them.
fn extract_callable(
    evaluator: &Evaluator,
    args: &[Expr],
    idx: usize,
    default_params: &[&str],
    name: &str,
    ctx: &mut EvalContext,
) -> Result<(Vec<String>, Expr)> {
    match &args[idx].kind {
        ExprKind::Lambda { params, body } => {
            if params.len() != default_params.len() {
                return Err(Error::argument_count(
                    name,
                    format!("a {}-parameter lambda", default_params.len()),
                    params.len(),
                ));
            }
            Ok((params.clone(), (**body).clone()))
        }
        _ => {
            let mut names: Vec<String> = default_params.iter().map(|s| s.to_string()).collect();
            for (i, extra) in args[idx + 1..].iter().enumerate() {
                if i >= names.len() {
                    break;
                }
                match evaluator.evaluate(extra, ctx)? {
                    Value::String(s) => names[i] = s,
                    other => {
                        return Err(Error::type_mismatch(name, "String", other.type_name(), idx + 1 + i))
                    }
                }
            }
            Ok((names, args[idx].clone()))
        }
    }
}

fn save(ctx: &EvalContext, name: &str) -> Option<Value> {
    ctx.variables.get(name).cloned()
}

fn restore(ctx: &mut EvalContext, name: &str, previous: Option<Value>) {
    match previous {
        Some(v) => {
            ctx.variables.insert(name.to_string(), v);
        }
        None => {
            ctx.variables.remove(name);
        }
    }
}

fn do_map(evaluator: &Evaluator, args: &[Expr], ctx: &mut EvalContext) -> Result<Value> {
    if args.len() < 2 || args.len() > 3 {
        return Err(Error::argument_count("map", "2-3", args.len()));
    }
    let list = eval_list(evaluator, args, "map", ctx)?;
    let (params, body) = extract_callable(evaluator, args, 1, &["x"], "map", ctx)?;
    let param = params[0].clone();
    let previous = save(ctx, &param);
    let mut out = Vec::with_capacity(list.len());
    let result = (|| -> Result<()> {
        for item in list {
            ctx.variables.insert(param.clone(), item);
            out.push(evaluator.evaluate(&body, ctx)?);
        }
        Ok(())
    })();
    restore(ctx, &param, previous);
    result?;
    Ok(Value::List(out))
}

fn do_filter(evaluator: &Evaluator, args: &[Expr], ctx: &mut EvalContext) -> Result<Value> {
    if args.len() < 2 || args.len() > 3 {
        return Err(Error::argument_count("filter", "2-3", args.len()));
    }
    let list = eval_list(evaluator, args, "filter", ctx)?;
    let (params, body) = extract_callable(evaluator, args, 1, &["x"], "filter", ctx)?;
    let param = params[0].clone();
    let previous = save(ctx, &param);
    let mut out = Vec::new();
    let result = (|| -> Result<()> {
        for item in list {
            ctx.variables.insert(param.clone(), item.clone());
            if evaluator.evaluate(&body, ctx)?.is_truthy() {
                out.push(item);
            }
        }
        Ok(())
    })();
    restore(ctx, &param, previous);
    result?;
    Ok(Value::List(out))
}

fn do_reduce(evaluator: &Evaluator, args: &[Expr], ctx: &mut EvalContext) -> Result<Value> {
    if args.len() < 3 || args.len() > 5 {
        return Err(Error::argument_count("reduce", "3-5", args.len()));
    }
    let list = eval_list(evaluator, args, "reduce", ctx)?;
    let mut acc = evaluator.evaluate(&args[1], ctx)?;
    let (params, body) = extract_callable(evaluator, args, 2, &["acc", "x"], "reduce", ctx)?;
    let acc_name = params[0].clone();
    let elem_name = params[1].clone();
    let prev_acc = save(ctx, &acc_name);
    let prev_elem = save(ctx, &elem_name);
    let result = (|| -> Result<Value> {
        for item in list {
            ctx.variables.insert(acc_name.clone(), acc);
            ctx.variables.insert(elem_name.clone(), item);
            acc = evaluator.evaluate(&body, ctx)?;
        }
        Ok(acc)
    })();
    restore(ctx, &acc_name, prev_acc);
    restore(ctx, &elem_name, prev_elem);
    result
}

fn do_find(evaluator: &Evaluator, args: &[Expr], ctx: &mut EvalContext) -> Result<Value> {
    if args.len() < 2 || args.len() > 3 {
        return Err(Error::argument_count("find", "2-3", args.len()));
    }
    let list = eval_list(evaluator, args, "find", ctx)?;
    let (params, body) = extract_callable(evaluator, args, 1, &["x"], "find", ctx)?;
    let param = params[0].clone();
    let previous = save(ctx, &param);
    let mut found = Value::Null;
    let result = (|| -> Result<()> {
        for item in list {
            ctx.variables.insert(param.clone(), item.clone());
            if evaluator.evaluate(&body, ctx)?.is_truthy() {
                found = item;
                break;
            }
        }
        Ok(())
    })();
    restore(ctx, &param, previous);
    result?;
    Ok(found)
}

fn do_some(evaluator: &Evaluator, args: &[Expr], ctx: &mut EvalContext) -> Result<Value> {
    if args.len() < 2 || args.len() > 3 {
        return Err(Error::argument_count("some", "2-3", args.len()));
    }
    let list = eval_list(evaluator, args, "some", ctx)?;
    let (params, body) = extract_callable(evaluator, args, 1, &["x"], "some", ctx)?;
    let param = params[0].clone();
    let previous = save(ctx, &param);
    let mut any = false;
    let result = (|| -> Result<()> {
        for item in list {
            ctx.variables.insert(param.clone(), item);
            if evaluator.evaluate(&body, ctx)?.is_truthy() {
                any = true;
                break;
            }
        }
        Ok(())
    })();
    restore(ctx, &param, previous);
    result?;
    Ok(Value::Bool(any))
}

fn do_every(evaluator: &Evaluator, args: &[Expr], ctx: &mut EvalContext) -> Result<Value> {
    if args.len() < 2 || args.len() > 3 {
        return Err(Error::argument_count("every", "2-3", args.len()));
    }
    let list = eval_list(evaluator, args, "every", ctx)?;
    let (params, body) = extract_callable(evaluator, args, 1, &["x"], "every", ctx)?;
    let param = params[0].clone();
    let previous = save(ctx, &param);
    let mut all = true;
    let result = (|| -> Result<()> {
        for item in list {
            ctx.variables.insert(param.clone(), item);
            if !evaluator.evaluate(&body, ctx)?.is_truthy() {
                all = false;
                break;
            }
        }
        Ok(())
    })();
    restore(ctx, &param, previous);
    result?;
    Ok(Value::Bool(all))
}
