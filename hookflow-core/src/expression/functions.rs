//! Built-in expression functions.
//!
//! String comparisons are case-insensitive throughout. `success()`,
//! `failure()` and `cancelled()` are context-aware: they inspect the step
//! outcomes recorded so far.

use super::context::{EvaluationContext, FunctionTable, StepStatus};
use super::value::Value;
use crate::error::ExpressionError;

pub(crate) fn register_builtins(table: FunctionTable) -> FunctionTable {
    table
        .with_function("contains", contains)
        .with_function("startsWith", starts_with)
        .with_function("endsWith", ends_with)
        .with_function("format", format)
        .with_function("join", join)
        .with_function("toJSON", to_json)
        .with_function("fromJSON", from_json)
        .with_function("always", always)
        .with_context_function("success", success)
        .with_context_function("failure", failure)
        .with_context_function("cancelled", cancelled)
}

fn expect_args(function: &str, args: &[Value], expected: usize) -> Result<(), ExpressionError> {
    if args.len() != expected {
        return Err(ExpressionError::ArgumentCount {
            function: function.to_string(),
            expected: expected.to_string(),
            got: args.len(),
        });
    }
    Ok(())
}

fn contains(args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("contains", args, 2)?;
    let needle = args[1].to_string().to_lowercase();
    let found = match &args[0] {
        Value::String(haystack) => haystack.to_lowercase().contains(&needle),
        Value::List(items) => items
            .iter()
            .any(|item| item.to_string().to_lowercase() == needle),
        _ => false,
    };
    Ok(Value::Bool(found))
}

fn starts_with(args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("startsWith", args, 2)?;
    let subject = args[0].to_string().to_lowercase();
    let prefix = args[1].to_string().to_lowercase();
    Ok(Value::Bool(subject.starts_with(&prefix)))
}

fn ends_with(args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("endsWith", args, 2)?;
    let subject = args[0].to_string().to_lowercase();
    let suffix = args[1].to_string().to_lowercase();
    Ok(Value::Bool(subject.ends_with(&suffix)))
}

/// `format('{0} and {1}', a, b)`
fn format(args: &[Value]) -> Result<Value, ExpressionError> {
    let Some((template, rest)) = args.split_first() else {
        return Err(ExpressionError::ArgumentCount {
            function: "format".into(),
            expected: "at least 1".into(),
            got: 0,
        });
    };
    // One left-to-right pass, so argument text is never re-substituted.
    let template = template.to_string();
    let mut result = String::with_capacity(template.len());
    let mut remaining = template.as_str();
    while let Some(open) = remaining.find('{') {
        result.push_str(&remaining[..open]);
        let after = &remaining[open + 1..];
        let placeholder = after.find('}').and_then(|close| {
            let arg = after[..close].parse::<usize>().ok().and_then(|i| rest.get(i))?;
            Some((arg, close))
        });
        match placeholder {
            Some((arg, close)) => {
                result.push_str(&arg.to_string());
                remaining = &after[close + 1..];
            }
            None => {
                result.push('{');
                remaining = after;
            }
        }
    }
    result.push_str(remaining);
    Ok(Value::String(result))
}

fn join(args: &[Value]) -> Result<Value, ExpressionError> {
    if args.is_empty() || args.len() > 2 {
        return Err(ExpressionError::ArgumentCount {
            function: "join".into(),
            expected: "1 or 2".into(),
            got: args.len(),
        });
    }
    let separator = args.get(1).map(Value::to_string).unwrap_or_else(|| ",".into());
    let joined = match &args[0] {
        Value::List(items) => items
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(&separator),
        other => other.to_string(),
    };
    Ok(Value::String(joined))
}

fn to_json(args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("toJSON", args, 1)?;
    Ok(Value::String(args[0].to_json().to_string()))
}

fn from_json(args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("fromJSON", args, 1)?;
    let text = args[0].to_string();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(Value::from)
        .map_err(|e| ExpressionError::InvalidArgument {
            function: "fromJSON".into(),
            message: e.to_string(),
        })
}

fn always(args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("always", args, 0)?;
    Ok(Value::Bool(true))
}

fn success(ctx: &EvaluationContext, args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("success", args, 0)?;
    Ok(Value::Bool(
        !ctx.any_step(&[StepStatus::Failure, StepStatus::Cancelled]),
    ))
}

fn failure(ctx: &EvaluationContext, args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("failure", args, 0)?;
    Ok(Value::Bool(ctx.any_step(&[StepStatus::Failure])))
}

fn cancelled(ctx: &EvaluationContext, args: &[Value]) -> Result<Value, ExpressionError> {
    expect_args("cancelled", args, 0)?;
    Ok(Value::Bool(ctx.any_step(&[StepStatus::Cancelled])))
}
