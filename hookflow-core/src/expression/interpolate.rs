//! `${{ expr }}` substitution inside string-valued workflow fields, and
//! condition evaluation for step `if:` clauses.

use super::context::EvaluationContext;
use super::evaluator;
use super::lexer::tokenize;
use super::value::Value;
use crate::error::ExpressionError;

const OPEN: &str = "${{";
const CLOSE: &str = "}}";

/// Tokenize and evaluate a bare expression.
pub fn evaluate(expression: &str, ctx: &EvaluationContext) -> Result<Value, ExpressionError> {
    let tokens = tokenize(expression)?;
    evaluator::evaluate(&tokens, ctx)
}

/// Replace every `${{ expr }}` in `template` with the stringified result.
pub fn interpolate(template: &str, ctx: &EvaluationContext) -> Result<String, ExpressionError> {
    let mut result = String::with_capacity(template.len());
    for segment in segments(template) {
        match segment? {
            Segment::Text(text) => result.push_str(text),
            Segment::Expression(expr) => result.push_str(&evaluate(expr, ctx)?.to_string()),
        }
    }
    Ok(result)
}

/// Evaluate a step condition. The `${{ }}` wrapper is optional; a condition
/// that mixes literal text with embedded expressions is interpolated and the
/// resulting string's truthiness is used.
pub fn evaluate_condition(condition: &str, ctx: &EvaluationContext) -> Result<bool, ExpressionError> {
    let trimmed = condition.trim();
    if let Some(inner) = wrapped_expression(trimmed) {
        return Ok(evaluate(inner, ctx)?.to_bool());
    }
    if trimmed.contains(OPEN) {
        return Ok(Value::String(interpolate(trimmed, ctx)?).to_bool());
    }
    Ok(evaluate(trimmed, ctx)?.to_bool())
}

/// Lex every embedded expression without evaluating it. Used to reject
/// malformed workflows at load time.
pub fn check_syntax(template: &str) -> Result<(), ExpressionError> {
    for segment in segments(template) {
        if let Segment::Expression(expr) = segment? {
            tokenize(expr)?;
        }
    }
    Ok(())
}

/// Lex a condition, with or without its wrapper.
pub fn check_condition_syntax(condition: &str) -> Result<(), ExpressionError> {
    let trimmed = condition.trim();
    match wrapped_expression(trimmed) {
        Some(inner) => tokenize(inner).map(|_| ()),
        None if trimmed.contains(OPEN) => check_syntax(trimmed),
        None => tokenize(trimmed).map(|_| ()),
    }
}

/// The inner text if `text` is exactly one `${{ ... }}` block.
fn wrapped_expression(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains(CLOSE) {
        return None;
    }
    Some(inner)
}

enum Segment<'a> {
    Text(&'a str),
    Expression(&'a str),
}

fn segments(template: &str) -> impl Iterator<Item = Result<Segment<'_>, ExpressionError>> {
    let mut offset = 0;
    let mut pending_expression: Option<&str> = None;
    let mut failed = false;
    std::iter::from_fn(move || {
        if failed {
            return None;
        }
        if let Some(expr) = pending_expression.take() {
            return Some(Ok(Segment::Expression(expr)));
        }
        if offset >= template.len() {
            return None;
        }
        let rest = &template[offset..];
        let Some(start) = rest.find(OPEN) else {
            offset = template.len();
            return Some(Ok(Segment::Text(rest)));
        };
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            failed = true;
            return Some(Err(ExpressionError::UnclosedInterpolation {
                offset: offset + start,
            }));
        };
        pending_expression = Some(after_open[..end].trim());
        offset += start + OPEN.len() + end + CLOSE.len();
        Some(Ok(Segment::Text(&rest[..start])))
    })
}
