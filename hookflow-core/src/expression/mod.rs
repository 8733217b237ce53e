//! The `${{ }}` expression language.
//!
//! A hand-written tokenizer feeds a recursive-descent evaluator that resolves
//! the `event`, `env` and `steps` roots and built-in functions from an
//! [`EvaluationContext`].

pub mod context;
pub mod evaluator;
pub mod functions;
pub mod interpolate;
pub mod lexer;
pub mod value;

pub use context::{ContextFunction, EvaluationContext, Function, FunctionTable, StepOutcome, StepStatus};
pub use interpolate::{check_condition_syntax, check_syntax, evaluate, evaluate_condition, interpolate};
pub use lexer::{tokenize, Token, TokenKind};
pub use value::Value;
