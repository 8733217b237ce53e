//! Per-run evaluation state: event data, environment, step outcomes and the
//! function tables expressions are resolved against.

use super::functions;
use super::value::Value;
use crate::error::ExpressionError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Outcome of a step as seen by later expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Success,
    Failure,
    Skipped,
    Cancelled,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Success => "success",
            StepStatus::Failure => "failure",
            StepStatus::Skipped => "skipped",
            StepStatus::Cancelled => "cancelled",
        }
    }

    /// Failure and cancellation both count against the run.
    pub fn is_failed(self) -> bool {
        matches!(self, StepStatus::Failure | StepStatus::Cancelled)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record exposed as `steps.<name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Named outputs. Steps do not publish outputs yet, so this stays empty.
    pub outputs: IndexMap<String, String>,
    pub outcome: StepStatus,
}

impl StepOutcome {
    pub fn new(outcome: StepStatus) -> Self {
        Self {
            outputs: IndexMap::new(),
            outcome,
        }
    }

    pub(crate) fn member(&self, name: &str) -> Value {
        match name {
            "outputs" => Value::Map(
                self.outputs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
            "outcome" => Value::String(self.outcome.as_str().to_string()),
            _ => Value::Null,
        }
    }

    /// The `{outputs, outcome}` map view of this record.
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("outputs".to_string(), self.member("outputs"));
        map.insert("outcome".to_string(), self.member("outcome"));
        Value::Map(map)
    }
}

/// A built-in that only sees its arguments.
pub type Function = fn(&[Value]) -> Result<Value, ExpressionError>;

/// A built-in that also inspects the evaluation context (e.g. `success()`).
pub type ContextFunction = fn(&EvaluationContext, &[Value]) -> Result<Value, ExpressionError>;

/// Immutable name → function tables. Context-aware entries take precedence.
#[derive(Clone, Default)]
pub struct FunctionTable {
    plain: HashMap<String, Function>,
    contextual: HashMap<String, ContextFunction>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard built-in set.
    pub fn builtin() -> Self {
        functions::register_builtins(Self::new())
    }

    pub fn with_function(mut self, name: &str, function: Function) -> Self {
        self.plain.insert(name.to_string(), function);
        self
    }

    pub fn with_context_function(mut self, name: &str, function: ContextFunction) -> Self {
        self.contextual.insert(name.to_string(), function);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contextual.contains_key(name) || self.plain.contains_key(name)
    }

    /// Invoke `name`, trying context-aware functions first.
    pub fn call(
        &self,
        name: &str,
        ctx: &EvaluationContext,
        args: &[Value],
    ) -> Result<Value, ExpressionError> {
        if let Some(function) = self.contextual.get(name) {
            return function(ctx, args);
        }
        if let Some(function) = self.plain.get(name) {
            return function(args);
        }
        Err(ExpressionError::UnknownFunction {
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut plain: Vec<&String> = self.plain.keys().collect();
        let mut contextual: Vec<&String> = self.contextual.keys().collect();
        plain.sort();
        contextual.sort();
        f.debug_struct("FunctionTable")
            .field("plain", &plain)
            .field("contextual", &contextual)
            .finish()
    }
}

/// State for resolving expressions during one workflow run.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    event: Value,
    env: IndexMap<String, String>,
    steps: IndexMap<String, StepOutcome>,
    functions: Arc<FunctionTable>,
}

impl EvaluationContext {
    /// Create a context with the built-in function table.
    pub fn new(event: Value, env: IndexMap<String, String>) -> Self {
        Self::with_functions(event, env, Arc::new(FunctionTable::builtin()))
    }

    pub fn with_functions(
        event: Value,
        env: IndexMap<String, String>,
        functions: Arc<FunctionTable>,
    ) -> Self {
        Self {
            event,
            env,
            steps: IndexMap::new(),
            functions,
        }
    }

    pub fn event(&self) -> &Value {
        &self.event
    }

    pub fn env(&self) -> &IndexMap<String, String> {
        &self.env
    }

    pub fn set_env(&mut self, env: IndexMap<String, String>) {
        self.env = env;
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Step outcomes recorded so far, in execution order.
    pub fn steps(&self) -> &IndexMap<String, StepOutcome> {
        &self.steps
    }

    /// Record or overwrite the outcome of a step. A step keeps the position of
    /// its first recording.
    pub fn set_step_status(&mut self, name: &str, status: StepStatus) {
        match self.steps.get_mut(name) {
            Some(entry) => entry.outcome = status,
            None => {
                self.steps
                    .insert(name.to_string(), StepOutcome::new(status));
            }
        }
    }

    pub fn step_status(&self, name: &str) -> Option<StepStatus> {
        self.steps.get(name).map(|s| s.outcome)
    }

    /// True if any recorded step has one of the given outcomes.
    pub fn any_step(&self, statuses: &[StepStatus]) -> bool {
        self.steps.values().any(|s| statuses.contains(&s.outcome))
    }

    /// Resolve one of the root objects (`event`, `env`, `steps`).
    pub fn root(&self, name: &str) -> Option<Value> {
        match name {
            "event" => Some(self.event.clone()),
            "env" => Some(Value::Map(
                self.env
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            )),
            "steps" => Some(Value::Map(
                self.steps
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::Step(v.clone())))
                    .collect(),
            )),
            _ => None,
        }
    }
}
