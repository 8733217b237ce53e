//! Error types for the hookflow core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering the expression language, workflow loading, command execution,
//! action resolution and configuration domains.

use std::path::PathBuf;

/// Top-level error type for the hookflow core library.
#[derive(Debug, thiserror::Error)]
pub enum HookflowError {
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from tokenizing, parsing and evaluating `${{ }}` expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("unexpected character at position {position}")]
    UnexpectedCharacter { position: usize },

    #[error("unterminated string literal starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("{function}() expects {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("'{name}' is not callable")]
    NotCallable { name: String },

    #[error("{function}(): {message}")]
    InvalidArgument { function: String, message: String },

    #[error("unclosed expression starting at byte {offset}: missing '}}}}'")]
    UnclosedInterpolation { offset: usize },
}

/// Errors from loading and validating workflow declarations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Failed to parse workflow: {message}")]
    Parse { message: String },

    #[error("Workflow validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to read workflow file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from running a step's command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to start '{shell}': {message}")]
    Spawn { shell: String, message: String },

    #[error("command exited with status {exit_code}")]
    Failed { exit_code: i32 },

    #[error("command terminated by signal")]
    Terminated,

    #[error("step timed out after {secs} seconds")]
    TimedOut { secs: u64 },

    #[error("step was cancelled")]
    Cancelled,
}

/// Errors from resolving and loading `uses:` actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("invalid action reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("action '{reference}' not found at {path}")]
    NotFound { reference: String, path: PathBuf },

    #[error("no action.yml or action.yaml in {path}")]
    MissingMetadata { path: PathBuf },

    #[error("failed to parse action metadata {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("unsupported action runtime '{using}' (only 'composite' is supported)")]
    UnsupportedRuntime { using: String },

    #[error("missing required input '{input}' for action '{action}'")]
    MissingInput { action: String, input: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration parse error: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// A type alias for results using the top-level `HookflowError`.
pub type Result<T> = std::result::Result<T, HookflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_expression() {
        let err = HookflowError::Expression(ExpressionError::UnknownFunction {
            name: "frobnicate".into(),
        });
        assert_eq!(
            err.to_string(),
            "Expression error: unknown function: frobnicate"
        );
    }

    #[test]
    fn test_lex_error_messages() {
        let err = ExpressionError::UnexpectedCharacter { position: 4 };
        assert_eq!(err.to_string(), "unexpected character at position 4");

        let err = ExpressionError::UnclosedInterpolation { offset: 3 };
        assert_eq!(
            err.to_string(),
            "unclosed expression starting at byte 3: missing '}}'"
        );
    }

    #[test]
    fn test_timeout_message_is_distinct() {
        let err = ExecutionError::TimedOut { secs: 30 };
        assert_eq!(err.to_string(), "step timed out after 30 seconds");
        assert_ne!(
            err.to_string(),
            ExecutionError::Failed { exit_code: 1 }.to_string()
        );
    }

    #[test]
    fn test_action_error_variants() {
        let err = ActionError::UnsupportedRuntime {
            using: "node20".into(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported action runtime 'node20' (only 'composite' is supported)"
        );

        let err = ActionError::MissingInput {
            action: "./lint".into(),
            input: "target".into(),
        };
        assert_eq!(
            err.to_string(),
            "missing required input 'target' for action './lint'"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HookflowError = io_err.into();
        assert!(matches!(err, HookflowError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: HookflowError = serde_err.into();
        assert!(matches!(err, HookflowError::Serialization(_)));
    }
}
