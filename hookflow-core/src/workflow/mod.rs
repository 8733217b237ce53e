//! Workflow declarations and their execution.
//!
//! Workflows are YAML files declaring triggers and ordered steps. Steps run a
//! shell command or a composite action; their `${{ }}` expressions are
//! resolved against the event and the outcomes of earlier steps.

pub mod action;
pub mod parser;
pub mod report;
pub mod runner;
pub mod shell;
pub mod types;

pub use action::{ActionMetadata, ActionReference, ActionResolver, CachedActionResolver};
pub use parser::{discover_workflows, load_workflow, parse_workflow, validate_workflow};
pub use report::{render_denial_reason, render_run_log, FileLogSink, LogSink};
pub use runner::WorkflowRunner;
pub use shell::{CommandExecutor, CommandOutput, CommandRequest, ShellCommandExecutor};
pub use types::{
    CommitTrigger, Decision, FileTrigger, HooksTrigger, PushTrigger, Step, StepResult,
    ToolTrigger, Triggers, Workflow, WorkflowResult,
};
