//! # Hookflow Core
//!
//! Core library for hookflow, a local automation engine that gates actions
//! taken by coding agents. For each incoming event it decides which declared
//! workflows apply, runs their steps and returns an allow/deny decision with
//! a human-readable reason.
//!
//! Provides the `${{ }}` expression language, the trigger matcher, the step
//! runner, workflow loading, action resolution and configuration.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod expression;
pub mod trigger;
pub mod workflow;

// Re-export commonly used types at the crate root.
pub use config::{load_config, HookflowConfig};
pub use engine::{Engine, EngineResult, LoadedWorkflow};
pub use error::{HookflowError, Result};
pub use event::{CommitEvent, CommitFile, Event, FileEvent, HookEvent, PushEvent, ToolEvent};
pub use expression::{EvaluationContext, StepStatus, Value};
pub use workflow::{Decision, Workflow, WorkflowResult, WorkflowRunner};
