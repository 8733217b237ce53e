//! Workflow type definitions for the hookflow engine.
//!
//! Defines the declaration parsed from YAML (workflows, triggers, steps) and
//! the records a run produces (step results, the final decision).

use crate::expression::StepStatus;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A complete workflow declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Failures deny the action when set; otherwise they only warn.
    #[serde(default = "default_blocking")]
    pub blocking: bool,
    #[serde(default)]
    pub on: Triggers,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_blocking() -> bool {
    true
}

/// The `on:` block. Each populated field is one trigger kind; kinds are OR'd.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triggers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<HooksTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolTrigger>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<PushTrigger>,
}

impl Triggers {
    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    /// Names of the declared trigger kinds.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.hooks.is_some() {
            kinds.push("hooks");
        }
        if self.tool.is_some() {
            kinds.push("tool");
        }
        if !self.tools.is_empty() {
            kinds.push("tools");
        }
        if self.file.is_some() {
            kinds.push("file");
        }
        if self.commit.is_some() {
            kinds.push("commit");
        }
        if self.push.is_some() {
            kinds.push("push");
        }
        kinds
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HooksTrigger {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Matches a tool call by name, with optional per-argument globs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolTrigger {
    pub name: String,
    #[serde(default)]
    pub args: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTrigger {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, alias = "paths-ignore", alias = "paths_ignore")]
    pub paths_ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitTrigger {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, alias = "paths-ignore", alias = "paths_ignore")]
    pub paths_ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTrigger {
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default, alias = "branches-ignore", alias = "branches_ignore")]
    pub branches_ignore: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "tags-ignore", alias = "tags_ignore")]
    pub tags_ignore: Vec<String>,
}

/// A single step: a shell command (`run`) or an action reference (`uses`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "if")]
    pub condition: Option<String>,
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default)]
    pub uses: Option<String>,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default, alias = "working-directory", alias = "working_directory")]
    pub working_directory: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default, alias = "continue-on-error", alias = "continue_on_error")]
    pub continue_on_error: bool,
    #[serde(default)]
    pub with: IndexMap<String, String>,
}

impl Step {
    /// The key this step is recorded under: its name, or `step-N` (1-based).
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("step-{}", index + 1),
        }
    }

    /// The `if:` text, or `None` when it is absent or blank.
    pub fn effective_condition(&self) -> Option<&str> {
        self.condition.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// The permission verdict for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[default]
    Allow,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
        }
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Decision::Deny)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }
}

/// Final decision for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub workflow: String,
    pub decision: Decision,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub steps: Vec<StepResult>,
}

impl WorkflowResult {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.is_failed())
    }
}
