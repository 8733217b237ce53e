//! The engine: discovered workflows plus a runner, evaluated per event.

use crate::config::HookflowConfig;
use crate::error::{HookflowError, WorkflowError};
use crate::event::Event;
use crate::trigger;
use crate::workflow::{
    discover_workflows, load_workflow, CachedActionResolver, Decision, FileLogSink,
    ShellCommandExecutor, Workflow, WorkflowResult, WorkflowRunner,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A workflow and the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedWorkflow {
    pub path: PathBuf,
    pub workflow: Workflow,
}

/// A workflow file that failed to load.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidWorkflow {
    pub path: PathBuf,
    pub error: String,
}

/// Aggregate verdict across every matching workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    pub decision: Decision,
    pub reason: String,
    pub workflows: Vec<WorkflowResult>,
}

pub struct Engine {
    workspace: PathBuf,
    workflows: Vec<LoadedWorkflow>,
    invalid: Vec<InvalidWorkflow>,
    runner: WorkflowRunner,
}

impl Engine {
    pub fn new(workspace: impl Into<PathBuf>, workflows: Vec<LoadedWorkflow>, runner: WorkflowRunner) -> Self {
        Self {
            workspace: workspace.into(),
            workflows,
            invalid: Vec::new(),
            runner,
        }
    }

    /// Discover and validate the workspace's workflows and build the default
    /// runner from `config`.
    pub fn load(config: &HookflowConfig, workspace: &Path) -> Result<Self, HookflowError> {
        let dir = config.workflow_dir(workspace);
        let mut workflows = Vec::new();
        let mut invalid = Vec::new();
        for path in discover_workflows(&dir)? {
            match load_workflow(&path) {
                Ok(workflow) => {
                    debug!(path = %path.display(), workflow = %workflow.name, "Loaded workflow");
                    workflows.push(LoadedWorkflow { path, workflow });
                }
                Err(e) if config.fail_on_invalid_workflow => {
                    return Err(match e {
                        WorkflowError::Validation { message } => WorkflowError::Validation {
                            message: format!("{}: {message}", path.display()),
                        },
                        other => other,
                    }
                    .into());
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping invalid workflow");
                    invalid.push(InvalidWorkflow {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            dir = %dir.display(),
            loaded = workflows.len(),
            skipped = invalid.len(),
            "Workflows discovered"
        );

        let runner = WorkflowRunner::new(Arc::new(ShellCommandExecutor::new()))
            .with_action_resolver(Arc::new(CachedActionResolver::new(
                workspace,
                config.action_cache_dir(workspace),
            )))
            .with_log_sink(Arc::new(FileLogSink::new(config.log_dir(workspace))))
            .with_default_shell(config.default_shell.clone())
            .with_default_timeout(config.default_step_timeout());

        let mut engine = Self::new(workspace, workflows, runner);
        engine.invalid = invalid;
        Ok(engine)
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn workflows(&self) -> &[LoadedWorkflow] {
        &self.workflows
    }

    /// Files skipped during [`Engine::load`].
    pub fn invalid(&self) -> &[InvalidWorkflow] {
        &self.invalid
    }

    /// Workflows whose triggers select `event`. Runs nothing.
    pub fn matching(&self, event: &Event) -> Vec<&LoadedWorkflow> {
        self.workflows
            .iter()
            .filter(|loaded| trigger::matches(&loaded.workflow.on, event))
            .collect()
    }

    pub async fn evaluate(&self, event: &Event) -> EngineResult {
        self.evaluate_with_cancel(event, CancellationToken::new())
            .await
    }

    /// Run every matching workflow in turn, each in its own context. Denies
    /// if any run denies.
    pub async fn evaluate_with_cancel(&self, event: &Event, cancel: CancellationToken) -> EngineResult {
        let mut event = event.clone();
        if event.cwd.is_empty() {
            event.cwd = self.workspace.display().to_string();
        }
        if event.timestamp.is_empty() {
            event.timestamp = chrono::Utc::now().to_rfc3339();
        }

        let matching = self.matching(&event);
        if matching.is_empty() {
            debug!(kinds = ?event.kinds(), "No workflows matched event");
            return EngineResult {
                decision: Decision::Allow,
                reason: "No workflows matched".to_string(),
                workflows: Vec::new(),
            };
        }

        let mut results = Vec::with_capacity(matching.len());
        for loaded in matching {
            results.push(
                self.runner
                    .run_with_cancel(&loaded.workflow, &event, cancel.clone())
                    .await,
            );
        }
        aggregate(results)
    }
}

fn aggregate(results: Vec<WorkflowResult>) -> EngineResult {
    let denials: Vec<&str> = results
        .iter()
        .filter(|r| r.decision.is_deny())
        .map(|r| r.reason.as_str())
        .collect();
    if denials.is_empty() {
        let reason = format!("{} workflow(s) allowed", results.len());
        return EngineResult {
            decision: Decision::Allow,
            reason,
            workflows: results,
        };
    }
    EngineResult {
        decision: Decision::Deny,
        reason: denials.join("\n\n"),
        workflows: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FileEvent;
    use pretty_assertions::assert_eq;

    const ALLOW: &str = "name: ok\non:\n  file:\n    paths: ['**/*.js']\nsteps:\n  - run: 'true'\n";
    const DENY: &str = "name: guard\non:\n  file:\n    paths: ['**/*.js']\nsteps:\n  - name: refuse\n    run: echo no; exit 1\n";
    const OTHER: &str = "name: push-only\non:\n  push: {}\nsteps:\n  - run: 'true'\n";

    fn write_workspace(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let wf_dir = dir.path().join(".hookflow/workflows");
        std::fs::create_dir_all(&wf_dir).unwrap();
        for (name, text) in files {
            std::fs::write(wf_dir.join(name), text).unwrap();
        }
        dir
    }

    fn js_edit() -> Event {
        Event {
            file: Some(FileEvent {
                path: "src/index.js".into(),
                action: "edit".into(),
                content: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_skips_invalid() {
        let ws = write_workspace(&[("a.yml", ALLOW), ("broken.yml", "name: x\nsteps: []\n")]);
        let engine = Engine::load(&HookflowConfig::default(), ws.path()).unwrap();
        assert_eq!(engine.workflows().len(), 1);
        assert_eq!(engine.invalid().len(), 1);
        assert!(engine.invalid()[0].path.ends_with("broken.yml"));
    }

    #[test]
    fn test_load_strict_fails() {
        let ws = write_workspace(&[("broken.yml", "name: x\nsteps: []\n")]);
        let config = HookflowConfig {
            fail_on_invalid_workflow: true,
            ..Default::default()
        };
        assert!(Engine::load(&config, ws.path()).is_err());
    }

    #[test]
    fn test_matching_is_pure() {
        let ws = write_workspace(&[("a.yml", ALLOW), ("b.yml", OTHER)]);
        let engine = Engine::load(&HookflowConfig::default(), ws.path()).unwrap();
        let names: Vec<&str> = engine
            .matching(&js_edit())
            .iter()
            .map(|l| l.workflow.name.as_str())
            .collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_no_match_allows() {
        let ws = write_workspace(&[("b.yml", OTHER)]);
        let engine = Engine::load(&HookflowConfig::default(), ws.path()).unwrap();
        let result = engine.evaluate(&js_edit()).await;
        assert_eq!(result.decision, Decision::Allow);
        assert_eq!(result.reason, "No workflows matched");
        assert!(result.workflows.is_empty());
    }

    #[tokio::test]
    async fn test_any_deny_denies() {
        let ws = write_workspace(&[("a.yml", ALLOW), ("b.yml", DENY)]);
        let engine = Engine::load(&HookflowConfig::default(), ws.path()).unwrap();
        let result = engine.evaluate(&js_edit()).await;
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.workflows.len(), 2);
        assert!(result.reason.contains("Workflow 'guard' failed"));
        assert!(result.reason.contains("refuse"));
        let log = result.workflows[1].log_file.clone().unwrap();
        assert!(log.starts_with(ws.path().join(".hookflow/logs")));
        assert!(log.exists());
    }
}
