//! Workflow runner: executes a workflow's steps in order and turns their
//! outcomes into an allow/deny decision.
//!
//! Per step the runner records `pending`, evaluates the `if:` condition,
//! applies the skip-after-failure rule, executes through the
//! [`CommandExecutor`] and writes the final outcome back into the
//! [`EvaluationContext`] so later conditions can see it.

use crate::error::{ActionError, ExecutionError};
use crate::event::Event;
use crate::expression::{evaluate_condition, interpolate, EvaluationContext, FunctionTable, StepStatus};
use crate::workflow::action::{ActionMetadata, ActionReference, ActionResolver};
use crate::workflow::report::{render_denial_reason, render_run_log, LogSink};
use crate::workflow::shell::{CommandExecutor, CommandOutput, CommandRequest};
use crate::workflow::types::{Decision, Step, StepResult, Workflow, WorkflowResult};
use chrono::Utc;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SKIPPED_CONDITION: &str = "Skipped (condition not met)";
pub const SKIPPED_PREVIOUS_FAILED: &str = "Skipped (previous step failed)";
pub const SKIPPED_CANCELLED: &str = "Skipped (run cancelled)";

/// Extra time given to an executor past the step timeout before the runner
/// stops waiting on it.
const EXECUTOR_GRACE: Duration = Duration::from_secs(1);

/// Environment variable pointing composite steps at their action directory.
pub const ACTION_PATH_VAR: &str = "HOOKFLOW_ACTION_PATH";

/// Runs workflows against events.
pub struct WorkflowRunner {
    executor: Arc<dyn CommandExecutor>,
    resolver: Option<Arc<dyn ActionResolver>>,
    log_sink: Option<Arc<dyn LogSink>>,
    functions: Arc<FunctionTable>,
    default_shell: String,
    default_timeout: Option<Duration>,
}

/// Outcome of executing one step body.
struct StepRun {
    status: StepStatus,
    output: String,
    error: Option<String>,
}

impl StepRun {
    fn failed(output: impl Into<String>, error: impl ToString) -> Self {
        Self {
            status: StepStatus::Failure,
            output: output.into(),
            error: Some(error.to_string()),
        }
    }

    fn from_command(out: CommandOutput) -> Self {
        let status = match (out.success, &out.error) {
            (true, _) => StepStatus::Success,
            (false, Some(ExecutionError::Cancelled)) => StepStatus::Cancelled,
            (false, _) => StepStatus::Failure,
        };
        Self {
            status,
            output: out.output,
            error: out.error.map(|e| e.to_string()),
        }
    }
}

impl WorkflowRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            resolver: None,
            log_sink: None,
            functions: Arc::new(FunctionTable::builtin()),
            default_shell: "sh".to_string(),
            default_timeout: None,
        }
    }

    pub fn with_action_resolver(mut self, resolver: Arc<dyn ActionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn with_functions(mut self, functions: Arc<FunctionTable>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_default_shell(mut self, shell: impl Into<String>) -> Self {
        self.default_shell = shell.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run `workflow` for `event` to completion.
    pub async fn run(&self, workflow: &Workflow, event: &Event) -> WorkflowResult {
        self.run_with_cancel(workflow, event, CancellationToken::new())
            .await
    }

    /// Run `workflow` for `event`. When `cancel` fires, the executing step is
    /// stopped and every remaining step is recorded as cancelled.
    pub async fn run_with_cancel(
        &self,
        workflow: &Workflow,
        event: &Event,
        cancel: CancellationToken,
    ) -> WorkflowResult {
        let started_at = Utc::now();
        info!(
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            blocking = workflow.blocking,
            "Running workflow"
        );

        let mut ctx =
            EvaluationContext::with_functions(event.to_value(), IndexMap::new(), self.functions.clone());
        let env = resolve_workflow_env(workflow, &mut ctx);
        ctx.set_env(env);

        let mut previous_failed = false;
        let mut results = Vec::with_capacity(workflow.steps.len());

        for (idx, step) in workflow.steps.iter().enumerate() {
            let name = step.display_name(idx);
            let started = Instant::now();

            if cancel.is_cancelled() {
                debug!(workflow = %workflow.name, step = %name, "Run cancelled, not starting step");
                ctx.set_step_status(&name, StepStatus::Cancelled);
                results.push(StepResult {
                    name,
                    status: StepStatus::Cancelled,
                    output: SKIPPED_CANCELLED.to_string(),
                    error: Some(ExecutionError::Cancelled.to_string()),
                    duration_ms: 0,
                });
                continue;
            }

            ctx.set_step_status(&name, StepStatus::Pending);

            if let Some(condition) = step.effective_condition() {
                match evaluate_condition(condition, &ctx) {
                    Err(e) => {
                        warn!(workflow = %workflow.name, step = %name, error = %e, "Step condition failed to evaluate");
                        ctx.set_step_status(&name, StepStatus::Failure);
                        if !step.continue_on_error {
                            previous_failed = true;
                        }
                        results.push(StepResult {
                            name,
                            status: StepStatus::Failure,
                            output: String::new(),
                            error: Some(format!("condition evaluation failed: {e}")),
                            duration_ms: elapsed_ms(started),
                        });
                        continue;
                    }
                    Ok(false) => {
                        debug!(workflow = %workflow.name, step = %name, "Condition not met, skipping step");
                        ctx.set_step_status(&name, StepStatus::Success);
                        results.push(StepResult {
                            name,
                            status: StepStatus::Success,
                            output: SKIPPED_CONDITION.to_string(),
                            error: None,
                            duration_ms: elapsed_ms(started),
                        });
                        continue;
                    }
                    Ok(true) => {}
                }
            }

            // Textual check on the raw condition, not on what it evaluates to.
            let bypasses_failure = step
                .effective_condition()
                .is_some_and(|c| c.contains("always()"));
            if previous_failed && !bypasses_failure {
                debug!(workflow = %workflow.name, step = %name, "Previous step failed, skipping step");
                ctx.set_step_status(&name, StepStatus::Failure);
                results.push(StepResult {
                    name,
                    status: StepStatus::Failure,
                    output: SKIPPED_PREVIOUS_FAILED.to_string(),
                    error: None,
                    duration_ms: 0,
                });
                continue;
            }

            debug!(workflow = %workflow.name, step = %name, "Executing step");
            let run = self.execute_step(step, &name, &ctx, event, &cancel).await;
            ctx.set_step_status(&name, run.status);
            if run.status.is_failed() && !step.continue_on_error {
                previous_failed = true;
            }
            debug!(
                workflow = %workflow.name,
                step = %name,
                status = %run.status,
                "Step finished"
            );
            results.push(StepResult {
                name,
                status: run.status,
                output: run.output,
                error: run.error,
                duration_ms: elapsed_ms(started),
            });
        }

        let failed: Vec<&str> = results
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.name.as_str())
            .collect();

        if failed.is_empty() {
            info!(workflow = %workflow.name, decision = "allow", "Workflow completed");
            return WorkflowResult {
                workflow: workflow.name.clone(),
                decision: Decision::Allow,
                reason: format!("Workflow '{}' completed successfully", workflow.name),
                log_file: None,
                steps: results,
            };
        }

        if !workflow.blocking {
            warn!(
                workflow = %workflow.name,
                failed_steps = %failed.join(", "),
                "Workflow failed in non-blocking mode, allowing"
            );
            let reason = format!(
                "Workflow '{}' had failing steps (non-blocking): {}",
                workflow.name,
                failed.join(", ")
            );
            return WorkflowResult {
                workflow: workflow.name.clone(),
                decision: Decision::Allow,
                reason,
                log_file: None,
                steps: results,
            };
        }

        let log_file = match &self.log_sink {
            Some(sink) => {
                let log = render_run_log(workflow, &results, started_at);
                match sink.write(&workflow.name, &log).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(workflow = %workflow.name, error = %e, "Failed to write run log");
                        None
                    }
                }
            }
            None => None,
        };
        let reason = render_denial_reason(&workflow.name, &results, log_file.as_deref());
        info!(
            workflow = %workflow.name,
            decision = "deny",
            failed_steps = %failed.join(", "),
            "Workflow denied"
        );
        WorkflowResult {
            workflow: workflow.name.clone(),
            decision: Decision::Deny,
            reason,
            log_file,
            steps: results,
        }
    }

    async fn execute_step(
        &self,
        step: &Step,
        name: &str,
        ctx: &EvaluationContext,
        event: &Event,
        cancel: &CancellationToken,
    ) -> StepRun {
        let mut env = ctx.env().clone();
        for (key, value) in &step.env {
            match interpolate(value, ctx) {
                Ok(value) => {
                    env.insert(key.clone(), value);
                }
                Err(e) => return StepRun::failed("", format!("env.{key}: {e}")),
            }
        }

        let working_dir = match &step.working_directory {
            Some(dir) => match interpolate(dir, ctx) {
                Ok(dir) => Some(resolve_dir(&event.cwd, &dir)),
                Err(e) => return StepRun::failed("", format!("working directory: {e}")),
            },
            None if !event.cwd.is_empty() => Some(PathBuf::from(&event.cwd)),
            None => None,
        };

        let timeout = step
            .timeout
            .map(Duration::from_secs)
            .or(self.default_timeout);
        let shell = step
            .shell
            .clone()
            .unwrap_or_else(|| self.default_shell.clone());

        if let Some(uses) = &step.uses {
            let base = CommandRequest {
                shell,
                command: String::new(),
                working_dir,
                env,
                timeout,
            };
            return self.run_action(uses, step, name, ctx, base, cancel).await;
        }

        let Some(run) = &step.run else {
            return StepRun::failed("", "step declares neither 'run' nor 'uses'");
        };
        let command = match interpolate(run, ctx) {
            Ok(command) => command,
            Err(e) => return StepRun::failed("", e),
        };

        let request = CommandRequest {
            shell,
            command,
            working_dir,
            env,
            timeout,
        };
        StepRun::from_command(self.invoke(request, cancel).await)
    }

    /// Run a composite action's steps in order; the first failure stops it.
    async fn run_action(
        &self,
        uses: &str,
        step: &Step,
        name: &str,
        ctx: &EvaluationContext,
        base: CommandRequest,
        cancel: &CancellationToken,
    ) -> StepRun {
        let prepared = self.prepare_action(uses, step, name);
        let (dir, metadata, inputs) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(step = %name, uses = %uses, error = %e, "Action could not be prepared");
                return StepRun::failed("", e);
            }
        };

        let deadline = base.timeout.map(|t| Instant::now() + t);
        let mut outputs = Vec::new();
        for (idx, composite) in metadata.runs.steps.iter().enumerate() {
            let command = match interpolate(&composite.run, ctx) {
                Ok(command) => command,
                Err(e) => return StepRun::failed(outputs.join("\n"), format!("action step {}: {e}", idx + 1)),
            };
            let mut env = base.env.clone();
            env.extend(inputs.clone());
            env.insert(ACTION_PATH_VAR.to_string(), dir.display().to_string());
            for (key, value) in &composite.env {
                match interpolate(value, ctx) {
                    Ok(value) => {
                        env.insert(key.clone(), value);
                    }
                    Err(e) => return StepRun::failed(outputs.join("\n"), format!("env.{key}: {e}")),
                }
            }
            let working_dir = match (&composite.working_directory, &base.working_dir) {
                (Some(sub), Some(parent)) => Some(parent.join(sub)),
                (Some(sub), None) => Some(PathBuf::from(sub)),
                (None, parent) => parent.clone(),
            };
            let timeout = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        let secs = base.timeout.map(|t| t.as_secs()).unwrap_or_default();
                        return StepRun::failed(outputs.join("\n"), ExecutionError::TimedOut { secs });
                    }
                    Some(remaining)
                }
                None => None,
            };
            let request = CommandRequest {
                shell: composite.shell.clone().unwrap_or_else(|| base.shell.clone()),
                command,
                working_dir,
                env,
                timeout,
            };
            let mut out = self.invoke(request, cancel).await;
            if let Some(ExecutionError::TimedOut { .. }) = out.error {
                out.error = Some(ExecutionError::TimedOut {
                    secs: base.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                });
            }
            if !out.output.is_empty() {
                outputs.push(out.output.clone());
            }
            if !out.success {
                let mut run = StepRun::from_command(out);
                run.output = outputs.join("\n");
                return run;
            }
        }

        StepRun {
            status: StepStatus::Success,
            output: outputs.join("\n"),
            error: None,
        }
    }

    fn prepare_action(
        &self,
        uses: &str,
        step: &Step,
        name: &str,
    ) -> Result<(PathBuf, ActionMetadata, IndexMap<String, String>), ActionError> {
        let reference = ActionReference::parse(uses)?;
        let Some(resolver) = &self.resolver else {
            return Err(ActionError::NotFound {
                reference: reference.to_string(),
                path: PathBuf::new(),
            });
        };
        let dir = resolver.resolve(&reference)?;
        let metadata = ActionMetadata::load(&dir)?;
        metadata.ensure_supported()?;
        let action = if metadata.name.is_empty() {
            name.to_string()
        } else {
            metadata.name.clone()
        };
        let inputs = metadata.input_env(&action, &step.with)?;
        Ok((dir, metadata, inputs))
    }

    /// Call the executor inside the step's waiting window.
    async fn invoke(&self, request: CommandRequest, cancel: &CancellationToken) -> CommandOutput {
        let Some(limit) = request.timeout else {
            return self.executor.execute(request, cancel.clone()).await;
        };
        let window = limit + EXECUTOR_GRACE;
        match tokio::time::timeout(window, self.executor.execute(request, cancel.clone())).await {
            Ok(out) => out,
            Err(_) => CommandOutput::failed(
                String::new(),
                ExecutionError::TimedOut {
                    secs: limit.as_secs(),
                },
            ),
        }
    }
}

/// Interpolate workflow-level env once, in declaration order; later entries
/// can reference earlier ones. A failing value keeps its raw text.
fn resolve_workflow_env(workflow: &Workflow, ctx: &mut EvaluationContext) -> IndexMap<String, String> {
    let mut env = IndexMap::new();
    for (key, raw) in &workflow.env {
        let value = match interpolate(raw, ctx) {
            Ok(value) => value,
            Err(e) => {
                warn!(workflow = %workflow.name, key = %key, error = %e, "Could not interpolate workflow env value");
                raw.clone()
            }
        };
        env.insert(key.clone(), value);
        ctx.set_env(env.clone());
    }
    env
}

fn resolve_dir(cwd: &str, dir: &str) -> PathBuf {
    let path = Path::new(dir);
    if path.is_absolute() || cwd.is_empty() {
        path.to_path_buf()
    } else {
        Path::new(cwd).join(path)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{FileEvent, ToolEvent};
    use crate::workflow::action::CachedActionResolver;
    use crate::workflow::parser::parse_workflow;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Records every request. Commands containing `fail` exit 1, `hang`
    /// waits for cancellation, anything else echoes the command.
    #[derive(Default)]
    struct MockExecutor {
        requests: Mutex<Vec<CommandRequest>>,
    }

    impl MockExecutor {
        fn commands(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.command.clone())
                .collect()
        }

        fn requests(&self) -> Vec<CommandRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn execute(&self, request: CommandRequest, cancel: CancellationToken) -> CommandOutput {
            let command = request.command.clone();
            self.requests.lock().unwrap().push(request);
            if command.contains("hang") {
                cancel.cancelled().await;
                return CommandOutput::failed("partial", ExecutionError::Cancelled);
            }
            if command.contains("stall") {
                std::future::pending::<()>().await;
            }
            if command.contains("fail") {
                return CommandOutput::failed("boom", ExecutionError::Failed { exit_code: 1 });
            }
            CommandOutput::succeeded(command)
        }
    }

    #[derive(Default)]
    struct MemorySink {
        logs: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl LogSink for MemorySink {
        async fn write(&self, workflow: &str, content: &str) -> std::io::Result<PathBuf> {
            self.logs
                .lock()
                .unwrap()
                .push((workflow.to_string(), content.to_string()));
            Ok(PathBuf::from(format!("/logs/{workflow}.log")))
        }
    }

    fn workflow(steps: &str) -> Workflow {
        parse_workflow(&format!("name: wf\non:\n  push: {{}}\nsteps:\n{steps}")).unwrap()
    }

    fn runner(executor: &Arc<MockExecutor>) -> WorkflowRunner {
        WorkflowRunner::new(executor.clone())
    }

    fn file_event() -> Event {
        Event {
            file: Some(FileEvent {
                path: "src/index.js".into(),
                action: "edit".into(),
                content: None,
            }),
            cwd: "/repo".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow("  - name: a\n    run: echo a\n  - name: b\n    run: echo b\n");
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.decision, Decision::Allow);
        assert_eq!(exec.commands(), vec!["echo a", "echo b"]);
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Success));
    }

    #[tokio::test]
    async fn test_failure_skips_following_steps() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow("  - name: first\n    run: fail\n  - name: second\n    run: echo 2\n");
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.steps[0].status, StepStatus::Failure);
        assert_eq!(result.steps[1].status, StepStatus::Failure);
        assert_eq!(result.steps[1].output, "Skipped (previous step failed)");
        assert_eq!(result.steps[1].error, None);
        assert_eq!(exec.commands(), vec!["fail"]);
    }

    #[tokio::test]
    async fn test_continue_on_error_lets_next_step_run() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: first\n    run: fail\n    continue-on-error: true\n  - name: second\n    run: echo 2\n",
        );
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.steps[0].status, StepStatus::Failure);
        assert_eq!(result.steps[1].status, StepStatus::Success);
        assert_eq!(exec.commands(), vec!["fail", "echo 2"]);
    }

    #[tokio::test]
    async fn test_always_bypasses_skip() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: first\n    run: fail\n  - name: cleanup\n    if: ${{ always() }}\n    run: echo cleanup\n",
        );
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.steps[1].status, StepStatus::Success);
        assert_eq!(exec.commands(), vec!["fail", "echo cleanup"]);
    }

    #[tokio::test]
    async fn test_always_bypass_is_textual() {
        // The condition never calls always(); the substring alone bypasses.
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: first\n    run: fail\n  - name: quirk\n    if: \"${{ 'always()' != '' }}\"\n    run: echo quirk\n",
        );
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.steps[1].status, StepStatus::Success);
        assert_eq!(exec.commands(), vec!["fail", "echo quirk"]);
    }

    #[tokio::test]
    async fn test_blank_condition_runs_step() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: empty\n    if: ''\n    run: echo empty\n  - name: spaces\n    if: '   '\n    run: echo spaces\n",
        );
        crate::workflow::parser::validate_workflow(&wf).unwrap();
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.decision, Decision::Allow);
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Success));
        assert_eq!(exec.commands(), vec!["echo empty", "echo spaces"]);
    }

    #[tokio::test]
    async fn test_blank_condition_does_not_bypass_skip() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow("  - name: first\n    run: fail\n  - name: second\n    if: ''\n    run: echo 2\n");
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.steps[1].output, "Skipped (previous step failed)");
    }

    #[tokio::test]
    async fn test_condition_false_records_success() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: only-js\n    if: ${{ endsWith(event.file.path, '.ts') }}\n    run: echo ts\n",
        );
        let result = runner(&exec).run(&wf, &file_event()).await;
        assert_eq!(result.steps[0].status, StepStatus::Success);
        assert_eq!(result.steps[0].output, "Skipped (condition not met)");
        assert!(exec.commands().is_empty());
        assert_eq!(result.decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_condition_error_fails_step_only() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: broken\n    if: nope()\n    run: echo never\n  - name: after\n    if: always()\n    run: echo after\n",
        );
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.steps[0].status, StepStatus::Failure);
        assert!(
            result.steps[0]
                .error
                .as_deref()
                .unwrap()
                .contains("unknown function: nope")
        );
        assert_eq!(result.steps[1].status, StepStatus::Success);
        assert_eq!(exec.commands(), vec!["echo after"]);
    }

    #[tokio::test]
    async fn test_failure_function_sees_prior_outcomes() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: a\n    run: fail\n    continue-on-error: true\n  - name: on-failure\n    if: failure()\n    run: echo notify ${{ steps.a.outcome }}\n",
        );
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.steps[1].status, StepStatus::Success);
        assert_eq!(exec.commands(), vec!["fail", "echo notify failure"]);
    }

    #[tokio::test]
    async fn test_blocking_denies_with_reason_and_log() {
        let exec = Arc::new(MockExecutor::default());
        let sink = Arc::new(MemorySink::default());
        let wf = workflow("  - name: secret-scan\n    run: fail\n");
        let result = runner(&exec)
            .with_log_sink(sink.clone())
            .run(&wf, &Event::default())
            .await;
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.reason.contains("secret-scan"));
        assert!(result.reason.contains("boom"));
        assert!(result.reason.contains("/logs/wf.log"));
        assert_eq!(result.log_file, Some(PathBuf::from("/logs/wf.log")));
        let logs = sink.logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].1.contains("Step 1: secret-scan [failure]"));
    }

    #[tokio::test]
    async fn test_non_blocking_allows() {
        let exec = Arc::new(MockExecutor::default());
        let sink = Arc::new(MemorySink::default());
        let mut wf = workflow("  - name: secret-scan\n    run: fail\n");
        wf.blocking = false;
        let result = runner(&exec)
            .with_log_sink(sink.clone())
            .run(&wf, &Event::default())
            .await;
        assert_eq!(result.decision, Decision::Allow);
        assert!(result.reason.contains("non-blocking"));
        assert!(sink.logs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interpolation_env_and_working_dir() {
        let exec = Arc::new(MockExecutor::default());
        let wf = parse_workflow(
            r#"
name: wf
on:
  file: {}
env:
  TARGET: ${{ event.file.path }}
  LABEL: "lint ${{ env.TARGET }}"
steps:
  - name: lint
    run: eslint ${{ env.TARGET }}
    working-directory: web
    shell: bash
    env:
      ACTION: ${{ event.file.action }}
"#,
        )
        .unwrap();
        runner(&exec).run(&wf, &file_event()).await;
        let requests = exec.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.command, "eslint src/index.js");
        assert_eq!(request.shell, "bash");
        assert_eq!(request.working_dir, Some(PathBuf::from("/repo/web")));
        assert_eq!(request.env.get("LABEL").map(String::as_str), Some("lint src/index.js"));
        assert_eq!(request.env.get("ACTION").map(String::as_str), Some("edit"));
    }

    #[tokio::test]
    async fn test_defaults_apply() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow("  - run: echo hi\n");
        let event = Event {
            tool: Some(ToolEvent {
                name: "Bash".into(),
                ..Default::default()
            }),
            cwd: "/work".into(),
            ..Default::default()
        };
        let result = runner(&exec)
            .with_default_shell("bash")
            .with_default_timeout(Some(Duration::from_secs(9)))
            .run(&wf, &event)
            .await;
        let request = &exec.requests()[0];
        assert_eq!(request.shell, "bash");
        assert_eq!(request.timeout, Some(Duration::from_secs(9)));
        assert_eq!(request.working_dir, Some(PathBuf::from("/work")));
        assert_eq!(result.steps[0].name, "step-1");
    }

    #[tokio::test]
    async fn test_runner_window_reports_timeout() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow("  - name: slow\n    run: stall\n    timeout: 1\n");
        let result = runner(&exec).run(&wf, &Event::default()).await;
        assert_eq!(result.steps[0].status, StepStatus::Failure);
        assert_eq!(
            result.steps[0].error.as_deref(),
            Some("step timed out after 1 seconds")
        );
        assert_eq!(result.decision, Decision::Deny);
    }

    #[tokio::test]
    async fn test_cancel_mid_run() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: a\n    run: echo a\n  - name: b\n    run: hang\n  - name: c\n    if: always()\n    run: echo c\n",
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let result = runner(&exec)
            .run_with_cancel(&wf, &Event::default(), cancel)
            .await;
        let statuses: Vec<StepStatus> = result.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Success, StepStatus::Cancelled, StepStatus::Cancelled]
        );
        assert_eq!(result.steps[1].output, "partial");
        assert_eq!(result.steps[2].output, SKIPPED_CANCELLED);
        assert_eq!(exec.commands(), vec!["echo a", "hang"]);
        assert_eq!(result.decision, Decision::Deny);
    }

    #[tokio::test]
    async fn test_uses_composite_action() {
        let workspace = tempfile::tempdir().unwrap();
        let action_dir = workspace.path().join("actions/greet");
        std::fs::create_dir_all(&action_dir).unwrap();
        std::fs::write(
            action_dir.join("action.yml"),
            "name: greet\ninputs:\n  who:\n    required: true\nruns:\n  using: composite\n  steps:\n    - run: echo one\n    - run: echo two ${{ event.file.path }}\n",
        )
        .unwrap();

        let exec = Arc::new(MockExecutor::default());
        let resolver = Arc::new(CachedActionResolver::new(
            workspace.path(),
            workspace.path().join("cache"),
        ));
        let wf = workflow("  - name: greet\n    uses: ./actions/greet\n    with:\n      who: world\n");
        let result = runner(&exec)
            .with_action_resolver(resolver)
            .run(&wf, &file_event())
            .await;

        assert_eq!(result.steps[0].status, StepStatus::Success);
        assert_eq!(result.steps[0].output, "echo one\necho two src/index.js");
        let requests = exec.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].env.get("INPUT_WHO").map(String::as_str), Some("world"));
        assert!(requests[0].env.contains_key(ACTION_PATH_VAR));
    }

    #[tokio::test]
    async fn test_action_errors_fail_step() {
        let exec = Arc::new(MockExecutor::default());
        let wf = workflow(
            "  - name: bad-ref\n    uses: not-a-reference\n  - name: missing\n    if: always()\n    uses: ./nowhere\n",
        );
        let workspace = tempfile::tempdir().unwrap();
        let resolver = Arc::new(CachedActionResolver::new(workspace.path(), workspace.path()));
        let result = runner(&exec)
            .with_action_resolver(resolver)
            .run(&wf, &Event::default())
            .await;
        assert!(
            result.steps[0]
                .error
                .as_deref()
                .unwrap()
                .contains("invalid action reference")
        );
        assert!(result.steps[1].error.as_deref().unwrap().contains("not found"));
        assert!(exec.commands().is_empty());
    }
}
