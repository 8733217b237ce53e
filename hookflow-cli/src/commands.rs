//! CLI subcommand handlers.

use crate::{Commands, ConfigAction};
use hookflow_core::config::{load_config, workspace_config_path, HookflowConfig};
use hookflow_core::expression::{evaluate, interpolate, EvaluationContext, Value};
use hookflow_core::workflow::{discover_workflows, load_workflow};
use hookflow_core::{Engine, Event};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit status of `run --exit-code` when any workflow denies.
const DENY_EXIT_CODE: u8 = 2;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Run { event, exit_code } => handle_run(event, exit_code, workspace).await,
        Commands::Check { event } => handle_check(event, workspace).await,
        Commands::Validate { paths } => handle_validate(paths, workspace),
        Commands::List => handle_list(workspace),
        Commands::Eval { expression, event } => handle_eval(&expression, event).await,
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load_workspace_config(workspace: &Path) -> anyhow::Result<HookflowConfig> {
    let config = load_config(Some(workspace), None)?;
    for warning in config.validate() {
        warn!(warning = %warning, "Configuration warning");
    }
    Ok(config)
}

/// Read an event from `path`, or from stdin when no path is given.
async fn read_event(path: Option<&Path>) -> anyhow::Result<Event> {
    let text = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read event file {}: {}", path.display(), e))?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };
    parse_event(&text)
}

fn parse_event(text: &str) -> anyhow::Result<Event> {
    if text.trim().is_empty() {
        anyhow::bail!("No event provided: pass --event FILE or pipe event JSON on stdin");
    }
    Event::from_json(text).map_err(|e| anyhow::anyhow!("Invalid event JSON: {}", e))
}

async fn handle_run(event: Option<PathBuf>, exit_code: bool, workspace: &Path) -> anyhow::Result<ExitCode> {
    let config = load_workspace_config(workspace)?;
    let engine = Engine::load(&config, workspace)?;
    let event = read_event(event.as_deref()).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling running workflows");
            on_interrupt.cancel();
        }
    });

    let result = engine.evaluate_with_cancel(&event, cancel).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if exit_code && result.decision.is_deny() {
        return Ok(ExitCode::from(DENY_EXIT_CODE));
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Serialize)]
struct MatchedWorkflow<'a> {
    name: &'a str,
    path: &'a Path,
    blocking: bool,
}

async fn handle_check(event: Option<PathBuf>, workspace: &Path) -> anyhow::Result<ExitCode> {
    let config = load_workspace_config(workspace)?;
    let engine = Engine::load(&config, workspace)?;
    let event = read_event(event.as_deref()).await?;

    let matched: Vec<MatchedWorkflow<'_>> = engine
        .matching(&event)
        .into_iter()
        .map(|loaded| MatchedWorkflow {
            name: &loaded.workflow.name,
            path: &loaded.path,
            blocking: loaded.workflow.blocking,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&matched)?);
    Ok(ExitCode::SUCCESS)
}

/// Expand directories into the workflow files they contain.
fn collect_workflow_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover_workflows(path)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn handle_validate(paths: Vec<PathBuf>, workspace: &Path) -> anyhow::Result<ExitCode> {
    let paths = if paths.is_empty() {
        vec![load_workspace_config(workspace)?.workflow_dir(workspace)]
    } else {
        paths
    };
    let files = collect_workflow_files(&paths)?;
    if files.is_empty() {
        println!("No workflow files found.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut failures = 0;
    for file in &files {
        match load_workflow(file) {
            Ok(workflow) => println!("  ok    {} ({})", file.display(), workflow.name),
            Err(e) => {
                failures += 1;
                println!("  error {}: {}", file.display(), e);
            }
        }
    }
    println!(
        "\n{} file(s) checked, {} invalid.",
        files.len(),
        failures
    );
    if failures > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_list(workspace: &Path) -> anyhow::Result<ExitCode> {
    let config = load_workspace_config(workspace)?;
    let engine = Engine::load(&config, workspace)?;

    if engine.workflows().is_empty() {
        println!(
            "No workflows found in {}.",
            config.workflow_dir(workspace).display()
        );
    }
    for loaded in engine.workflows() {
        let wf = &loaded.workflow;
        println!(
            "  {:<24} on: {:<20} {:<12} {}",
            wf.name,
            wf.on.kinds().join(", "),
            if wf.blocking { "blocking" } else { "non-blocking" },
            loaded.path.display()
        );
        if !wf.description.is_empty() {
            println!("    {}", wf.description);
        }
    }
    for invalid in engine.invalid() {
        eprintln!("  skipped {}: {}", invalid.path.display(), invalid.error);
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_eval(expression: &str, event: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let event = match event {
        Some(path) => read_event(Some(&path)).await?,
        None => Event::default(),
    };
    let env = std::env::vars().collect();
    let ctx = EvaluationContext::new(event.to_value(), env);
    println!("{}", render_expression(expression, &ctx)?);
    Ok(ExitCode::SUCCESS)
}

/// A lone `${{ }}` block or a bare expression prints its value; text with
/// embedded expressions prints the interpolated string.
fn render_expression(expression: &str, ctx: &EvaluationContext) -> anyhow::Result<String> {
    let trimmed = expression.trim();
    let is_template = trimmed.contains("${{")
        && !(trimmed.starts_with("${{") && trimmed.ends_with("}}") && trimmed.matches("${{").count() == 1);
    if is_template {
        return Ok(interpolate(trimmed, ctx)?);
    }
    let inner = trimmed
        .strip_prefix("${{")
        .and_then(|s| s.strip_suffix("}}"))
        .unwrap_or(trimmed);
    let value = evaluate(inner, ctx)?;
    Ok(match value {
        Value::String(s) => s,
        other => serde_json::to_string(&other.to_json())?,
    })
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<ExitCode> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(ExitCode::SUCCESS);
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_path, HookflowConfig::default().to_toml()?)?;
            std::fs::create_dir_all(HookflowConfig::default().workflow_dir(workspace))?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        ConfigAction::Show => {
            let config = load_workspace_config(workspace)?;
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        let event: Event = serde_json::from_value(json!({
            "tool": {"name": "Bash", "args": {"command": "git push"}}
        }))
        .unwrap();
        EvaluationContext::new(event.to_value(), Default::default())
    }

    #[test]
    fn test_parse_event() {
        let event = parse_event(r#"{"file": {"path": "a.rs", "action": "edit"}}"#).unwrap();
        assert_eq!(event.file.unwrap().path, "a.rs");
        assert!(parse_event("   ").is_err());
        assert!(parse_event("{not json").is_err());
    }

    #[test]
    fn test_render_expression_forms() {
        let ctx = ctx();
        assert_eq!(render_expression("event.tool.name", &ctx).unwrap(), "Bash");
        assert_eq!(
            render_expression("${{ contains(event.tool.args.command, 'PUSH') }}", &ctx).unwrap(),
            "true"
        );
        assert_eq!(
            render_expression("tool=${{ event.tool.name }}!", &ctx).unwrap(),
            "tool=Bash!"
        );
        assert_eq!(render_expression("event.tool.args", &ctx).unwrap(), r#"{"command":"git push"}"#);
        assert!(render_expression("nope()", &ctx).is_err());
    }

    #[test]
    fn test_collect_workflow_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yml"), "name: a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        let single = dir.path().join("explicit.yaml");
        let files = collect_workflow_files(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        assert_eq!(files, vec![dir.path().join("a.yml"), single]);
    }

    #[test]
    fn test_config_init_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();
        let written = std::fs::read_to_string(workspace_config_path(dir.path())).unwrap();
        assert!(written.contains("default_shell"));
        assert!(dir.path().join(".hookflow/workflows").is_dir());
    }
}
