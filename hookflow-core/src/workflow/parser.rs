//! YAML parser, validator and on-disk discovery for workflow declarations.

use crate::error::WorkflowError;
use crate::expression::{check_condition_syntax, check_syntax};
use crate::workflow::types::Workflow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Parse a workflow declaration from a YAML string.
pub fn parse_workflow(yaml: &str) -> Result<Workflow, WorkflowError> {
    serde_yaml::from_str::<Workflow>(yaml).map_err(|e| WorkflowError::Parse {
        message: e.to_string(),
    })
}

/// Validate a parsed workflow for structural correctness.
///
/// Checks:
/// - The workflow has a name, at least one trigger and at least one step
/// - Each step has exactly one of `run` / `uses`
/// - No duplicate step names
/// - Every embedded `${{ }}` expression and every `if:` condition lexes
pub fn validate_workflow(workflow: &Workflow) -> Result<(), WorkflowError> {
    if workflow.name.trim().is_empty() {
        return invalid("Workflow must have a name".to_string());
    }
    if workflow.on.is_empty() {
        return invalid(format!(
            "Workflow '{}' declares no triggers and would never run",
            workflow.name
        ));
    }
    if workflow.steps.is_empty() {
        return invalid(format!(
            "Workflow '{}' must have at least one step",
            workflow.name
        ));
    }

    for (key, value) in &workflow.env {
        check_expressions(value, &format!("env.{key}"))?;
    }

    let mut seen = HashSet::new();
    for (idx, step) in workflow.steps.iter().enumerate() {
        let name = step.display_name(idx);
        if !seen.insert(name.clone()) {
            return invalid(format!("Duplicate step name: '{name}'"));
        }

        match (&step.run, &step.uses) {
            (Some(_), Some(_)) => {
                return invalid(format!("Step '{name}' declares both 'run' and 'uses'"));
            }
            (None, None) => {
                return invalid(format!("Step '{name}' must declare 'run' or 'uses'"));
            }
            _ => {}
        }

        if let Some(condition) = step.effective_condition() {
            check_condition_syntax(condition).map_err(|e| WorkflowError::Validation {
                message: format!("Step '{name}' has an invalid condition: {e}"),
            })?;
        }
        if let Some(run) = &step.run {
            check_expressions(run, &format!("step '{name}' run"))?;
        }
        if let Some(dir) = &step.working_directory {
            check_expressions(dir, &format!("step '{name}' working directory"))?;
        }
        for (key, value) in step.env.iter().chain(step.with.iter()) {
            check_expressions(value, &format!("step '{name}' {key}"))?;
        }
    }

    Ok(())
}

/// Read, parse and validate one workflow file.
pub fn load_workflow(path: &Path) -> Result<Workflow, WorkflowError> {
    let text = std::fs::read_to_string(path).map_err(|source| WorkflowError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let workflow = parse_workflow(&text).map_err(|e| match e {
        WorkflowError::Parse { message } => WorkflowError::Parse {
            message: format!("{}: {message}", path.display()),
        },
        other => other,
    })?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

/// Every `.yml` / `.yaml` file under `dir`, sorted. A missing directory
/// yields no workflows.
pub fn discover_workflows(dir: &Path) -> Result<Vec<PathBuf>, WorkflowError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| WorkflowError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_yaml = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if is_yaml {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn check_expressions(text: &str, location: &str) -> Result<(), WorkflowError> {
    check_syntax(text).map_err(|e| WorkflowError::Validation {
        message: format!("Invalid expression in {location}: {e}"),
    })
}

fn invalid(message: String) -> Result<(), WorkflowError> {
    Err(WorkflowError::Validation { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LINT: &str = r#"
name: lint-js
description: Lint edited JavaScript
on:
  file:
    types: [edit, create]
    paths: ["**/*.js"]
    paths-ignore: ["vendor/**"]
env:
  MODE: strict
steps:
  - name: eslint
    run: npx eslint ${{ event.file.path }}
    timeout: 30
  - name: report
    if: ${{ always() }}
    run: echo done
    continue-on-error: true
"#;

    #[test]
    fn test_parse_and_validate() {
        let wf = parse_workflow(LINT).unwrap();
        assert_eq!(wf.name, "lint-js");
        assert!(wf.blocking);
        assert_eq!(wf.steps.len(), 2);
        assert_eq!(wf.steps[0].timeout, Some(30));
        assert!(wf.steps[1].continue_on_error);
        let file = wf.on.file.as_ref().unwrap();
        assert_eq!(file.paths_ignore, vec!["vendor/**".to_string()]);
        validate_workflow(&wf).unwrap();
    }

    #[test]
    fn test_parse_error() {
        let err = parse_workflow("name: [unterminated").unwrap_err();
        assert!(matches!(err, WorkflowError::Parse { .. }));
    }

    #[test]
    fn test_rejects_missing_triggers() {
        let wf = parse_workflow("name: x\nsteps:\n  - run: echo\n").unwrap();
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("no triggers"));
    }

    #[test]
    fn test_rejects_empty_steps() {
        let wf = parse_workflow("name: x\non:\n  push: {}\nsteps: []\n").unwrap();
        assert!(validate_workflow(&wf).is_err());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let wf = parse_workflow(
            "name: x\non:\n  push: {}\nsteps:\n  - name: a\n    run: echo\n  - name: a\n    run: echo\n",
        )
        .unwrap();
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("Duplicate step name: 'a'"));
    }

    #[test]
    fn test_rejects_run_and_uses() {
        let both = parse_workflow(
            "name: x\non:\n  push: {}\nsteps:\n  - run: echo\n    uses: ./act\n",
        )
        .unwrap();
        assert!(validate_workflow(&both).is_err());
        let neither = parse_workflow("name: x\non:\n  push: {}\nsteps:\n  - name: a\n").unwrap();
        assert!(validate_workflow(&neither).is_err());
    }

    #[test]
    fn test_rejects_bad_expressions() {
        let wf = parse_workflow(
            "name: x\non:\n  push: {}\nsteps:\n  - run: echo ${{ event.file.path\n",
        )
        .unwrap();
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("Invalid expression"));

        let bad_if = parse_workflow(
            "name: x\non:\n  push: {}\nsteps:\n  - run: echo\n    if: event.x == 'open\n",
        )
        .unwrap();
        assert!(validate_workflow(&bad_if).is_err());
    }

    #[test]
    fn test_load_and_discover() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("b.yml"), LINT).unwrap();
        std::fs::write(nested.join("a.yaml"), LINT).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let found = discover_workflows(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("b.yml"), nested.join("a.yaml")]);

        let wf = load_workflow(&found[0]).unwrap();
        assert_eq!(wf.name, "lint-js");
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_workflows(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_workflow(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, WorkflowError::Io { .. }));
    }
}
