//! Run logs and denial reasons.

use crate::workflow::types::{StepResult, Workflow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Characters of step output quoted in a denial reason.
pub const OUTPUT_EXCERPT_CHARS: usize = 200;

/// Persists the detailed log of a denied run.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Store `content` and return where it went.
    async fn write(&self, workflow: &str, content: &str) -> std::io::Result<PathBuf>;
}

/// Writes `<dir>/<workflow-slug>-<timestamp>-<id>.log`.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn write(&self, workflow: &str, content: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let id = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}-{}-{}.log",
            slugify(workflow),
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            &id[..8]
        );
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "workflow".to_string()
    } else {
        slug.to_string()
    }
}

/// The full per-step log of a run.
pub fn render_run_log(workflow: &Workflow, steps: &[StepResult], timestamp: DateTime<Utc>) -> String {
    let mut log = String::new();
    let _ = writeln!(log, "Workflow: {}", workflow.name);
    if !workflow.description.is_empty() {
        let _ = writeln!(log, "Description: {}", workflow.description);
    }
    let _ = writeln!(log, "Timestamp: {}", timestamp.to_rfc3339());
    let _ = writeln!(log, "Blocking: {}", workflow.blocking);

    for (idx, step) in steps.iter().enumerate() {
        let _ = writeln!(log);
        let _ = writeln!(
            log,
            "Step {}: {} [{}] ({} ms)",
            idx + 1,
            step.name,
            step.status,
            step.duration_ms
        );
        if let Some(error) = &step.error {
            let _ = writeln!(log, "  Error: {error}");
        }
        if !step.output.is_empty() {
            let _ = writeln!(log, "  Output:");
            for line in step.output.lines() {
                let _ = writeln!(log, "    {line}");
            }
        }
    }
    log
}

/// The reason attached to a deny decision: every failed step with its error
/// and the start of its output, then a pointer to the full log.
pub fn render_denial_reason(workflow: &str, steps: &[StepResult], log_file: Option<&Path>) -> String {
    let mut reason = format!("Workflow '{workflow}' failed:");
    for step in steps.iter().filter(|s| s.is_failed()) {
        let _ = write!(reason, "\n- Step '{}' ({})", step.name, step.status);
        if let Some(error) = &step.error {
            let _ = write!(reason, ": {error}");
        }
        let output = step.output.trim();
        if !output.is_empty() {
            let _ = write!(reason, "\n  Output: {}", excerpt(output, OUTPUT_EXCERPT_CHARS));
        }
    }
    if let Some(path) = log_file {
        let _ = write!(reason, "\nFull log: {}", path.display());
    }
    reason
}

fn excerpt(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
