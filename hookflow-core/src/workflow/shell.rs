//! Command execution for `run:` steps.
//!
//! [`ShellCommandExecutor`] spawns the step's shell with `tokio::process`,
//! interleaves stdout and stderr into one buffer as lines arrive, and kills
//! the child when the timeout expires or the run is cancelled. Output
//! captured before the kill is returned.

use crate::error::ExecutionError;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to keep reading pipes after the child exits on its own.
const DRAIN_AFTER_EXIT: Duration = Duration::from_secs(2);
/// How long to keep reading pipes after the child was killed.
const DRAIN_AFTER_KILL: Duration = Duration::from_millis(200);

/// One command to run.
#[derive(Debug, Clone, Default)]
pub struct CommandRequest {
    pub shell: String,
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub env: IndexMap<String, String>,
    pub timeout: Option<Duration>,
}

/// What came back from a command: combined output plus success or the
/// reason for failure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOutput {
    pub output: String,
    pub success: bool,
    pub error: Option<ExecutionError>,
}

impl CommandOutput {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(output: impl Into<String>, error: ExecutionError) -> Self {
        Self {
            output: output.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Runs step commands. Implementations must honour `request.timeout` and
/// `cancel`, returning whatever output was produced before stopping.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: CommandRequest, cancel: CancellationToken) -> CommandOutput;
}

/// The program and arguments used to run `command` under `shell`.
pub fn shell_invocation(shell: &str, command: &str) -> (String, Vec<String>) {
    let command = command.to_string();
    match shell {
        "sh" | "bash" | "zsh" => (shell.to_string(), vec!["-c".into(), command]),
        "pwsh" | "powershell" => (
            shell.to_string(),
            vec![
                "-NoProfile".into(),
                "-NonInteractive".into(),
                "-Command".into(),
                command,
            ],
        ),
        "python" | "python3" => (shell.to_string(), vec!["-c".into(), command]),
        "node" => ("node".to_string(), vec!["-e".into(), command]),
        "cmd" => ("cmd".to_string(), vec!["/C".into(), command]),
        other => (other.to_string(), vec!["-c".into(), command]),
    }
}

/// Default executor backed by local processes.
#[derive(Debug, Clone, Default)]
pub struct ShellCommandExecutor;

impl ShellCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

enum Completion {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

#[async_trait]
impl CommandExecutor for ShellCommandExecutor {
    async fn execute(&self, request: CommandRequest, cancel: CancellationToken) -> CommandOutput {
        let (program, args) = shell_invocation(&request.shell, &request.command);
        let mut command = Command::new(&program);
        command
            .args(&args)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(shell = %program, error = %e, "Failed to spawn step command");
                return CommandOutput::failed(
                    String::new(),
                    ExecutionError::Spawn {
                        shell: program,
                        message: e.to_string(),
                    },
                );
            }
        };

        let buffer = Arc::new(Mutex::new(String::new()));
        let readers = vec![
            spawn_reader(child.stdout.take(), buffer.clone()),
            spawn_reader(child.stderr.take(), buffer.clone()),
        ];

        let timeout = request.timeout;
        let expiry = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let completion = tokio::select! {
            status = child.wait() => Completion::Exited(status),
            _ = expiry => Completion::TimedOut(timeout.unwrap_or_default()),
            _ = cancel.cancelled() => Completion::Cancelled,
        };

        let result = match completion {
            Completion::Exited(status) => {
                drain(readers, DRAIN_AFTER_EXIT).await;
                match status {
                    Ok(status) if status.success() => Ok(()),
                    Ok(status) => Err(match status.code() {
                        Some(exit_code) => ExecutionError::Failed { exit_code },
                        None => ExecutionError::Terminated,
                    }),
                    Err(e) => Err(ExecutionError::Spawn {
                        shell: program.clone(),
                        message: e.to_string(),
                    }),
                }
            }
            Completion::TimedOut(limit) => {
                debug!(shell = %program, secs = limit.as_secs(), "Step deadline reached, killing command");
                let _ = child.kill().await;
                drain(readers, DRAIN_AFTER_KILL).await;
                Err(ExecutionError::TimedOut {
                    secs: limit.as_secs(),
                })
            }
            Completion::Cancelled => {
                debug!(shell = %program, "Run cancelled, killing command");
                let _ = child.kill().await;
                drain(readers, DRAIN_AFTER_KILL).await;
                Err(ExecutionError::Cancelled)
            }
        };

        let output = buffer
            .lock()
            .map(|text| text.trim_end_matches('\n').to_string())
            .unwrap_or_default();
        match result {
            Ok(()) => CommandOutput::succeeded(output),
            Err(error) => CommandOutput::failed(output, error),
        }
    }
}

fn spawn_reader<R>(pipe: Option<R>, buffer: Arc<Mutex<String>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(pipe) = pipe else {
            return;
        };
        // Read raw bytes until EOF; invalid UTF-8 is replaced, never a reason
        // to stop draining the pipe.
        let mut reader = BufReader::new(pipe);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line
                        .strip_suffix(b"\n")
                        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
                        .unwrap_or(line.as_slice());
                    if let Ok(mut text) = buffer.lock() {
                        text.push_str(&String::from_utf8_lossy(trimmed));
                        text.push('\n');
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Stopped reading command output");
                    break;
                }
            }
        }
    })
}

/// Wait for the pipe readers, giving up after `wait`. A grandchild that
/// inherited the pipes can keep them open after the shell is gone.
async fn drain(readers: Vec<JoinHandle<()>>, wait: Duration) {
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(wait, reader).await.is_err() {
            abort.abort();
        }
    }
}
