// SPDX-License-Identifier: GPL-3.0-only

//! Out-of-process execution of btrfs invocations
//!
//! The executor never fails past its boundary: a missing binary, a spawn
//! failure or a timeout all come back as an `OperationResult` with the
//! matching `Outcome`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use btrfs_types::{CommandInvocation, OperationResult, Outcome};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classify::classify;

/// How long to keep draining pipes after a timed-out child was killed
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs a fully built invocation and captures its result
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, invocation: &CommandInvocation, timeout: Duration) -> OperationResult;
}

/// Executor that runs invocations behind a privilege-escalation prefix
/// such as `pkexec` or `sudo -n`.
#[derive(Debug, Clone)]
pub struct PrivilegedExecutor {
    prefix: Vec<String>,
    skip_prefix_when_root: bool,
}

impl PrivilegedExecutor {
    pub fn new(prefix: Vec<String>) -> Self {
        Self {
            prefix,
            skip_prefix_when_root: true,
        }
    }

    /// Executor that runs the program directly
    pub fn unprivileged() -> Self {
        Self::new(Vec::new())
    }

    pub fn skip_prefix_when_root(mut self, skip: bool) -> Self {
        self.skip_prefix_when_root = skip;
        self
    }

    fn active_prefix(&self) -> &[String] {
        if self.skip_prefix_when_root && unsafe { libc::geteuid() } == 0 {
            &[]
        } else {
            &self.prefix
        }
    }

    /// Program to spawn and the arguments that precede the invocation's own
    fn command_line(&self, program: &Path) -> (PathBuf, Vec<String>) {
        match self.active_prefix().split_first() {
            Some((escalator, rest)) => {
                let mut leading = rest.to_vec();
                leading.push(program.to_string_lossy().to_string());
                (PathBuf::from(escalator), leading)
            }
            None => (program.to_path_buf(), Vec::new()),
        }
    }
}

#[async_trait]
impl Executor for PrivilegedExecutor {
    async fn run(&self, invocation: &CommandInvocation, timeout: Duration) -> OperationResult {
        let started = Instant::now();

        let program = match resolve_program(&invocation.program) {
            Ok(program) => program,
            Err(message) => {
                warn!("Cannot run {}: {}", invocation.program, message);
                return OperationResult::invalid(message);
            }
        };

        let (binary, leading) = self.command_line(&program);
        info!(command = %invocation, "Running btrfs invocation");
        debug!(binary = %binary.display(), ?leading, args = ?invocation.args, "Spawning process");

        let mut command = Command::new(&binary);
        command
            .args(&leading)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to execute {}: {}", binary.display(), e);
                return OperationResult::invalid(format!(
                    "failed to execute {}: {}",
                    binary.display(),
                    e
                ));
            }
        };

        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        let waited = tokio::time::timeout(timeout, child.wait()).await;

        let (exit_code, timed_out, wait_error) = match waited {
            Ok(Ok(status)) => (status.code(), None, None),
            Ok(Err(e)) => (None, None, Some(format!("failed to wait for {}: {}", binary.display(), e))),
            Err(_) => {
                let kill_error = terminate(&mut child).await;
                if let Some(e) = &kill_error {
                    warn!("{} may still be running after timeout: {}", invocation.program, e);
                }
                (None, Some(kill_error), None)
            }
        };

        let grace = timed_out.as_ref().map(|_| PIPE_DRAIN_GRACE);
        let stdout = collect(stdout_task, grace).await;
        let mut stderr = collect(stderr_task, grace).await;

        let outcome = if let Some(kill_error) = timed_out {
            report_timeout(&mut stderr, &invocation.program, timeout, kill_error.as_deref());
            Outcome::ToolError
        } else if let Some(message) = wait_error {
            append_line(&mut stderr, &message);
            Outcome::ToolError
        } else {
            classify(exit_code, &stderr)
        };

        let result = OperationResult {
            exit_code,
            stdout,
            stderr,
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if result.is_success() {
            debug!(command = %invocation, duration_ms = result.duration_ms, "Invocation succeeded");
        } else {
            warn!(
                command = %invocation,
                outcome = ?result.outcome,
                exit_code = ?result.exit_code,
                "Invocation failed: {}",
                result.stderr.trim()
            );
        }

        result
    }
}

/// Locate the program: absolute or relative paths must exist, bare names are
/// searched in `PATH`.
fn resolve_program(program: &str) -> Result<PathBuf, String> {
    if program.is_empty() {
        return Err("no program given".to_string());
    }

    if program.contains('/') {
        let path = PathBuf::from(program);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(format!("{program}: No such file or directory"))
        };
    }

    which::which(program).map_err(|e| format!("{program}: {e}"))
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe
        && let Err(e) = pipe.read_to_end(&mut buffer).await
    {
        debug!("Failed to read process output: {}", e);
    }
    buffer
}

async fn collect(task: JoinHandle<Vec<u8>>, grace: Option<Duration>) -> String {
    let bytes = match grace {
        Some(grace) => match tokio::time::timeout(grace, task).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => Vec::new(),
        },
        None => task.await.unwrap_or_default(),
    };
    String::from_utf8_lossy(&bytes).to_string()
}

/// Kill the child's process group, then the child itself.
///
/// Returns a description of what could not be killed. With an escalation
/// prefix the child may belong to root, in which case both calls fail with
/// `EPERM` and the job keeps running.
async fn terminate(child: &mut Child) -> Option<String> {
    let mut failures = Vec::new();

    if let Some(pid) = child.id() {
        // The child leads its own process group; take helpers down with it.
        let rc = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
        if rc != 0 {
            let e = std::io::Error::last_os_error();
            if e.raw_os_error() != Some(libc::ESRCH) {
                failures.push(format!("process group {pid}: {e}"));
            }
        }
    }

    if let Err(e) = child.kill().await {
        failures.push(e.to_string());
    }

    if failures.is_empty() {
        None
    } else {
        Some(failures.join("; "))
    }
}

fn report_timeout(stderr: &mut String, program: &str, timeout: Duration, kill_error: Option<&str>) {
    append_line(
        stderr,
        &format!("{} timed out after {:.1}s", program, timeout.as_secs_f64()),
    );
    if let Some(e) = kill_error {
        append_line(stderr, &format!("failed to terminate {program}: {e}"));
    }
}

fn append_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() && !buffer.ends_with('\n') {
        buffer.push('\n');
    }
    buffer.push_str(line);
}
