//! External command execution with a hard timeout.

use futures_util::future::{self, BoxFuture, FutureExt};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::error::ProbeError;

/// How long a timed-out child gets to exit after SIGTERM before it is killed
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Captured result of a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub exit_code: i32,
}

/// Runs an external program and reports its stdout.
///
/// `env` entries are merged onto the inherited environment. Errors:
/// `ToolNotFound` when `path` is missing or not executable, `Timeout` when
/// the process outlives `timeout` (partial output is discarded),
/// `CommandFailed` for spawn errors, non-zero exits and non-UTF-8 output.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        path: &'a Path,
        args: &'a [String],
        env: &'a [(String, String)],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<CommandOutput, ProbeError>>;
}

/// `CommandRunner` backed by real child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            grace: TERMINATE_GRACE,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grace(grace: Duration) -> Self {
        Self { grace }
    }
}

impl CommandRunner for ProcessRunner {
    fn run<'a>(
        &'a self,
        path: &'a Path,
        args: &'a [String],
        env: &'a [(String, String)],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<CommandOutput, ProbeError>> {
        run_process(path, args, env, timeout, self.grace).boxed()
    }
}

async fn run_process(
    path: &Path,
    args: &[String],
    env: &[(String, String)],
    timeout: Duration,
    grace: Duration,
) -> Result<CommandOutput, ProbeError> {
    if !is_executable(path) {
        return Err(ProbeError::ToolNotFound);
    }

    log::debug!("executing: {} {}", path.display(), args.join(" "));

    // kill_on_drop: dropping an in-flight cycle must not leave the child behind
    let mut child = Command::new(path)
        .args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ProbeError::ToolNotFound
            } else {
                ProbeError::command_failed(format!("failed to start: {}", e))
            }
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let collected = tokio::time::timeout(
        timeout,
        future::join3(child.wait(), read_pipe(stdout), read_pipe(stderr)),
    )
    .await;

    let (status, stdout, stderr) = match collected {
        Ok(parts) => parts,
        Err(_elapsed) => {
            log::warn!(
                "{} {} timed out after {:?}, terminating",
                path.display(),
                args.join(" "),
                timeout
            );
            terminate(&mut child, grace).await;
            return Err(ProbeError::Timeout(timeout));
        }
    };

    let status = status.map_err(|e| ProbeError::command_failed(e.to_string()))?;
    let stdout = stdout.map_err(|e| ProbeError::command_failed(e.to_string()))?;
    let stderr = stderr.map_err(|e| ProbeError::command_failed(e.to_string()))?;

    if !status.success() {
        let message = String::from_utf8_lossy(&stderr).trim().to_string();
        let message = if message.is_empty() {
            match status.code() {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            }
        } else {
            message
        };
        return Err(ProbeError::CommandFailed(message));
    }

    let stdout = String::from_utf8(stdout)
        .map_err(|_| ProbeError::command_failed("output was not valid UTF-8"))?;

    Ok(CommandOutput {
        stdout,
        exit_code: status.code().unwrap_or(0),
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// SIGTERM, then SIGKILL once the grace period runs out. Failures are logged only.
async fn terminate(child: &mut Child, grace: Duration) {
    if send_sigterm(child) {
        if let Ok(Ok(_)) = tokio::time::timeout(grace, child.wait()).await {
            return;
        }
    }

    if let Err(e) = child.kill().await {
        log::warn!("Failed to kill timed-out process: {}", e);
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    match child.id() {
        // SAFETY: the pid belongs to our own child, which has not been reaped yet
        Some(pid) => unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 },
        None => false,
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}

/// True when `path` names an existing file we may execute
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
