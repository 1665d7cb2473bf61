// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abortable subprocess execution.
//!
//! No shell interpolation: the program and arguments are passed directly.
//! Both output streams are captured and truncated at a per-stream byte cap.
//! On timeout or cancellation the child gets SIGTERM, a short grace period,
//! then SIGKILL.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Grace period between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Default per-stream capture cap.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Errors from command execution setup.
///
/// Runtime failures of the child (non-zero exit, timeout, truncation) are
/// reported in [`CommandOutcome`], not as errors.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("program not allowed: {0}")]
    NotAllowed(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("lock acquisition timed out after {0:?}")]
    LockTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Specification of one subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub max_output_bytes: usize,
    /// When present, the program basename must be in this list.
    pub allowlist: Option<Vec<String>>,
}

impl CommandSpec {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            timeout: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            allowlist: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_output_bytes(mut self, cap: usize) -> Self {
        self.max_output_bytes = cap;
        self
    }

    pub fn allowlist<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist = Some(programs.into_iter().map(Into::into).collect());
        self
    }
}

/// Result of a completed (or killed) subprocess.
#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    /// None when the process was killed before exiting normally.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// True when the process was killed (timeout or cancellation).
    pub killed: bool,
    /// True when the kill was caused by the deadline rather than the caller.
    pub timed_out: bool,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl CommandOutcome {
    pub fn ok(&self) -> bool {
        self.exit_code == Some(0) && !self.killed
    }
}

/// Captured stream with its truncation flag.
struct Captured {
    text: String,
    truncated: bool,
}

/// Read a stream to completion, keeping at most `cap` bytes.
async fn capture<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> Captured {
    let mut buf = Vec::with_capacity(4096.min(cap));
    let mut chunk = [0u8; 4096];
    let mut truncated = false;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buf.len());
                if room >= n {
                    buf.extend_from_slice(&chunk[..n]);
                } else {
                    buf.extend_from_slice(&chunk[..room]);
                    truncated = true;
                    // Keep draining so the child never blocks on a full pipe.
                }
            }
            Err(_) => break,
        }
    }
    Captured { text: String::from_utf8_lossy(&buf).into_owned(), truncated }
}

#[cfg(unix)]
fn terminate(child: &Child) {
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}

/// SIGTERM, wait out the grace period, then SIGKILL.
pub async fn kill_with_grace(child: &mut Child) {
    terminate(child);
    let graceful = tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok();
    if !graceful {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

/// Run a subprocess to completion, cancellation, or deadline.
pub async fn run(spec: CommandSpec, cancel: &CancellationToken) -> Result<CommandOutcome, ExecError> {
    if let Some(allowlist) = &spec.allowlist {
        let program = spec.cmd.rsplit('/').next().unwrap_or(&spec.cmd);
        if !allowlist.iter().any(|p| p == program) {
            return Err(ExecError::NotAllowed(spec.cmd.clone()));
        }
    }

    let mut command = Command::new(&spec.cmd);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let mut child = command
        .spawn()
        .map_err(|source| ExecError::Spawn { program: spec.cmd.clone(), source })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let cap = spec.max_output_bytes;
    let stdout_task = tokio::spawn(async move {
        match stdout {
            Some(reader) => capture(reader, cap).await,
            None => Captured { text: String::new(), truncated: false },
        }
    });
    let stderr_task = tokio::spawn(async move {
        match stderr {
            Some(reader) => capture(reader, cap).await,
            None => Captured { text: String::new(), truncated: false },
        }
    });

    let deadline = spec.timeout;
    let mut killed = false;
    let mut timed_out = false;

    let status = tokio::select! {
        status = child.wait() => Some(status?),
        _ = cancel.cancelled() => {
            debug!(program = %spec.cmd, "command cancelled");
            killed = true;
            None
        }
        _ = sleep_opt(deadline) => {
            debug!(program = %spec.cmd, timeout = ?deadline, "command timed out");
            killed = true;
            timed_out = true;
            None
        }
    };

    if killed {
        kill_with_grace(&mut child).await;
    }

    let stdout = stdout_task.await.unwrap_or(Captured { text: String::new(), truncated: false });
    let stderr = stderr_task.await.unwrap_or(Captured { text: String::new(), truncated: false });

    Ok(CommandOutcome {
        exit_code: status.and_then(|s| s.code()),
        stdout: stdout.text,
        stderr: stderr.text,
        killed,
        timed_out,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
    })
}

/// Sleep for the duration, or forever when none is set.
async fn sleep_opt(duration: Option<Duration>) {
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
