// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared one-turn CLI driver.
//!
//! Spawns the agent binary in streaming-JSON mode, feeds each stdout line
//! through the provider's parser, and fans normalized events out to
//! subscribers. The child is killed (SIGTERM, grace, SIGKILL) on
//! cancellation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use ads_core::{AgentEvent, ClassifiedError, Input, ThreadItem, TurnError, TurnUsage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{AdapterError, SendOptions, TurnOutcome};

/// Cap on captured stderr (used only for error classification).
const STDERR_CAP: usize = 64 * 1024;

/// Everything a provider needs to build and parse one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub input: Input,
    pub thread_id: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

/// Accumulated parse state for one turn.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub thread_id: Option<String>,
    pub response: String,
    pub usage: Option<TurnUsage>,
    pub completed: bool,
    pub error: Option<String>,
    /// Items awaiting their completion line, keyed by native id.
    pending: HashMap<String, ThreadItem>,
    counter: u32,
}

impl ParseOutcome {
    /// Synthesize a per-turn item id when the provider line has none.
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}-{}", prefix, self.counter)
    }

    pub fn track_pending(&mut self, native_id: &str, item: ThreadItem) {
        self.pending.insert(native_id.to_string(), item);
    }

    pub fn take_pending(&mut self, native_id: &str) -> Option<ThreadItem> {
        self.pending.remove(native_id)
    }
}

/// Per-provider behavior: how to invoke the CLI and how to read its lines.
pub trait Profile: Send + Sync + 'static {
    /// Stable adapter id ("codex", "claude", "gemini").
    fn id(&self) -> &'static str;

    /// Binary to execute.
    fn program(&self) -> &str;

    /// Arguments for one turn.
    fn build_args(&self, request: &TurnRequest) -> Vec<String>;

    /// Parse one stdout line into normalized events, updating `outcome`.
    /// Non-JSON or unrecognized lines return no events.
    fn parse_line(&self, line: &str, outcome: &mut ParseOutcome) -> Vec<AgentEvent>;
}

/// Run one turn of `profile` to completion or cancellation.
pub(super) async fn run_turn<P: Profile>(
    profile: &P,
    request: TurnRequest,
    opts: &SendOptions,
    events: &broadcast::Sender<AgentEvent>,
) -> Result<TurnOutcome, AdapterError> {
    let args = profile.build_args(&request);
    let mut command = tokio::process::Command::new(profile.program());
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &request.cwd {
        command.current_dir(cwd);
    }
    for (key, value) in &request.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|e| {
        AdapterError::Spawn(format!("{}: {}", profile.program(), e))
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(stderr) = stderr {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if buf.len() < STDERR_CAP {
                    buf.push_str(&line);
                    buf.push('\n');
                }
            }
        }
        buf
    });

    let mut outcome = ParseOutcome::default();
    let mut cancelled = false;

    if let Some(stdout) = stdout {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            for event in profile.parse_line(&line, &mut outcome) {
                                if opts.streaming || is_turn_boundary(&event) {
                                    let _ = events.send(event);
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            debug!(agent = profile.id(), error = %e, "stdout read error");
                            break;
                        }
                    }
                }
                _ = opts.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
            }
        }
    }

    if cancelled {
        ads_exec::kill_with_grace(&mut child).await;
        let _ = stderr_task.await;
        return Err(AdapterError::Aborted);
    }

    let status = child.wait().await.map_err(|e| AdapterError::Spawn(e.to_string()))?;
    let stderr_text = stderr_task.await.unwrap_or_default();

    if let Some(message) = outcome.error.take() {
        let classified = ClassifiedError::classify(&message);
        let _ = events.send(AgentEvent::TurnFailed { error: TurnError { message } });
        return Err(AdapterError::Protocol(classified));
    }

    if !status.success() && !outcome.completed {
        let message = if stderr_text.trim().is_empty() {
            format!("{} exited with {:?}", profile.id(), status.code())
        } else {
            stderr_text.trim().to_string()
        };
        warn!(agent = profile.id(), exit = ?status.code(), "agent turn failed");
        let classified = ClassifiedError::classify(&message);
        let _ = events.send(AgentEvent::TurnFailed { error: TurnError { message } });
        return Err(AdapterError::Protocol(classified));
    }

    let turn = TurnOutcome {
        response: outcome.response,
        usage: outcome.usage,
        thread_id: outcome.thread_id.or(request.thread_id),
    };
    let _ = events.send(AgentEvent::TurnCompleted {
        response: turn.response.clone(),
        usage: turn.usage.clone(),
    });
    Ok(turn)
}

fn is_turn_boundary(event: &AgentEvent) -> bool {
    matches!(
        event,
        AgentEvent::TurnStarted | AgentEvent::TurnCompleted { .. } | AgentEvent::TurnFailed { .. }
    )
}
