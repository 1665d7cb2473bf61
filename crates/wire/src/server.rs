// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server → client WebSocket messages.

use ads_core::{ExploredEntry, TaskId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::http::TaskDto;

/// Snapshot of one adapter for the `agents` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub active: bool,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Incremental command output for a `command` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandUpdate {
    /// Stable per-command key (`<item>:cmd:<command>`).
    pub id: String,
    pub command: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Suffix beyond the previously delivered output.
    #[serde(default)]
    pub output_delta: String,
}

/// Final payload of a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    pub ok: bool,
    pub output: String,
    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(rename = "expectedThreadId", default, skip_serializing_if = "Option::is_none")]
    pub expected_thread_id: Option<String>,
    /// True iff a previously-saved thread id differed from the new one.
    #[serde(rename = "threadReset", default)]
    pub thread_reset: bool,
}

/// Classified error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    pub needs_reset: bool,
    /// One-line user hint.
    pub hint: String,
}

impl From<&ads_core::ClassifiedError> for ErrorPayload {
    fn from(err: &ads_core::ClassifiedError) -> Self {
        Self {
            code: err.code.to_string(),
            message: err.original_error.clone(),
            retryable: err.retryable,
            needs_reset: err.needs_reset,
            hint: err.user_hint(),
        }
    }
}

/// Task lifecycle event relayed over the WS channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEventPayload {
    /// "task:started", "step:completed", …
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// One WebSocket message from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        version: String,
        workspace: PathBuf,
        agents: Vec<AgentInfo>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        explored: Vec<ExploredEntry>,
    },
    Ack {
        client_message_id: String,
        #[serde(default)]
        duplicate: bool,
    },
    Delta {
        delta: String,
        /// "step" for reasoning/phase lines; absent for response text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Command {
        command: CommandUpdate,
    },
    Patch {
        patch: String,
    },
    Explored {
        category: String,
        summary: String,
    },
    Agent {
        id: String,
        active: bool,
    },
    Result(TurnResult),
    Error(ErrorPayload),
    Agents {
        agents: Vec<AgentInfo>,
    },
    History {
        entries: Vec<serde_json::Value>,
    },
    Workspace {
        root: PathBuf,
        initialized: bool,
    },
    #[serde(rename = "task:event")]
    TaskEvent(TaskEventPayload),
    TaskBundleDraft {
        title: String,
        prompt: String,
    },
}
