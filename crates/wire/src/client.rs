// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client → server WebSocket messages.

use serde::{Deserialize, Serialize};

/// Inline image shipped with a prompt, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Base64 data (no data-URL prefix).
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImagePayload>,
    /// Duplicate-suppression key; first insertion wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

/// Thread selection for `task_resume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    /// explicit → current → saved → none
    #[default]
    Auto,
    Current,
    Saved,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResumePayload {
    #[serde(default)]
    pub mode: ResumeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// One WebSocket message from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Prompt(PromptPayload),
    /// A slash-command string ("/cd /tmp", "/agent codex", …).
    Command(String),
    TaskResume(TaskResumePayload),
    /// Request the agent snapshot.
    Agents,
    Ping,
    /// Resume the saved conversation thread.
    Resume {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
    },
    /// Clear the active agent's thread.
    Reset,
}
