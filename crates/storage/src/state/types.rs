// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row types materialized from the WAL.

use ads_core::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outbox row for the task-terminal notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRow {
    pub task_id: TaskId,
    pub workspace_root: PathBuf,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at_ms: Option<u64>,
    /// Set exactly once when a send succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_at_ms: Option<u64>,
}

/// One conversation history row for a connection session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Session the entry belongs to (chat-session-id scoped to a workspace).
    pub session_key: String,
    /// "user" | "assistant" | "status"
    pub kind: String,
    pub content: String,
    /// Client-supplied id used for duplicate suppression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    pub created_at_ms: u64,
}

/// Saved agent thread identity per (user, agent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Restore point stashed when a reset wants to keep a way back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_thread: Option<String>,
}
