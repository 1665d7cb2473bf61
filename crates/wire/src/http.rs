// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task HTTP API request/response bodies.

use ads_core::{AttachmentId, Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

/// Stable `{error}` body returned on every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub prompt: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub inherit_context: Option<bool>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub attachments: Vec<AttachmentId>,
    /// Create directly into the queued pool instead of pending.
    #[serde(default)]
    pub queued: bool,
}

/// PATCH body: either a queue action or pending-only field edits.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatchTaskRequest {
    Action {
        action: PatchAction,
    },
    Update {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        priority: Option<i32>,
        #[serde(default, rename = "inheritContext")]
        inherit_context: Option<bool>,
        #[serde(default, rename = "maxRetries")]
        max_retries: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchAction {
    Pause,
    Resume,
    Cancel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<TaskId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    pub direction: MoveDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub content: String,
}

/// Task row shape returned by the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: TaskId,
    pub title: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub status: TaskStatus,
    pub priority: i32,
    pub queue_order: u64,
    pub inherit_context: bool,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl From<&Task> for TaskDto {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            prompt: task.prompt.clone(),
            model: task.model.clone(),
            status: task.status,
            priority: task.priority,
            queue_order: task.queue_order,
            inherit_context: task.inherit_context,
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            created_at: task.created_at_ms,
            started_at: task.started_at_ms,
            completed_at: task.completed_at_ms,
            result: task.result.clone(),
            error: task.error.clone(),
            thread_id: task.thread_id.clone(),
        }
    }
}

/// `GET /api/task-queue/status` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusDto {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_task_id: Option<TaskId>,
    pub pending: usize,
    pub queued: usize,
}
