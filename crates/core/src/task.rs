// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task model and status machine.
//!
//! A task is a background agent job owned by one project. Lifecycle:
//!
//! ```text
//! queued ──promote──> pending ──pick──> planning ──plan──> running ──> completed
//!                                              \──fail (retries left)──> pending
//!                                              \──fail (exhausted)─────> failed
//! any non-terminal ──cancel──> cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a task.
    pub struct TaskId("task-");
}

crate::define_id! {
    /// Unique identifier for an attachment blob.
    pub struct AttachmentId("att-");
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Awaiting promotion into the pending pool
    Queued,
    /// Eligible for pick by the scheduler
    Pending,
    /// Picked; the planner is producing steps
    Planning,
    /// Executor is working through the plan
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Active states hold the per-project single-task slot.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Planning | TaskStatus::Running)
    }
}

crate::simple_display! {
    TaskStatus {
        Queued => "queued",
        Pending => "pending",
        Planning => "planning",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// A background agent job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Opaque per-model parameters forwarded to the adapter.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub model_params: HashMap<String, serde_json::Value>,
    pub status: TaskStatus,
    /// Higher runs first.
    pub priority: i32,
    /// Tie-break within a priority band; monotonic from creation time.
    pub queue_order: u64,
    /// Whether the executor seeds the agent with recent conversation context.
    #[serde(default)]
    pub inherit_context: bool,
    /// Adapter that ran (or is running) this task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    /// Set when the task is flagged for purge-scheduler reclamation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at_ms: Option<u64>,
    /// Epoch ms of the first transition into planning. Set exactly once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_injected_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Agent thread that produced the result, when the adapter exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fields {title, prompt, model, priority, inherit_context, max_retries}
    /// are only editable while the task is pending.
    pub fn is_editable(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Sort key for scheduler pick: highest priority first, then oldest
    /// queue order, then creation time.
    pub fn pick_key(&self) -> (i32, u64, u64) {
        (-self.priority, self.queue_order, self.created_at_ms)
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            title: String = "test task",
            prompt: String = "do the thing",
        }
        set {
            status: TaskStatus = TaskStatus::Pending,
            priority: i32 = 0,
            queue_order: u64 = 1,
            inherit_context: bool = false,
            retry_count: u32 = 0,
            max_retries: u32 = 0,
            created_at_ms: u64 = 1,
            model_params: HashMap<String, serde_json::Value> = HashMap::new(),
        }
        option {
            model: String = None,
            agent_id: String = None,
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
            archived_at_ms: u64 = None,
            prompt_injected_at_ms: u64 = None,
            result: String = None,
            error: String = None,
            thread_id: String = None,
            parent_task_id: TaskId = None,
        }
        computed {
            id: TaskId = TaskId::new(),
        }
    }
}

/// State of a single plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStepState {
    Pending,
    Started,
    Completed,
    Failed,
}

crate::simple_display! {
    PlanStepState {
        Pending => "pending",
        Started => "started",
        Completed => "completed",
        Failed => "failed",
    }
}

/// One step of a task's execution plan. Append-only per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub task_id: TaskId,
    pub step_number: u32,
    pub title: String,
    pub description: String,
    pub state: PlanStepState,
}

/// Who produced a message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// What kind of message row this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Chat,
    Command,
    Audit,
}

/// Append-only conversation row attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: TaskId,
    pub role: MessageRole,
    pub message_type: MessageType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub created_at_ms: u64,
}

/// Uploaded blob linked to a task (or orphaned pending link).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Relative path under the attachment storage root.
    pub storage_key: String,
    pub content_type: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub size_bytes: u64,
    pub filename: String,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
