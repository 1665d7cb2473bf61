// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task queue lifecycle events.

use ads_core::{PlanStep, Task, TaskId, TaskMessage};
use serde::{Deserialize, Serialize};

/// Emitted by the queue in causal order per task:
/// `task:started → task:planned → task:running → step:* → terminal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    #[serde(rename = "task:started")]
    TaskStarted {
        task: Task,
        /// True exactly once per task (first transition into planning).
        prompt_injected: bool,
    },

    #[serde(rename = "task:planned")]
    TaskPlanned { task_id: TaskId, steps: Vec<PlanStep> },

    #[serde(rename = "task:running")]
    TaskRunning { task_id: TaskId },

    #[serde(rename = "step:started")]
    StepStarted { task_id: TaskId, step_number: u32 },

    #[serde(rename = "step:completed")]
    StepCompleted { task_id: TaskId, step_number: u32 },

    #[serde(rename = "message")]
    Message { task_id: TaskId, message: TaskMessage },

    #[serde(rename = "message:delta")]
    MessageDelta { task_id: TaskId, delta: String },

    #[serde(rename = "command")]
    Command { task_id: TaskId, command: String },

    /// Promotion pass moved a queued task to pending.
    #[serde(rename = "task:updated")]
    TaskUpdated { task: Task },

    #[serde(rename = "task:completed")]
    TaskCompleted { task: Task },

    #[serde(rename = "task:failed")]
    TaskFailed {
        task: Task,
        /// False when the failure re-queued the task for retry.
        terminal: bool,
    },

    #[serde(rename = "task:cancelled")]
    TaskCancelled { task: Task },

    #[serde(rename = "queue:paused")]
    QueuePaused {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "queue:resumed")]
    QueueResumed,
}

impl QueueEvent {
    /// Wire tag for WS relay.
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::TaskStarted { .. } => "task:started",
            QueueEvent::TaskPlanned { .. } => "task:planned",
            QueueEvent::TaskRunning { .. } => "task:running",
            QueueEvent::StepStarted { .. } => "step:started",
            QueueEvent::StepCompleted { .. } => "step:completed",
            QueueEvent::Message { .. } => "message",
            QueueEvent::MessageDelta { .. } => "message:delta",
            QueueEvent::Command { .. } => "command",
            QueueEvent::TaskUpdated { .. } => "task:updated",
            QueueEvent::TaskCompleted { .. } => "task:completed",
            QueueEvent::TaskFailed { .. } => "task:failed",
            QueueEvent::TaskCancelled { .. } => "task:cancelled",
            QueueEvent::QueuePaused { .. } => "queue:paused",
            QueueEvent::QueueResumed => "queue:resumed",
        }
    }
}
