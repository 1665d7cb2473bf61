// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events persisted to the workspace WAL.
//!
//! State is derived from these facts; every handler in `state/` must be
//! idempotent because events are applied once on mutation and again on
//! replay after a crash.

use ads_core::{Attachment, AttachmentId, PlanStep, PlanStepState, Task, TaskId, TaskMessage, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::state::{HistoryEntry, NotificationRow};

/// One durable fact about the workspace's task state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    // -- tasks --
    #[serde(rename = "task:created")]
    TaskCreated { task: Task },

    /// Pending-only field edits.
    #[serde(rename = "task:updated")]
    TaskUpdated {
        id: TaskId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<Option<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inherit_context: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_retries: Option<u32>,
    },

    /// Any status transition, with the fields it touches.
    #[serde(rename = "task:status")]
    TaskStatusChanged {
        id: TaskId,
        status: TaskStatus,
        at_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_at_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed_at_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        queue_order: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
    },

    #[serde(rename = "task:queue_order")]
    QueueOrderSet { id: TaskId, queue_order: u64 },

    #[serde(rename = "task:prompt_injected")]
    PromptInjected { id: TaskId, at_ms: u64 },

    #[serde(rename = "task:archived")]
    TaskArchived { id: TaskId, at_ms: u64 },

    #[serde(rename = "task:deleted")]
    TaskDeleted { id: TaskId },

    #[serde(rename = "task:purged")]
    TasksPurged { ids: Vec<TaskId> },

    // -- plan --
    #[serde(rename = "plan:step_added")]
    PlanStepAdded { step: PlanStep },

    #[serde(rename = "plan:step_state")]
    PlanStepStateChanged {
        task_id: TaskId,
        step_number: u32,
        state: PlanStepState,
    },

    // -- messages --
    #[serde(rename = "message:added")]
    MessageAdded { message: TaskMessage },

    // -- attachments --
    #[serde(rename = "attachment:added")]
    AttachmentAdded { attachment: Attachment },

    #[serde(rename = "attachment:linked")]
    AttachmentLinked { id: AttachmentId, task_id: TaskId },

    // -- notifications outbox --
    #[serde(rename = "notify:upserted")]
    NotificationUpserted { row: NotificationRow },

    #[serde(rename = "notify:sent")]
    NotificationSent { task_id: TaskId, at_ms: u64 },

    #[serde(rename = "notify:failed")]
    NotificationFailed {
        task_id: TaskId,
        at_ms: u64,
        next_retry_at_ms: u64,
        error: String,
    },

    // -- history --
    #[serde(rename = "history:appended")]
    HistoryAppended { entry: HistoryEntry },

    #[serde(rename = "history:cleared")]
    HistoryCleared { session_key: String },

    // -- threads --
    #[serde(rename = "thread:saved")]
    ThreadSaved { key: String, thread_id: String },

    #[serde(rename = "thread:resume_stashed")]
    ThreadResumeStashed { key: String, thread_id: String },

    #[serde(rename = "thread:cleared")]
    ThreadCleared { key: String },

    /// Catch-all for unknown event types written by newer versions.
    #[serde(other, skip_serializing)]
    Custom,
}
