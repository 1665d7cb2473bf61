// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable task store operations.
//!
//! Every mutation appends to the WAL and applies to the materialized state
//! under one mutex, so each operation is atomic with respect to readers.
//! Cross-operation serialization per workspace is the caller's job (the
//! engine holds the workspace lock).

use std::path::{Path, PathBuf};

use ads_core::{
    Attachment, AttachmentId, PlanStep, PlanStepState, Task, TaskId, TaskMessage, TaskStatus,
};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::events::StoreEvent;
use crate::snapshot::{load_snapshot, write_snapshot};
use crate::state::{HistoryEntry, MaterializedTasks, NotificationRow, ThreadRecord};
use crate::wal::{Wal, WalError};

/// Snapshot + truncate once this many events accumulate past the last one.
const SNAPSHOT_EVERY: u64 = 512;

const WAL_FILE: &str = "tasks.wal";
const SNAPSHOT_FILE: &str = "tasks.snap";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Input for task creation.
#[derive(Debug, Clone, Default)]
pub struct CreateTask {
    pub title: Option<String>,
    pub prompt: String,
    pub model: Option<String>,
    pub model_params: std::collections::HashMap<String, serde_json::Value>,
    pub priority: i32,
    pub inherit_context: bool,
    pub max_retries: u32,
    pub attachments: Vec<AttachmentId>,
    pub parent_task_id: Option<TaskId>,
}

/// Pending-only field edits.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub prompt: Option<String>,
    pub model: Option<Option<String>>,
    pub priority: Option<i32>,
    pub inherit_context: Option<bool>,
    pub max_retries: Option<u32>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.prompt.is_none()
            && self.model.is_none()
            && self.priority.is_none()
            && self.inherit_context.is_none()
            && self.max_retries.is_none()
    }
}

/// Result of one purge batch.
#[derive(Debug, Clone, Default)]
pub struct PurgeBatch {
    pub task_ids: Vec<TaskId>,
    /// `(id, storage_key)` pairs for blob reclamation.
    pub attachments: Vec<(AttachmentId, String)>,
}

struct Inner {
    wal: Wal,
    state: MaterializedTasks,
    snapshot_seq: u64,
    snapshot_path: PathBuf,
}

impl Inner {
    /// Append + apply + flush; snapshot when the WAL suffix grows long.
    fn commit(&mut self, event: StoreEvent) -> Result<(), StoreError> {
        let seq = self.wal.append(&event)?;
        self.state.apply(&event);
        self.wal.flush()?;
        if seq.saturating_sub(self.snapshot_seq) >= SNAPSHOT_EVERY {
            write_snapshot(&self.snapshot_path, &self.state, seq)?;
            self.wal.truncate_before(seq)?;
            self.snapshot_seq = seq;
            debug!(seq, "snapshotted task state");
        }
        Ok(())
    }

    fn require_task(&self, id: &TaskId) -> Result<Task, StoreError> {
        self.state
            .tasks
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("task {}", id)))
    }

    fn next_queue_order(&self, now: u64) -> u64 {
        let max = self.state.tasks.values().map(|t| t.queue_order).max().unwrap_or(0);
        now.max(max + 1)
    }

    fn pending_sorted(&self) -> Vec<Task> {
        let mut pending: Vec<Task> = self
            .state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.pick_key());
        pending
    }
}

/// Workspace-scoped durable task store.
pub struct TaskStore {
    inner: Mutex<Inner>,
}

impl TaskStore {
    /// Open the store rooted at `dir`, replaying snapshot + WAL.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let wal = Wal::open(&dir.join(WAL_FILE))?;
        let (mut state, snapshot_seq) = match load_snapshot(&snapshot_path) {
            Some(snapshot) => (snapshot.state, snapshot.last_seq),
            None => (MaterializedTasks::default(), 0),
        };
        for entry in wal.entries_after(snapshot_seq)? {
            state.apply(&entry.event);
        }
        Ok(Self { inner: Mutex::new(Inner { wal, state, snapshot_seq, snapshot_path }) })
    }

    /// Fold the current WAL into a snapshot immediately (clean shutdown).
    pub fn snapshot_now(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let seq = inner.wal.write_seq();
        if seq == inner.snapshot_seq {
            return Ok(());
        }
        write_snapshot(&inner.snapshot_path, &inner.state, seq)?;
        inner.wal.truncate_before(seq)?;
        inner.snapshot_seq = seq;
        Ok(())
    }

    // ---- tasks ----

    pub fn create_task(
        &self,
        input: CreateTask,
        now: u64,
        status: Option<TaskStatus>,
    ) -> Result<Task, StoreError> {
        if input.prompt.trim().is_empty() {
            return Err(StoreError::InvalidInput("prompt must not be empty".into()));
        }
        let status = status.unwrap_or(TaskStatus::Pending);
        if !matches!(status, TaskStatus::Pending | TaskStatus::Queued) {
            return Err(StoreError::InvalidInput(format!(
                "tasks cannot be created as {}",
                status
            )));
        }

        let mut inner = self.inner.lock();
        for attachment_id in &input.attachments {
            let attachment = inner
                .state
                .attachments
                .get(attachment_id.as_str())
                .ok_or_else(|| StoreError::NotFound(format!("attachment {}", attachment_id)))?;
            if attachment.task_id.is_some() {
                return Err(StoreError::Conflict(format!(
                    "attachment {} already assigned",
                    attachment_id
                )));
            }
        }

        let title = input.title.unwrap_or_else(|| {
            let line = input.prompt.lines().next().unwrap_or_default();
            ads_core::short(line, 80).to_string()
        });
        let task = Task {
            id: TaskId::new(),
            title,
            prompt: input.prompt,
            model: input.model,
            model_params: input.model_params,
            status,
            priority: input.priority,
            queue_order: inner.next_queue_order(now),
            inherit_context: input.inherit_context,
            agent_id: None,
            retry_count: 0,
            max_retries: input.max_retries,
            created_at_ms: now,
            started_at_ms: None,
            completed_at_ms: None,
            archived_at_ms: None,
            prompt_injected_at_ms: None,
            result: None,
            error: None,
            thread_id: None,
            parent_task_id: input.parent_task_id,
        };
        inner.commit(StoreEvent::TaskCreated { task: task.clone() })?;
        for attachment_id in input.attachments {
            inner.commit(StoreEvent::AttachmentLinked {
                id: attachment_id,
                task_id: task.id.clone(),
            })?;
        }
        Ok(task)
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.inner.lock().state.tasks.get(id.as_str()).cloned()
    }

    /// Tasks ordered by `(priority DESC, queue_order ASC, created_at ASC)`.
    pub fn list_tasks(&self, status: Option<TaskStatus>, limit: Option<usize>) -> Vec<Task> {
        let inner = self.inner.lock();
        let mut tasks: Vec<Task> = inner
            .state
            .tasks
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.pick_key());
        if let Some(limit) = limit {
            tasks.truncate(limit);
        }
        tasks
    }

    /// Permute pending queue orders to match `ids`. Every id must name a
    /// pending task.
    pub fn reorder_pending_tasks(&self, ids: &[TaskId]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            let task = inner.require_task(id)?;
            if task.status != TaskStatus::Pending {
                return Err(StoreError::Conflict(format!("task {} is not pending", id)));
            }
            orders.push(task.queue_order);
        }
        orders.sort_unstable();
        for (id, order) in ids.iter().zip(orders) {
            inner.commit(StoreEvent::QueueOrderSet { id: id.clone(), queue_order: order })?;
        }
        Ok(())
    }

    /// Swap a pending task with its neighbor.
    pub fn move_pending_task(&self, id: &TaskId, direction: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if task.status != TaskStatus::Pending {
            return Err(StoreError::Conflict(format!("task {} is not pending", id)));
        }
        let pending = inner.pending_sorted();
        let Some(index) = pending.iter().position(|t| t.id == task.id) else {
            return Ok(());
        };
        let neighbor = match direction {
            "up" => index.checked_sub(1).map(|i| pending[i].clone()),
            "down" => pending.get(index + 1).cloned(),
            other => {
                return Err(StoreError::InvalidInput(format!("unknown direction {:?}", other)))
            }
        };
        let Some(neighbor) = neighbor else {
            return Ok(()); // already at the edge
        };
        inner.commit(StoreEvent::QueueOrderSet {
            id: task.id.clone(),
            queue_order: neighbor.queue_order,
        })?;
        inner.commit(StoreEvent::QueueOrderSet {
            id: neighbor.id.clone(),
            queue_order: task.queue_order,
        })?;
        Ok(())
    }

    /// Atomically promote the head queued task to pending.
    pub fn dequeue_next_queued_task(&self, now: u64) -> Result<Option<Task>, StoreError> {
        let mut inner = self.inner.lock();
        let mut queued: Vec<Task> = inner
            .state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Queued)
            .cloned()
            .collect();
        queued.sort_by_key(|t| t.pick_key());
        let Some(head) = queued.into_iter().next() else {
            return Ok(None);
        };
        inner.commit(StoreEvent::TaskStatusChanged {
            id: head.id.clone(),
            status: TaskStatus::Pending,
            at_ms: now,
            started_at_ms: None,
            completed_at_ms: None,
            queue_order: Some(now),
            retry_count: None,
            result: None,
            error: None,
            agent_id: None,
            thread_id: None,
        })?;
        Ok(inner.state.tasks.get(head.id.as_str()).cloned())
    }

    /// Pending-only field edits.
    pub fn update_task(&self, id: &TaskId, update: TaskUpdate) -> Result<Task, StoreError> {
        if update.is_empty() {
            return Err(StoreError::InvalidInput("no fields to update".into()));
        }
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if !task.is_editable() {
            return Err(StoreError::Conflict(format!(
                "task {} is {}; only pending tasks are editable",
                id, task.status
            )));
        }
        inner.commit(StoreEvent::TaskUpdated {
            id: id.clone(),
            title: update.title,
            prompt: update.prompt,
            model: update.model,
            priority: update.priority,
            inherit_context: update.inherit_context,
            max_retries: update.max_retries,
        })?;
        inner.require_task(id)
    }

    /// Record prompt injection; returns true only on the first call.
    pub fn mark_prompt_injected(&self, id: &TaskId, now: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if task.prompt_injected_at_ms.is_some() {
            return Ok(false);
        }
        inner.commit(StoreEvent::PromptInjected { id: id.clone(), at_ms: now })?;
        Ok(true)
    }

    // ---- scheduler transitions ----

    /// Pending → planning. Enforces the one-active-task-per-project invariant.
    pub fn start_task(&self, id: &TaskId, now: u64) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if task.status != TaskStatus::Pending {
            return Err(StoreError::Conflict(format!("task {} is {}", id, task.status)));
        }
        if let Some(active) = inner.state.active_task() {
            return Err(StoreError::Conflict(format!("task {} is already active", active.id)));
        }
        inner.commit(StoreEvent::TaskStatusChanged {
            id: id.clone(),
            status: TaskStatus::Planning,
            at_ms: now,
            started_at_ms: Some(now),
            completed_at_ms: None,
            queue_order: None,
            retry_count: None,
            result: None,
            error: None,
            agent_id: None,
            thread_id: None,
        })?;
        inner.require_task(id)
    }

    /// Planning → running.
    pub fn set_task_running(&self, id: &TaskId, agent_id: Option<String>) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if task.status != TaskStatus::Planning {
            return Err(StoreError::Conflict(format!("task {} is {}", id, task.status)));
        }
        inner.commit(StoreEvent::TaskStatusChanged {
            id: id.clone(),
            status: TaskStatus::Running,
            at_ms: task.started_at_ms.unwrap_or_default(),
            started_at_ms: None,
            completed_at_ms: None,
            queue_order: None,
            retry_count: None,
            result: None,
            error: None,
            agent_id,
            thread_id: None,
        })?;
        inner.require_task(id)
    }

    pub fn complete_task(
        &self,
        id: &TaskId,
        now: u64,
        result: String,
        thread_id: Option<String>,
    ) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if task.is_terminal() {
            return Err(StoreError::Conflict(format!("task {} is already {}", id, task.status)));
        }
        // completed_at >= started_at even if the caller's clock is stale.
        let completed = now.max(task.started_at_ms.unwrap_or(now));
        inner.commit(StoreEvent::TaskStatusChanged {
            id: id.clone(),
            status: TaskStatus::Completed,
            at_ms: completed,
            started_at_ms: None,
            completed_at_ms: Some(completed),
            queue_order: None,
            retry_count: None,
            result: Some(result),
            error: None,
            agent_id: None,
            thread_id,
        })?;
        inner.require_task(id)
    }

    /// Record a failure: back to pending when retries remain, otherwise
    /// terminal failed. Returns `(task, retried)`.
    pub fn fail_task(
        &self,
        id: &TaskId,
        now: u64,
        error: String,
    ) -> Result<(Task, bool), StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if task.is_terminal() {
            return Err(StoreError::Conflict(format!("task {} is already {}", id, task.status)));
        }
        let retried = task.retry_count < task.max_retries;
        let (status, queue_order, completed_at_ms) = if retried {
            (TaskStatus::Pending, Some(now), None)
        } else {
            (TaskStatus::Failed, None, Some(now.max(task.started_at_ms.unwrap_or(now))))
        };
        inner.commit(StoreEvent::TaskStatusChanged {
            id: id.clone(),
            status,
            at_ms: now,
            started_at_ms: None,
            completed_at_ms,
            queue_order,
            retry_count: Some(if retried { task.retry_count + 1 } else { task.retry_count }),
            result: None,
            error: Some(error),
            agent_id: None,
            thread_id: None,
        })?;
        Ok((inner.require_task(id)?, retried))
    }

    /// Cancel a non-terminal task. Terminal tasks are a no-op (`None`).
    pub fn cancel_task(&self, id: &TaskId, now: u64) -> Result<Option<Task>, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if task.is_terminal() {
            return Ok(None);
        }
        inner.commit(StoreEvent::TaskStatusChanged {
            id: id.clone(),
            status: TaskStatus::Cancelled,
            at_ms: now,
            started_at_ms: None,
            completed_at_ms: Some(now.max(task.started_at_ms.unwrap_or(now))),
            queue_order: None,
            retry_count: None,
            result: None,
            error: None,
            agent_id: None,
            thread_id: None,
        })?;
        Ok(Some(inner.require_task(id)?))
    }

    /// Put a terminal task back into the pending pool (retry/rerun).
    pub fn requeue_task(&self, id: &TaskId, now: u64) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if task.status.is_active() {
            return Err(StoreError::Conflict(format!("task {} is active", id)));
        }
        inner.commit(StoreEvent::TaskStatusChanged {
            id: id.clone(),
            status: TaskStatus::Pending,
            at_ms: now,
            started_at_ms: None,
            completed_at_ms: None,
            queue_order: Some(now),
            retry_count: None,
            result: None,
            error: None,
            agent_id: None,
            thread_id: None,
        })?;
        inner.require_task(id)
    }

    pub fn get_active_task_id(&self) -> Option<TaskId> {
        self.inner.lock().state.active_task().map(|t| t.id.clone())
    }

    // ---- plan & messages ----

    /// Append numbered plan steps after any existing ones.
    pub fn add_plan_steps(
        &self,
        task_id: &TaskId,
        steps: Vec<(String, String)>,
    ) -> Result<Vec<PlanStep>, StoreError> {
        let mut inner = self.inner.lock();
        inner.require_task(task_id)?;
        let start = inner
            .state
            .plan_steps
            .get(task_id.as_str())
            .and_then(|s| s.last().map(|s| s.step_number))
            .unwrap_or(0);
        let mut added = Vec::with_capacity(steps.len());
        for (offset, (title, description)) in steps.into_iter().enumerate() {
            let step = PlanStep {
                task_id: task_id.clone(),
                step_number: start + offset as u32 + 1,
                title,
                description,
                state: PlanStepState::Pending,
            };
            inner.commit(StoreEvent::PlanStepAdded { step: step.clone() })?;
            added.push(step);
        }
        Ok(added)
    }

    pub fn set_plan_step_state(
        &self,
        task_id: &TaskId,
        step_number: u32,
        state: PlanStepState,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.require_task(task_id)?;
        inner.commit(StoreEvent::PlanStepStateChanged {
            task_id: task_id.clone(),
            step_number,
            state,
        })
    }

    pub fn get_plan(&self, task_id: &TaskId) -> Vec<PlanStep> {
        self.inner.lock().state.plan_steps.get(task_id.as_str()).cloned().unwrap_or_default()
    }

    pub fn add_message(&self, message: TaskMessage) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.require_task(&message.task_id)?;
        inner.commit(StoreEvent::MessageAdded { message })
    }

    pub fn get_messages(&self, task_id: &TaskId, limit: Option<usize>) -> Vec<TaskMessage> {
        let inner = self.inner.lock();
        let messages = inner.state.messages.get(task_id.as_str()).cloned().unwrap_or_default();
        match limit {
            Some(limit) if messages.len() > limit => {
                messages[messages.len() - limit..].to_vec()
            }
            _ => messages,
        }
    }

    /// A conversation is the message stream of one task.
    pub fn get_conversation_messages(
        &self,
        conversation_id: &TaskId,
        limit: Option<usize>,
    ) -> Vec<TaskMessage> {
        self.get_messages(conversation_id, limit)
    }

    // ---- attachments ----

    pub fn add_attachment(&self, attachment: Attachment) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.attachments.contains_key(attachment.id.as_str()) {
            return Err(StoreError::Conflict(format!(
                "attachment {} already exists",
                attachment.id
            )));
        }
        inner.commit(StoreEvent::AttachmentAdded { attachment })
    }

    // ---- deletion & purge ----

    /// Remove a task and its dependents. Silent when absent.
    pub fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.tasks.contains_key(id.as_str()) {
            inner.commit(StoreEvent::TaskDeleted { id: id.clone() })?;
        }
        Ok(())
    }

    pub fn archive_task(&self, id: &TaskId, now: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.require_task(id)?;
        if !task.is_terminal() {
            return Err(StoreError::Conflict(format!("task {} is not terminal", id)));
        }
        inner.commit(StoreEvent::TaskArchived { id: id.clone(), at_ms: now })
    }

    /// One purge batch: archived+completed tasks older than `cutoff_ms`.
    pub fn purge_archived_completed_tasks_batch(
        &self,
        cutoff_ms: u64,
        limit: usize,
    ) -> Result<PurgeBatch, StoreError> {
        let mut inner = self.inner.lock();
        let mut candidates: Vec<&Task> = inner
            .state
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Completed
                    && t.archived_at_ms.is_some()
                    && t.completed_at_ms.unwrap_or(u64::MAX) < cutoff_ms
            })
            .collect();
        candidates.sort_by_key(|t| t.completed_at_ms);
        let task_ids: Vec<TaskId> =
            candidates.into_iter().take(limit).map(|t| t.id.clone()).collect();
        if task_ids.is_empty() {
            return Ok(PurgeBatch::default());
        }
        let attachments: Vec<(AttachmentId, String)> = inner
            .state
            .attachments
            .values()
            .filter(|a| {
                a.task_id
                    .as_ref()
                    .map(|t| task_ids.iter().any(|id| id == t))
                    .unwrap_or(false)
            })
            .map(|a| (a.id.clone(), a.storage_key.clone()))
            .collect();
        inner.commit(StoreEvent::TasksPurged { ids: task_ids.clone() })?;
        Ok(PurgeBatch { task_ids, attachments })
    }

    // ---- notification outbox ----

    pub fn upsert_notification(&self, row: NotificationRow) -> Result<(), StoreError> {
        self.inner.lock().commit(StoreEvent::NotificationUpserted { row })
    }

    /// Rows eligible for a send attempt at `now`.
    pub fn due_notifications(&self, now: u64) -> Vec<NotificationRow> {
        self.inner
            .lock()
            .state
            .notifications
            .values()
            .filter(|row| {
                row.notified_at_ms.is_none()
                    && row.next_retry_at_ms.map_or(true, |at| at <= now)
            })
            .cloned()
            .collect()
    }

    /// At-most-once marker; false when already notified.
    pub fn mark_notified(&self, task_id: &TaskId, now: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(row) = inner.state.notifications.get(task_id.as_str()) else {
            return Err(StoreError::NotFound(format!("notification for {}", task_id)));
        };
        if row.notified_at_ms.is_some() {
            return Ok(false);
        }
        inner.commit(StoreEvent::NotificationSent { task_id: task_id.clone(), at_ms: now })?;
        Ok(true)
    }

    pub fn record_notification_failure(
        &self,
        task_id: &TaskId,
        now: u64,
        next_retry_at_ms: u64,
        error: String,
    ) -> Result<(), StoreError> {
        self.inner.lock().commit(StoreEvent::NotificationFailed {
            task_id: task_id.clone(),
            at_ms: now,
            next_retry_at_ms,
            error,
        })
    }

    pub fn get_notification(&self, task_id: &TaskId) -> Option<NotificationRow> {
        self.inner.lock().state.notifications.get(task_id.as_str()).cloned()
    }

    // ---- history ----

    /// Append a history row. Returns false (and writes nothing) when the
    /// entry's client_message_id was already inserted for this session.
    pub fn append_history(&self, entry: HistoryEntry) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(client_id) = &entry.client_message_id {
            let duplicate = inner
                .state
                .history
                .get(&entry.session_key)
                .map(|rows| {
                    rows.iter().any(|r| r.client_message_id.as_ref() == Some(client_id))
                })
                .unwrap_or(false);
            if duplicate {
                return Ok(false);
            }
        }
        inner.commit(StoreEvent::HistoryAppended { entry })?;
        Ok(true)
    }

    pub fn clear_history(&self, session_key: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .commit(StoreEvent::HistoryCleared { session_key: session_key.to_string() })
    }

    pub fn history(&self, session_key: &str) -> Vec<HistoryEntry> {
        self.inner.lock().state.history.get(session_key).cloned().unwrap_or_default()
    }

    /// Most recent user/assistant rows, newest last, bounded by entry count
    /// and total characters.
    pub fn recent_history(
        &self,
        session_key: &str,
        max_entries: usize,
        max_chars: usize,
    ) -> Vec<HistoryEntry> {
        let inner = self.inner.lock();
        let Some(rows) = inner.state.history.get(session_key) else {
            return Vec::new();
        };
        let mut selected: Vec<HistoryEntry> = Vec::new();
        let mut chars = 0;
        for row in rows.iter().rev() {
            if row.kind != "user" && row.kind != "assistant" {
                continue;
            }
            if selected.len() >= max_entries || chars + row.content.len() > max_chars {
                break;
            }
            chars += row.content.len();
            selected.push(row.clone());
        }
        selected.reverse();
        selected
    }

    // ---- thread identity ----

    /// Idempotent: saving the same thread id twice writes one event.
    pub fn save_thread(&self, key: &str, thread_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let current = inner.state.threads.get(key).and_then(|r| r.thread_id.clone());
        if current.as_deref() == Some(thread_id) {
            return Ok(());
        }
        inner.commit(StoreEvent::ThreadSaved {
            key: key.to_string(),
            thread_id: thread_id.to_string(),
        })
    }

    pub fn stash_resume_thread(&self, key: &str, thread_id: &str) -> Result<(), StoreError> {
        self.inner.lock().commit(StoreEvent::ThreadResumeStashed {
            key: key.to_string(),
            thread_id: thread_id.to_string(),
        })
    }

    pub fn thread_record(&self, key: &str) -> ThreadRecord {
        self.inner.lock().state.threads.get(key).cloned().unwrap_or_default()
    }

    pub fn clear_thread(&self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().commit(StoreEvent::ThreadCleared { key: key.to_string() })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
