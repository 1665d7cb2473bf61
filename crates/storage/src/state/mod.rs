// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.

mod history;
mod notify;
mod tasks;
mod types;

pub use types::{HistoryEntry, NotificationRow, ThreadRecord};

use ads_core::{Attachment, PlanStep, Task, TaskMessage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::events::StoreEvent;

/// Materialized task state built from WAL events.
///
/// The maps correspond one-to-one to the embedded tables: `tasks`,
/// `task_plan_steps`, `task_messages`, `task_attachments`,
/// `web_task_notifications`, `history_entries`, plus the thread-identity
/// records.
///
/// # Idempotency Requirement
///
/// **All event handlers MUST be idempotent.** Applying the same event twice
/// must produce the same state as applying it once: events are applied once
/// by the mutating operation and again during replay after a crash.
/// Guidelines:
/// - Use assignment (`=`) instead of mutation (`+=`)
/// - Guard inserts with existence checks
/// - Guard set-once fields (`prompt_injected_at_ms`, `notified_at_ms`)
///   behind `is_none()` checks
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedTasks {
    pub tasks: HashMap<String, Task>,
    #[serde(default)]
    pub plan_steps: HashMap<String, Vec<PlanStep>>,
    #[serde(default)]
    pub messages: HashMap<String, Vec<TaskMessage>>,
    #[serde(default)]
    pub attachments: HashMap<String, Attachment>,
    #[serde(default)]
    pub notifications: HashMap<String, NotificationRow>,
    #[serde(default)]
    pub history: HashMap<String, Vec<HistoryEntry>>,
    /// Thread identity per "user:agent" key.
    #[serde(default)]
    pub threads: HashMap<String, ThreadRecord>,
}

impl MaterializedTasks {
    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Current non-terminal active task (planning or running), if any.
    pub fn active_task(&self) -> Option<&Task> {
        self.tasks.values().find(|t| t.status.is_active())
    }

    /// Apply an event to derive state changes.
    pub fn apply(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::TaskCreated { .. }
            | StoreEvent::TaskUpdated { .. }
            | StoreEvent::TaskStatusChanged { .. }
            | StoreEvent::QueueOrderSet { .. }
            | StoreEvent::PromptInjected { .. }
            | StoreEvent::TaskArchived { .. }
            | StoreEvent::TaskDeleted { .. }
            | StoreEvent::TasksPurged { .. }
            | StoreEvent::PlanStepAdded { .. }
            | StoreEvent::PlanStepStateChanged { .. }
            | StoreEvent::MessageAdded { .. }
            | StoreEvent::AttachmentAdded { .. }
            | StoreEvent::AttachmentLinked { .. } => tasks::apply(self, event),

            StoreEvent::NotificationUpserted { .. }
            | StoreEvent::NotificationSent { .. }
            | StoreEvent::NotificationFailed { .. } => notify::apply(self, event),

            StoreEvent::HistoryAppended { .. }
            | StoreEvent::HistoryCleared { .. }
            | StoreEvent::ThreadSaved { .. }
            | StoreEvent::ThreadResumeStashed { .. }
            | StoreEvent::ThreadCleared { .. } => history::apply(self, event),

            StoreEvent::Custom => {}
        }
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
