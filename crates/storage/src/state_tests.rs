// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::{MessageRole, MessageType, Task, TaskId, TaskMessage, TaskStatus};
use crate::state::HistoryEntry;

fn created(task: &Task) -> StoreEvent {
    StoreEvent::TaskCreated { task: task.clone() }
}

#[test]
fn apply_is_idempotent_for_create() {
    let mut state = MaterializedTasks::default();
    let task = Task::builder().title("one").build();
    let event = created(&task);
    state.apply(&event);
    state.apply(&event);
    assert_eq!(state.tasks.len(), 1);
}

#[test]
fn prompt_injected_only_sets_once() {
    let mut state = MaterializedTasks::default();
    let task = Task::builder().build();
    state.apply(&created(&task));

    state.apply(&StoreEvent::PromptInjected { id: task.id.clone(), at_ms: 100 });
    state.apply(&StoreEvent::PromptInjected { id: task.id.clone(), at_ms: 999 });
    assert_eq!(state.tasks[task.id.as_str()].prompt_injected_at_ms, Some(100));
}

#[test]
fn status_change_updates_fields() {
    let mut state = MaterializedTasks::default();
    let task = Task::builder().build();
    state.apply(&created(&task));

    state.apply(&StoreEvent::TaskStatusChanged {
        id: task.id.clone(),
        status: TaskStatus::Planning,
        at_ms: 50,
        started_at_ms: Some(50),
        completed_at_ms: None,
        queue_order: None,
        retry_count: None,
        result: None,
        error: None,
        agent_id: Some("codex".into()),
        thread_id: None,
    });
    let stored = &state.tasks[task.id.as_str()];
    assert_eq!(stored.status, TaskStatus::Planning);
    assert_eq!(stored.started_at_ms, Some(50));
    assert_eq!(stored.agent_id.as_deref(), Some("codex"));
}

#[test]
fn delete_cascades_to_dependents() {
    let mut state = MaterializedTasks::default();
    let task = Task::builder().build();
    state.apply(&created(&task));
    state.apply(&StoreEvent::MessageAdded {
        message: TaskMessage {
            task_id: task.id.clone(),
            role: MessageRole::User,
            message_type: MessageType::Chat,
            content: "hi".into(),
            model_used: None,
            created_at_ms: 1,
        },
    });
    assert!(!state.messages.is_empty());

    state.apply(&StoreEvent::TaskDeleted { id: task.id.clone() });
    assert!(state.tasks.is_empty());
    assert!(state.messages.is_empty());
}

#[test]
fn replayed_message_is_not_duplicated() {
    let mut state = MaterializedTasks::default();
    let task = Task::builder().build();
    state.apply(&created(&task));
    let event = StoreEvent::MessageAdded {
        message: TaskMessage {
            task_id: task.id.clone(),
            role: MessageRole::Assistant,
            message_type: MessageType::Chat,
            content: "result".into(),
            model_used: None,
            created_at_ms: 7,
        },
    };
    state.apply(&event);
    state.apply(&event);
    assert_eq!(state.messages[task.id.as_str()].len(), 1);
}

#[test]
fn history_dedupes_by_client_message_id() {
    let mut state = MaterializedTasks::default();
    let entry = HistoryEntry {
        session_key: "main".into(),
        kind: "user".into(),
        content: "hello".into(),
        client_message_id: Some("cm-1".into()),
        created_at_ms: 1,
    };
    state.apply(&StoreEvent::HistoryAppended { entry: entry.clone() });
    state.apply(&StoreEvent::HistoryAppended { entry });
    assert_eq!(state.history["main"].len(), 1);
}

#[test]
fn notification_sent_marker_is_write_once() {
    let mut state = MaterializedTasks::default();
    let id = TaskId::from_string("task-n");
    state.apply(&StoreEvent::NotificationUpserted {
        row: crate::state::NotificationRow {
            task_id: id.clone(),
            workspace_root: "/tmp/ws".into(),
            status: TaskStatus::Completed,
            started_at_ms: Some(1),
            completed_at_ms: Some(2),
            project_name: "ws".into(),
            last_error: None,
            retry_count: 0,
            next_retry_at_ms: None,
            notified_at_ms: None,
        },
    });
    state.apply(&StoreEvent::NotificationSent { task_id: id.clone(), at_ms: 10 });
    state.apply(&StoreEvent::NotificationSent { task_id: id.clone(), at_ms: 99 });
    assert_eq!(state.notifications[id.as_str()].notified_at_ms, Some(10));
}

#[test]
fn unknown_events_deserialize_to_custom_and_are_ignored() {
    let event: StoreEvent =
        serde_json::from_str(r#"{"type":"task:from_the_future","id":"x"}"#).unwrap();
    assert_eq!(event, StoreEvent::Custom);
    let mut state = MaterializedTasks::default();
    state.apply(&event);
    assert!(state.tasks.is_empty());
}
