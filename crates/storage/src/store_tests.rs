// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::{MessageRole, MessageType, TaskMessage};
use tempfile::tempdir;

fn open_store(dir: &Path) -> TaskStore {
    TaskStore::open(dir).unwrap()
}

fn create(store: &TaskStore, prompt: &str, now: u64) -> Task {
    store
        .create_task(CreateTask { prompt: prompt.into(), ..CreateTask::default() }, now, None)
        .unwrap()
}

#[test]
fn create_then_list_then_get_round_trip() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());

    let task = create(&store, "Hello", 100);
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.title, "Hello");

    let listed = store.list_tasks(None, None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, task.id);
    assert_eq!(store.get_task(&task.id).unwrap(), task);
}

#[test]
fn empty_prompt_is_rejected() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let err = store
        .create_task(CreateTask { prompt: "   ".into(), ..CreateTask::default() }, 1, None)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[test]
fn listing_orders_by_priority_then_queue_order() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());

    let low_old = create(&store, "low old", 10);
    let low_new = create(&store, "low new", 20);
    let high = store
        .create_task(
            CreateTask { prompt: "high".into(), priority: 5, ..CreateTask::default() },
            30,
            None,
        )
        .unwrap();

    let ids: Vec<_> = store.list_tasks(None, None).into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![high.id, low_old.id, low_new.id]);
}

#[test]
fn reorder_pending_matches_given_order_exactly() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let a = create(&store, "A", 1);
    let b = create(&store, "B", 2);
    let c = create(&store, "C", 3);

    store.reorder_pending_tasks(&[c.id.clone(), a.id.clone(), b.id.clone()]).unwrap();

    let ids: Vec<_> = store
        .list_tasks(Some(TaskStatus::Pending), None)
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![c.id, a.id, b.id]);
}

#[test]
fn reorder_rejects_non_pending_ids() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let a = create(&store, "A", 1);
    let b = create(&store, "B", 2);
    store.start_task(&a.id, 10).unwrap();

    let err = store.reorder_pending_tasks(&[a.id.clone(), b.id.clone()]).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    // And the pending task kept its order.
    assert_eq!(store.get_task(&b.id).unwrap().queue_order, 2);
}

#[test]
fn move_swaps_with_neighbor_and_edges_are_noops() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let a = create(&store, "A", 1);
    let b = create(&store, "B", 2);

    store.move_pending_task(&b.id, "up").unwrap();
    let ids: Vec<_> =
        store.list_tasks(Some(TaskStatus::Pending), None).into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![b.id.clone(), a.id.clone()]);

    // b is now first; moving it up again changes nothing.
    store.move_pending_task(&b.id, "up").unwrap();
    let ids2: Vec<_> =
        store.list_tasks(Some(TaskStatus::Pending), None).into_iter().map(|t| t.id).collect();
    assert_eq!(ids2, vec![b.id, a.id]);
}

#[test]
fn dequeue_promotes_head_queued_task() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let queued = store
        .create_task(
            CreateTask { prompt: "queued".into(), ..CreateTask::default() },
            5,
            Some(TaskStatus::Queued),
        )
        .unwrap();
    assert_eq!(queued.status, TaskStatus::Queued);

    let promoted = store.dequeue_next_queued_task(50).unwrap().unwrap();
    assert_eq!(promoted.id, queued.id);
    assert_eq!(promoted.status, TaskStatus::Pending);
    assert_eq!(promoted.queue_order, 50);

    assert!(store.dequeue_next_queued_task(60).unwrap().is_none());
}

#[test]
fn update_is_rejected_for_non_pending() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = create(&store, "edit me", 1);
    store.start_task(&task.id, 2).unwrap();

    let err = store
        .update_task(&task.id, TaskUpdate { title: Some("new".into()), ..TaskUpdate::default() })
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn update_patches_pending_fields() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = create(&store, "edit me", 1);
    let updated = store
        .update_task(
            &task.id,
            TaskUpdate {
                title: Some("renamed".into()),
                priority: Some(9),
                max_retries: Some(2),
                ..TaskUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.priority, 9);
    assert_eq!(updated.max_retries, 2);
    assert_eq!(updated.prompt, "edit me");
}

#[test]
fn mark_prompt_injected_returns_true_exactly_once() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = create(&store, "inject", 1);
    assert!(store.mark_prompt_injected(&task.id, 10).unwrap());
    assert!(!store.mark_prompt_injected(&task.id, 20).unwrap());
    assert_eq!(store.get_task(&task.id).unwrap().prompt_injected_at_ms, Some(10));
}

#[test]
fn single_active_task_invariant() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let a = create(&store, "A", 1);
    let b = create(&store, "B", 2);

    store.start_task(&a.id, 10).unwrap();
    let err = store.start_task(&b.id, 11).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.get_active_task_id(), Some(a.id));
}

#[test]
fn lifecycle_timestamps_are_monotonic() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = create(&store, "timing", 100);
    store.start_task(&task.id, 200).unwrap();
    store.set_task_running(&task.id, Some("fake".into())).unwrap();
    let done = store.complete_task(&task.id, 300, "ok".into(), None).unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.completed_at_ms.unwrap() >= done.started_at_ms.unwrap());
    assert!(done.started_at_ms.unwrap() >= done.created_at_ms);
}

#[test]
fn failure_with_retries_left_requeues_as_pending() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = store
        .create_task(
            CreateTask { prompt: "retry me".into(), max_retries: 2, ..CreateTask::default() },
            1,
            None,
        )
        .unwrap();
    store.start_task(&task.id, 10).unwrap();

    let (failed, retried) = store.fail_task(&task.id, 20, "boom".into()).unwrap();
    assert!(retried);
    assert_eq!(failed.status, TaskStatus::Pending);
    assert_eq!(failed.retry_count, 1);
    assert_eq!(failed.queue_order, 20);
}

#[test]
fn failure_without_retries_is_terminal() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = create(&store, "no retries", 1);
    store.start_task(&task.id, 10).unwrap();

    let (failed, retried) = store.fail_task(&task.id, 20, "boom".into()).unwrap();
    assert!(!retried);
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("boom"));
}

#[test]
fn cancel_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = create(&store, "cancel me", 1);

    let cancelled = store.cancel_task(&task.id, 10).unwrap().unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    // Second cancel is a no-op.
    assert!(store.cancel_task(&task.id, 20).unwrap().is_none());
    assert_eq!(store.get_task(&task.id).unwrap().completed_at_ms, Some(10));
}

#[test]
fn attachment_conflict_on_create() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let attachment = ads_core::Attachment {
        id: ads_core::AttachmentId::from_string("att-1"),
        task_id: None,
        storage_key: "blobs/att-1.png".into(),
        content_type: "image/png".into(),
        sha256: "deadbeef".into(),
        width: Some(10),
        height: Some(10),
        size_bytes: 123,
        filename: "shot.png".into(),
    };
    store.add_attachment(attachment.clone()).unwrap();

    let first = store
        .create_task(
            CreateTask {
                prompt: "with attachment".into(),
                attachments: vec![attachment.id.clone()],
                ..CreateTask::default()
            },
            1,
            None,
        )
        .unwrap();
    assert!(first.id.as_str().starts_with("task-"));

    let err = store
        .create_task(
            CreateTask {
                prompt: "steals attachment".into(),
                attachments: vec![attachment.id],
                ..CreateTask::default()
            },
            2,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn plan_and_messages_round_trip() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = create(&store, "plan me", 1);

    let steps = store
        .add_plan_steps(
            &task.id,
            vec![("step one".into(), "do a".into()), ("step two".into(), "do b".into())],
        )
        .unwrap();
    assert_eq!(steps[0].step_number, 1);
    assert_eq!(steps[1].step_number, 2);

    store
        .set_plan_step_state(&task.id, 1, ads_core::PlanStepState::Completed)
        .unwrap();
    let plan = store.get_plan(&task.id);
    assert_eq!(plan[0].state, ads_core::PlanStepState::Completed);
    assert_eq!(plan[1].state, ads_core::PlanStepState::Pending);

    store
        .add_message(TaskMessage {
            task_id: task.id.clone(),
            role: MessageRole::Assistant,
            message_type: MessageType::Chat,
            content: "working".into(),
            model_used: Some("fake".into()),
            created_at_ms: 5,
        })
        .unwrap();
    assert_eq!(store.get_messages(&task.id, None).len(), 1);
    assert!(store.get_messages(&task.id, Some(0)).is_empty());
}

#[test]
fn delete_task_is_silent_when_absent() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    store.delete_task(&TaskId::from_string("task-missing")).unwrap();
}

#[test]
fn purge_returns_only_old_archived_completed() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());

    let old = create(&store, "old", 1);
    store.start_task(&old.id, 2).unwrap();
    store.set_task_running(&old.id, None).unwrap();
    store.complete_task(&old.id, 100, "done".into(), None).unwrap();
    store.archive_task(&old.id, 150).unwrap();

    let fresh = create(&store, "fresh", 3);
    store.start_task(&fresh.id, 4).unwrap();
    store.set_task_running(&fresh.id, None).unwrap();
    store.complete_task(&fresh.id, 9_000, "done".into(), None).unwrap();
    store.archive_task(&fresh.id, 9_100).unwrap();

    let batch = store.purge_archived_completed_tasks_batch(5_000, 100).unwrap();
    assert_eq!(batch.task_ids, vec![old.id.clone()]);
    assert!(store.get_task(&old.id).is_none());
    assert!(store.get_task(&fresh.id).is_some());
}

#[test]
fn snapshot_now_folds_the_wal() {
    let dir = tempdir().unwrap();
    let id = {
        let store = open_store(dir.path());
        let task = create(&store, "snapshot me", 1);
        store.snapshot_now().unwrap();
        // Idempotent when nothing new was written.
        store.snapshot_now().unwrap();
        task.id
    };
    assert!(dir.path().join("tasks.snap").exists());

    // Reload comes from the snapshot (the WAL suffix is empty).
    let store = open_store(dir.path());
    assert!(store.get_task(&id).is_some());
}

#[test]
fn store_reloads_state_from_disk() {
    let dir = tempdir().unwrap();
    let id = {
        let store = open_store(dir.path());
        let task = create(&store, "durable", 1);
        store.start_task(&task.id, 5).unwrap();
        task.id
    };

    let store = open_store(dir.path());
    let task = store.get_task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Planning);
    assert_eq!(task.started_at_ms, Some(5));
}

#[test]
fn history_append_dedup_and_recent_window() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());

    let entry = HistoryEntry {
        session_key: "main".into(),
        kind: "user".into(),
        content: "hello".into(),
        client_message_id: Some("cm-1".into()),
        created_at_ms: 1,
    };
    assert!(store.append_history(entry.clone()).unwrap());
    assert!(!store.append_history(entry).unwrap());
    assert_eq!(store.history("main").len(), 1);

    for n in 0..30 {
        store
            .append_history(HistoryEntry {
                session_key: "main".into(),
                kind: if n % 2 == 0 { "assistant".into() } else { "user".into() },
                content: format!("row {}", n),
                client_message_id: None,
                created_at_ms: 10 + n,
            })
            .unwrap();
    }
    let recent = store.recent_history("main", 20, 8_000);
    assert_eq!(recent.len(), 20);
    assert_eq!(recent.last().unwrap().content, "row 29");

    // Character budget trims the window further.
    let tight = store.recent_history("main", 20, 12);
    assert!(tight.len() < 20);
}

#[test]
fn thread_save_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    store.save_thread("1:codex", "th-1").unwrap();
    store.save_thread("1:codex", "th-1").unwrap();
    assert_eq!(store.thread_record("1:codex").thread_id.as_deref(), Some("th-1"));

    store.stash_resume_thread("1:codex", "th-0").unwrap();
    let record = store.thread_record("1:codex");
    assert_eq!(record.resume_thread.as_deref(), Some("th-0"));

    store.clear_thread("1:codex").unwrap();
    assert!(store.thread_record("1:codex").thread_id.is_none());
}

#[test]
fn notifier_rows_due_and_at_most_once() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let task = create(&store, "notify", 1);

    store
        .upsert_notification(NotificationRow {
            task_id: task.id.clone(),
            workspace_root: "/tmp/ws".into(),
            status: TaskStatus::Completed,
            started_at_ms: Some(1),
            completed_at_ms: Some(2),
            project_name: "ws".into(),
            last_error: None,
            retry_count: 0,
            next_retry_at_ms: None,
            notified_at_ms: None,
        })
        .unwrap();

    assert_eq!(store.due_notifications(10).len(), 1);
    store.record_notification_failure(&task.id, 10, 5_010, "net down".into()).unwrap();
    assert!(store.due_notifications(10).is_empty());
    assert_eq!(store.due_notifications(6_000).len(), 1);
    assert_eq!(store.get_notification(&task.id).unwrap().retry_count, 1);

    assert!(store.mark_notified(&task.id, 6_001).unwrap());
    assert!(!store.mark_notified(&task.id, 6_002).unwrap());
    assert!(store.due_notifications(7_000).is_empty());
}
