// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::Task;

#[test]
fn prompt_message_round_trips() {
    let json = r#"{"type":"prompt","payload":{"text":"hi","client_message_id":"cm-1"}}"#;
    let message: ClientMessage = serde_json::from_str(json).unwrap();
    match &message {
        ClientMessage::Prompt(payload) => {
            assert_eq!(payload.text, "hi");
            assert_eq!(payload.client_message_id.as_deref(), Some("cm-1"));
            assert!(payload.images.is_empty());
        }
        other => panic!("unexpected: {:?}", other),
    }
    let back = serde_json::to_value(&message).unwrap();
    assert_eq!(back["type"], "prompt");
    assert_eq!(back["payload"]["text"], "hi");
}

#[test]
fn unit_client_messages_need_no_payload() {
    let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert_eq!(ping, ClientMessage::Ping);
    let agents: ClientMessage = serde_json::from_str(r#"{"type":"agents"}"#).unwrap();
    assert_eq!(agents, ClientMessage::Agents);
}

#[test]
fn command_message_carries_raw_string() {
    let message: ClientMessage =
        serde_json::from_str(r#"{"type":"command","payload":"/cd /tmp"}"#).unwrap();
    assert_eq!(message, ClientMessage::Command("/cd /tmp".into()));
}

#[test]
fn task_resume_defaults_to_auto() {
    let message: ClientMessage =
        serde_json::from_str(r#"{"type":"task_resume","payload":{}}"#).unwrap();
    match message {
        ClientMessage::TaskResume(payload) => {
            assert_eq!(payload.mode, ResumeMode::Auto);
            assert!(payload.thread_id.is_none());
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn result_message_uses_camel_case_thread_fields() {
    let message = ServerMessage::Result(TurnResult {
        ok: true,
        output: "done".into(),
        thread_id: Some("th-1".into()),
        expected_thread_id: Some("th-0".into()),
        thread_reset: true,
    });
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["type"], "result");
    assert_eq!(value["threadId"], "th-1");
    assert_eq!(value["expectedThreadId"], "th-0");
    assert_eq!(value["threadReset"], true);
}

#[test]
fn task_event_uses_colon_tag() {
    let message = ServerMessage::TaskEvent(TaskEventPayload {
        event: "task:started".into(),
        task_id: None,
        task: None,
        detail: None,
    });
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["type"], "task:event");
    assert_eq!(value["event"], "task:started");
}

#[test]
fn patch_request_distinguishes_action_and_update() {
    let action: PatchTaskRequest = serde_json::from_str(r#"{"action":"cancel"}"#).unwrap();
    assert!(matches!(action, PatchTaskRequest::Action { action: PatchAction::Cancel }));

    let update: PatchTaskRequest =
        serde_json::from_str(r#"{"title":"new title","maxRetries":3}"#).unwrap();
    match update {
        PatchTaskRequest::Update { title, max_retries, .. } => {
            assert_eq!(title.as_deref(), Some("new title"));
            assert_eq!(max_retries, Some(3));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn task_dto_maps_task_fields() {
    let task = Task::builder().title("t").prompt("p").build();
    let dto = TaskDto::from(&task);
    assert_eq!(dto.id, task.id);
    let value = serde_json::to_value(&dto).unwrap();
    assert_eq!(value["createdAt"], 1);
    assert_eq!(value["status"], "pending");
}

#[test]
fn error_payload_from_classified_error() {
    let classified = ads_core::ClassifiedError::classify("429 rate limit");
    let payload = ErrorPayload::from(&classified);
    assert_eq!(payload.code, "rate_limited");
    assert!(payload.retryable);
    assert!(!payload.hint.is_empty());
}
