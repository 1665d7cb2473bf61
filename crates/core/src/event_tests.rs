// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn command_item() -> ThreadItem {
    ThreadItem::CommandExecution {
        id: "item-1".into(),
        command: "cargo test".into(),
        status: CommandStatus::InProgress,
        exit_code: None,
        aggregated_output: String::new(),
    }
}

#[test]
fn events_serialize_with_type_tag() {
    let event = AgentEvent::ItemStarted { item: command_item() };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "item:started");
    assert_eq!(value["item"]["item_type"], "command_execution");
    assert_eq!(value["item"]["command"], "cargo test");
}

#[test]
fn unknown_event_types_deserialize_to_custom() {
    let event: AgentEvent =
        serde_json::from_str(r#"{"type":"turn:not_a_thing","payload":1}"#).unwrap();
    assert_eq!(event, AgentEvent::Custom);
}

#[test]
fn turn_completed_round_trips() {
    let event = AgentEvent::TurnCompleted {
        response: "done".into(),
        usage: Some(TurnUsage { input_tokens: 10, cached_input_tokens: 4, output_tokens: 2 }),
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: AgentEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn item_phases() {
    assert_eq!(command_item().phase(), Phase::Command);
    let reasoning = ThreadItem::Reasoning { id: "r".into(), text: "hm".into() };
    assert_eq!(reasoning.phase(), Phase::Analysis);
    let msg = ThreadItem::AgentMessage { id: "m".into(), text: "hi".into() };
    assert_eq!(msg.phase(), Phase::Responding);
    let ws = ThreadItem::WebSearch { id: "w".into(), query: "rust".into() };
    assert_eq!(ws.phase(), Phase::Tool);
}

#[test]
fn event_phase_covers_lifecycle() {
    assert_eq!(AgentEvent::TurnStarted.phase(), Phase::Boot);
    let failed = AgentEvent::TurnFailed { error: TurnError { message: "x".into() } };
    assert_eq!(failed.phase(), Phase::Error);
    let status = AgentEvent::Status {
        phase: Phase::Connection,
        title: "reconnect".into(),
        detail: String::new(),
    };
    assert_eq!(status.phase(), Phase::Connection);
}
