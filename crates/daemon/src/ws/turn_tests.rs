// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::event::{CommandStatus, FileChangeEntry, TurnError};

fn translator() -> TurnTranslator {
    TurnTranslator::new(50, DedupeMode::Consecutive, "codex")
}

fn message_update(text: &str) -> AgentEvent {
    AgentEvent::ItemUpdated {
        item: ThreadItem::AgentMessage { id: "m1".into(), text: text.into() },
        delta: None,
    }
}

#[test]
fn responding_deltas_send_only_the_suffix() {
    let mut t = translator();
    let out = t.translate(&message_update("Hello"));
    assert_eq!(out.len(), 1);
    assert!(matches!(&out[0], ServerMessage::Delta { delta, source: None } if delta == "Hello"));

    let out = t.translate(&message_update("Hello world"));
    assert!(matches!(&out[0], ServerMessage::Delta { delta, .. } if delta == " world"));

    // Unchanged text produces nothing.
    assert!(t.translate(&message_update("Hello world")).is_empty());
    assert_eq!(t.response(), "Hello world");
}

#[test]
fn reasoning_deltas_carry_step_source() {
    let mut t = translator();
    let event = AgentEvent::ItemUpdated {
        item: ThreadItem::Reasoning { id: "r1".into(), text: "thinking".into() },
        delta: Some("thinking".into()),
    };
    let out = t.translate(&event);
    assert!(matches!(
        &out[0],
        ServerMessage::Delta { delta, source: Some(s) } if delta == "thinking" && s == "step"
    ));
}

#[test]
fn phase_status_lines_render_bracketed() {
    let mut t = translator();
    let event = AgentEvent::Status {
        phase: Phase::Boot,
        title: "starting".into(),
        detail: "codex".into(),
    };
    let out = t.translate(&event);
    assert!(matches!(
        &out[0],
        ServerMessage::Delta { delta, source: Some(s) }
            if delta == "[boot] starting: codex\n" && s == "step"
    ));
}

fn command_event(output: &str, completed: bool) -> AgentEvent {
    let item = ThreadItem::CommandExecution {
        id: "i1".into(),
        command: "rg foo".into(),
        status: if completed { CommandStatus::Completed } else { CommandStatus::InProgress },
        exit_code: completed.then_some(0),
        aggregated_output: output.into(),
    };
    if completed {
        AgentEvent::ItemCompleted { item }
    } else {
        AgentEvent::ItemUpdated { item, delta: None }
    }
}

#[test]
fn command_header_once_then_prefix_diffed_output() {
    let mut t = translator();

    let out = t.translate(&command_event("line1\n", false));
    assert_eq!(out.len(), 2);
    assert!(matches!(&out[0], ServerMessage::Delta { delta, .. } if delta == "$ rg foo\n"));
    match &out[1] {
        ServerMessage::Command { command } => {
            assert_eq!(command.id, "i1:cmd:rg foo");
            assert_eq!(command.output_delta, "line1\n");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(t.take_history(), vec!["$ rg foo"]);

    // Second update: no header, only the new output suffix.
    let out = t.translate(&command_event("line1\nline2\n", true));
    assert_eq!(out.len(), 1);
    match &out[0] {
        ServerMessage::Command { command } => {
            assert_eq!(command.output_delta, "line2\n");
            assert_eq!(command.exit_code, Some(0));
            assert_eq!(command.status, "completed");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(t.take_history().is_empty());
}

#[test]
fn file_change_completion_emits_patch_and_explored() {
    let mut t = translator();
    let event = AgentEvent::ItemCompleted {
        item: ThreadItem::FileChange {
            id: "f1".into(),
            changes: vec![
                FileChangeEntry { kind: FileChangeKind::Update, path: "src/lib.rs".into() },
                FileChangeEntry { kind: FileChangeKind::Add, path: "src/new.rs".into() },
            ],
        },
    };
    let out = t.translate(&event);
    assert!(matches!(
        &out[0],
        ServerMessage::Patch { patch } if patch == "M src/lib.rs\nA src/new.rs\n"
    ));
    assert!(matches!(
        &out[1],
        ServerMessage::Explored { category, summary } if category == "Write" && summary == "src/lib.rs"
    ));

    // The explored tracker ingested the change too.
    assert_eq!(t.explored.len(), 2);
}

#[test]
fn in_progress_file_change_stays_quiet() {
    let mut t = translator();
    let event = AgentEvent::ItemUpdated {
        item: ThreadItem::FileChange {
            id: "f1".into(),
            changes: vec![FileChangeEntry {
                kind: FileChangeKind::Update,
                path: "src/lib.rs".into(),
            }],
        },
        delta: None,
    };
    assert!(t.translate(&event).is_empty());
}

#[test]
fn turn_boundaries_translate_to_nothing() {
    let mut t = translator();
    assert!(t.translate(&AgentEvent::TurnStarted).is_empty());
    assert!(t
        .translate(&AgentEvent::TurnCompleted { response: "done".into(), usage: None })
        .is_empty());
    assert!(t
        .translate(&AgentEvent::TurnFailed { error: TurnError { message: "x".into() } })
        .is_empty());
}
