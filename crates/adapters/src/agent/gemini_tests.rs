// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::Input;
use std::collections::HashMap;

fn profile() -> GeminiProfile {
    GeminiProfile::new()
}

fn request() -> TurnRequest {
    TurnRequest {
        input: Input::text("summarize"),
        thread_id: None,
        model: Some("gemini-2.5-pro".into()),
        cwd: None,
        env: HashMap::new(),
    }
}

#[test]
fn args_carry_model_and_prompt() {
    let args = profile().build_args(&request());
    let pos = args.iter().position(|a| a == "-m").unwrap();
    assert_eq!(args[pos + 1], "gemini-2.5-pro");
    assert_eq!(args.last().unwrap(), "summarize");
}

#[test]
fn message_chunks_accumulate_response() {
    let mut outcome = ParseOutcome::default();
    profile().parse_line(r#"{"type":"message","text":"Hello "}"#, &mut outcome);
    let events = profile().parse_line(r#"{"type":"message","text":"world"}"#, &mut outcome);
    assert_eq!(outcome.response, "Hello world");
    match &events[0] {
        AgentEvent::ItemUpdated { delta, .. } => assert_eq!(delta.as_deref(), Some("world")),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn shell_tool_call_round_trip() {
    let mut outcome = ParseOutcome::default();
    let call = r#"{"type":"tool_call","id":"t1","name":"run_shell_command","args":{"command":"npm test"}}"#;
    let events = profile().parse_line(call, &mut outcome);
    assert!(matches!(
        &events[0],
        AgentEvent::ItemStarted { item: ThreadItem::CommandExecution { command, .. } }
            if command == "npm test"
    ));

    let result = r#"{"type":"tool_result","id":"t1","status":"ok","output":"42 passing"}"#;
    let events = profile().parse_line(result, &mut outcome);
    assert!(matches!(
        &events[0],
        AgentEvent::ItemCompleted {
            item: ThreadItem::CommandExecution { status: CommandStatus::Completed, aggregated_output, .. }
        } if aggregated_output == "42 passing"
    ));
}

#[test]
fn result_line_completes_turn_with_stats() {
    let mut outcome = ParseOutcome::default();
    let line = r#"{"type":"result","status":"ok","response":"done","stats":{"input":20,"cached":5,"output":4}}"#;
    profile().parse_line(line, &mut outcome);
    assert!(outcome.completed);
    assert_eq!(outcome.response, "done");
    assert_eq!(outcome.usage.unwrap().input_tokens, 20);
}

#[test]
fn error_result_is_recorded() {
    let mut outcome = ParseOutcome::default();
    profile().parse_line(r#"{"type":"result","status":"error","error":"quota"}"#, &mut outcome);
    assert_eq!(outcome.error.as_deref(), Some("quota"));
}
