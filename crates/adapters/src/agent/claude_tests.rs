// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::Input;
use std::collections::HashMap;

fn profile() -> ClaudeProfile {
    ClaudeProfile::new()
}

fn request() -> TurnRequest {
    TurnRequest {
        input: Input::text("hello"),
        thread_id: None,
        model: None,
        cwd: None,
        env: HashMap::new(),
    }
}

#[test]
fn args_use_stream_json_print_mode() {
    let args = profile().build_args(&request());
    assert_eq!(&args[..3], &["-p", "--output-format", "stream-json"]);
    assert_eq!(args.last().unwrap(), "hello");
}

#[test]
fn resume_appends_session_flag() {
    let mut req = request();
    req.thread_id = Some("sess-1".into());
    let args = profile().build_args(&req);
    let pos = args.iter().position(|a| a == "--resume").unwrap();
    assert_eq!(args[pos + 1], "sess-1");
}

#[test]
fn init_line_captures_session_id() {
    let mut outcome = ParseOutcome::default();
    profile().parse_line(
        r#"{"type":"system","subtype":"init","session_id":"sess-42"}"#,
        &mut outcome,
    );
    assert_eq!(outcome.thread_id.as_deref(), Some("sess-42"));
}

#[test]
fn text_blocks_stream_agent_message() {
    let mut outcome = ParseOutcome::default();
    let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"partial answer"}]}}"#;
    let events = profile().parse_line(line, &mut outcome);
    assert_eq!(events.len(), 1);
    match &events[0] {
        AgentEvent::ItemUpdated { item: ThreadItem::AgentMessage { text, .. }, delta } => {
            assert_eq!(text, "partial answer");
            assert_eq!(delta.as_deref(), Some("partial answer"));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn bash_tool_use_then_result_completes_command() {
    let mut outcome = ParseOutcome::default();
    let use_line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"tu_1","name":"Bash","input":{"command":"ls src"}}]}}"#;
    let events = profile().parse_line(use_line, &mut outcome);
    assert!(matches!(
        &events[0],
        AgentEvent::ItemStarted { item: ThreadItem::CommandExecution { command, .. } }
            if command == "ls src"
    ));

    let result_line = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"tu_1","content":"main.rs\nlib.rs"}]}}"#;
    let events = profile().parse_line(result_line, &mut outcome);
    match &events[0] {
        AgentEvent::ItemCompleted {
            item: ThreadItem::CommandExecution { status, exit_code, aggregated_output, .. },
        } => {
            assert_eq!(*status, CommandStatus::Completed);
            assert_eq!(*exit_code, Some(0));
            assert!(aggregated_output.contains("main.rs"));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn failed_tool_result_marks_failure() {
    let mut outcome = ParseOutcome::default();
    let use_line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"tu_2","name":"Bash","input":{"command":"false"}}]}}"#;
    profile().parse_line(use_line, &mut outcome);
    let result_line = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"tu_2","is_error":true,"content":"boom"}]}}"#;
    let events = profile().parse_line(result_line, &mut outcome);
    assert!(matches!(
        &events[0],
        AgentEvent::ItemCompleted { item: ThreadItem::CommandExecution { status, .. } }
            if *status == CommandStatus::Failed
    ));
}

#[test]
fn write_tool_use_maps_to_file_change() {
    let mut outcome = ParseOutcome::default();
    let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"tu_3","name":"Write","input":{"file_path":"src/new.rs"}}]}}"#;
    let events = profile().parse_line(line, &mut outcome);
    match &events[0] {
        AgentEvent::ItemStarted { item: ThreadItem::FileChange { changes, .. } } => {
            assert_eq!(changes[0].path, "src/new.rs");
            assert_eq!(changes[0].kind, FileChangeKind::Add);
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn success_result_sets_response_and_usage() {
    let mut outcome = ParseOutcome::default();
    let line = r#"{"type":"result","subtype":"success","result":"final answer","session_id":"sess-9","usage":{"input_tokens":12,"cache_read_input_tokens":8,"output_tokens":3}}"#;
    profile().parse_line(line, &mut outcome);
    assert!(outcome.completed);
    assert_eq!(outcome.response, "final answer");
    assert_eq!(outcome.thread_id.as_deref(), Some("sess-9"));
    assert_eq!(outcome.usage.unwrap().cached_input_tokens, 8);
}

#[test]
fn error_result_records_error() {
    let mut outcome = ParseOutcome::default();
    let line = r#"{"type":"result","subtype":"error_during_execution","is_error":true,"result":"rate limit hit"}"#;
    profile().parse_line(line, &mut outcome);
    assert!(!outcome.completed);
    assert_eq!(outcome.error.as_deref(), Some("rate limit hit"));
}
