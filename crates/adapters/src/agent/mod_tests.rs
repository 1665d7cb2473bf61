// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ads_core::event::ThreadItem;
use ads_core::{AgentEvent, Input};
use std::time::Duration;

/// Test profile: drives `sh` to print a scripted line protocol.
///
/// Lines: `THREAD <id>`, `MSG <text>`, `DONE`, `FAIL <message>`.
struct ShProfile {
    script: String,
}

impl ShProfile {
    fn new(script: impl Into<String>) -> Self {
        Self { script: script.into() }
    }
}

impl Profile for ShProfile {
    fn id(&self) -> &'static str {
        "sh-test"
    }

    fn program(&self) -> &str {
        "sh"
    }

    fn build_args(&self, _request: &TurnRequest) -> Vec<String> {
        vec!["-c".into(), self.script.clone()]
    }

    fn parse_line(&self, line: &str, outcome: &mut ParseOutcome) -> Vec<AgentEvent> {
        if let Some(thread) = line.strip_prefix("THREAD ") {
            outcome.thread_id = Some(thread.to_string());
            Vec::new()
        } else if let Some(text) = line.strip_prefix("MSG ") {
            outcome.response.push_str(text);
            let id = outcome.next_id("msg");
            vec![AgentEvent::ItemUpdated {
                item: ThreadItem::AgentMessage { id, text: outcome.response.clone() },
                delta: Some(text.to_string()),
            }]
        } else if line == "DONE" {
            outcome.completed = true;
            Vec::new()
        } else if let Some(message) = line.strip_prefix("FAIL ") {
            outcome.error = Some(message.to_string());
            Vec::new()
        } else {
            Vec::new()
        }
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn turn_streams_events_and_returns_outcome() {
    let agent = CliAgent::new(ShProfile::new("printf 'THREAD t-1\\nMSG hello\\nDONE\\n'"));
    let mut rx = agent.subscribe();

    let outcome = agent.send(Input::text("hi"), SendOptions::default()).await.unwrap();
    assert_eq!(outcome.response, "hello");
    assert_eq!(outcome.thread_id.as_deref(), Some("t-1"));
    assert_eq!(agent.thread_id().as_deref(), Some("t-1"));

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(AgentEvent::TurnStarted)));
    assert!(events.iter().any(|e| matches!(e, AgentEvent::ItemUpdated { .. })));
    assert!(matches!(events.last(), Some(AgentEvent::TurnCompleted { response, .. }) if response == "hello"));
}

#[tokio::test]
async fn non_streaming_suppresses_item_events() {
    let agent = CliAgent::new(ShProfile::new("printf 'MSG quiet\\nDONE\\n'"));
    let mut rx = agent.subscribe();
    let opts = SendOptions { streaming: false, ..SendOptions::default() };
    agent.send(Input::text("hi"), opts).await.unwrap();
    let events = drain(&mut rx);
    assert!(!events.iter().any(|e| matches!(e, AgentEvent::ItemUpdated { .. })));
    assert!(events.iter().any(|e| matches!(e, AgentEvent::TurnCompleted { .. })));
}

#[tokio::test]
async fn failure_line_becomes_protocol_error() {
    let agent = CliAgent::new(ShProfile::new("printf 'FAIL rate limit exceeded\\n'"));
    let err = agent.send(Input::text("hi"), SendOptions::default()).await.unwrap_err();
    match err {
        AdapterError::Protocol(classified) => {
            assert_eq!(classified.code, ads_core::ErrorCode::RateLimited);
            assert!(classified.retryable);
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn nonzero_exit_without_completion_fails() {
    let agent = CliAgent::new(ShProfile::new("echo 'not json' >&2; exit 7"));
    let err = agent.send(Input::text("hi"), SendOptions::default()).await.unwrap_err();
    assert!(matches!(err, AdapterError::Protocol(_)));
    assert!(agent.status().error.is_some());
}

#[tokio::test]
async fn cancellation_aborts_the_turn() {
    let agent = CliAgent::new(ShProfile::new("sleep 30; printf 'DONE\\n'"));
    let opts = SendOptions::default();
    let cancel = opts.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });
    let err = agent.send(Input::text("hi"), opts).await.unwrap_err();
    assert!(matches!(err, AdapterError::Aborted));
    // Aborted turns are not surfaced as adapter errors.
    assert!(agent.status().error.is_none());
    assert!(agent.status().ready);
}

#[tokio::test]
async fn reset_clears_thread_id() {
    let agent = CliAgent::new(ShProfile::new("printf 'THREAD t-2\\nDONE\\n'"));
    agent.send(Input::text("hi"), SendOptions::default()).await.unwrap();
    assert!(agent.thread_id().is_some());
    agent.reset();
    assert!(agent.thread_id().is_none());
}

#[tokio::test]
async fn fake_agent_scripted_and_echo_turns() {
    let fake = fake::FakeAgent::new("fake");
    fake.script(fake::FakeTurn::responding("scripted").with_thread("th-1"));

    let outcome = fake.send(Input::text("one"), SendOptions::default()).await.unwrap();
    assert_eq!(outcome.response, "scripted");
    assert_eq!(outcome.thread_id.as_deref(), Some("th-1"));

    let outcome = fake.send(Input::text("two"), SendOptions::default()).await.unwrap();
    assert_eq!(outcome.response, "echo: two");
    assert_eq!(fake.calls().len(), 2);
}

#[tokio::test]
async fn fake_agent_reports_scripted_failures() {
    let fake = fake::FakeAgent::new("fake");
    fake.script(fake::FakeTurn::failing(ads_core::ClassifiedError::classify("429 rate limit")));
    let err = fake.send(Input::text("x"), SendOptions::default()).await.unwrap_err();
    assert!(matches!(err, AdapterError::Protocol(c) if c.retryable));
}
