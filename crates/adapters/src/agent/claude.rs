// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code profile (`claude -p --output-format stream-json`).
//!
//! Claude's stream interleaves assistant content blocks and tool results.
//! Tool uses are tracked as pending items and completed when the matching
//! `tool_result` block arrives.

use ads_core::event::{
    AgentEvent, CommandStatus, FileChangeEntry, FileChangeKind, ThreadItem, TurnUsage,
};
use ads_core::InputPart;
use serde_json::Value;

use super::process::{ParseOutcome, Profile, TurnRequest};

pub struct ClaudeProfile {
    program: String,
}

impl ClaudeProfile {
    pub fn new() -> Self {
        Self { program: "claude".to_string() }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for ClaudeProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl Profile for ClaudeProfile {
    fn id(&self) -> &'static str {
        "claude"
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn build_args(&self, request: &TurnRequest) -> Vec<String> {
        let mut args: Vec<String> =
            vec!["-p".into(), "--output-format".into(), "stream-json".into(), "--verbose".into()];
        if let Some(thread_id) = &request.thread_id {
            args.push("--resume".into());
            args.push(thread_id.clone());
        }
        if let Some(model) = &request.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        let mut prompt = request.input.joined_text();
        // Claude Code reads local images when the path appears in the prompt.
        for part in &request.input.parts {
            if let InputPart::LocalImage { path } = part {
                prompt.push_str(&format!("\n[image: {}]", path.display()));
            }
        }
        args.push(prompt);
        args
    }

    fn parse_line(&self, line: &str, outcome: &mut ParseOutcome) -> Vec<AgentEvent> {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            return Vec::new();
        };
        match value.get("type").and_then(Value::as_str) {
            Some("system") => {
                if value.get("subtype").and_then(Value::as_str) == Some("init") {
                    outcome.thread_id =
                        value.get("session_id").and_then(Value::as_str).map(str::to_string);
                }
                Vec::new()
            }
            Some("assistant") => lift_assistant(&value, outcome),
            Some("user") => lift_tool_results(&value, outcome),
            Some("result") => {
                if let Some(session) = value.get("session_id").and_then(Value::as_str) {
                    outcome.thread_id = Some(session.to_string());
                }
                let is_error =
                    value.get("is_error").and_then(Value::as_bool).unwrap_or(false);
                if is_error {
                    outcome.error = value
                        .get("result")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| Some("claude turn failed".to_string()));
                } else {
                    outcome.completed = true;
                    if let Some(result) = value.get("result").and_then(Value::as_str) {
                        outcome.response = result.to_string();
                    }
                    outcome.usage = value.get("usage").map(|u| TurnUsage {
                        input_tokens: u64_field(u, "input_tokens"),
                        cached_input_tokens: u64_field(u, "cache_read_input_tokens"),
                        output_tokens: u64_field(u, "output_tokens"),
                    });
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn lift_assistant(value: &Value, outcome: &mut ParseOutcome) -> Vec<AgentEvent> {
    let Some(content) = value
        .pointer("/message/content")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    let mut events = Vec::new();
    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                if text.is_empty() {
                    continue;
                }
                let id = outcome.next_id("msg");
                outcome.response = text.to_string();
                events.push(AgentEvent::ItemUpdated {
                    item: ThreadItem::AgentMessage { id, text: text.to_string() },
                    delta: Some(text.to_string()),
                });
            }
            Some("thinking") => {
                let text = block.get("thinking").and_then(Value::as_str).unwrap_or_default();
                let id = outcome.next_id("think");
                events.push(AgentEvent::ItemUpdated {
                    item: ThreadItem::Reasoning { id, text: text.to_string() },
                    delta: Some(text.to_string()),
                });
            }
            Some("tool_use") => {
                let native_id =
                    block.get("id").and_then(Value::as_str).unwrap_or("tool").to_string();
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                let item = lift_tool_use(&native_id, name, &input);
                outcome.track_pending(&native_id, item.clone());
                events.push(AgentEvent::ItemStarted { item });
            }
            _ => {}
        }
    }
    events
}

/// Map a Claude tool_use block to a normalized item.
fn lift_tool_use(id: &str, name: &str, input: &Value) -> ThreadItem {
    match name {
        "Bash" => ThreadItem::CommandExecution {
            id: id.to_string(),
            command: input.get("command").and_then(Value::as_str).unwrap_or_default().to_string(),
            status: CommandStatus::InProgress,
            exit_code: None,
            aggregated_output: String::new(),
        },
        "Write" | "Edit" | "NotebookEdit" => ThreadItem::FileChange {
            id: id.to_string(),
            changes: vec![FileChangeEntry {
                kind: if name == "Write" { FileChangeKind::Add } else { FileChangeKind::Update },
                path: input
                    .get("file_path")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }],
        },
        "WebSearch" => ThreadItem::WebSearch {
            id: id.to_string(),
            query: input.get("query").and_then(Value::as_str).unwrap_or_default().to_string(),
        },
        "TodoWrite" => ThreadItem::TodoList {
            id: id.to_string(),
            items: input
                .pointer("/todos")
                .and_then(Value::as_array)
                .map(|todos| {
                    todos
                        .iter()
                        .map(|t| ads_core::TodoItem {
                            text: t
                                .get("content")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            completed: t.get("status").and_then(Value::as_str)
                                == Some("completed"),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        },
        _ => ThreadItem::ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            status: CommandStatus::InProgress,
            arguments: Some(input.clone()),
        },
    }
}

/// `tool_result` blocks complete the pending item they reference.
fn lift_tool_results(value: &Value, outcome: &mut ParseOutcome) -> Vec<AgentEvent> {
    let Some(content) = value.pointer("/message/content").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut events = Vec::new();
    for block in content {
        if block.get("type").and_then(Value::as_str) != Some("tool_result") {
            continue;
        }
        let Some(native_id) = block.get("tool_use_id").and_then(Value::as_str) else {
            continue;
        };
        let Some(mut item) = outcome.take_pending(native_id) else {
            continue;
        };
        let is_error = block.get("is_error").and_then(Value::as_bool).unwrap_or(false);
        let result_text = block
            .get("content")
            .map(flatten_result_content)
            .unwrap_or_default();
        match &mut item {
            ThreadItem::CommandExecution { status, exit_code, aggregated_output, .. } => {
                *status = if is_error { CommandStatus::Failed } else { CommandStatus::Completed };
                *exit_code = Some(if is_error { 1 } else { 0 });
                *aggregated_output = result_text;
            }
            ThreadItem::ToolCall { status, .. } => {
                *status = if is_error { CommandStatus::Failed } else { CommandStatus::Completed };
            }
            _ => {}
        }
        events.push(AgentEvent::ItemCompleted { item });
    }
    events
}

/// Tool result content is either a plain string or a list of text blocks.
fn flatten_result_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
