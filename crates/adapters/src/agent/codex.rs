// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex CLI profile (`codex exec --json`).
//!
//! Codex's experimental JSON stream is already item-shaped
//! (`thread.started`, `item.*`, `turn.completed`), so normalization is
//! mostly a field-by-field lift into the abstract schema.

use ads_core::event::{
    AgentEvent, CommandStatus, FileChangeEntry, FileChangeKind, ThreadItem, TodoItem, TurnUsage,
};
use ads_core::InputPart;
use serde_json::Value;

use super::process::{ParseOutcome, Profile, TurnRequest};

pub struct CodexProfile {
    program: String,
}

impl CodexProfile {
    pub fn new() -> Self {
        Self { program: "codex".to_string() }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for CodexProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl Profile for CodexProfile {
    fn id(&self) -> &'static str {
        "codex"
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn build_args(&self, request: &TurnRequest) -> Vec<String> {
        let mut args: Vec<String> = vec!["exec".into()];
        if let Some(thread_id) = &request.thread_id {
            args.push("resume".into());
            args.push(thread_id.clone());
        }
        args.push("--json".into());
        args.push("--skip-git-repo-check".into());
        if let Some(model) = &request.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        for part in &request.input.parts {
            if let InputPart::LocalImage { path } = part {
                args.push("--image".into());
                args.push(path.display().to_string());
            }
        }
        args.push(request.input.joined_text());
        args
    }

    fn parse_line(&self, line: &str, outcome: &mut ParseOutcome) -> Vec<AgentEvent> {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            return Vec::new();
        };
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Vec::new();
        };
        match kind {
            "thread.started" => {
                outcome.thread_id = str_field(&value, "thread_id");
                Vec::new()
            }
            "item.started" | "item.updated" | "item.completed" => {
                let Some(item) = value.get("item").and_then(|i| lift_item(i, outcome)) else {
                    return Vec::new();
                };
                if kind == "item.completed" {
                    if let ThreadItem::AgentMessage { text, .. } = &item {
                        outcome.response = text.clone();
                    }
                }
                vec![match kind {
                    "item.started" => AgentEvent::ItemStarted { item },
                    "item.updated" => AgentEvent::ItemUpdated { item, delta: None },
                    _ => AgentEvent::ItemCompleted { item },
                }]
            }
            "turn.completed" => {
                outcome.completed = true;
                outcome.usage = value.get("usage").map(|u| TurnUsage {
                    input_tokens: u64_field(u, "input_tokens"),
                    cached_input_tokens: u64_field(u, "cached_input_tokens"),
                    output_tokens: u64_field(u, "output_tokens"),
                });
                Vec::new()
            }
            "turn.failed" => {
                outcome.error = value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| Some("turn failed".to_string()));
                Vec::new()
            }
            "error" => {
                outcome.error =
                    str_field(&value, "message").or_else(|| Some("codex error".to_string()));
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Lift a codex item object into the normalized schema.
fn lift_item(item: &Value, outcome: &mut ParseOutcome) -> Option<ThreadItem> {
    let id = str_field(item, "id").unwrap_or_else(|| outcome.next_id("codex"));
    let item_type = item.get("item_type").or_else(|| item.get("type")).and_then(Value::as_str)?;
    match item_type {
        "command_execution" => Some(ThreadItem::CommandExecution {
            id,
            command: str_field(item, "command").unwrap_or_default(),
            status: lift_status(item),
            exit_code: item.get("exit_code").and_then(Value::as_i64).map(|c| c as i32),
            aggregated_output: str_field(item, "aggregated_output").unwrap_or_default(),
        }),
        "file_change" => {
            let changes = item
                .get("changes")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| {
                            let path = str_field(entry, "path")?;
                            let kind = match entry.get("kind").and_then(Value::as_str) {
                                Some("add") => FileChangeKind::Add,
                                Some("delete") => FileChangeKind::Delete,
                                _ => FileChangeKind::Update,
                            };
                            Some(FileChangeEntry { kind, path })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(ThreadItem::FileChange { id, changes })
        }
        "mcp_tool_call" => Some(ThreadItem::McpToolCall {
            id,
            server: str_field(item, "server").unwrap_or_default(),
            tool: str_field(item, "tool").unwrap_or_default(),
            status: lift_status(item),
        }),
        "web_search" => Some(ThreadItem::WebSearch {
            id,
            query: str_field(item, "query").unwrap_or_default(),
        }),
        "reasoning" => Some(ThreadItem::Reasoning {
            id,
            text: str_field(item, "text").unwrap_or_default(),
        }),
        "agent_message" => Some(ThreadItem::AgentMessage {
            id,
            text: str_field(item, "text").unwrap_or_default(),
        }),
        "todo_list" => {
            let items = item
                .get("items")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| TodoItem {
                            text: str_field(entry, "text").unwrap_or_default(),
                            completed: entry
                                .get("completed")
                                .and_then(Value::as_bool)
                                .unwrap_or(false),
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(ThreadItem::TodoList { id, items })
        }
        _ => None,
    }
}

fn lift_status(item: &Value) -> CommandStatus {
    match item.get("status").and_then(Value::as_str) {
        Some("completed") => CommandStatus::Completed,
        Some("failed") => CommandStatus::Failed,
        _ => CommandStatus::InProgress,
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
