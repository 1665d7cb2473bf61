// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini CLI profile (`gemini --output-format stream-json`).

use ads_core::event::{AgentEvent, CommandStatus, ThreadItem, TurnUsage};
use serde_json::Value;

use super::process::{ParseOutcome, Profile, TurnRequest};

pub struct GeminiProfile {
    program: String,
}

impl GeminiProfile {
    pub fn new() -> Self {
        Self { program: "gemini".to_string() }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for GeminiProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl Profile for GeminiProfile {
    fn id(&self) -> &'static str {
        "gemini"
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn build_args(&self, request: &TurnRequest) -> Vec<String> {
        let mut args: Vec<String> =
            vec!["--output-format".into(), "stream-json".into(), "--yolo".into()];
        if let Some(model) = &request.model {
            args.push("-m".into());
            args.push(model.clone());
        }
        args.push("-p".into());
        args.push(request.input.joined_text());
        args
    }

    fn parse_line(&self, line: &str, outcome: &mut ParseOutcome) -> Vec<AgentEvent> {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            return Vec::new();
        };
        match value.get("type").and_then(Value::as_str) {
            Some("init") => {
                outcome.thread_id =
                    value.get("session_id").and_then(Value::as_str).map(str::to_string);
                Vec::new()
            }
            Some("thought") => {
                let text = value.get("text").and_then(Value::as_str).unwrap_or_default();
                let id = outcome.next_id("think");
                vec![AgentEvent::ItemUpdated {
                    item: ThreadItem::Reasoning { id, text: text.to_string() },
                    delta: Some(text.to_string()),
                }]
            }
            Some("message") | Some("content") => {
                let text = value.get("text").and_then(Value::as_str).unwrap_or_default();
                if text.is_empty() {
                    return Vec::new();
                }
                outcome.response.push_str(text);
                let id = outcome.next_id("msg");
                vec![AgentEvent::ItemUpdated {
                    item: ThreadItem::AgentMessage { id, text: outcome.response.clone() },
                    delta: Some(text.to_string()),
                }]
            }
            Some("tool_call") => {
                let native_id = value
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| outcome.next_id("tool"));
                let name = value.get("name").and_then(Value::as_str).unwrap_or_default();
                let item = if name == "run_shell_command" {
                    ThreadItem::CommandExecution {
                        id: native_id.clone(),
                        command: value
                            .pointer("/args/command")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        status: CommandStatus::InProgress,
                        exit_code: None,
                        aggregated_output: String::new(),
                    }
                } else {
                    ThreadItem::ToolCall {
                        id: native_id.clone(),
                        name: name.to_string(),
                        status: CommandStatus::InProgress,
                        arguments: value.get("args").cloned(),
                    }
                };
                outcome.track_pending(&native_id, item.clone());
                vec![AgentEvent::ItemStarted { item }]
            }
            Some("tool_result") => {
                let Some(native_id) = value.get("id").and_then(Value::as_str) else {
                    return Vec::new();
                };
                let Some(mut item) = outcome.take_pending(native_id) else {
                    return Vec::new();
                };
                let failed =
                    value.get("status").and_then(Value::as_str) == Some("error");
                match &mut item {
                    ThreadItem::CommandExecution { status, exit_code, aggregated_output, .. } => {
                        *status =
                            if failed { CommandStatus::Failed } else { CommandStatus::Completed };
                        *exit_code = Some(if failed { 1 } else { 0 });
                        if let Some(output) = value.get("output").and_then(Value::as_str) {
                            *aggregated_output = output.to_string();
                        }
                    }
                    ThreadItem::ToolCall { status, .. } => {
                        *status =
                            if failed { CommandStatus::Failed } else { CommandStatus::Completed };
                    }
                    _ => {}
                }
                vec![AgentEvent::ItemCompleted { item }]
            }
            Some("result") => {
                if value.get("status").and_then(Value::as_str) == Some("error") {
                    outcome.error = value
                        .get("error")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| Some("gemini turn failed".to_string()));
                } else {
                    outcome.completed = true;
                    if let Some(response) = value.get("response").and_then(Value::as_str) {
                        outcome.response = response.to_string();
                    }
                    outcome.usage = value.get("stats").map(|s| TurnUsage {
                        input_tokens: s.get("input").and_then(Value::as_u64).unwrap_or(0),
                        cached_input_tokens: s.get("cached").and_then(Value::as_u64).unwrap_or(0),
                        output_tokens: s.get("output").and_then(Value::as_u64).unwrap_or(0),
                    });
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
