// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turn event translation.
//!
//! Lifts normalized adapter events into client WS messages: coalesced
//! response deltas, phase step lines, per-command headers and prefix-diffed
//! output, patch summaries and explored updates. One translator instance
//! lives for one turn.

use std::collections::{HashMap, HashSet};

use ads_core::event::{AgentEvent, FileChangeKind, Phase, ThreadItem};
use ads_core::{DedupeMode, ExploredCategory, ExploredTracker};
use ads_wire::{CommandUpdate, ServerMessage};

pub struct TurnTranslator {
    /// Response text already delivered (only the suffix is sent).
    responding_seen: String,
    /// Reasoning text already delivered, per item id.
    reasoning_seen: HashMap<String, usize>,
    /// Output bytes already delivered, per command key.
    command_seen: HashMap<String, usize>,
    /// Command keys whose `$ cmd` header has been emitted.
    announced: HashSet<String>,
    /// Status history rows produced as side-effects.
    history: Vec<String>,
    pub explored: ExploredTracker,
    explored_source: String,
    now_ms: u64,
}

impl TurnTranslator {
    pub fn new(max_explored: usize, dedupe: DedupeMode, source: &str) -> Self {
        Self {
            responding_seen: String::new(),
            reasoning_seen: HashMap::new(),
            command_seen: HashMap::new(),
            announced: HashSet::new(),
            history: Vec::new(),
            explored: ExploredTracker::new(max_explored, dedupe),
            explored_source: source.to_string(),
            now_ms: 0,
        }
    }

    pub fn set_now_ms(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }

    /// Drain accumulated status history rows.
    pub fn take_history(&mut self) -> Vec<String> {
        std::mem::take(&mut self.history)
    }

    /// Full response text seen this turn.
    pub fn response(&self) -> &str {
        &self.responding_seen
    }

    /// Translate one adapter event into zero or more client messages.
    pub fn translate(&mut self, event: &AgentEvent) -> Vec<ServerMessage> {
        self.explored.ingest_event(event, self.now_ms, &self.explored_source);
        match event {
            AgentEvent::ItemStarted { item }
            | AgentEvent::ItemUpdated { item, .. }
            | AgentEvent::ItemCompleted { item } => {
                let completed = matches!(event, AgentEvent::ItemCompleted { .. });
                self.translate_item(item, completed)
            }
            AgentEvent::Status { phase, title, detail } => match phase {
                Phase::Responding | Phase::Completed | Phase::Error => Vec::new(),
                _ => {
                    let line = if detail.is_empty() {
                        format!("[{}] {}\n", phase, title)
                    } else {
                        format!("[{}] {}: {}\n", phase, title, detail)
                    };
                    vec![ServerMessage::Delta { delta: line, source: Some("step".into()) }]
                }
            },
            AgentEvent::TurnStarted
            | AgentEvent::TurnCompleted { .. }
            | AgentEvent::TurnFailed { .. }
            | AgentEvent::Custom => Vec::new(),
        }
    }

    fn translate_item(&mut self, item: &ThreadItem, completed: bool) -> Vec<ServerMessage> {
        match item {
            ThreadItem::AgentMessage { text, .. } => {
                let delta = suffix_beyond(&self.responding_seen, text);
                if delta.is_empty() {
                    return Vec::new();
                }
                self.responding_seen = text.clone();
                vec![ServerMessage::Delta { delta, source: None }]
            }

            ThreadItem::Reasoning { id, text, .. } => {
                let seen = self.reasoning_seen.entry(id.clone()).or_insert(0);
                if text.len() <= *seen {
                    return Vec::new();
                }
                let delta = tail_from(text, *seen).to_string();
                *seen = text.len();
                vec![ServerMessage::Delta { delta, source: Some("step".into()) }]
            }

            ThreadItem::CommandExecution { id, command, status, exit_code, aggregated_output } => {
                let key = format!("{}:cmd:{}", id, command);
                let mut out = Vec::new();
                if self.announced.insert(key.clone()) {
                    out.push(ServerMessage::Delta {
                        delta: format!("$ {}\n", command),
                        source: Some("step".into()),
                    });
                    self.history.push(format!("$ {}", command));
                }
                let seen = self.command_seen.entry(key.clone()).or_insert(0);
                let output_delta = if aggregated_output.len() > *seen {
                    let delta = tail_from(aggregated_output, *seen).to_string();
                    *seen = aggregated_output.len();
                    delta
                } else {
                    String::new()
                };
                if !output_delta.is_empty() || completed {
                    out.push(ServerMessage::Command {
                        command: CommandUpdate {
                            id: key,
                            command: command.clone(),
                            status: status.to_string(),
                            exit_code: *exit_code,
                            output_delta,
                        },
                    });
                }
                out
            }

            ThreadItem::FileChange { changes, .. } if completed => {
                let mut patch = String::new();
                for change in changes {
                    let tag = match change.kind {
                        FileChangeKind::Add => "A",
                        FileChangeKind::Delete => "D",
                        FileChangeKind::Update => "M",
                    };
                    patch.push_str(&format!("{} {}\n", tag, change.path));
                }
                let mut out = vec![ServerMessage::Patch { patch }];
                for change in changes {
                    out.push(ServerMessage::Explored {
                        category: ExploredCategory::Write.to_string(),
                        summary: change.path.clone(),
                    });
                }
                out
            }

            ThreadItem::WebSearch { query, .. } if completed => {
                vec![ServerMessage::Explored {
                    category: ExploredCategory::WebSearch.to_string(),
                    summary: query.clone(),
                }]
            }

            ThreadItem::ToolCall { .. }
            | ThreadItem::McpToolCall { .. }
            | ThreadItem::TodoList { .. }
            | ThreadItem::FileChange { .. }
            | ThreadItem::WebSearch { .. } => Vec::new(),
        }
    }
}

/// The part of `full` beyond `seen`, falling back to the length-based tail
/// when the stream restarted (non-prefix).
fn suffix_beyond(seen: &str, full: &str) -> String {
    if let Some(suffix) = full.strip_prefix(seen) {
        suffix.to_string()
    } else if full.len() > seen.len() {
        tail_from(full, seen.len()).to_string()
    } else {
        String::new()
    }
}

/// Byte-indexed tail, adjusted forward to a char boundary.
fn tail_from(s: &str, mut idx: usize) -> &str {
    if idx >= s.len() {
        return "";
    }
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    &s[idx..]
}

#[cfg(test)]
#[path = "turn_tests.rs"]
mod tests;
