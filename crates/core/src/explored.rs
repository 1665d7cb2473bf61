// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explored-activity tracker.
//!
//! Derives a bounded, deduplicated "Explored" feed from normalized agent
//! events and explicit tool-invocation hooks. The tracker never exceeds
//! `max_items` entries; with consecutive dedupe no two adjacent entries
//! share `(category, summary)`.

use crate::event::{AgentEvent, ThreadItem};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How many file names a merged Read entry shows before `(+N more)`.
const READ_MERGE_FANOUT: usize = 3;

/// Category of an explored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExploredCategory {
    List,
    Search,
    Read,
    Write,
    Execute,
    Agent,
    Tool,
    WebSearch,
}

crate::simple_display! {
    ExploredCategory {
        List => "List",
        Search => "Search",
        Read => "Read",
        Write => "Write",
        Execute => "Execute",
        Agent => "Agent",
        Tool => "Tool",
        WebSearch => "WebSearch",
    }
}

/// Deduplication policy for adjacent entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeMode {
    /// Keep duplicates as-is
    None,
    /// Collapse runs of identical entries and render a `×N` suffix
    #[default]
    Consecutive,
}

/// One compact feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploredEntry {
    pub category: ExploredCategory,
    pub summary: String,
    pub ts_ms: u64,
    /// Where this entry came from (adapter id, "hook", …).
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    /// Collapsed run length (rendered as `×N` when > 1).
    #[serde(default = "default_count")]
    pub count: u32,
    /// File names merged into this Read entry beyond the first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged: Vec<String>,
}

fn default_count() -> u32 {
    1
}

impl ExploredEntry {
    /// Render the summary with its `×N` / `(+N more)` decorations.
    pub fn display_summary(&self) -> String {
        let mut out = if self.merged.is_empty() {
            self.summary.clone()
        } else {
            let mut names: Vec<&str> = Vec::with_capacity(READ_MERGE_FANOUT);
            names.push(self.summary.as_str());
            for name in self.merged.iter().take(READ_MERGE_FANOUT - 1) {
                names.push(name.as_str());
            }
            let shown = names.join(", ");
            let hidden = (1 + self.merged.len()).saturating_sub(READ_MERGE_FANOUT);
            if hidden > 0 {
                format!("{} (+{} more)", shown, hidden)
            } else {
                shown
            }
        };
        if self.count > 1 {
            out.push_str(&format!(" ×{}", self.count));
        }
        out
    }
}

/// Bounded, deduplicating feed of explored activity.
#[derive(Debug, Clone)]
pub struct ExploredTracker {
    entries: VecDeque<ExploredEntry>,
    max_items: usize,
    dedupe: DedupeMode,
}

impl ExploredTracker {
    pub fn new(max_items: usize, dedupe: DedupeMode) -> Self {
        Self { entries: VecDeque::new(), max_items, dedupe }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current compacted feed, oldest first.
    pub fn snapshot(&self) -> Vec<ExploredEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Ingest a normalized adapter event. Only completed items produce
    /// entries; streaming updates are too noisy for the feed.
    pub fn ingest_event(&mut self, event: &AgentEvent, ts_ms: u64, source: &str) {
        let AgentEvent::ItemCompleted { item } = event else {
            return;
        };
        match item {
            ThreadItem::CommandExecution { command, .. } => {
                let (category, summary) = classify_command(command);
                self.record(category, summary, ts_ms, source);
            }
            ThreadItem::FileChange { changes, .. } => {
                for change in changes {
                    self.record(ExploredCategory::Write, change.path.clone(), ts_ms, source);
                }
            }
            ThreadItem::ToolCall { name, arguments, .. } => {
                let target = arguments
                    .as_ref()
                    .and_then(tool_target)
                    .unwrap_or_default();
                let (category, summary) = classify_tool(name, &target);
                self.record(category, summary, ts_ms, source);
            }
            ThreadItem::McpToolCall { server, tool, .. } => {
                self.record(ExploredCategory::Tool, format!("{}:{}", server, tool), ts_ms, source);
            }
            ThreadItem::WebSearch { query, .. } => {
                self.record(ExploredCategory::WebSearch, query.clone(), ts_ms, source);
            }
            ThreadItem::Reasoning { .. }
            | ThreadItem::AgentMessage { .. }
            | ThreadItem::TodoList { .. } => {}
        }
    }

    /// Explicit tool-invocation hook (server-side tools, not adapter events).
    pub fn record_tool(&mut self, tool: &str, target: &str, ts_ms: u64, source: &str) {
        let (category, summary) = classify_tool(tool, target);
        self.record(category, summary, ts_ms, source);
    }

    /// Append an entry, applying dedupe/merge policy and the size cap.
    pub fn record(
        &mut self,
        category: ExploredCategory,
        summary: String,
        ts_ms: u64,
        source: &str,
    ) {
        if self.max_items == 0 {
            return;
        }
        if self.dedupe == DedupeMode::Consecutive {
            if let Some(last) = self.entries.back_mut() {
                if last.category == category && last.summary == summary && last.merged.is_empty() {
                    last.count += 1;
                    last.ts_ms = ts_ms;
                    return;
                }
                // Fold runs of Reads into one entry: "a, b, c (+N more)"
                if category == ExploredCategory::Read
                    && last.category == ExploredCategory::Read
                    && last.count == 1
                {
                    if last.summary != summary && !last.merged.iter().any(|m| *m == summary) {
                        last.merged.push(summary);
                        last.ts_ms = ts_ms;
                    }
                    return;
                }
            }
        }
        self.entries.push_back(ExploredEntry {
            category,
            summary,
            ts_ms,
            source: source.to_string(),
            meta: None,
            count: 1,
            merged: Vec::new(),
        });
        while self.entries.len() > self.max_items {
            self.entries.pop_front();
        }
    }
}

/// Map a shell command line to a feed category and summary.
///
/// Tokenization is intentionally rough: the first recognized program name
/// wins, so `cd foo && rg bar` classifies as Search.
pub fn classify_command(command: &str) -> (ExploredCategory, String) {
    for token in command.split_whitespace() {
        let program = token.rsplit('/').next().unwrap_or(token);
        let category = match program {
            "ls" => Some(ExploredCategory::List),
            "rg" | "grep" | "find" => Some(ExploredCategory::Search),
            "cat" | "head" | "tail" => Some(ExploredCategory::Read),
            "sed" => Some(if command.contains("-i") {
                ExploredCategory::Write
            } else {
                ExploredCategory::Read
            }),
            _ => None,
        };
        if let Some(category) = category {
            return (category, crate::id::short(command, 120).to_string());
        }
    }
    (ExploredCategory::Execute, crate::id::short(command, 120).to_string())
}

/// Map a tool name (and optional target) to a feed category and summary.
pub fn classify_tool(tool: &str, target: &str) -> (ExploredCategory, String) {
    let category = match tool {
        "read" => ExploredCategory::Read,
        "write" | "apply_patch" => ExploredCategory::Write,
        "search" | "grep" | "find" | "vsearch" => ExploredCategory::Search,
        "exec" => ExploredCategory::Execute,
        "agent" => ExploredCategory::Agent,
        _ => ExploredCategory::Tool,
    };
    let summary = if target.is_empty() { tool.to_string() } else { target.to_string() };
    (category, summary)
}

/// Pull a human-meaningful target out of tool-call arguments.
fn tool_target(args: &serde_json::Value) -> Option<String> {
    for key in ["path", "file_path", "query", "pattern", "command"] {
        if let Some(value) = args.get(key).and_then(|v| v.as_str()) {
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(test)]
#[path = "explored_tests.rs"]
mod tests;
