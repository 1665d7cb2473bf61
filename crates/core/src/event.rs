// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized agent event schema.
//!
//! Every adapter translates its CLI's native stream into this vocabulary.
//! Per turn the contract is: one `turn:started`, zero or more `item:*`
//! events, then exactly one of `turn:completed` or `turn:failed`.
//!
//! Serializes with `{"type": "turn:started", ...fields}` format. Unknown
//! type tags deserialize to `Custom`.

use serde::{Deserialize, Serialize};

/// Abstract phase tag for rendering progress to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Adapter/process is starting up
    Boot,
    /// Model is reasoning
    Analysis,
    /// Context gathering (todo lists, file inventory)
    Context,
    /// Shell command execution
    Command,
    /// File modification
    Editing,
    /// Tool or MCP invocation
    Tool,
    /// Assistant response text streaming
    Responding,
    Completed,
    Error,
    /// Transport-level status (reconnects, stream stalls)
    Connection,
}

crate::simple_display! {
    Phase {
        Boot => "boot",
        Analysis => "analysis",
        Context => "context",
        Command => "command",
        Editing => "editing",
        Tool => "tool",
        Responding => "responding",
        Completed => "completed",
        Error => "error",
        Connection => "connection",
    }
}

/// Execution state of a command or tool item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    InProgress,
    Completed,
    Failed,
}

crate::simple_display! {
    CommandStatus {
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Kind of change inside a `file_change` item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Add,
    Delete,
    Update,
}

/// One entry of a `todo_list` item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// A unit of in-turn activity, identified by a stable per-turn `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum ThreadItem {
    CommandExecution {
        id: String,
        command: String,
        status: CommandStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default)]
        aggregated_output: String,
    },
    FileChange {
        id: String,
        changes: Vec<FileChangeEntry>,
    },
    ToolCall {
        id: String,
        name: String,
        status: CommandStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<serde_json::Value>,
    },
    McpToolCall {
        id: String,
        server: String,
        tool: String,
        status: CommandStatus,
    },
    WebSearch {
        id: String,
        query: String,
    },
    Reasoning {
        id: String,
        text: String,
    },
    AgentMessage {
        id: String,
        text: String,
    },
    TodoList {
        id: String,
        items: Vec<TodoItem>,
    },
}

/// One path-level change inside a file_change item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeEntry {
    pub kind: FileChangeKind,
    pub path: String,
}

impl ThreadItem {
    pub fn id(&self) -> &str {
        match self {
            ThreadItem::CommandExecution { id, .. }
            | ThreadItem::FileChange { id, .. }
            | ThreadItem::ToolCall { id, .. }
            | ThreadItem::McpToolCall { id, .. }
            | ThreadItem::WebSearch { id, .. }
            | ThreadItem::Reasoning { id, .. }
            | ThreadItem::AgentMessage { id, .. }
            | ThreadItem::TodoList { id, .. } => id,
        }
    }

    /// Abstract phase this item renders under.
    pub fn phase(&self) -> Phase {
        match self {
            ThreadItem::CommandExecution { .. } => Phase::Command,
            ThreadItem::FileChange { .. } => Phase::Editing,
            ThreadItem::ToolCall { .. } | ThreadItem::McpToolCall { .. } => Phase::Tool,
            ThreadItem::WebSearch { .. } => Phase::Tool,
            ThreadItem::Reasoning { .. } => Phase::Analysis,
            ThreadItem::AgentMessage { .. } => Phase::Responding,
            ThreadItem::TodoList { .. } => Phase::Context,
        }
    }
}

/// Token accounting reported by the adapter for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Normalized event emitted by an agent adapter during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    #[serde(rename = "turn:started")]
    TurnStarted,

    #[serde(rename = "item:started")]
    ItemStarted { item: ThreadItem },

    /// Incremental update. For streaming text items `delta` carries the
    /// appended suffix; `item` carries the full accumulated state.
    #[serde(rename = "item:updated")]
    ItemUpdated {
        item: ThreadItem,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delta: Option<String>,
    },

    #[serde(rename = "item:completed")]
    ItemCompleted { item: ThreadItem },

    /// Out-of-band lifecycle/status line with an abstract phase tag.
    #[serde(rename = "status")]
    Status {
        phase: Phase,
        title: String,
        #[serde(default)]
        detail: String,
    },

    #[serde(rename = "turn:completed")]
    TurnCompleted {
        response: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TurnUsage>,
    },

    #[serde(rename = "turn:failed")]
    TurnFailed { error: TurnError },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

/// Error payload of a failed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnError {
    pub message: String,
}

impl AgentEvent {
    /// Phase tag for rendering; items defer to their own mapping.
    pub fn phase(&self) -> Phase {
        match self {
            AgentEvent::TurnStarted => Phase::Boot,
            AgentEvent::ItemStarted { item }
            | AgentEvent::ItemUpdated { item, .. }
            | AgentEvent::ItemCompleted { item } => item.phase(),
            AgentEvent::Status { phase, .. } => *phase,
            AgentEvent::TurnCompleted { .. } => Phase::Completed,
            AgentEvent::TurnFailed { .. } => Phase::Error,
            AgentEvent::Custom => Phase::Connection,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
