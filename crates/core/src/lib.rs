// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ads-core: domain types for the Agent Dispatch Server
//!
//! Holds the task model, the normalized agent event schema, project identity,
//! the explored-activity tracker, and the clock abstraction. Everything here
//! is runtime-free: no tokio, no I/O.

pub mod macros;

pub mod clock;
pub mod error;
pub mod event;
pub mod explored;
pub mod id;
pub mod input;
pub mod project;
pub mod task;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use error::{ClassifiedError, ErrorCode};
pub use event::{
    AgentEvent, CommandStatus, FileChangeEntry, FileChangeKind, Phase, ThreadItem, TodoItem,
    TurnError, TurnUsage,
};
pub use explored::{DedupeMode, ExploredCategory, ExploredEntry, ExploredTracker};
pub use id::short;
pub use input::{Input, InputPart};
pub use project::{canonical_workspace_root, derive_project_session_id, ProjectId};
#[cfg(any(test, feature = "test-support"))]
pub use task::TaskBuilder;
pub use task::{
    Attachment, AttachmentId, MessageRole, MessageType, PlanStep, PlanStepState, Task, TaskId,
    TaskMessage, TaskStatus,
};
