// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ads-adapters: uniform contract over external CLI coding agents.
//!
//! Each supported agent (`codex`, `claude`, `gemini`) is driven as a child
//! process in streaming-JSON mode; a per-provider parser normalizes its
//! native line protocol into the abstract [`ads_core::AgentEvent`] schema.

pub mod agent;

pub use agent::{
    AdapterError, AgentAdapter, AgentStatus, CliAgent, SendOptions, TurnOutcome,
};
pub use agent::claude::ClaudeProfile;
pub use agent::codex::CodexProfile;
pub use agent::gemini::GeminiProfile;

#[cfg(any(test, feature = "test-support"))]
pub use agent::fake::{FakeAgent, FakeTurn};
