// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent adapter contract and the shared CLI driver.
//!
//! The adapter owns one agent thread at a time. `send` runs one prompt turn
//! to completion; events stream to subscribers while the turn is in flight.

pub mod claude;
pub mod codex;
pub mod fake;
pub mod gemini;
mod process;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ads_core::{AgentEvent, ClassifiedError, Input, TurnUsage};
use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub use process::{ParseOutcome, Profile, TurnRequest};

/// Capacity of the per-adapter event fan-out channel. Slow subscribers lag
/// and miss events rather than blocking the turn.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Errors from an agent turn.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to start agent process: {0}")]
    Spawn(String),

    /// Classified agent/provider failure; carries retry/reset guidance.
    #[error("{0}")]
    Protocol(ClassifiedError),

    /// Turn was cancelled by the caller. Not an error in the failure
    /// taxonomy; surfaced distinctly so callers can report "aborted".
    #[error("turn aborted")]
    Aborted,

    #[error("adapter busy: a turn is already streaming")]
    Busy,
}

impl AdapterError {
    /// Fold into the classified form for client-facing error payloads.
    pub fn classify(&self) -> ClassifiedError {
        match self {
            AdapterError::Spawn(msg) => {
                ClassifiedError::new(ads_core::ErrorCode::AgentProtocol, msg.clone())
                    .not_retryable()
            }
            AdapterError::Protocol(err) => err.clone(),
            AdapterError::Aborted => {
                ClassifiedError::new(ads_core::ErrorCode::Internal, "aborted").not_retryable()
            }
            AdapterError::Busy => {
                ClassifiedError::new(ads_core::ErrorCode::Conflict, "adapter busy").not_retryable()
            }
        }
    }
}

/// Options for one `send` call.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Emit streaming item events (false = only turn boundary events).
    pub streaming: bool,
    pub cancel: CancellationToken,
    /// Extra environment for the agent process.
    pub env: HashMap<String, String>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self { streaming: true, cancel: CancellationToken::new(), env: HashMap::new() }
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub response: String,
    pub usage: Option<TurnUsage>,
    /// Thread id after the turn (adapters may mint a new one per turn).
    pub thread_id: Option<String>,
}

/// Adapter health snapshot.
#[derive(Debug, Clone, Default)]
pub struct AgentStatus {
    pub ready: bool,
    pub error: Option<String>,
    pub streaming: bool,
}

/// Uniform contract over a CLI coding agent.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// Stable adapter id ("codex", "claude", "gemini", "fake").
    fn id(&self) -> &str;

    /// Run one prompt turn. Events stream to subscribers while in flight.
    async fn send(&self, input: Input, opts: SendOptions) -> Result<TurnOutcome, AdapterError>;

    /// Subscribe to the normalized event stream. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AgentEvent>;

    fn thread_id(&self) -> Option<String>;

    /// Forget the current thread; the next turn starts a fresh conversation.
    fn reset(&self);

    fn set_model(&self, model: Option<String>);

    fn set_working_directory(&self, cwd: PathBuf);

    fn status(&self) -> AgentStatus;
}

/// Mutable adapter state shared across turns.
#[derive(Debug, Default)]
struct CliAgentState {
    thread_id: Option<String>,
    model: Option<String>,
    cwd: Option<PathBuf>,
    streaming: bool,
    last_error: Option<String>,
}

/// Shared CLI agent driver, parameterized by a per-provider [`Profile`].
pub struct CliAgent<P> {
    profile: P,
    state: Arc<Mutex<CliAgentState>>,
    events: broadcast::Sender<AgentEvent>,
}

impl<P: Profile> CliAgent<P> {
    pub fn new(profile: P) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { profile, state: Arc::new(Mutex::new(CliAgentState::default())), events }
    }

    pub fn with_cwd(profile: P, cwd: PathBuf) -> Self {
        let agent = Self::new(profile);
        agent.state.lock().cwd = Some(cwd);
        agent
    }

    /// Restore a previously saved thread id (used by session resume).
    pub fn with_thread(self, thread_id: Option<String>) -> Self {
        self.state.lock().thread_id = thread_id;
        self
    }

    fn emit(&self, event: AgentEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl<P: Profile> AgentAdapter for CliAgent<P> {
    fn id(&self) -> &str {
        self.profile.id()
    }

    async fn send(&self, input: Input, opts: SendOptions) -> Result<TurnOutcome, AdapterError> {
        let request = {
            let mut state = self.state.lock();
            if state.streaming {
                return Err(AdapterError::Busy);
            }
            state.streaming = true;
            state.last_error = None;
            TurnRequest {
                input,
                thread_id: state.thread_id.clone(),
                model: state.model.clone(),
                cwd: state.cwd.clone(),
                env: opts.env.clone(),
            }
        };

        self.emit(AgentEvent::TurnStarted);
        let result = process::run_turn(
            &self.profile,
            request,
            &opts,
            &self.events,
        )
        .await;

        let mut state = self.state.lock();
        state.streaming = false;
        match &result {
            Ok(outcome) => {
                if let Some(thread_id) = &outcome.thread_id {
                    state.thread_id = Some(thread_id.clone());
                }
            }
            Err(AdapterError::Aborted) => {}
            Err(err) => {
                state.last_error = Some(err.to_string());
            }
        }
        result
    }

    fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    fn thread_id(&self) -> Option<String> {
        self.state.lock().thread_id.clone()
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.thread_id = None;
        state.last_error = None;
    }

    fn set_model(&self, model: Option<String>) {
        self.state.lock().model = model;
    }

    fn set_working_directory(&self, cwd: PathBuf) {
        self.state.lock().cwd = Some(cwd);
    }

    fn status(&self) -> AgentStatus {
        let state = self.state.lock();
        AgentStatus {
            ready: !state.streaming,
            error: state.last_error.clone(),
            streaming: state.streaming,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
