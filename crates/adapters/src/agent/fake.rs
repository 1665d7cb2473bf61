// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fake adapter for tests.
//!
//! Turns are queued up front; each `send` consumes one. An unscripted send
//! echoes the prompt back. Gated behind the `test-support` feature.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ads_core::{AgentEvent, ClassifiedError, Input, TurnError};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::{AdapterError, AgentAdapter, AgentStatus, SendOptions, TurnOutcome};

/// One scripted turn.
#[derive(Debug, Clone, Default)]
pub struct FakeTurn {
    /// Item events emitted before the turn resolves.
    pub events: Vec<AgentEvent>,
    pub response: String,
    /// When set, the turn fails with this classification.
    pub error: Option<ClassifiedError>,
    /// Thread id the adapter reports after this turn.
    pub thread_id: Option<String>,
    /// Simulated work time (lets tests exercise cancellation).
    pub delay: Option<Duration>,
}

impl FakeTurn {
    pub fn responding(response: impl Into<String>) -> Self {
        Self { response: response.into(), ..Self::default() }
    }

    pub fn failing(error: ClassifiedError) -> Self {
        Self { error: Some(error), ..Self::default() }
    }

    pub fn with_events(mut self, events: Vec<AgentEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct FakeState {
    thread_id: Option<String>,
    model: Option<String>,
    cwd: Option<PathBuf>,
    streaming: bool,
    resets: u32,
}

/// Scripted agent adapter.
pub struct FakeAgent {
    id: String,
    turns: Mutex<VecDeque<FakeTurn>>,
    calls: Mutex<Vec<Input>>,
    state: Arc<Mutex<FakeState>>,
    events: broadcast::Sender<AgentEvent>,
}

impl FakeAgent {
    pub fn new(id: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            id: id.into(),
            turns: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            state: Arc::new(Mutex::new(FakeState::default())),
            events,
        }
    }

    pub fn script(&self, turn: FakeTurn) {
        self.turns.lock().push_back(turn);
    }

    /// Inputs received so far.
    pub fn calls(&self) -> Vec<Input> {
        self.calls.lock().clone()
    }

    pub fn reset_count(&self) -> u32 {
        self.state.lock().resets
    }

    pub fn cwd(&self) -> Option<PathBuf> {
        self.state.lock().cwd.clone()
    }

    pub fn model(&self) -> Option<String> {
        self.state.lock().model.clone()
    }
}

#[async_trait]
impl AgentAdapter for FakeAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, input: Input, opts: SendOptions) -> Result<TurnOutcome, AdapterError> {
        self.calls.lock().push(input.clone());
        let turn = self
            .turns
            .lock()
            .pop_front()
            .unwrap_or_else(|| FakeTurn::responding(format!("echo: {}", input.joined_text())));

        self.state.lock().streaming = true;
        let _ = self.events.send(AgentEvent::TurnStarted);

        for event in &turn.events {
            if opts.streaming {
                let _ = self.events.send(event.clone());
            }
        }

        if let Some(delay) = turn.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = opts.cancel.cancelled() => {
                    self.state.lock().streaming = false;
                    return Err(AdapterError::Aborted);
                }
            }
        }

        let mut state = self.state.lock();
        state.streaming = false;
        if let Some(error) = turn.error {
            let _ = self.events.send(AgentEvent::TurnFailed {
                error: TurnError { message: error.original_error.clone() },
            });
            return Err(AdapterError::Protocol(error));
        }

        if let Some(thread_id) = &turn.thread_id {
            state.thread_id = Some(thread_id.clone());
        } else if state.thread_id.is_none() {
            state.thread_id = Some(format!("fake-thread-{}", state.resets + 1));
        }

        let outcome = TurnOutcome {
            response: turn.response,
            usage: None,
            thread_id: state.thread_id.clone(),
        };
        let _ = self.events.send(AgentEvent::TurnCompleted {
            response: outcome.response.clone(),
            usage: None,
        });
        Ok(outcome)
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
        state.resets += 1;
    }

    fn set_model(&self, model: Option<String>) {
        self.state.lock().model = model;
    }

    fn set_working_directory(&self, cwd: PathBuf) {
        self.state.lock().cwd = Some(cwd);
    }

    fn status(&self) -> AgentStatus {
        let state = self.state.lock();
        AgentStatus { ready: !state.streaming, error: None, streaming: state.streaming }
    }
}
