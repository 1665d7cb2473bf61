// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-adapter orchestrator.
//!
//! Holds an ordered list of agent adapters with one designated active
//! adapter. Turns route to the active adapter unless a specific agent is
//! named. Events from every adapter fan into one stream; only the adapter
//! processing a turn emits, so subscribers effectively follow the turn.

use std::path::PathBuf;
use std::sync::Arc;

use ads_adapters::{AdapterError, AgentAdapter, SendOptions, TurnOutcome};
use ads_core::{AgentEvent, Input, Phase};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::EngineError;

/// Marker prefix a supervisor response uses to hand work to a subordinate:
/// `@delegate(<agent-id>): <prompt>`.
const DELEGATE_PREFIX: &str = "@delegate(";

/// Snapshot of one adapter for status surfaces.
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub id: String,
    pub active: bool,
    pub ready: bool,
}

pub struct Orchestrator {
    agents: Vec<Arc<dyn AgentAdapter>>,
    active: Mutex<usize>,
    events: broadcast::Sender<AgentEvent>,
}

impl Orchestrator {
    /// Build from a non-empty adapter list; the first adapter is active.
    pub fn new(agents: Vec<Arc<dyn AgentAdapter>>) -> Self {
        debug_assert!(!agents.is_empty(), "orchestrator requires at least one adapter");
        let (events, _) = broadcast::channel(1024);
        for agent in &agents {
            let mut rx = agent.subscribe();
            let tx = events.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            let _ = tx.send(event);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "orchestrator event forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }
        Self { agents, active: Mutex::new(0), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    pub fn active_agent(&self) -> Arc<dyn AgentAdapter> {
        Arc::clone(&self.agents[*self.active.lock() % self.agents.len()])
    }

    fn find(&self, id: &str) -> Option<Arc<dyn AgentAdapter>> {
        self.agents.iter().find(|a| a.id() == id).cloned()
    }

    /// Route a turn to the active adapter.
    pub async fn send(&self, input: Input, opts: SendOptions) -> Result<TurnOutcome, AdapterError> {
        self.active_agent().send(input, opts).await
    }

    /// Route a turn to a specific adapter.
    pub async fn invoke_agent(
        &self,
        id: &str,
        input: Input,
        opts: SendOptions,
    ) -> Result<TurnOutcome, AdapterError> {
        match self.find(id) {
            Some(agent) => agent.send(input, opts).await,
            None => Err(AdapterError::Spawn(format!("unknown agent: {}", id))),
        }
    }

    pub fn switch_agent(&self, id: &str) -> Result<(), EngineError> {
        let index = self
            .agents
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| EngineError::UnknownAgent(id.to_string()))?;
        *self.active.lock() = index;
        Ok(())
    }

    pub fn list_agents(&self) -> Vec<AgentSnapshot> {
        let active = *self.active.lock();
        self.agents
            .iter()
            .enumerate()
            .map(|(index, agent)| AgentSnapshot {
                id: agent.id().to_string(),
                active: index == active,
                ready: agent.status().ready,
            })
            .collect()
    }

    // ---- pass-throughs to the active adapter ----

    pub fn thread_id(&self) -> Option<String> {
        self.active_agent().thread_id()
    }

    pub fn reset(&self) {
        self.active_agent().reset()
    }

    pub fn set_model(&self, model: Option<String>) {
        self.active_agent().set_model(model)
    }

    pub fn set_working_directory(&self, cwd: PathBuf) {
        for agent in &self.agents {
            agent.set_working_directory(cwd.clone());
        }
    }

    pub fn status(&self) -> ads_adapters::AgentStatus {
        self.active_agent().status()
    }

    /// Collaborative turn: run the supervisor, then execute any
    /// `@delegate(agent): prompt` directives in its response sequentially,
    /// surfacing delegation hooks on the event stream.
    pub async fn send_collaborative(
        &self,
        input: Input,
        opts: SendOptions,
    ) -> Result<TurnOutcome, AdapterError> {
        let mut outcome = self.send(input, opts.clone()).await?;
        let directives = parse_delegations(&outcome.response);
        if directives.is_empty() {
            return Ok(outcome);
        }

        let mut combined = outcome.response.clone();
        for (agent_id, prompt) in directives {
            let _ = self.events.send(AgentEvent::Status {
                phase: Phase::Tool,
                title: "delegation:start".into(),
                detail: agent_id.clone(),
            });
            match self.invoke_agent(&agent_id, Input::text(prompt), opts.clone()).await {
                Ok(sub) => {
                    let _ = self.events.send(AgentEvent::Status {
                        phase: Phase::Tool,
                        title: "delegation:result".into(),
                        detail: agent_id.clone(),
                    });
                    combined.push_str(&format!("\n\n[{}] {}", agent_id, sub.response));
                }
                Err(AdapterError::Aborted) => return Err(AdapterError::Aborted),
                Err(err) => {
                    let _ = self.events.send(AgentEvent::Status {
                        phase: Phase::Error,
                        title: "delegation:result".into(),
                        detail: format!("{}: {}", agent_id, err),
                    });
                }
            }
        }
        outcome.response = combined;
        Ok(outcome)
    }
}

/// Extract `@delegate(agent): prompt` directives, one per line.
fn parse_delegations(response: &str) -> Vec<(String, String)> {
    let mut directives = Vec::new();
    for line in response.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(DELEGATE_PREFIX) else {
            continue;
        };
        let Some(close) = rest.find(')') else {
            continue;
        };
        let agent = rest[..close].trim().to_string();
        let prompt = rest[close + 1..].trim_start_matches(':').trim().to_string();
        if !agent.is_empty() && !prompt.is_empty() {
            directives.push((agent, prompt));
        }
    }
    directives
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
