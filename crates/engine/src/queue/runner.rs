// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planner/executor seam for the task queue.

use std::sync::Arc;

use ads_adapters::{AdapterError, AgentAdapter, SendOptions};
use ads_core::{ClassifiedError, Input, PlanStep, Task};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Output of one executed plan step.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub summary: String,
    /// Thread the adapter used, for task bookkeeping.
    pub thread_id: Option<String>,
}

/// Plans a task into steps and executes them.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Produce `(title, description)` pairs. An empty plan is invalid.
    async fn plan(&self, task: &Task) -> Result<Vec<(String, String)>, ClassifiedError>;

    async fn run_step(
        &self,
        task: &Task,
        step: &PlanStep,
        cancel: &CancellationToken,
    ) -> Result<StepOutput, ClassifiedError>;

    /// Adapter id recorded on the task while it runs.
    fn agent_id(&self) -> String;
}

/// Runner backed by one agent adapter: single-step plans, the step prompt
/// is the task prompt (optionally prefixed with a plan-step header).
pub struct AgentTaskRunner {
    agent: Arc<dyn AgentAdapter>,
    /// Model used for planning turns when set (TASK_QUEUE_PLAN_MODEL).
    plan_model: Option<String>,
}

impl AgentTaskRunner {
    pub fn new(agent: Arc<dyn AgentAdapter>) -> Self {
        Self { agent, plan_model: None }
    }

    pub fn with_plan_model(mut self, model: Option<String>) -> Self {
        self.plan_model = model;
        self
    }
}

#[async_trait]
impl TaskRunner for AgentTaskRunner {
    async fn plan(&self, task: &Task) -> Result<Vec<(String, String)>, ClassifiedError> {
        // Without a dedicated plan model the task runs as one step.
        let Some(plan_model) = &self.plan_model else {
            return Ok(vec![("Execute task".to_string(), task.prompt.clone())]);
        };

        self.agent.set_model(Some(plan_model.clone()));
        let prompt = format!(
            "Break the following task into a short numbered list of concrete steps. \
             One step per line, no commentary.\n\n{}",
            task.prompt
        );
        let result = self
            .agent
            .send(Input::text(prompt), SendOptions { streaming: false, ..SendOptions::default() })
            .await;
        self.agent.set_model(task.model.clone());

        let outcome = result.map_err(|e| adapter_error(&e))?;
        let steps: Vec<(String, String)> = outcome
            .response
            .lines()
            .filter_map(|line| {
                let line = line.trim().trim_start_matches(|c: char| {
                    c.is_ascii_digit() || c == '.' || c == ')' || c == '-'
                });
                let line = line.trim();
                (!line.is_empty()).then(|| (line.to_string(), line.to_string()))
            })
            .collect();
        if steps.is_empty() {
            return Ok(vec![("Execute task".to_string(), task.prompt.clone())]);
        }
        Ok(steps)
    }

    async fn run_step(
        &self,
        task: &Task,
        step: &PlanStep,
        cancel: &CancellationToken,
    ) -> Result<StepOutput, ClassifiedError> {
        self.agent.set_model(task.model.clone());
        let prompt = if step.description == task.prompt {
            task.prompt.clone()
        } else {
            format!("{}\n\nCurrent step: {}", task.prompt, step.description)
        };
        let opts = SendOptions { cancel: cancel.clone(), ..SendOptions::default() };
        let outcome = self.agent.send(Input::text(prompt), opts).await.map_err(|e| {
            adapter_error(&e)
        })?;
        Ok(StepOutput { summary: outcome.response, thread_id: outcome.thread_id })
    }

    fn agent_id(&self) -> String {
        self.agent.id().to_string()
    }
}

/// Cancellation is reported by the queue's own cancel path; everything else
/// folds into the classified form.
fn adapter_error(err: &AdapterError) -> ClassifiedError {
    err.classify()
}
