// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project task queue.
//!
//! One task at a time per project. The scheduler promotes queued tasks to
//! pending, picks the highest-priority pending task, plans it, executes the
//! plan step by step and emits lifecycle events in causal order. All state
//! transitions happen under the project's workspace lock; the agent work
//! itself runs outside it so interactive turns are not starved for the
//! whole duration of a task.

mod events;
mod runner;

pub use events::QueueEvent;
pub use runner::{AgentTaskRunner, StepOutput, TaskRunner};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ads_core::{Clock, MessageRole, MessageType, Task, TaskId, TaskMessage};
use ads_exec::WorkspaceLocks;
use ads_storage::TaskStore;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::EngineError;

/// Scheduler idle poll; the Notify wake is the fast path.
const IDLE_POLL: Duration = Duration::from_millis(500);

struct ActiveRun {
    task_id: TaskId,
    cancel: CancellationToken,
}

struct SingleRun {
    task_id: TaskId,
    /// Return the queue to paused once this task reaches a terminal state.
    pause_after: bool,
}

#[derive(Default)]
struct QueueState {
    running: bool,
    active: Option<ActiveRun>,
    single: Option<SingleRun>,
}

/// Per-project scheduler.
pub struct TaskQueue<C: Clock> {
    store: Arc<TaskStore>,
    runner: Arc<dyn TaskRunner>,
    locks: WorkspaceLocks,
    workspace_root: PathBuf,
    clock: C,
    events: broadcast::Sender<QueueEvent>,
    state: Mutex<QueueState>,
    wake: Notify,
}

impl<C: Clock + 'static> TaskQueue<C> {
    pub fn new(
        store: Arc<TaskStore>,
        runner: Arc<dyn TaskRunner>,
        locks: WorkspaceLocks,
        workspace_root: PathBuf,
        clock: C,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            store,
            runner,
            locks,
            workspace_root,
            clock,
            events,
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn active_task_id(&self) -> Option<TaskId> {
        self.state.lock().active.as_ref().map(|a| a.task_id.clone())
    }

    // ---- control plane ----

    pub fn start(&self) {
        let mut state = self.state.lock();
        if !state.running {
            state.running = true;
            drop(state);
            info!("task queue started");
            self.emit(QueueEvent::QueueResumed);
        }
        self.wake.notify_one();
    }

    pub fn pause(&self, reason: Option<String>) {
        let mut state = self.state.lock();
        if state.running {
            state.running = false;
            drop(state);
            info!(?reason, "task queue paused");
            self.emit(QueueEvent::QueuePaused { reason });
        }
    }

    pub fn resume(&self) {
        self.start();
    }

    /// New task arrived; wake the scheduler.
    pub fn notify_new_task(&self) {
        self.wake.notify_one();
    }

    /// Cancel a task. Aborts the in-flight run when it is the active task;
    /// otherwise transitions any non-terminal task directly.
    pub fn cancel(&self, id: &TaskId) -> Result<(), EngineError> {
        let active_cancel = {
            let state = self.state.lock();
            state.active.as_ref().filter(|a| &a.task_id == id).map(|a| a.cancel.clone())
        };
        if let Some(cancel) = active_cancel {
            debug!(task = %id, "aborting active task");
            cancel.cancel();
            return Ok(());
        }
        let now = self.clock.epoch_ms();
        if let Some(task) = self.store.cancel_task(id, now)? {
            self.emit(QueueEvent::TaskCancelled { task });
        }
        Ok(())
    }

    /// Put a failed or cancelled task back into the pending pool.
    pub fn retry(&self, id: &TaskId) -> Result<Task, EngineError> {
        let task = self
            .store
            .get_task(id)
            .ok_or_else(|| ads_storage::StoreError::NotFound(format!("task {}", id)))?;
        if !matches!(task.status, ads_core::TaskStatus::Failed | ads_core::TaskStatus::Cancelled) {
            return Err(EngineError::Store(ads_storage::StoreError::Conflict(format!(
                "task {} is {}; only failed or cancelled tasks can be retried",
                id, task.status
            ))));
        }
        let requeued = self.store.requeue_task(id, self.clock.epoch_ms())?;
        self.emit(QueueEvent::TaskUpdated { task: requeued.clone() });
        self.wake.notify_one();
        Ok(requeued)
    }

    /// Re-run a terminal task (completed included).
    pub fn rerun(&self, id: &TaskId) -> Result<Task, EngineError> {
        let requeued = self.store.requeue_task(id, self.clock.epoch_ms())?;
        self.emit(QueueEvent::TaskUpdated { task: requeued.clone() });
        self.wake.notify_one();
        Ok(requeued)
    }

    /// Exclusive single-task run: auto-resumes the queue, runs only this
    /// task, and re-pauses on its terminal event. Idempotent when the same
    /// task is already running under the controller.
    pub fn run_single(&self, id: &TaskId) -> Result<(), EngineError> {
        let task = self
            .store
            .get_task(id)
            .ok_or_else(|| ads_storage::StoreError::NotFound(format!("task {}", id)))?;
        let mut state = self.state.lock();
        if let Some(single) = &state.single {
            if &single.task_id == id {
                return Ok(()); // already driving this task
            }
            return Err(EngineError::Store(ads_storage::StoreError::Conflict(
                "another single-task run is in progress".into(),
            )));
        }
        if task.is_terminal() {
            return Err(EngineError::Store(ads_storage::StoreError::Conflict(format!(
                "task {} is already {}",
                id, task.status
            ))));
        }
        let was_paused = !state.running;
        state.single = Some(SingleRun { task_id: id.clone(), pause_after: was_paused });
        if was_paused {
            state.running = true;
            drop(state);
            self.emit(QueueEvent::QueueResumed);
        } else {
            drop(state);
        }
        self.wake.notify_one();
        Ok(())
    }

    // ---- scheduler ----

    /// Run the scheduler until `shutdown` fires.
    pub async fn run_loop(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(IDLE_POLL) => {}
            }
            while !shutdown.is_cancelled() && self.run_next().await {}
        }
    }

    /// Execute at most one task to a terminal state. Returns false when
    /// there was nothing to do.
    pub async fn run_next(&self) -> bool {
        let Some((task, prompt_injected, cancel)) = self.pick().await else {
            return false;
        };
        self.emit(QueueEvent::TaskStarted { task: task.clone(), prompt_injected });
        let outcome = self.drive(&task, &cancel).await;
        self.finish(&task.id, outcome, &cancel).await;
        true
    }

    /// Promotion pass + pick, under the workspace lock (single writer).
    async fn pick(&self) -> Option<(Task, bool, CancellationToken)> {
        self.locks
            .run_exclusive(&self.workspace_root, || async {
                {
                    let state = self.state.lock();
                    if !state.running || state.active.is_some() {
                        return None;
                    }
                }
                // Promote queued → pending until the queue is drained.
                loop {
                    let now = self.clock.epoch_ms();
                    match self.store.dequeue_next_queued_task(now) {
                        Ok(Some(promoted)) => {
                            self.emit(QueueEvent::TaskUpdated { task: promoted })
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "promotion pass failed");
                            break;
                        }
                    }
                }

                let single_target = self.state.lock().single.as_ref().map(|s| s.task_id.clone());
                let candidate = match &single_target {
                    Some(id) => self
                        .store
                        .get_task(id)
                        .filter(|t| t.status == ads_core::TaskStatus::Pending),
                    None => self
                        .store
                        .list_tasks(Some(ads_core::TaskStatus::Pending), Some(1))
                        .into_iter()
                        .next(),
                };
                let candidate = candidate?;

                let now = self.clock.epoch_ms();
                let task = match self.store.start_task(&candidate.id, now) {
                    Ok(task) => task,
                    Err(e) => {
                        warn!(task = %candidate.id, error = %e, "failed to start task");
                        return None;
                    }
                };
                let prompt_injected =
                    self.store.mark_prompt_injected(&task.id, now).unwrap_or(false);

                let cancel = CancellationToken::new();
                self.state.lock().active =
                    Some(ActiveRun { task_id: task.id.clone(), cancel: cancel.clone() });
                Some((task, prompt_injected, cancel))
            })
            .await
    }

    /// Plan + execute. Runs outside the workspace lock.
    async fn drive(
        &self,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<(String, Option<String>), ads_core::ClassifiedError> {
        let steps = self.runner.plan(task).await?;
        if cancel.is_cancelled() {
            return Err(cancelled_marker());
        }
        let plan = self
            .store
            .add_plan_steps(&task.id, steps)
            .map_err(|e| ads_core::ClassifiedError::new(ads_core::ErrorCode::Internal, e.to_string()))?;
        self.emit(QueueEvent::TaskPlanned { task_id: task.id.clone(), steps: plan.clone() });

        let running = self
            .store
            .set_task_running(&task.id, Some(self.runner.agent_id()))
            .map_err(|e| ads_core::ClassifiedError::new(ads_core::ErrorCode::Internal, e.to_string()))?;
        self.emit(QueueEvent::TaskRunning { task_id: task.id.clone() });

        let mut last_summary = String::new();
        let mut last_thread = None;
        for step in &plan {
            if cancel.is_cancelled() {
                return Err(cancelled_marker());
            }
            self.emit(QueueEvent::StepStarted {
                task_id: task.id.clone(),
                step_number: step.step_number,
            });
            let _ = self.store.set_plan_step_state(
                &task.id,
                step.step_number,
                ads_core::PlanStepState::Started,
            );

            let output = match self.runner.run_step(&running, step, cancel).await {
                Ok(output) => output,
                Err(err) => {
                    let _ = self.store.set_plan_step_state(
                        &task.id,
                        step.step_number,
                        ads_core::PlanStepState::Failed,
                    );
                    return Err(err);
                }
            };

            let message = TaskMessage {
                task_id: task.id.clone(),
                role: MessageRole::Assistant,
                message_type: MessageType::Chat,
                content: output.summary.clone(),
                model_used: running.model.clone(),
                created_at_ms: self.clock.epoch_ms(),
            };
            let _ = self.store.add_message(message.clone());
            self.emit(QueueEvent::Message { task_id: task.id.clone(), message });

            let _ = self.store.set_plan_step_state(
                &task.id,
                step.step_number,
                ads_core::PlanStepState::Completed,
            );
            self.emit(QueueEvent::StepCompleted {
                task_id: task.id.clone(),
                step_number: step.step_number,
            });
            if output.thread_id.is_some() {
                last_thread = output.thread_id;
            }
            last_summary = output.summary;
        }
        Ok((last_summary, last_thread))
    }

    /// Terminal bookkeeping under the workspace lock.
    async fn finish(
        &self,
        task_id: &TaskId,
        outcome: Result<(String, Option<String>), ads_core::ClassifiedError>,
        cancel: &CancellationToken,
    ) {
        self.locks
            .run_exclusive(&self.workspace_root, || async {
                let now = self.clock.epoch_ms();
                let event = if cancel.is_cancelled() {
                    match self.store.cancel_task(task_id, now) {
                        Ok(Some(task)) => Some(QueueEvent::TaskCancelled { task }),
                        Ok(None) => None,
                        Err(e) => {
                            warn!(task = %task_id, error = %e, "cancel bookkeeping failed");
                            None
                        }
                    }
                } else {
                    match outcome {
                        Ok((result, thread_id)) => {
                            match self.store.complete_task(task_id, now, result, thread_id) {
                                Ok(task) => Some(QueueEvent::TaskCompleted { task }),
                                Err(e) => {
                                    warn!(task = %task_id, error = %e, "completion failed");
                                    None
                                }
                            }
                        }
                        Err(err) => match self.store.fail_task(task_id, now, err.to_string()) {
                            Ok((task, retried)) => {
                                Some(QueueEvent::TaskFailed { task, terminal: !retried })
                            }
                            Err(e) => {
                                warn!(task = %task_id, error = %e, "failure bookkeeping failed");
                                None
                            }
                        },
                    }
                };

                let pause_after = {
                    let mut state = self.state.lock();
                    state.active = None;
                    match &state.single {
                        Some(single) if &single.task_id == task_id => {
                            let pause = single.pause_after;
                            state.single = None;
                            if pause {
                                state.running = false;
                            }
                            pause
                        }
                        _ => false,
                    }
                };

                if let Some(event) = event {
                    self.emit(event);
                }
                if pause_after {
                    self.emit(QueueEvent::QueuePaused {
                        reason: Some("single-task run complete".into()),
                    });
                }
            })
            .await;
        self.wake.notify_one();
    }
}

fn cancelled_marker() -> ads_core::ClassifiedError {
    ads_core::ClassifiedError::new(ads_core::ErrorCode::Internal, "aborted").not_retryable()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
